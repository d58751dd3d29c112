/*
Copyright 2021 Google LLC

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    https://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Builders for declaration-model fixtures shared by the integration suites.

#![allow(dead_code)]

use stiletto::annotation::AnnotationData;
use stiletto::codegen::{generate_component, GeneratedUnit};
use stiletto::config::CompilerOptions;
use stiletto::error::{DiagnosticKind, DiagnosticLog};
use stiletto::graph::{build_graph, BindingGraph, GraphResult};
use stiletto::manifest::{
    BindingDecl, BindingType, ComponentDecl, ComponentKind, DependencyDecl, EntryPointDecl,
    InjectableDecl, Manifest, ModuleDecl,
};
use stiletto::processor::AllResolved;
use stiletto::type_data::TypeData;
use stiletto::validate::{validate_graph, ValidationReport};

pub const TEST_CRATE: &str = "test";

/// A type local to the test crate.
pub fn t(path: &str) -> TypeData {
    TypeData::local(TEST_CRATE, path)
}

pub fn qualifier(name: &str) -> AnnotationData {
    AnnotationData::of(t(name))
}

pub fn provider_of(inner: TypeData) -> TypeData {
    TypeData::global("stiletto::Provider").with_args(vec![inner])
}

pub fn lazy_of(inner: TypeData) -> TypeData {
    TypeData::global("stiletto::Lazy").with_args(vec![inner])
}

pub fn produced_of(inner: TypeData) -> TypeData {
    TypeData::global("stiletto::Produced").with_args(vec![inner])
}

/// A `_` standing in for a type argument the declaration left open.
pub fn placeholder() -> TypeData {
    TypeData::primitive("_")
}

pub fn component(name: &str) -> ComponentDecl {
    let mut component = ComponentDecl::new();
    component.type_data = t(name);
    component.module_path = "crate".to_owned();
    component
}

pub fn subcomponent(name: &str) -> ComponentDecl {
    let mut result = component(name);
    result.kind = ComponentKind::Subcomponent;
    result
}

pub fn entry(name: &str, type_data: TypeData) -> EntryPointDecl {
    let mut entry_point = EntryPointDecl::new();
    entry_point.name = name.to_owned();
    entry_point.type_data = type_data;
    entry_point
}

/// An entry point spelled `& T`, the way scoped bindings are consumed.
pub fn ref_entry(name: &str, mut type_data: TypeData) -> EntryPointDecl {
    type_data.field_ref = true;
    entry(name, type_data)
}

pub fn module(name: &str) -> ModuleDecl {
    let mut module = ModuleDecl::new();
    module.type_data = t(name);
    module
}

pub fn provides(name: &str, type_data: TypeData) -> BindingDecl {
    let mut binding = BindingDecl::new(BindingType::Provides);
    binding.name = name.to_owned();
    binding.type_data = type_data;
    binding
}

pub fn dep(type_data: TypeData) -> DependencyDecl {
    let mut dependency = DependencyDecl::new();
    dependency.name = "dep".to_owned();
    dependency.type_data = type_data;
    dependency
}

pub fn injectable(name: &str, dependencies: Vec<DependencyDecl>) -> InjectableDecl {
    let mut result = InjectableDecl::new();
    result.type_data = t(name);
    result.ctor_name = "new".to_owned();
    result.dependencies = dependencies;
    result
}

pub fn scoped_injectable(name: &str, scope: &str) -> InjectableDecl {
    let mut result = injectable(name, Vec::new());
    result.scopes.push(t(scope));
    result
}

/// Resolves one component's graph with every type resolvable.
pub fn build(manifest: &Manifest, name: &str) -> (BindingGraph, DiagnosticLog) {
    let component = manifest
        .find_component(&t(name))
        .unwrap_or_else(|| panic!("no component {} in manifest", name));
    let mut log = DiagnosticLog::new();
    match build_graph(manifest, component, &AllResolved, &mut log) {
        GraphResult::Built(graph) => (graph, log),
        GraphResult::Deferred { waiting_on, .. } => {
            panic!("unexpected deferral waiting on {}", waiting_on.readable())
        }
    }
}

pub fn validate(manifest: &Manifest, name: &str) -> ValidationReport {
    let (graph, _) = build(manifest, name);
    validate_graph(manifest, &graph)
}

pub fn generate(manifest: &Manifest, name: &str, options: &CompilerOptions) -> GeneratedUnit {
    let (graph, log) = build(manifest, name);
    assert!(
        log.is_empty(),
        "unexpected diagnostics: {:#?}",
        log.iter().collect::<Vec<_>>()
    );
    generate_component(manifest, &graph, options)
}

pub fn kinds(log: &DiagnosticLog) -> Vec<DiagnosticKind> {
    log.iter().map(|diagnostic| diagnostic.kind).collect()
}

/// Generated token streams print with separator spaces; strip all whitespace
/// so assertions can spell code naturally.
pub fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn assert_parses(unit: &GeneratedUnit) -> syn::File {
    syn::parse2(unit.tokens.clone()).unwrap_or_else(|e| {
        panic!(
            "generated unit {} does not parse: {}\n{}",
            unit.name,
            e,
            unit.text()
        )
    })
}

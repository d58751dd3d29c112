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

mod common;

use common::*;
use stiletto::error::DiagnosticKind;
use stiletto::manifest::{
    BindingDecl, BindingType, CreatorDecl, CreatorMethodDecl, DeclaredVisibility, Manifest,
    MultibindingType, SupertraitDecl, TypeDecl,
};
use stiletto::type_data::TypeData;

fn report_kinds(report: &stiletto::validate::ValidationReport) -> Vec<DiagnosticKind> {
    report
        .diagnostics
        .iter()
        .map(|diagnostic| diagnostic.kind)
        .collect()
}

fn manifest_with_module_binding(binding: BindingDecl) -> Manifest {
    let mut manifest = Manifest::new();
    let mut m = module("M");
    m.bindings.push(binding);
    manifest.modules.push(m);
    let mut my_component = component("MyComponent");
    my_component.modules.push(t("M"));
    manifest.components.push(my_component);
    manifest
}

#[test]
fn module_private_type_inaccessible_from_component_module() {
    let mut manifest = Manifest::new();
    manifest.type_decls.push(TypeDecl {
        type_data: t("internal::Widget"),
        visibility: DeclaredVisibility::Module,
        defined_in: "crate::internal".to_owned(),
        exported_name: None,
    });
    let mut widget_module = module("WidgetModule");
    widget_module
        .bindings
        .push(provides("provide_widget", t("internal::Widget")));
    manifest.modules.push(widget_module);
    let mut my_component = component("MyComponent");
    my_component.modules.push(t("WidgetModule"));
    my_component
        .entry_points
        .push(entry("widget", t("internal::Widget")));
    manifest.components.push(my_component);

    let report = validate(&manifest, "MyComponent");
    assert_eq!(report_kinds(&report), vec![DiagnosticKind::InaccessibleType]);
    assert!(report.diagnostics[0]
        .message
        .contains("not accessible from test::crate"));

    // Generating from inside the declaring module sees the type.
    manifest.components[0].module_path = "crate::internal".to_owned();
    let report = validate(&manifest, "MyComponent");
    assert!(report.is_clean());
}

#[test]
fn scoped_binding_requires_declaring_component() {
    let mut manifest = Manifest::new();
    let mut cache_module = module("CacheModule");
    let mut binding = provides("provide_cache", t("Cache"));
    binding.scopes.push(t("AppScope"));
    cache_module.bindings.push(binding);
    manifest.modules.push(cache_module);
    let mut my_component = component("MyComponent");
    my_component.modules.push(t("CacheModule"));
    my_component.entry_points.push(ref_entry("cache", t("Cache")));
    manifest.components.push(my_component);

    let report = validate(&manifest, "MyComponent");
    assert_eq!(report_kinds(&report), vec![DiagnosticKind::ScopeMismatch]);
    assert!(report.diagnostics[0]
        .message
        .contains("nor an ancestor component declares that scope"));

    manifest.components[0].scopes.push(t("AppScope"));
    let report = validate(&manifest, "MyComponent");
    assert!(report.is_clean());
}

#[test]
fn child_may_use_scope_declared_by_ancestor() {
    let mut manifest = Manifest::new();
    manifest
        .injectables
        .push(scoped_injectable("Cache", "AppScope"));
    let mut parent = component("Parent");
    parent.scopes.push(t("AppScope"));
    parent.subcomponents.push(t("Child"));
    manifest.components.push(parent);
    let mut child = subcomponent("Child");
    child.entry_points.push(ref_entry("cache", t("Cache")));
    manifest.components.push(child);

    let report = validate(&manifest, "Parent");
    assert!(report.is_clean());
}

#[test]
fn descendant_scope_does_not_cover_ancestor_binding() {
    let mut manifest = Manifest::new();
    manifest
        .injectables
        .push(scoped_injectable("Cache", "AppScope"));
    let mut parent = component("Parent");
    parent.entry_points.push(ref_entry("cache", t("Cache")));
    parent.subcomponents.push(t("Child"));
    manifest.components.push(parent);
    let mut child = subcomponent("Child");
    child.scopes.push(t("AppScope"));
    manifest.components.push(child);

    let report = validate(&manifest, "Parent");
    assert_eq!(report_kinds(&report), vec![DiagnosticKind::ScopeMismatch]);
}

#[test]
fn scoped_binding_cannot_be_taken_by_value() {
    let mut manifest = Manifest::new();
    let mut cache_module = module("CacheModule");
    let mut binding = provides("provide_cache", t("Cache"));
    binding.scopes.push(t("AppScope"));
    cache_module.bindings.push(binding);
    manifest.modules.push(cache_module);
    let mut my_component = component("MyComponent");
    my_component.scopes.push(t("AppScope"));
    my_component.modules.push(t("CacheModule"));
    my_component.entry_points.push(entry("cache", t("Cache")));
    manifest.components.push(my_component);

    let report = validate(&manifest, "MyComponent");
    assert_eq!(report_kinds(&report), vec![DiagnosticKind::InvalidRequest]);
    assert!(report.diagnostics[0]
        .message
        .contains("unable to provide scoped binding as regular type"));
}

#[test]
fn unscoped_binding_cannot_be_borrowed() {
    let mut manifest = Manifest::new();
    let mut string_module = module("StringModule");
    string_module
        .bindings
        .push(provides("provide_string", TypeData::string()));
    manifest.modules.push(string_module);
    let mut my_component = component("MyComponent");
    my_component.modules.push(t("StringModule"));
    my_component
        .entry_points
        .push(ref_entry("string", TypeData::string()));
    manifest.components.push(my_component);

    let report = validate(&manifest, "MyComponent");
    assert_eq!(report_kinds(&report), vec![DiagnosticKind::InvalidRequest]);
    assert!(report.diagnostics[0]
        .message
        .contains("unable to borrow unscoped binding"));
}

#[test]
fn scope_claimed_twice_along_chain_rejected() {
    let mut manifest = Manifest::new();
    let mut parent = component("Parent");
    parent.scopes.push(t("AppScope"));
    parent.subcomponents.push(t("Child"));
    manifest.components.push(parent);
    let mut child = subcomponent("Child");
    child.scopes.push(t("AppScope"));
    manifest.components.push(child);

    let report = validate(&manifest, "Parent");
    assert_eq!(report_kinds(&report), vec![DiagnosticKind::ScopeMismatch]);
    assert!(report.diagnostics[0]
        .message
        .contains("already claimed by ancestor component ::test::Parent"));
}

#[test]
fn multibinds_must_return_a_collection() {
    let mut declared = BindingDecl::new(BindingType::Multibinds);
    declared.name = "nothing".to_owned();
    declared.type_data = TypeData::unit();
    let manifest = manifest_with_module_binding(declared);

    let report = validate(&manifest, "MyComponent");
    assert_eq!(
        report_kinds(&report),
        vec![DiagnosticKind::MalformedMultibinding]
    );
    assert!(report.diagnostics[0]
        .message
        .contains("must return a collection"));
}

#[test]
fn multibinds_rejects_raw_collection() {
    let mut declared = BindingDecl::new(BindingType::Multibinds);
    declared.name = "raw".to_owned();
    declared.type_data = TypeData::global("std::vec::Vec");
    let manifest = manifest_with_module_binding(declared);

    let report = validate(&manifest, "MyComponent");
    assert_eq!(
        report_kinds(&report),
        vec![DiagnosticKind::MalformedMultibinding]
    );
    assert!(report.diagnostics[0]
        .message
        .contains("must name its element type"));
}

#[test]
fn multibinds_rejects_placeholder_map_key() {
    let mut declared = BindingDecl::new(BindingType::Multibinds);
    declared.name = "wild".to_owned();
    declared.type_data = TypeData::map_of(placeholder(), TypeData::string());
    let manifest = manifest_with_module_binding(declared);

    let report = validate(&manifest, "MyComponent");
    assert_eq!(
        report_kinds(&report),
        vec![DiagnosticKind::MalformedMultibinding]
    );
    assert!(report.diagnostics[0].message.contains("may not use _"));
}

#[test]
fn multibinds_rejects_framework_element_type() {
    let mut declared = BindingDecl::new(BindingType::Multibinds);
    declared.name = "providers".to_owned();
    declared.type_data = TypeData::vec_of(provider_of(TypeData::string()));
    let manifest = manifest_with_module_binding(declared);

    let report = validate(&manifest, "MyComponent");
    assert_eq!(
        report_kinds(&report),
        vec![DiagnosticKind::MalformedMultibinding]
    );
    assert!(report.diagnostics[0]
        .message
        .contains("may not bind framework types"));
}

#[test]
fn contribution_rejects_framework_element_type() {
    let mut contribution = provides("provider", provider_of(TypeData::string()));
    contribution.multibinding = MultibindingType::IntoVec;
    let manifest = manifest_with_module_binding(contribution);

    let report = validate(&manifest, "MyComponent");
    assert_eq!(
        report_kinds(&report),
        vec![DiagnosticKind::MalformedMultibinding]
    );
}

fn creator_component(methods: Vec<CreatorMethodDecl>) -> Manifest {
    let mut manifest = Manifest::new();
    let mut my_component = component("MyComponent");
    let mut creator = CreatorDecl::default();
    creator.type_data = t("Builder");
    creator.methods = methods;
    my_component.creator = Some(creator);
    manifest.components.push(my_component);
    manifest
}

fn build_method(name: &str) -> CreatorMethodDecl {
    let mut method = CreatorMethodDecl::default();
    method.name = name.to_owned();
    method.return_type = Some(t("MyComponent"));
    method
}

fn setter(name: &str, parameter: TypeData) -> CreatorMethodDecl {
    let mut method = CreatorMethodDecl::default();
    method.name = name.to_owned();
    method.parameters.push(dep(parameter));
    method.bound_instance = true;
    method
}

#[test]
fn creator_allows_only_one_build_method() {
    let manifest = creator_component(vec![build_method("build"), build_method("create")]);
    let report = validate(&manifest, "MyComponent");
    assert_eq!(report_kinds(&report), vec![DiagnosticKind::MalformedCreator]);
    assert!(report.diagnostics[0]
        .message
        .contains("more than one build method"));
    assert!(report.diagnostics[0].message.contains("::test::Builder.build"));
    assert!(report.diagnostics[0].message.contains("::test::Builder.create"));
}

#[test]
fn creator_setter_takes_exactly_one_parameter() {
    let mut no_param = CreatorMethodDecl::default();
    no_param.name = "name".to_owned();
    no_param.bound_instance = true;
    let manifest = creator_component(vec![no_param]);
    let report = validate(&manifest, "MyComponent");
    assert_eq!(report_kinds(&report), vec![DiagnosticKind::MalformedCreator]);
    assert!(report.diagnostics[0]
        .message
        .contains("must take exactly one parameter"));
}

#[test]
fn creator_setter_rejects_framework_parameter() {
    let manifest = creator_component(vec![setter("name", provider_of(TypeData::string()))]);
    let report = validate(&manifest, "MyComponent");
    assert_eq!(report_kinds(&report), vec![DiagnosticKind::MalformedCreator]);
    assert!(report.diagnostics[0]
        .message
        .contains("may not take the framework type"));
}

#[test]
fn creator_setter_returns_unit_or_creator() {
    let mut method = setter("name", TypeData::string());
    method.return_type = Some(t("SomethingElse"));
    let manifest = creator_component(vec![method]);
    let report = validate(&manifest, "MyComponent");
    assert_eq!(report_kinds(&report), vec![DiagnosticKind::MalformedCreator]);
    assert!(report.diagnostics[0]
        .message
        .contains("must return nothing or the creator type"));

    let mut fluent = setter("name", TypeData::string());
    fluent.return_type = Some(t("Builder"));
    let manifest = creator_component(vec![fluent]);
    assert!(validate(&manifest, "MyComponent").is_clean());
}

#[test]
fn inherited_creator_method_cites_declaring_type() {
    let mut method = CreatorMethodDecl::default();
    method.name = "name".to_owned();
    method.bound_instance = true;
    method.declared_in = Some(t("BaseBuilder"));
    let manifest = creator_component(vec![method]);
    let report = validate(&manifest, "MyComponent");
    assert_eq!(report_kinds(&report), vec![DiagnosticKind::MalformedCreator]);
    assert!(report.diagnostics[0]
        .message
        .contains("::test::BaseBuilder.name"));
}

fn supertrait(name: &str, entry_points: Vec<stiletto::manifest::EntryPointDecl>) -> SupertraitDecl {
    let mut result = SupertraitDecl::default();
    result.type_data = t(name);
    result.entry_points = entry_points;
    result
}

#[test]
fn conflicting_inherited_entry_points_reported_once_citing_both() {
    let mut manifest = Manifest::new();
    let mut numbers = module("NumberModule");
    numbers
        .bindings
        .push(provides("provide_long", TypeData::primitive("i64")));
    numbers
        .bindings
        .push(provides("provide_double", TypeData::primitive("f64")));
    manifest.modules.push(numbers);
    let mut my_component = component("MyComponent");
    my_component.modules.push(t("NumberModule"));
    my_component
        .supertraits
        .push(supertrait("A", vec![entry("value", TypeData::primitive("i64"))]));
    my_component
        .supertraits
        .push(supertrait("B", vec![entry("value", TypeData::primitive("f64"))]));
    manifest.components.push(my_component);

    let report = validate(&manifest, "MyComponent");
    assert_eq!(
        report_kinds(&report),
        vec![DiagnosticKind::ConflictingEntryPoints]
    );
    let message = &report.diagnostics[0].message;
    assert!(message.contains("can only implement value once"));
    assert!(message.contains("::test::A.value -> i64"));
    assert!(message.contains("::test::B.value -> f64"));
}

#[test]
fn identical_inherited_entry_points_merge_silently() {
    let mut manifest = Manifest::new();
    let mut string_module = module("StringModule");
    string_module
        .bindings
        .push(provides("provide_string", TypeData::string()));
    manifest.modules.push(string_module);
    let mut my_component = component("MyComponent");
    my_component.modules.push(t("StringModule"));
    my_component
        .supertraits
        .push(supertrait("A", vec![entry("value", TypeData::string())]));
    my_component
        .supertraits
        .push(supertrait("B", vec![entry("value", TypeData::string())]));
    manifest.components.push(my_component);

    let report = validate(&manifest, "MyComponent");
    assert!(report.is_clean());
}

#[test]
fn production_binding_only_reachable_through_producer_kinds() {
    let mut manifest = Manifest::new();
    let mut token_module = module("TokenModule");
    let mut produces = BindingDecl::new(BindingType::Produces);
    produces.name = "produce_token".to_owned();
    produces.type_data = TypeData::string();
    token_module.bindings.push(produces);
    manifest.modules.push(token_module);
    let mut my_component = component("MyComponent");
    my_component.modules.push(t("TokenModule"));
    my_component
        .entry_points
        .push(entry("token", TypeData::string()));
    manifest.components.push(my_component);

    let report = validate(&manifest, "MyComponent");
    assert_eq!(report_kinds(&report), vec![DiagnosticKind::InvalidRequest]);
    assert!(report.diagnostics[0]
        .message
        .contains("may only be requested through Producer or Produced"));

    manifest.components[0].entry_points[0] = entry("token", produced_of(TypeData::string()));
    let report = validate(&manifest, "MyComponent");
    assert!(report.is_clean());
}

#[test]
fn validation_is_idempotent() {
    let mut manifest = Manifest::new();
    let mut cache_module = module("CacheModule");
    let mut binding = provides("provide_cache", t("Cache"));
    binding.scopes.push(t("AppScope"));
    cache_module.bindings.push(binding);
    manifest.modules.push(cache_module);
    let mut my_component = component("MyComponent");
    my_component.modules.push(t("CacheModule"));
    my_component.entry_points.push(entry("cache", t("Cache")));
    manifest.components.push(my_component);

    let (graph, _) = build(&manifest, "MyComponent");
    let first = stiletto::validate::validate_graph(&manifest, &graph);
    let second = stiletto::validate::validate_graph(&manifest, &graph);
    assert!(!first.is_clean());
    assert_eq!(first, second);
}

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
use stiletto::manifest::Manifest;
use stiletto::type_data::TypeData;

fn cyclic_manifest(foo_dep: TypeData, bar_dep: TypeData) -> Manifest {
    let mut manifest = Manifest::new();
    manifest.injectables.push(injectable("Foo", vec![dep(foo_dep)]));
    manifest.injectables.push(injectable("Bar", vec![dep(bar_dep)]));
    let mut my_component = component("MyComponent");
    my_component.entry_points.push(entry("foo", t("Foo")));
    manifest.components.push(my_component);
    manifest
}

#[test]
fn all_instance_cycle_is_fatal() {
    let manifest = cyclic_manifest(t("Bar"), t("Foo"));
    let (_, log) = build(&manifest, "MyComponent");
    assert_eq!(kinds(&log), vec![DiagnosticKind::DependencyCycle]);
    let diagnostic = log.iter().next().unwrap();
    assert!(diagnostic.message.contains("Cyclic dependency detected"));
    assert!(diagnostic.message.contains("*->"));
    assert!(diagnostic.message.contains("::test::Foo (injectable)"));
}

#[test]
fn provider_broken_cycle_is_legal() {
    let manifest = cyclic_manifest(provider_of(t("Bar")), provider_of(t("Foo")));
    let (_, log) = build(&manifest, "MyComponent");
    assert!(log.is_empty());
}

#[test]
fn lazy_broken_cycle_is_legal() {
    let manifest = cyclic_manifest(lazy_of(t("Bar")), lazy_of(t("Foo")));
    let (_, log) = build(&manifest, "MyComponent");
    assert!(log.is_empty());
}

#[test]
fn single_indirect_edge_does_not_excuse_the_rest() {
    // Foo asks for a deferred Bar, but Bar still asks for Foo directly.
    let manifest = cyclic_manifest(provider_of(t("Bar")), t("Foo"));
    let (_, log) = build(&manifest, "MyComponent");
    assert_eq!(kinds(&log), vec![DiagnosticKind::DependencyCycle]);
}

#[test]
fn cycle_reported_once_across_entry_points() {
    let mut manifest = cyclic_manifest(t("Bar"), t("Foo"));
    manifest.components[0].entry_points.push(entry("bar", t("Bar")));
    let (_, log) = build(&manifest, "MyComponent");
    assert_eq!(kinds(&log), vec![DiagnosticKind::DependencyCycle]);
}

#[test]
fn self_dependency_is_a_cycle() {
    let mut manifest = Manifest::new();
    manifest
        .injectables
        .push(injectable("Foo", vec![dep(t("Foo"))]));
    let mut my_component = component("MyComponent");
    my_component.entry_points.push(entry("foo", t("Foo")));
    manifest.components.push(my_component);

    let (_, log) = build(&manifest, "MyComponent");
    assert_eq!(kinds(&log), vec![DiagnosticKind::DependencyCycle]);
}

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
use stiletto::annotation::AnnotationValue;
use stiletto::binding::BindingKind;
use stiletto::error::DiagnosticKind;
use stiletto::key::Key;
use stiletto::manifest::{BindingDecl, BindingType, Manifest, MultibindingType};
use stiletto::type_data::TypeData;

fn into_vec(name: &str, type_data: TypeData) -> BindingDecl {
    let mut binding = provides(name, type_data);
    binding.multibinding = MultibindingType::IntoVec;
    binding
}

fn into_map(name: &str, type_data: TypeData, map_key: AnnotationValue) -> BindingDecl {
    let mut binding = provides(name, type_data);
    binding.multibinding = MultibindingType::IntoMap;
    binding.map_key = Some(map_key);
    binding
}

fn vec_component(manifest: &mut Manifest, element: TypeData) {
    let mut my_component = component("MyComponent");
    my_component.modules.push(t("M"));
    my_component
        .entry_points
        .push(entry("strings", TypeData::vec_of(element)));
    manifest.components.push(my_component);
}

#[test]
fn into_vec_contributions_accumulate() {
    let mut manifest = Manifest::new();
    let mut m = module("M");
    m.bindings.push(into_vec("a", TypeData::string()));
    m.bindings.push(into_vec("b", TypeData::string()));
    manifest.modules.push(m);
    vec_component(&mut manifest, TypeData::string());

    let (graph, log) = build(&manifest, "MyComponent");
    assert!(log.is_empty());
    let aggregate = graph
        .binding_for(&Key::for_type(&TypeData::vec_of(TypeData::string())))
        .unwrap();
    assert!(matches!(aggregate.kind, BindingKind::MultiboundVec));
    assert_eq!(aggregate.dependencies.len(), 2);
    // Each contribution resolves under its own key.
    let contribution = Key::for_type(&TypeData::string()).with_contribution(&t("M"), "a");
    assert!(graph.binding_for(&contribution).is_some());
}

#[test]
fn elements_into_vec_flattens_into_the_aggregate() {
    let mut manifest = Manifest::new();
    let mut m = module("M");
    m.bindings.push(into_vec("one", TypeData::string()));
    let mut many = provides("many", TypeData::vec_of(TypeData::string()));
    many.multibinding = MultibindingType::ElementsIntoVec;
    m.bindings.push(many);
    manifest.modules.push(m);
    vec_component(&mut manifest, TypeData::string());

    let (graph, log) = build(&manifest, "MyComponent");
    assert!(log.is_empty());
    let aggregate = graph
        .binding_for(&Key::for_type(&TypeData::vec_of(TypeData::string())))
        .unwrap();
    assert_eq!(aggregate.dependencies.len(), 2);
    assert_eq!(
        aggregate
            .dependencies
            .iter()
            .filter(|dependency| dependency.flattened)
            .count(),
        1
    );
}

#[test]
fn into_map_collects_entries_in_contribution_order() {
    let mut manifest = Manifest::new();
    let mut m = module("M");
    m.bindings.push(into_map(
        "a",
        TypeData::string(),
        AnnotationValue::Str("first".to_owned()),
    ));
    m.bindings.push(into_map(
        "b",
        TypeData::string(),
        AnnotationValue::Str("second".to_owned()),
    ));
    manifest.modules.push(m);
    let mut my_component = component("MyComponent");
    my_component.modules.push(t("M"));
    my_component.entry_points.push(entry(
        "map",
        TypeData::map_of(TypeData::string(), TypeData::string()),
    ));
    manifest.components.push(my_component);

    let (graph, log) = build(&manifest, "MyComponent");
    assert!(log.is_empty());
    let aggregate = graph
        .binding_for(&Key::for_type(&TypeData::map_of(
            TypeData::string(),
            TypeData::string(),
        )))
        .unwrap();
    match &aggregate.kind {
        BindingKind::MultiboundMap { entries } => {
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].0, AnnotationValue::Str("first".to_owned()));
        }
        other => panic!("unexpected kind {:?}", other),
    }
}

#[test]
fn duplicated_map_key_reported_once_and_skipped() {
    let mut manifest = Manifest::new();
    let mut m = module("M");
    m.bindings.push(into_map(
        "a",
        TypeData::string(),
        AnnotationValue::Str("same".to_owned()),
    ));
    m.bindings.push(into_map(
        "b",
        TypeData::string(),
        AnnotationValue::Str("same".to_owned()),
    ));
    manifest.modules.push(m);
    let mut my_component = component("MyComponent");
    my_component.modules.push(t("M"));
    my_component.entry_points.push(entry(
        "map",
        TypeData::map_of(TypeData::string(), TypeData::string()),
    ));
    manifest.components.push(my_component);

    let (graph, log) = build(&manifest, "MyComponent");
    assert_eq!(kinds(&log), vec![DiagnosticKind::DuplicateMapKey]);
    let aggregate = graph
        .binding_for(&Key::for_type(&TypeData::map_of(
            TypeData::string(),
            TypeData::string(),
        )))
        .unwrap();
    match &aggregate.kind {
        BindingKind::MultiboundMap { entries } => assert_eq!(entries.len(), 1),
        other => panic!("unexpected kind {:?}", other),
    }
}

#[test]
fn multibinds_declaration_alone_provides_empty_collection() {
    let mut manifest = Manifest::new();
    let mut m = module("M");
    let mut declared = BindingDecl::new(BindingType::Multibinds);
    declared.name = "strings".to_owned();
    declared.type_data = TypeData::vec_of(TypeData::string());
    m.bindings.push(declared);
    manifest.modules.push(m);
    vec_component(&mut manifest, TypeData::string());

    let (graph, log) = build(&manifest, "MyComponent");
    assert!(log.is_empty());
    let aggregate = graph
        .binding_for(&Key::for_type(&TypeData::vec_of(TypeData::string())))
        .unwrap();
    assert!(matches!(aggregate.kind, BindingKind::MultiboundVec));
    assert!(aggregate.dependencies.is_empty());
}

#[test]
fn int_map_key_builds_i32_keyed_map() {
    let mut manifest = Manifest::new();
    let mut m = module("M");
    m.bindings
        .push(into_map("a", TypeData::string(), AnnotationValue::Int(1)));
    manifest.modules.push(m);
    let mut my_component = component("MyComponent");
    my_component.modules.push(t("M"));
    my_component.entry_points.push(entry(
        "map",
        TypeData::map_of(TypeData::primitive("i32"), TypeData::string()),
    ));
    manifest.components.push(my_component);

    let (graph, log) = build(&manifest, "MyComponent");
    assert!(log.is_empty());
    assert!(graph
        .binding_for(&Key::for_type(&TypeData::map_of(
            TypeData::primitive("i32"),
            TypeData::string(),
        )))
        .is_some());
}

#[test]
fn enum_map_key_builds_enum_keyed_map() {
    let mut manifest = Manifest::new();
    let mut m = module("M");
    m.bindings.push(into_map(
        "a",
        TypeData::string(),
        AnnotationValue::EnumValue(t("Flavor::Vanilla")),
    ));
    manifest.modules.push(m);
    let mut my_component = component("MyComponent");
    my_component.modules.push(t("M"));
    my_component
        .entry_points
        .push(entry("map", TypeData::map_of(t("Flavor"), TypeData::string())));
    manifest.components.push(my_component);

    let (graph, log) = build(&manifest, "MyComponent");
    assert!(log.is_empty());
    assert!(graph
        .binding_for(&Key::for_type(&TypeData::map_of(
            t("Flavor"),
            TypeData::string(),
        )))
        .is_some());
}

#[test]
fn qualified_aggregate_collects_only_qualified_contributions() {
    let mut manifest = Manifest::new();
    let mut m = module("M");
    let mut named = into_vec("named", TypeData::string());
    named.qualifiers.push(qualifier("Q"));
    m.bindings.push(named);
    m.bindings.push(into_vec("plain", TypeData::string()));
    manifest.modules.push(m);
    let mut my_component = component("MyComponent");
    my_component.modules.push(t("M"));
    let mut named_entry = entry("strings", TypeData::vec_of(TypeData::string()));
    named_entry.qualifiers.push(qualifier("Q"));
    my_component.entry_points.push(named_entry);
    manifest.components.push(my_component);

    let (graph, log) = build(&manifest, "MyComponent");
    assert!(log.is_empty());
    let aggregate = graph
        .binding_for(&Key::qualified(
            &TypeData::vec_of(TypeData::string()),
            Some(qualifier("Q")),
        ))
        .unwrap();
    assert_eq!(aggregate.dependencies.len(), 1);
}

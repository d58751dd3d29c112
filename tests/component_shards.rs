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
use stiletto::config::CompilerOptions;
use stiletto::manifest::Manifest;

fn options(keys_per_shard: usize) -> CompilerOptions {
    let mut options = CompilerOptions::default();
    options.keys_per_component_shard = keys_per_shard;
    options
}

/// `count` independent scoped injectables, each its own entry point.
fn scoped_manifest(count: usize) -> Manifest {
    let mut manifest = Manifest::new();
    let mut my_component = component("MyComponent");
    my_component.scopes.push(t("AppScope"));
    for i in 0..count {
        let name = format!("Item{}", i);
        manifest
            .injectables
            .push(scoped_injectable(&name, "AppScope"));
        my_component
            .entry_points
            .push(ref_entry(&format!("item{}", i), t(&name)));
    }
    manifest.components.push(my_component);
    manifest
}

#[test]
fn binding_count_at_threshold_stays_one_shard() {
    let manifest = scoped_manifest(3);
    let unit = generate(&manifest, "MyComponent", &options(3));
    assert!(!unit.text().contains("Shard1"));
}

#[test]
fn one_binding_over_threshold_opens_second_shard() {
    let manifest = scoped_manifest(4);
    let text = generate(&manifest, "MyComponent", &options(3)).text();
    assert!(text.contains("Shard1"));
    assert!(!text.contains("Shard2"));
}

#[test]
fn scoped_fields_live_in_their_assigned_shard() {
    let manifest = scoped_manifest(2);
    let unit = generate(&manifest, "MyComponent", &options(1));
    let text = compact(&unit.text());
    // The second binding's cache cell sits in shard 1 and is reached through
    // the shard field.
    assert!(text.contains("Shard1{once_"));
    assert!(text.contains("self.shard1.once_"));
    assert_parses(&unit);
}

#[test]
fn independent_bindings_split_at_shard_size_one() {
    let mut manifest = Manifest::new();
    manifest.injectables.push(injectable("Foo", Vec::new()));
    manifest.injectables.push(injectable("Bar", Vec::new()));
    let mut my_component = component("MyComponent");
    my_component.entry_points.push(entry("foo", t("Foo")));
    my_component.entry_points.push(entry("bar", t("Bar")));
    manifest.components.push(my_component);

    let text = generate(&manifest, "MyComponent", &options(1)).text();
    assert!(text.contains("Shard1"));
}

#[test]
fn cyclic_bindings_never_split_across_shards() {
    let mut manifest = Manifest::new();
    manifest
        .injectables
        .push(injectable("Foo", vec![dep(provider_of(t("Bar")))]));
    manifest
        .injectables
        .push(injectable("Bar", vec![dep(provider_of(t("Foo")))]));
    let mut my_component = component("MyComponent");
    my_component.entry_points.push(entry("foo", t("Foo")));
    manifest.components.push(my_component);

    // Two bindings with room for one per shard, but the cycle keeps them
    // together in shard 0.
    let text = generate(&manifest, "MyComponent", &options(1)).text();
    assert!(!text.contains("Shard1"));
}

#[test]
fn cycle_straddling_the_boundary_pulls_into_one_shard() {
    let mut manifest = Manifest::new();
    manifest.injectables.push(injectable("First", Vec::new()));
    manifest
        .injectables
        .push(injectable("Foo", vec![dep(provider_of(t("Bar")))]));
    manifest
        .injectables
        .push(injectable("Bar", vec![dep(provider_of(t("Foo")))]));
    let mut my_component = component("MyComponent");
    my_component.entry_points.push(entry("first", t("First")));
    my_component.entry_points.push(entry("foo", t("Foo")));
    manifest.components.push(my_component);

    // First fills shard 0; the two-binding cycle does not fit and moves to
    // shard 1 whole instead of splitting.
    let text = generate(&manifest, "MyComponent", &options(2)).text();
    assert!(text.contains("Shard1"));
    assert!(!text.contains("Shard2"));
}

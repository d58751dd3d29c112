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

//! The switching provider: one generated struct multiplexing many bindings
//! through an integer id and a single dispatch method, instead of one
//! provider closure type per binding. Engaged under `fast_init`, or once a
//! component has enough provider-backed bindings that per-binding closures
//! would dominate the generated code.

use std::collections::{HashMap, HashSet};

use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::binding::{BindingKind, RequestKind};
use crate::codegen::{ComponentSections, GenContext};
use crate::config::CompilerOptions;
use crate::graph::BindingGraph;

/// Provider-backed binding count above which switching kicks in on its own.
pub const SWITCHING_PROVIDER_THRESHOLD: usize = 100;

pub(crate) struct SwitchingPlan {
    /// Key identifier → dispatch id.
    pub ids: HashMap<String, usize>,
    /// Identifiers in id order.
    pub order: Vec<String>,
}

/// Which keys are requested through a provider and can dispatch by id:
/// unscoped value bindings. Scoped bindings hand out references and stay on
/// their `Once` path.
fn switchable_requests(graph: &BindingGraph) -> Vec<String> {
    let mut requested: HashSet<String> = HashSet::new();
    for binding in graph.bindings_in_order() {
        for dependency in &binding.dependencies {
            if matches!(dependency.kind, RequestKind::Provider | RequestKind::Lazy) {
                requested.insert(dependency.key.identifier_string());
            }
        }
    }
    for entry_point in &graph.entry_points {
        if matches!(entry_point.kind, RequestKind::Provider | RequestKind::Lazy) {
            requested.insert(entry_point.key.identifier_string());
        }
    }

    graph
        .resolve_order
        .iter()
        .filter(|key| requested.contains(&key.identifier_string()))
        .filter(|key| {
            graph.binding_for(key).is_some_and(|binding| {
                binding.scope.is_none()
                    && !matches!(
                        binding.kind,
                        BindingKind::ComponentBinding { .. }
                            | BindingKind::MembersInjector { .. }
                            | BindingKind::Production { .. }
                    )
            })
        })
        .map(|key| key.identifier_string())
        .collect()
}

pub(crate) fn plan(graph: &BindingGraph, options: &CompilerOptions) -> Option<SwitchingPlan> {
    let switchable = switchable_requests(graph);
    if switchable.is_empty() {
        return None;
    }
    if !options.fast_init && switchable.len() <= SWITCHING_PROVIDER_THRESHOLD {
        return None;
    }
    let mut ids = HashMap::new();
    for (id, ident) in switchable.iter().enumerate() {
        ids.insert(ident.clone(), id);
    }
    Some(SwitchingPlan {
        ids,
        order: switchable,
    })
}

fn provider_struct_name(ctx: &GenContext) -> proc_macro2::Ident {
    format_ident!("{}SwitchingProvider", ctx.impl_name)
}

pub(crate) fn generate(ctx: &GenContext, plan: &SwitchingPlan) -> ComponentSections {
    let mut result = ComponentSections::new();
    let impl_name = &ctx.impl_name;
    let struct_name = provider_struct_name(ctx);

    let mut arms = quote! {};
    for (id, ident) in plan.order.iter().enumerate() {
        let method = format_ident!("{}", ident);
        arms = quote! {
            #arms
            #id => ::std::boxed::Box::new(self.#method()),
        };
    }

    result.add_methods(quote! {
        fn stiletto_switch(&self, id: usize) -> ::std::boxed::Box<dyn ::std::any::Any> {
            match id {
                #arms
                _ => panic!("unknown binding id {}", id),
            }
        }
    });

    result.add_items(quote! {
        #[allow(non_camel_case_types)]
        #[allow(dead_code)]
        struct #struct_name<'a, T> {
            component: &'a #impl_name,
            id: usize,
            _marker: ::std::marker::PhantomData<T>,
        }

        impl<'a, T: 'static> #struct_name<'a, T> {
            fn get(&self) -> T {
                *self
                    .component
                    .stiletto_switch(self.id)
                    .downcast::<T>()
                    .expect("switching provider delivers the declared type")
            }
        }
    });

    result
}

/// A provider that routes through the dispatch method instead of capturing
/// its own construction closure.
pub(crate) fn provider_expr(ctx: &GenContext, id: usize) -> TokenStream {
    let struct_name = provider_struct_name(ctx);
    quote! {{
        let provider = #struct_name {
            component: self,
            id: #id,
            _marker: ::std::marker::PhantomData,
        };
        stiletto::Provider::new(move || provider.get())
    }}
}

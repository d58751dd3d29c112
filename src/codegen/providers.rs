/*
Copyright 2020 Google LLC

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

//! One provider method per binding, plus the trait methods entry points turn
//! into. All expression generation funnels through [request_expr] so every
//! use site agrees on how a key is obtained.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::annotation::AnnotationValue;
use crate::binding::{Binding, BindingKind, RequestKind};
use crate::codegen::{component_impl_name, switching, GenContext};
use crate::graph::ResolvedEntryPoint;
use crate::key::Key;

/// `self` for local bindings, `self.parent` for inherited ones.
fn receiver(ctx: &GenContext, key: &Key) -> TokenStream {
    if ctx.graph.binding_for(key).is_some() {
        quote! {self}
    } else {
        quote! {self.parent}
    }
}

/// The expression producing one requested key at a use site.
pub(crate) fn request_expr(
    ctx: &GenContext,
    key: &Key,
    kind: RequestKind,
    reference: bool,
) -> TokenStream {
    let Some(target) = ctx.graph.lookup(key) else {
        // Resolution already reported this; keep the output parseable.
        return quote! {::core::unreachable!()};
    };
    let receiver = receiver(ctx, key);
    let method = key.identifier();
    let base = quote! {#receiver.#method()};
    let is_production = matches!(target.kind, BindingKind::Production { .. });
    let is_scoped = target.scope.is_some();

    match kind {
        RequestKind::Instance => {
            if !is_scoped && reference {
                quote! {&#base}
            } else {
                base
            }
        }
        RequestKind::Provider => provider_expr(ctx, key, &base),
        RequestKind::Lazy => {
            let provider = provider_expr(ctx, key, &base);
            quote! {stiletto::Lazy::new(#provider)}
        }
        RequestKind::Producer => {
            if is_production {
                quote! {stiletto::Producer::new(move || #base)}
            } else {
                quote! {stiletto::Producer::new(move || stiletto::Produced::succeeded(#base))}
            }
        }
        RequestKind::Produced => {
            if is_production {
                base
            } else {
                quote! {stiletto::Produced::succeeded(#base)}
            }
        }
    }
}

fn provider_expr(ctx: &GenContext, key: &Key, base: &TokenStream) -> TokenStream {
    if let Some(plan) = &ctx.switching {
        if let Some(id) = plan.ids.get(&key.identifier_string()) {
            return switching::provider_expr(ctx, *id);
        }
    }
    quote! {stiletto::Provider::new(move || #base)}
}

/// Return type of the provider method generated for a binding.
pub(crate) fn binding_return_type_tokens(ctx: &GenContext, binding: &Binding) -> TokenStream {
    match &binding.kind {
        BindingKind::Production { .. } => {
            let ty = ctx.spell(&binding.key.type_data);
            quote! {stiletto::Produced<#ty>}
        }
        BindingKind::MembersInjector { .. } => {
            let target = ctx.spell(&binding.key.type_data.args[0]);
            quote! {stiletto::MembersInjector<'_, #target>}
        }
        BindingKind::ComponentBinding { component }
            if component != &ctx.graph.component.type_data =>
        {
            let child = ctx.spell(component);
            quote! {::std::boxed::Box<dyn #child + '_>}
        }
        BindingKind::ComponentBinding { .. } => quote! {&Self},
        _ => {
            let ty = ctx.spell(&binding.key.type_data);
            if binding.scope.is_some() {
                quote! {&#ty}
            } else {
                quote! {#ty}
            }
        }
    }
}

/// The provider method for one binding.
pub(crate) fn binding_method(ctx: &GenContext, binding: &Binding) -> TokenStream {
    let method = binding.key.identifier();
    let return_type = binding_return_type_tokens(ctx, binding);

    match &binding.kind {
        BindingKind::ComponentBinding { component } => {
            if component == &ctx.graph.component.type_data {
                quote! {
                    fn #method(&self) -> &Self {
                        self
                    }
                }
            } else {
                let child_impl = component_impl_name(component, &ctx.current_crate);
                quote! {
                    fn #method(&self) -> #return_type {
                        ::std::boxed::Box::new(#child_impl::new(self))
                    }
                }
            }
        }
        BindingKind::MembersInjector { injectable } => {
            let target = ctx.spell(&binding.key.type_data.args[0]);
            let mut assignments = quote! {};
            let mut requests = binding.dependencies.iter();
            for field in injectable.fields.iter().filter(|field| field.injected) {
                let Some(request) = requests.next() else {
                    break;
                };
                let name = format_ident!("{}", field.name);
                let value = request_expr(ctx, &request.key, request.kind, request.reference);
                assignments = quote! {
                    #assignments
                    target.#name = #value;
                };
            }
            quote! {
                fn #method(&self) -> #return_type {
                    stiletto::MembersInjector::new(move |target: &mut #target| {
                        #assignments
                    })
                }
            }
        }
        _ => {
            let construct = construction_expr(ctx, binding);
            if binding.scope.is_some() {
                let once_access = once_access(ctx, binding);
                quote! {
                    fn #method(&self) -> #return_type {
                        #once_access.get(|| #construct)
                    }
                }
            } else {
                quote! {
                    fn #method(&self) -> #return_type {
                        #construct
                    }
                }
            }
        }
    }
}

fn once_access(ctx: &GenContext, binding: &Binding) -> TokenStream {
    let once_name = format_ident!("once_{}", binding.key.identifier());
    let shard = ctx
        .shards
        .shard_of
        .get(&binding.key.identifier_string())
        .copied()
        .unwrap_or(0);
    if shard == 0 {
        quote! {self.#once_name}
    } else {
        let shard_field = format_ident!("shard{}", shard);
        quote! {self.#shard_field.#once_name}
    }
}

fn dependency_args(ctx: &GenContext, binding: &Binding) -> TokenStream {
    let mut args = quote! {};
    for dependency in &binding.dependencies {
        let value = request_expr(ctx, &dependency.key, dependency.kind, dependency.reference);
        args = quote! {#args #value,};
    }
    args
}

/// The construction expression of a binding's value.
fn construction_expr(ctx: &GenContext, binding: &Binding) -> TokenStream {
    match &binding.kind {
        BindingKind::Injection { injectable } => {
            let ty = ctx.spell(&injectable.type_data);
            let ctor = format_ident!("{}", injectable.ctor_name);
            let args = dependency_args(ctx, binding);
            quote! {<#ty>::#ctor(#args)}
        }
        BindingKind::Provides { module, binding: decl } => {
            module_invoke(ctx, module, decl, binding)
        }
        BindingKind::Production { module, binding: decl } => {
            let invoke = module_invoke(ctx, module, decl, binding);
            quote! {stiletto::Produced::of(#invoke)}
        }
        BindingKind::Delegate { .. } => {
            let dependency = &binding.dependencies[0];
            let inner = request_expr(ctx, &dependency.key, dependency.kind, dependency.reference);
            if binding.key.type_data.path == "std::boxed::Box" {
                quote! {::std::boxed::Box::new(#inner)}
            } else {
                inner
            }
        }
        BindingKind::Boxed => {
            let dependency = &binding.dependencies[0];
            let inner = request_expr(ctx, &dependency.key, dependency.kind, dependency.reference);
            quote! {::std::boxed::Box::new(#inner)}
        }
        BindingKind::MultiboundVec => {
            let mut statements = quote! {};
            for dependency in &binding.dependencies {
                let value =
                    request_expr(ctx, &dependency.key, dependency.kind, dependency.reference);
                statements = if dependency.flattened {
                    quote! {#statements result.extend(#value);}
                } else {
                    quote! {#statements result.push(#value);}
                };
            }
            quote! {{
                #[allow(unused_mut)]
                let mut result = ::std::vec::Vec::new();
                #statements
                result
            }}
        }
        BindingKind::MultiboundMap { entries } => {
            let mut statements = quote! {};
            for (map_key, value_key) in entries {
                let literal = map_key_literal(ctx, map_key);
                let value = request_expr(ctx, value_key, RequestKind::Instance, false);
                statements = quote! {#statements result.insert(#literal, #value);};
            }
            quote! {{
                #[allow(unused_mut)]
                let mut result = ::std::collections::HashMap::new();
                #statements
                result
            }}
        }
        BindingKind::Optional { underlying } => match underlying {
            Some(inner) => {
                let value = request_expr(ctx, inner, RequestKind::Instance, false);
                quote! {::std::option::Option::Some(#value)}
            }
            None => quote! {::std::option::Option::None},
        },
        BindingKind::ComponentDependency { dependency } => {
            let field = dependency.identifier();
            quote! {self.#field.clone()}
        }
        BindingKind::ComponentDependencyMethod { dependency, method } => {
            let field = dependency.identifier();
            let method = format_ident!("{}", method);
            quote! {self.#field.#method()}
        }
        BindingKind::BoundInstance { method, .. } => {
            let field = format_ident!("{}", method);
            quote! {self.#field.clone()}
        }
        BindingKind::ComponentBinding { .. } | BindingKind::MembersInjector { .. } => {
            // Generated whole in binding_method.
            quote! {::core::unreachable!()}
        }
    }
}

fn module_invoke(
    ctx: &GenContext,
    module: &crate::type_data::TypeData,
    decl: &crate::manifest::BindingDecl,
    binding: &Binding,
) -> TokenStream {
    let method = format_ident!("{}", decl.name);
    let args = dependency_args(ctx, binding);
    if decl.field_static {
        let module_path = ctx.spell(module);
        quote! {#module_path::#method(#args)}
    } else {
        let module_field = module.identifier();
        quote! {self.#module_field.#method(#args)}
    }
}

fn map_key_literal(ctx: &GenContext, map_key: &AnnotationValue) -> TokenStream {
    match map_key {
        AnnotationValue::Str(value) => quote! {#value.to_owned()},
        AnnotationValue::Int(value) => {
            let value = *value as i32;
            quote! {#value}
        }
        AnnotationValue::Bool(value) => quote! {#value},
        AnnotationValue::EnumValue(variant) => {
            let path = ctx.spell(variant);
            quote! {#path}
        }
        _ => quote! {::core::unreachable!()},
    }
}

/// One trait method per entry point.
pub(crate) fn entry_point_method(ctx: &GenContext, entry_point: &ResolvedEntryPoint) -> TokenStream {
    let name = format_ident!("{}", entry_point.declaration.name);

    if entry_point.declaration.injects_members {
        let target = ctx.spell(&entry_point.declaration.type_data);
        let injector = entry_point.key.identifier();
        return quote! {
            fn #name(&self, target: &mut #target) {
                self.#injector().inject(target);
            }
        };
    }

    let signature = entry_point_signature(ctx, entry_point);
    let body = request_expr(ctx, &entry_point.key, entry_point.kind, entry_point.reference);
    quote! {
        fn #name(&self) -> #signature {
            #body
        }
    }
}

fn entry_point_signature(ctx: &GenContext, entry_point: &ResolvedEntryPoint) -> TokenStream {
    if let Some(target) = ctx.graph.lookup(&entry_point.key) {
        if let BindingKind::ComponentBinding { component } = &target.kind {
            if component != &ctx.graph.component.type_data {
                let child = ctx.spell(component);
                return quote! {::std::boxed::Box<dyn #child + '_>};
            }
        }
    }
    let declared = ctx.spell(&entry_point.declaration.type_data);
    quote! {#declared}
}

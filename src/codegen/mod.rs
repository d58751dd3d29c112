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

//! Emits one Rust compilation unit per root component from a validated
//! [BindingGraph]: the impl struct, its shards, provider methods, the
//! switching provider, trait impls for every entry-point surface, and the
//! construction surface.

mod providers;
mod switching;

use std::collections::{HashMap, HashSet};

use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};

use crate::accessibility::CodeLocation;
use crate::binding::BindingKind;
use crate::config::CompilerOptions;
use crate::graph::BindingGraph;
use crate::manifest::{ComponentDecl, CreatorDecl, Manifest};
use crate::type_data::TypeData;

pub use switching::SWITCHING_PROVIDER_THRESHOLD;

/// One generated source unit.
#[derive(Debug, Clone)]
pub struct GeneratedUnit {
    pub name: String,
    pub tokens: TokenStream,
}

impl GeneratedUnit {
    pub fn text(&self) -> String {
        self.tokens.to_string()
    }
}

/// Accumulates the pieces of a component implementation as they are
/// generated.
pub(crate) struct ComponentSections {
    pub fields: TokenStream,
    pub ctor_params: TokenStream,
    pub methods: TokenStream,
    pub trait_methods: TokenStream,
    pub items: TokenStream,
}

impl ComponentSections {
    pub fn new() -> Self {
        ComponentSections {
            fields: quote! {},
            ctor_params: quote! {},
            methods: quote! {},
            trait_methods: quote! {},
            items: quote! {},
        }
    }

    pub fn merge(&mut self, other: ComponentSections) {
        let fields = &self.fields;
        let ctor_params = &self.ctor_params;
        let methods = &self.methods;
        let trait_methods = &self.trait_methods;
        let items = &self.items;

        let other_fields = &other.fields;
        let other_ctor_params = &other.ctor_params;
        let other_methods = &other.methods;
        let other_trait_methods = &other.trait_methods;
        let other_items = &other.items;

        self.fields = quote! {#fields #other_fields};
        self.ctor_params = quote! {#ctor_params #other_ctor_params};
        self.methods = quote! {#methods #other_methods};
        self.trait_methods = quote! {#trait_methods #other_trait_methods};
        self.items = quote! {#items #other_items};
    }

    pub fn add_fields(&mut self, new_fields: TokenStream) {
        let fields = &self.fields;
        self.fields = quote! {#fields #new_fields}
    }

    pub fn add_ctor_params(&mut self, new_ctor_params: TokenStream) {
        let ctor_params = &self.ctor_params;
        self.ctor_params = quote! {#ctor_params #new_ctor_params}
    }

    pub fn add_methods(&mut self, new_methods: TokenStream) {
        let methods = &self.methods;
        self.methods = quote! {#methods #new_methods}
    }

    pub fn add_trait_methods(&mut self, new_trait_methods: TokenStream) {
        let trait_methods = &self.trait_methods;
        self.trait_methods = quote! {#trait_methods #new_trait_methods}
    }

    pub fn add_items(&mut self, new_items: TokenStream) {
        let items = &self.items;
        self.items = quote! {#items #new_items}
    }
}

/// Everything the per-binding generators need to know about the component
/// being emitted.
pub(crate) struct GenContext<'a> {
    pub manifest: &'a Manifest,
    pub graph: &'a BindingGraph,
    pub options: &'a CompilerOptions,
    pub location: CodeLocation,
    pub current_crate: String,
    pub impl_name: Ident,
    pub shards: ShardAssignment,
    pub switching: Option<switching::SwitchingPlan>,
}

impl GenContext<'_> {
    pub fn is_local(&self, ident: &str) -> bool {
        self.graph
            .resolve_order
            .iter()
            .any(|key| key.identifier_string() == ident)
    }

    /// Spell a type the way this component's module may name it.
    pub fn spell(&self, type_data: &TypeData) -> syn::Type {
        crate::accessibility::visible_type(self.manifest, type_data, &self.location)
            .syn_type(&self.current_crate)
    }
}

pub(crate) fn component_impl_name(type_data: &TypeData, current_crate: &str) -> Ident {
    format_ident!(
        "{}Impl",
        type_data
            .local_string_path(current_crate)
            .replace(' ', "")
            .replace("::", "_")
    )
}

fn snake_case(name: &str) -> String {
    let mut result = String::new();
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i != 0 {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

pub fn generate_component(
    manifest: &Manifest,
    graph: &BindingGraph,
    options: &CompilerOptions,
) -> GeneratedUnit {
    let component = &graph.component;
    let current_crate = component.type_data.field_crate.clone();
    let tokens = generate_impl(manifest, graph, options, &current_crate, None);
    let last_segment = component
        .type_data
        .path
        .rsplit("::")
        .next()
        .unwrap_or(&component.type_data.path);
    GeneratedUnit {
        name: format!("{}_impl.rs", snake_case(last_segment)),
        tokens,
    }
}

struct ParentInfo {
    impl_name: Ident,
    has_lifetime: bool,
}

fn generate_impl(
    manifest: &Manifest,
    graph: &BindingGraph,
    options: &CompilerOptions,
    current_crate: &str,
    parent: Option<&ParentInfo>,
) -> TokenStream {
    let component = &graph.component;
    let impl_name = component_impl_name(&component.type_data, current_crate);
    let shards = assign_shards(graph, options.keys_per_component_shard);
    let switching = if parent.is_none() {
        switching::plan(graph, options)
    } else {
        None
    };
    let ctx = GenContext {
        manifest,
        graph,
        options,
        location: CodeLocation::new(&component.type_data.field_crate, &component.module_path),
        current_crate: current_crate.to_owned(),
        impl_name: impl_name.clone(),
        shards,
        switching,
    };

    let mut sections = ComponentSections::new();
    sections.merge(generate_module_fields(&ctx));
    sections.merge(generate_dependency_fields(&ctx, parent.is_none()));
    sections.merge(generate_shards(&ctx));
    for binding in graph.bindings_in_order() {
        sections.add_methods(providers::binding_method(&ctx, binding));
    }
    sections.merge(generate_forwarders(&ctx));
    if let Some(plan) = &ctx.switching {
        sections.merge(switching::generate(&ctx, plan));
    }
    let trait_impls = generate_trait_impls(&ctx);
    for child in &graph.children {
        let info = ParentInfo {
            impl_name: impl_name.clone(),
            has_lifetime: parent.is_some(),
        };
        sections.add_items(generate_impl(
            manifest,
            child,
            options,
            current_crate,
            Some(&info),
        ));
    }

    let fields = &sections.fields;
    let ctor_params = &sections.ctor_params;
    let methods = &sections.methods;
    let items = &sections.items;
    let visibility = if options.generated_type_visible && parent.is_none() {
        quote! {pub}
    } else {
        quote! {}
    };

    match parent {
        None => {
            let constructors = generate_constructors(&ctx, &sections);
            quote! {
                #[allow(non_snake_case)]
                #[allow(non_camel_case_types)]
                #[allow(dead_code)]
                #visibility struct #impl_name {
                    #fields
                }
                #[allow(non_snake_case)]
                #[allow(dead_code)]
                impl #impl_name {
                    #methods
                }
                #trait_impls
                #constructors
                #items
            }
        }
        Some(parent_info) => {
            let parent_impl = &parent_info.impl_name;
            let parent_type = if parent_info.has_lifetime {
                quote! {#parent_impl<'a>}
            } else {
                quote! {#parent_impl}
            };
            quote! {
                #[allow(non_snake_case)]
                #[allow(non_camel_case_types)]
                #[allow(dead_code)]
                struct #impl_name<'a> {
                    parent: &'a #parent_type,
                    #fields
                }
                #[allow(non_snake_case)]
                #[allow(dead_code)]
                impl<'a> #impl_name<'a> {
                    fn new(parent: &'a #parent_type) -> Self {
                        Self {
                            parent,
                            #ctor_params
                        }
                    }
                    #methods
                }
                #trait_impls
                #items
            }
        }
    }
}

/// Module types handed in through creator setters rather than constructed by
/// the component itself.
fn creator_supplied_modules(component: &ComponentDecl) -> HashSet<String> {
    let Some(creator) = &component.creator else {
        return HashSet::new();
    };
    creator
        .methods
        .iter()
        .filter(|method| !method.bound_instance && method.parameters.len() == 1)
        .map(|method| method.parameters[0].type_data.identifier_string())
        .collect()
}

/// One field per installed module that has an instance binding or is handed
/// in through a creator setter. Only modules the component constructs itself
/// default-initialize; supplied ones are filled from the `create` parameter.
fn generate_module_fields(ctx: &GenContext) -> ComponentSections {
    let mut result = ComponentSections::new();
    let supplied = creator_supplied_modules(&ctx.graph.component);
    for module_type in &ctx.graph.component.modules {
        let module = ctx
            .manifest
            .find_module(module_type)
            .expect("verified module");
        let is_supplied = supplied.contains(&module_type.identifier_string());
        if !is_supplied && module.bindings.iter().all(|binding| binding.field_static) {
            continue;
        }
        let name = module_type.identifier();
        let path = ctx.spell(module_type);
        result.add_fields(quote! {
            #name: #path,
        });
        if !is_supplied {
            result.add_ctor_params(quote! {
                #name: ::core::default::Default::default(),
            });
        }
    }
    result
}

/// Fields for component dependencies and creator-bound instances. Only root
/// components have a construction surface for them.
fn generate_dependency_fields(ctx: &GenContext, is_root: bool) -> ComponentSections {
    let mut result = ComponentSections::new();
    if !is_root {
        return result;
    }
    for dependency in &ctx.graph.component.dependencies {
        let name = dependency.type_data.identifier();
        let path = ctx.spell(&dependency.type_data);
        result.add_fields(quote! {
            #name: #path,
        });
    }
    for binding in ctx.graph.bindings_in_order() {
        if let BindingKind::BoundInstance { method, .. } = &binding.kind {
            let name = format_ident!("{}", method);
            let path = ctx.spell(&binding.key.type_data);
            result.add_fields(quote! {
                #name: #path,
            });
        }
    }
    result
}

/// Scoped bindings cache in `Once` cells, grouped into shard structs so one
/// generated struct never exceeds the configured field count.
fn generate_shards(ctx: &GenContext) -> ComponentSections {
    let mut result = ComponentSections::new();
    let mut shard_fields: Vec<TokenStream> = vec![quote! {}; ctx.shards.count];
    let mut shard_inits: Vec<TokenStream> = vec![quote! {}; ctx.shards.count];

    for binding in ctx.graph.bindings_in_order() {
        if binding.scope.is_none() {
            continue;
        }
        let ident = binding.key.identifier_string();
        let shard = ctx.shards.shard_of.get(&ident).copied().unwrap_or(0);
        let once_name = format_ident!("once_{}", binding.key.identifier());
        let ty = ctx.spell(&binding.key.type_data);
        let field = quote! {
            #once_name: stiletto::Once<#ty>,
        };
        let init = quote! {
            #once_name: stiletto::Once::new(),
        };
        shard_fields[shard] = {
            let existing = &shard_fields[shard];
            quote! {#existing #field}
        };
        shard_inits[shard] = {
            let existing = &shard_inits[shard];
            quote! {#existing #init}
        };
    }

    // Shard 0 is the component impl itself.
    result.add_fields(shard_fields[0].clone());
    result.add_ctor_params(shard_inits[0].clone());

    for shard in 1..ctx.shards.count {
        let shard_name = format_ident!("{}Shard{}", ctx.impl_name, shard);
        let shard_field = format_ident!("shard{}", shard);
        let fields = &shard_fields[shard];
        let inits = &shard_inits[shard];
        result.add_items(quote! {
            #[allow(non_snake_case)]
            #[allow(non_camel_case_types)]
            #[allow(dead_code)]
            struct #shard_name {
                #fields
            }
        });
        result.add_fields(quote! {
            #shard_field: #shard_name,
        });
        result.add_ctor_params(quote! {
            #shard_field: #shard_name {
                #inits
            },
        });
    }
    result
}

/// Methods a descendant expects to call on this impl for keys this component
/// itself inherits from its own ancestors.
fn generate_forwarders(ctx: &GenContext) -> ComponentSections {
    let mut result = ComponentSections::new();
    let mut needed: HashSet<String> = HashSet::new();
    collect_descendant_inherited(ctx.graph, &mut needed);
    let mut needed: Vec<String> = needed.into_iter().collect();
    needed.sort();
    for ident in needed {
        if ctx.is_local(&ident) {
            continue;
        }
        let Some(binding) = ctx.graph.inherited.get(&ident) else {
            continue;
        };
        if matches!(binding.kind, BindingKind::ComponentBinding { .. }) {
            continue;
        }
        let method = binding.key.identifier();
        let return_type = providers::binding_return_type_tokens(ctx, binding);
        result.add_methods(quote! {
            fn #method(&self) -> #return_type {
                self.parent.#method()
            }
        });
    }
    result
}

fn collect_descendant_inherited(graph: &BindingGraph, into: &mut HashSet<String>) {
    for child in &graph.children {
        into.extend(child.inherited.keys().cloned());
        collect_descendant_inherited(child, into);
    }
}

/// Entry points grouped by the trait that declared them; one impl block per
/// surface.
fn generate_trait_impls(ctx: &GenContext) -> TokenStream {
    let component = &ctx.graph.component;
    let impl_name = &ctx.impl_name;

    let mut order: Vec<String> = Vec::new();
    let mut by_trait: HashMap<String, (TypeData, TokenStream)> = HashMap::new();
    for entry_point in &ctx.graph.entry_points {
        let method = providers::entry_point_method(ctx, entry_point);
        let trait_ident = entry_point.declared_in.identifier_string();
        if !by_trait.contains_key(&trait_ident) {
            order.push(trait_ident.clone());
            by_trait.insert(
                trait_ident.clone(),
                (entry_point.declared_in.clone(), quote! {}),
            );
        }
        let entry = by_trait.get_mut(&trait_ident).expect("just inserted");
        let existing = &entry.1;
        entry.1 = quote! {#existing #method};
    }
    // A component with no entry points of its own still implements its trait.
    let own_ident = component.type_data.identifier_string();
    if !by_trait.contains_key(&own_ident) {
        order.push(own_ident.clone());
        by_trait.insert(own_ident, (component.type_data.clone(), quote! {}));
    }

    let mut result = quote! {};
    for trait_ident in order {
        let (trait_type, methods) = &by_trait[&trait_ident];
        let trait_path = ctx.spell(trait_type);
        let impl_block = if ctx.graph.component.kind == crate::manifest::ComponentKind::Subcomponent
        {
            quote! {
                #[allow(non_snake_case)]
                impl<'a> #trait_path for #impl_name<'a> {
                    #methods
                }
            }
        } else {
            quote! {
                #[allow(non_snake_case)]
                impl #trait_path for #impl_name {
                    #methods
                }
            }
        };
        result = quote! {#result #impl_block};
    }
    result
}

/// The public construction surface of a root component: `build` when a
/// creator is declared, `new` when construction needs no input.
fn generate_constructors(ctx: &GenContext, sections: &ComponentSections) -> TokenStream {
    let component = &ctx.graph.component;
    let impl_name = &ctx.impl_name;
    let trait_path = ctx.spell(&component.type_data);
    let ctor_params = &sections.ctor_params;

    let mut explicit_params = quote! {};
    let mut explicit_inits = quote! {};
    let mut explicit_args = quote! {};
    for dependency in &component.dependencies {
        let name = dependency.type_data.identifier();
        let path = ctx.spell(&dependency.type_data);
        explicit_params = quote! {#explicit_params #name: #path,};
        explicit_inits = quote! {#explicit_inits #name,};
        explicit_args = quote! {#explicit_args #name,};
    }
    if let Some(creator) = &component.creator {
        for (field, path, param) in creator_setter_fields(ctx, creator) {
            explicit_params = quote! {#explicit_params #param: #path,};
            explicit_inits = quote! {#explicit_inits #field: #param,};
            explicit_args = quote! {#explicit_args #param,};
        }
    }
    // Everything not handed in explicitly initializes to its default.

    let build_name = if component.creator.is_some() {
        format_ident!("build")
    } else {
        format_ident!("new")
    };

    quote! {
        #[allow(non_snake_case)]
        impl #impl_name {
            fn create(#explicit_params) -> Self {
                Self {
                    #explicit_inits
                    #ctor_params
                }
            }
        }
        impl dyn #trait_path {
            #[allow(non_snake_case)]
            pub fn #build_name(#explicit_params) -> ::std::boxed::Box<dyn #trait_path> {
                ::std::boxed::Box::new(#impl_name::create(#explicit_args))
            }
        }
    }
}

/// Creator setters map onto `create` parameters: bound instances by method
/// name, modules by their field identifier.
fn creator_setter_fields(
    ctx: &GenContext,
    creator: &CreatorDecl,
) -> Vec<(Ident, syn::Type, Ident)> {
    let mut result = Vec::new();
    for method in &creator.methods {
        let Some(parameter) = method.parameters.first() else {
            continue;
        };
        if method.parameters.len() != 1 {
            continue;
        }
        if method.bound_instance {
            result.push((
                format_ident!("{}", method.name),
                ctx.spell(&parameter.type_data),
                format_ident!("{}", method.name),
            ));
        } else if ctx
            .graph
            .component
            .modules
            .iter()
            .any(|module| module == &parameter.type_data)
        {
            result.push((
                parameter.type_data.identifier(),
                ctx.spell(&parameter.type_data),
                format_ident!("{}", method.name),
            ));
        }
    }
    result
}

/// Deterministic shard assignment: bindings in discovery order, a new shard
/// whenever the current one is full, and strongly-connected (cyclic) binding
/// sets always landing in one shard together.
pub(crate) struct ShardAssignment {
    pub shard_of: HashMap<String, usize>,
    pub count: usize,
}

pub(crate) fn assign_shards(graph: &BindingGraph, keys_per_shard: usize) -> ShardAssignment {
    let components = strongly_connected(graph);
    let mut shard_of: HashMap<String, usize> = HashMap::new();
    let mut current = 0usize;
    let mut current_len = 0usize;
    let mut assigned: HashSet<String> = HashSet::new();

    for key in &graph.resolve_order {
        let ident = key.identifier_string();
        if assigned.contains(&ident) {
            continue;
        }
        let group = components
            .iter()
            .find(|group| group.contains(&ident))
            .cloned()
            .unwrap_or_else(|| vec![ident.clone()]);
        if current_len > 0 && current_len + group.len() > keys_per_shard {
            current += 1;
            current_len = 0;
        }
        for member in group {
            assigned.insert(member.clone());
            shard_of.insert(member, current);
            current_len += 1;
        }
    }

    ShardAssignment {
        shard_of,
        count: current + 1,
    }
}

/// Tarjan over local binding dependency edges; only groups with more than
/// one member matter for shard packing.
fn strongly_connected(graph: &BindingGraph) -> Vec<Vec<String>> {
    struct Tarjan<'a> {
        graph: &'a BindingGraph,
        index: usize,
        indices: HashMap<String, usize>,
        lowlinks: HashMap<String, usize>,
        on_stack: HashSet<String>,
        stack: Vec<String>,
        result: Vec<Vec<String>>,
    }

    impl Tarjan<'_> {
        fn edges(&self, ident: &str) -> Vec<String> {
            self.graph
                .resolve_order
                .iter()
                .find(|key| key.identifier_string() == ident)
                .and_then(|key| self.graph.binding_for(key))
                .map(|binding| {
                    binding
                        .dependencies
                        .iter()
                        .map(|dependency| dependency.key.identifier_string())
                        .filter(|dep| self.indices.contains_key(dep) || self.is_node(dep))
                        .collect()
                })
                .unwrap_or_default()
        }

        fn is_node(&self, ident: &str) -> bool {
            self.graph
                .resolve_order
                .iter()
                .any(|key| key.identifier_string() == ident)
        }

        fn connect(&mut self, ident: &str) {
            self.indices.insert(ident.to_owned(), self.index);
            self.lowlinks.insert(ident.to_owned(), self.index);
            self.index += 1;
            self.stack.push(ident.to_owned());
            self.on_stack.insert(ident.to_owned());

            for dep in self.edges(ident) {
                if !self.indices.contains_key(&dep) {
                    self.connect(&dep);
                    let dep_low = self.lowlinks[&dep];
                    let low = self.lowlinks[ident].min(dep_low);
                    self.lowlinks.insert(ident.to_owned(), low);
                } else if self.on_stack.contains(&dep) {
                    let dep_index = self.indices[&dep];
                    let low = self.lowlinks[ident].min(dep_index);
                    self.lowlinks.insert(ident.to_owned(), low);
                }
            }

            if self.lowlinks[ident] == self.indices[ident] {
                let mut group = Vec::new();
                loop {
                    let member = self.stack.pop().expect("nonempty tarjan stack");
                    self.on_stack.remove(&member);
                    let done = member == ident;
                    group.push(member);
                    if done {
                        break;
                    }
                }
                self.result.push(group);
            }
        }
    }

    let mut tarjan = Tarjan {
        graph,
        index: 0,
        indices: HashMap::new(),
        lowlinks: HashMap::new(),
        on_stack: HashSet::new(),
        stack: Vec::new(),
        result: Vec::new(),
    };
    for key in &graph.resolve_order {
        let ident = key.identifier_string();
        if !tarjan.indices.contains_key(&ident) {
            tarjan.connect(&ident);
        }
    }
    tarjan.result
}

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

//! Resolves the transitive closure of a component's entry points into a
//! [BindingGraph], breadth-first. Resolution never short-circuits on an
//! error; it records the diagnostic and keeps going so one pass reports
//! everything it can.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::annotation::AnnotationValue;
use crate::binding::{Binding, BindingKind, DependencyRequest, RequestKind};
use crate::error::{
    dependency_cycle, duplicated_binding, missing_binding, Diagnostic, DiagnosticKind,
    DiagnosticLog,
};
use crate::key::{Key, KeyFactory};
use crate::manifest::{
    BindingDecl, BindingType, ComponentDecl, DependencyDecl, EntryPointDecl, Manifest,
    MultibindingType,
};
use crate::processor::{Resolution, TypeResolver};
use crate::type_data::TypeData;

/// An entry point with its request resolved to a key.
#[derive(Debug, Clone)]
pub struct ResolvedEntryPoint {
    pub declaration: EntryPointDecl,
    pub declared_in: TypeData,
    pub key: Key,
    pub kind: RequestKind,
    /// The entry point returns `& T`.
    pub reference: bool,
}

/// Resolved dependency graph for one component, plus its descendants.
#[derive(Debug)]
pub struct BindingGraph {
    pub component: ComponentDecl,
    /// Key identifier → candidates. More than one candidate is a conflict
    /// that was already reported; the first stays the canonical resolution.
    bindings: HashMap<String, Vec<Binding>>,
    /// Keys in discovery order. Shard assignment and generated output follow
    /// this order, keeping generation deterministic.
    pub resolve_order: Vec<Key>,
    pub entry_points: Vec<ResolvedEntryPoint>,
    /// Keys satisfied by an ancestor component rather than locally, with the
    /// ancestor's binding for them.
    pub inherited: HashMap<String, Binding>,
    pub children: Vec<BindingGraph>,
}

impl BindingGraph {
    pub fn binding_for(&self, key: &Key) -> Option<&Binding> {
        self.bindings
            .get(&key.identifier_string())
            .and_then(|candidates| candidates.first())
    }

    pub fn candidates_for(&self, key: &Key) -> &[Binding] {
        self.bindings
            .get(&key.identifier_string())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_inherited(&self, key: &Key) -> bool {
        self.inherited.contains_key(&key.identifier_string())
    }

    /// Local binding, or the ancestor's when inherited.
    pub fn lookup(&self, key: &Key) -> Option<&Binding> {
        self.binding_for(key)
            .or_else(|| self.inherited.get(&key.identifier_string()))
    }

    /// Canonical bindings in discovery order.
    pub fn bindings_in_order(&self) -> Vec<&Binding> {
        self.resolve_order
            .iter()
            .filter_map(|key| self.binding_for(key))
            .collect()
    }
}

/// Outcome of one resolution attempt.
#[derive(Debug)]
pub enum GraphResult {
    Built(BindingGraph),
    /// A referenced type is not resolvable this round; retry next round.
    Deferred {
        component: TypeData,
        waiting_on: TypeData,
    },
}

pub fn build_graph(
    manifest: &Manifest,
    component: &ComponentDecl,
    resolver: &dyn TypeResolver,
    log: &mut DiagnosticLog,
) -> GraphResult {
    build_graph_impl(manifest, component, &HashMap::new(), resolver, log)
}

fn build_graph_impl(
    manifest: &Manifest,
    component: &ComponentDecl,
    inherited: &HashMap<String, Binding>,
    resolver: &dyn TypeResolver,
    log: &mut DiagnosticLog,
) -> GraphResult {
    let mut builder = GraphBuilder {
        manifest,
        component,
        inherited,
        resolver,
        index: DeclarationIndex::build(manifest, component, log),
        bindings: HashMap::new(),
        resolve_order: Vec::new(),
        inherited_keys: HashMap::new(),
        resolved: HashSet::new(),
        queue: VecDeque::new(),
        log,
    };

    let entry_points = match builder.seed_entry_points() {
        Ok(entry_points) => entry_points,
        Err(waiting_on) => {
            return GraphResult::Deferred {
                component: component.type_data.clone(),
                waiting_on,
            }
        }
    };

    while let Some(request) = builder.queue.pop_front() {
        if let Err(waiting_on) = builder.resolve(request) {
            return GraphResult::Deferred {
                component: component.type_data.clone(),
                waiting_on,
            };
        }
    }

    builder.find_cycles(&entry_points);

    let mut graph = BindingGraph {
        component: component.clone(),
        bindings: builder.bindings,
        resolve_order: builder.resolve_order,
        entry_points,
        inherited: builder.inherited_keys,
        children: Vec::new(),
    };

    // Children see everything the parent resolved, never the reverse.
    let mut child_inherited = inherited.clone();
    for key in &graph.resolve_order {
        if let Some(binding) = graph.binding_for(key) {
            child_inherited.insert(key.identifier_string(), binding.clone());
        }
    }
    for subcomponent in &component.subcomponents {
        let child = manifest
            .find_component(subcomponent)
            .expect("verified subcomponent");
        match build_graph_impl(manifest, child, &child_inherited, resolver, log) {
            GraphResult::Built(child_graph) => graph.children.push(child_graph),
            deferred @ GraphResult::Deferred { .. } => return deferred,
        }
    }

    GraphResult::Built(graph)
}

#[derive(Debug)]
struct Request {
    key: Key,
    /// Requester chain, most recent first.
    trace: Vec<String>,
}

/// Candidate declarations of one component, indexed by key identifier before
/// resolution starts.
struct DeclarationIndex {
    unique: HashMap<String, Vec<Binding>>,
    optionals: HashMap<String, Key>,
    vec_aggregates: HashMap<String, Aggregate>,
    map_aggregates: HashMap<String, Aggregate>,
}

struct Aggregate {
    key: Key,
    contributions: Vec<Contribution>,
}

struct Contribution {
    binding: Binding,
    flattened: bool,
    map_key: Option<AnnotationValue>,
}

impl DeclarationIndex {
    fn build(
        manifest: &Manifest,
        component: &ComponentDecl,
        log: &mut DiagnosticLog,
    ) -> DeclarationIndex {
        let mut index = DeclarationIndex {
            unique: HashMap::new(),
            optionals: HashMap::new(),
            vec_aggregates: HashMap::new(),
            map_aggregates: HashMap::new(),
        };
        let owner = &component.type_data;

        for module_type in &component.modules {
            let module = manifest.find_module(module_type).expect("verified module");
            for decl in &module.bindings {
                index.add_module_binding(owner, &module.type_data, decl, log);
            }
        }

        // The component instance itself, and each declared subcomponent, are
        // injectable as component bindings.
        index.add_unique(Binding::new(
            Key::for_type(owner),
            BindingKind::ComponentBinding {
                component: owner.clone(),
            },
            owner,
            &owner.canonical_string_path(),
        ));
        for subcomponent in &component.subcomponents {
            index.add_unique(Binding::new(
                Key::for_type(subcomponent),
                BindingKind::ComponentBinding {
                    component: subcomponent.clone(),
                },
                owner,
                &subcomponent.canonical_string_path(),
            ));
        }

        for dependency in &component.dependencies {
            index.add_unique(Binding::new(
                Key::for_type(&dependency.type_data),
                BindingKind::ComponentDependency {
                    dependency: dependency.type_data.clone(),
                },
                owner,
                &dependency.type_data.canonical_string_path(),
            ));
            for provision in &dependency.provisions {
                let element = format!(
                    "{}.{}",
                    dependency.type_data.canonical_string_path(),
                    provision.name
                );
                match KeyFactory::for_declaration(
                    &provision.type_data,
                    &provision.qualifiers,
                    &element,
                ) {
                    Ok(key) => index.add_unique(Binding::new(
                        key,
                        BindingKind::ComponentDependencyMethod {
                            dependency: dependency.type_data.clone(),
                            method: provision.name.clone(),
                        },
                        owner,
                        &element,
                    )),
                    Err(diagnostic) => log.report(diagnostic),
                }
            }
        }

        if let Some(creator) = &component.creator {
            for method in &creator.methods {
                if !method.bound_instance {
                    continue;
                }
                let Some(parameter) = method.parameters.first() else {
                    continue;
                };
                let element = format!(
                    "{}.{}",
                    creator.type_data.canonical_string_path(),
                    method.name
                );
                match KeyFactory::for_declaration(
                    &parameter.type_data,
                    &parameter.qualifiers,
                    &element,
                ) {
                    Ok(key) => index.add_unique(Binding::new(
                        key,
                        BindingKind::BoundInstance {
                            creator: creator.type_data.clone(),
                            method: method.name.clone(),
                        },
                        owner,
                        &element,
                    )),
                    Err(diagnostic) => log.report(diagnostic),
                }
            }
        }

        index
    }

    fn add_module_binding(
        &mut self,
        owner: &TypeData,
        module: &TypeData,
        decl: &BindingDecl,
        log: &mut DiagnosticLog,
    ) {
        let element = decl.element_path(module);
        let key = match KeyFactory::for_declaration(&decl.type_data, &decl.qualifiers, &element) {
            Ok(key) => key,
            Err(diagnostic) => {
                log.report(diagnostic);
                return;
            }
        };
        let mut dependencies = Vec::new();
        for dependency in &decl.dependencies {
            match KeyFactory::for_dependency(dependency, &element) {
                Ok((dep_key, kind, reference)) => {
                    dependencies.push(DependencyRequest::new(dep_key, kind).referenced(reference))
                }
                Err(diagnostic) => log.report(diagnostic),
            }
        }
        let scope = decl.scopes.first().cloned();

        match decl.binding_type {
            BindingType::Multibinds => {
                // Declares the aggregate exists; contributions are optional.
                self.aggregate_for(&key);
            }
            BindingType::BindsOptionOf => {
                let option_key = Key::qualified(
                    &TypeData::option_of(decl.type_data.clone()),
                    key.qualifier.clone(),
                );
                self.optionals.insert(option_key.identifier_string(), key);
            }
            _ => {
                let kind = match decl.binding_type {
                    BindingType::Provides => BindingKind::Provides {
                        module: module.clone(),
                        binding: decl.clone(),
                    },
                    BindingType::Produces => BindingKind::Production {
                        module: module.clone(),
                        binding: decl.clone(),
                    },
                    BindingType::Binds => BindingKind::Delegate {
                        module: module.clone(),
                        binding: decl.clone(),
                    },
                    _ => unreachable!(),
                };
                match decl.multibinding {
                    MultibindingType::None => {
                        self.add_unique(
                            Binding::new(key, kind, owner, &element)
                                .with_dependencies(dependencies)
                                .with_scope(scope),
                        );
                    }
                    MultibindingType::IntoVec | MultibindingType::ElementsIntoVec => {
                        let flattened = decl.multibinding == MultibindingType::ElementsIntoVec;
                        let element_type = if flattened {
                            decl.type_data
                                .args
                                .first()
                                .cloned()
                                .unwrap_or_else(|| decl.type_data.clone())
                        } else {
                            decl.type_data.clone()
                        };
                        let aggregate_key = Key::qualified(
                            &TypeData::vec_of(element_type),
                            key.qualifier.clone(),
                        );
                        let contribution = Binding::new(
                            key.with_contribution(module, &decl.name),
                            kind,
                            owner,
                            &element,
                        )
                        .with_dependencies(dependencies)
                        .with_scope(scope);
                        self.aggregate_for(&aggregate_key)
                            .contributions
                            .push(Contribution {
                                binding: contribution,
                                flattened,
                                map_key: None,
                            });
                    }
                    MultibindingType::IntoMap => {
                        let Some(map_key) = decl.map_key.clone() else {
                            log.report(Diagnostic::new(
                                DiagnosticKind::MalformedMultibinding,
                                &element,
                                &format!("{}: map binding must declare a map key", element),
                            ));
                            return;
                        };
                        let key_type = match map_key_type(&map_key, &element) {
                            Ok(key_type) => key_type,
                            Err(diagnostic) => {
                                log.report(diagnostic);
                                return;
                            }
                        };
                        let aggregate_key = Key::qualified(
                            &TypeData::map_of(key_type, decl.type_data.clone()),
                            key.qualifier.clone(),
                        );
                        let contribution = Binding::new(
                            key.with_contribution(module, &decl.name),
                            kind,
                            owner,
                            &element,
                        )
                        .with_dependencies(dependencies)
                        .with_scope(scope);
                        self.map_aggregate_for(&aggregate_key)
                            .contributions
                            .push(Contribution {
                                binding: contribution,
                                flattened: false,
                                map_key: Some(map_key),
                            });
                    }
                }
            }
        }
    }

    fn add_unique(&mut self, binding: Binding) {
        self.unique
            .entry(binding.key.identifier_string())
            .or_default()
            .push(binding);
    }

    fn aggregate_for(&mut self, key: &Key) -> &mut Aggregate {
        if is_map_key(key) {
            return self.map_aggregate_for(key);
        }
        self.vec_aggregates
            .entry(key.identifier_string())
            .or_insert_with(|| Aggregate {
                key: key.clone(),
                contributions: Vec::new(),
            })
    }

    fn map_aggregate_for(&mut self, key: &Key) -> &mut Aggregate {
        self.map_aggregates
            .entry(key.identifier_string())
            .or_insert_with(|| Aggregate {
                key: key.clone(),
                contributions: Vec::new(),
            })
    }
}

fn is_map_key(key: &Key) -> bool {
    key.type_data.path == "std::collections::HashMap"
}

/// Rust type of the map key literal a contribution declared.
fn map_key_type(map_key: &AnnotationValue, element: &str) -> Result<TypeData, Diagnostic> {
    Ok(match map_key {
        AnnotationValue::Str(_) => TypeData::string(),
        AnnotationValue::Int(_) => TypeData::primitive("i32"),
        AnnotationValue::Bool(_) => TypeData::primitive("bool"),
        AnnotationValue::EnumValue(variant) => enum_type_of(variant),
        other => {
            return Err(Diagnostic::new(
                DiagnosticKind::MalformedMultibinding,
                element,
                &format!(
                    "{}: unable to handle map key {}",
                    element,
                    other.stable_string()
                ),
            ))
        }
    })
}

/// `crate::E::Variant` → `crate::E`.
fn enum_type_of(variant: &TypeData) -> TypeData {
    let mut result = variant.clone();
    if let Some(split) = variant.path.rfind("::") {
        result.path = variant.path[..split].to_owned();
    }
    result
}

struct GraphBuilder<'a> {
    manifest: &'a Manifest,
    component: &'a ComponentDecl,
    inherited: &'a HashMap<String, Binding>,
    resolver: &'a dyn TypeResolver,
    index: DeclarationIndex,
    bindings: HashMap<String, Vec<Binding>>,
    resolve_order: Vec<Key>,
    inherited_keys: HashMap<String, Binding>,
    resolved: HashSet<String>,
    queue: VecDeque<Request>,
    log: &'a mut DiagnosticLog,
}

impl GraphBuilder<'_> {
    fn seed_entry_points(&mut self) -> Result<Vec<ResolvedEntryPoint>, TypeData> {
        let mut entry_points = Vec::new();
        for (declaration, declared_in) in self.component.all_entry_points() {
            let element = format!(
                "{}.{}",
                self.component.type_data.canonical_string_path(),
                declaration.name
            );
            let (key, kind, reference) = if declaration.injects_members {
                (
                    Key::for_type(&TypeData::global("stiletto::MembersInjector").with_args(vec![
                        declaration.type_data.clone(),
                    ])),
                    RequestKind::Instance,
                    false,
                )
            } else {
                let request = DependencyDecl {
                    name: declaration.name.clone(),
                    type_data: declaration.type_data.clone(),
                    qualifiers: declaration.qualifiers.clone(),
                };
                match KeyFactory::for_dependency(&request, &element) {
                    Ok(resolved) => resolved,
                    Err(diagnostic) => {
                        self.log.report(diagnostic);
                        continue;
                    }
                }
            };
            self.queue.push_back(Request {
                key: key.clone(),
                trace: vec![element],
            });
            entry_points.push(ResolvedEntryPoint {
                declaration: declaration.clone(),
                declared_in: declared_in.clone(),
                key,
                kind,
                reference,
            });
        }
        Ok(entry_points)
    }

    /// Resolves one requested key. `Err` carries the type that must wait for
    /// a later round.
    fn resolve(&mut self, request: Request) -> Result<(), TypeData> {
        let ident = request.key.identifier_string();
        if self.resolved.contains(&ident) {
            return Ok(());
        }
        self.resolved.insert(ident.clone());

        let mut candidates: Vec<Binding> = Vec::new();
        if let Some(unique) = self.index.unique.remove(&ident) {
            candidates.extend(unique);
        }

        if let Some(aggregate) = self.index.vec_aggregates.remove(&ident) {
            candidates.push(self.assemble_vec(aggregate, &request));
        }
        if let Some(aggregate) = self.index.map_aggregates.remove(&ident) {
            candidates.push(self.assemble_map(aggregate, &request));
        }
        if let Some(underlying) = self.index.optionals.remove(&ident) {
            candidates.push(self.assemble_optional(&request.key, underlying, &request));
        }

        if candidates.is_empty() {
            if let Some(synthesized) = self.synthesize(&request)? {
                candidates.push(synthesized);
            }
        }

        let inherited_binding = self.inherited.get(&ident);
        if candidates.is_empty() {
            if let Some(inherited) = inherited_binding {
                self.inherited_keys.insert(ident, inherited.clone());
                return Ok(());
            }
            match self.resolver.resolve(&request.key.type_data) {
                Resolution::NotYetResolvable => return Err(request.key.type_data.clone()),
                _ => {
                    self.log
                        .report(missing_binding(&request.key.readable(), &request.trace));
                    return Ok(());
                }
            }
        }

        if candidates.len() > 1 || inherited_binding.is_some() {
            let mut declarations: Vec<String> = Vec::new();
            if let Some(inherited) = inherited_binding {
                declarations.push(inherited.describe());
            }
            declarations.extend(candidates.iter().map(Binding::describe));
            self.log.report(
                duplicated_binding(&request.key.readable(), &declarations)
                    .with_trace(&request.trace),
            );
        }

        let chosen = candidates.first().expect("nonempty candidates");
        let mut trace = Vec::with_capacity(request.trace.len() + 1);
        trace.push(chosen.describe());
        trace.extend(request.trace.iter().cloned());
        for dependency in &chosen.dependencies {
            self.queue.push_back(Request {
                key: dependency.key.clone(),
                trace: trace.clone(),
            });
        }

        self.resolve_order.push(request.key.clone());
        self.bindings.insert(ident, candidates);
        Ok(())
    }

    fn assemble_vec(&mut self, aggregate: Aggregate, request: &Request) -> Binding {
        let owner = &self.component.type_data;
        let mut dependencies = Vec::new();
        for contribution in aggregate.contributions {
            let mut dependency =
                DependencyRequest::new(contribution.binding.key.clone(), RequestKind::Instance);
            dependency.flattened = contribution.flattened;
            dependencies.push(dependency);
            self.register_contribution(contribution.binding, request);
        }
        Binding::new(
            aggregate.key.clone(),
            BindingKind::MultiboundVec,
            owner,
            &aggregate.key.readable(),
        )
        .with_dependencies(dependencies)
    }

    fn assemble_map(&mut self, aggregate: Aggregate, request: &Request) -> Binding {
        let owner = &self.component.type_data;
        let mut dependencies = Vec::new();
        let mut entries: Vec<(AnnotationValue, Key)> = Vec::new();
        let mut seen_keys: HashMap<String, String> = HashMap::new();
        for contribution in aggregate.contributions {
            let map_key = contribution.map_key.clone().expect("map contribution");
            let stable = map_key.stable_string();
            if let Some(_previous) = seen_keys.get(&stable) {
                self.log.report(
                    Diagnostic::new(
                        DiagnosticKind::DuplicateMapKey,
                        &contribution.binding.declaration,
                        &format!(
                            "found duplicated key {} for {}, provided by:\n\t{}",
                            stable,
                            aggregate.key.readable(),
                            contribution.binding.describe()
                        ),
                    )
                    .with_trace(&request.trace),
                );
                continue;
            }
            seen_keys.insert(stable, contribution.binding.describe());
            dependencies.push(DependencyRequest::new(
                contribution.binding.key.clone(),
                RequestKind::Instance,
            ));
            entries.push((map_key, contribution.binding.key.clone()));
            self.register_contribution(contribution.binding, request);
        }
        Binding::new(
            aggregate.key.clone(),
            BindingKind::MultiboundMap { entries },
            owner,
            &aggregate.key.readable(),
        )
        .with_dependencies(dependencies)
    }

    /// Contribution bindings resolve under their own contribution keys.
    fn register_contribution(&mut self, binding: Binding, request: &Request) {
        let ident = binding.key.identifier_string();
        self.resolved.insert(ident.clone());
        let mut trace = Vec::with_capacity(request.trace.len() + 1);
        trace.push(binding.describe());
        trace.extend(request.trace.iter().cloned());
        for dependency in &binding.dependencies {
            self.queue.push_back(Request {
                key: dependency.key.clone(),
                trace: trace.clone(),
            });
        }
        self.resolve_order.push(binding.key.clone());
        self.bindings.insert(ident, vec![binding]);
    }

    fn assemble_optional(&mut self, option_key: &Key, underlying: Key, _request: &Request) -> Binding {
        let owner = &self.component.type_data;
        let present = self.is_satisfiable(&underlying);
        let mut binding = Binding::new(
            option_key.clone(),
            BindingKind::Optional {
                underlying: present.then(|| underlying.clone()),
            },
            owner,
            &option_key.readable(),
        );
        if present {
            binding = binding
                .with_dependencies(vec![DependencyRequest::new(underlying, RequestKind::Instance)]);
        }
        binding
    }

    /// Whether any declaration could satisfy the key, without resolving it.
    fn is_satisfiable(&self, key: &Key) -> bool {
        let ident = key.identifier_string();
        self.index.unique.contains_key(&ident)
            || self.index.vec_aggregates.contains_key(&ident)
            || self.index.map_aggregates.contains_key(&ident)
            || self.bindings.contains_key(&ident)
            || self.inherited.contains_key(&ident)
            || (key.qualifier.is_none()
                && key.contribution.is_none()
                && self.manifest.find_injectable(&key.type_data).is_some())
    }

    /// Last-resort synthesis: injectable constructors, members injectors,
    /// and auto-boxing.
    fn synthesize(&mut self, request: &Request) -> Result<Option<Binding>, TypeData> {
        let key = &request.key;
        let owner = &self.component.type_data;
        if key.qualifier.is_some() || key.contribution.is_some() {
            return Ok(None);
        }
        let type_data = &key.type_data;

        if type_data.path == "stiletto::MembersInjector" && type_data.args.len() == 1 {
            let target = &type_data.args[0];
            let Some(injectable) = self.manifest.find_injectable(target) else {
                match self.resolver.resolve(target) {
                    Resolution::NotYetResolvable => return Err(target.clone()),
                    _ => return Ok(None),
                }
            };
            let mut dependencies = Vec::new();
            for field in &injectable.fields {
                if !field.injected {
                    continue;
                }
                let site = DependencyDecl {
                    name: field.name.clone(),
                    type_data: field.type_data.clone(),
                    qualifiers: field.qualifiers.clone(),
                };
                let element = format!(
                    "{}.{}",
                    injectable.type_data.canonical_string_path(),
                    field.name
                );
                match KeyFactory::for_dependency(&site, &element) {
                    Ok((dep_key, kind, reference)) => dependencies
                        .push(DependencyRequest::new(dep_key, kind).referenced(reference)),
                    Err(diagnostic) => self.log.report(diagnostic),
                }
            }
            return Ok(Some(
                Binding::new(
                    key.clone(),
                    BindingKind::MembersInjector {
                        injectable: injectable.clone(),
                    },
                    owner,
                    &injectable.type_data.canonical_string_path(),
                )
                .with_dependencies(dependencies),
            ));
        }

        if let Some(injectable) = self.manifest.find_injectable(type_data) {
            let mut dependencies = Vec::new();
            for dependency in &injectable.dependencies {
                match KeyFactory::for_dependency(dependency, &injectable.element_path()) {
                    Ok((dep_key, kind, reference)) => dependencies
                        .push(DependencyRequest::new(dep_key, kind).referenced(reference)),
                    Err(diagnostic) => self.log.report(diagnostic),
                }
            }
            return Ok(Some(
                Binding::new(
                    key.clone(),
                    BindingKind::Injection {
                        injectable: injectable.clone(),
                    },
                    owner,
                    &injectable.type_data.canonical_string_path(),
                )
                .with_dependencies(dependencies)
                .with_scope(injectable.scopes.first().cloned()),
            ));
        }

        // Box<T> from a bound T.
        if type_data.path == "std::boxed::Box" && type_data.args.len() == 1 {
            let inner = Key::qualified(&type_data.args[0], key.qualifier.clone());
            return Ok(Some(
                Binding::new(key.clone(), BindingKind::Boxed, owner, &key.readable())
                    .with_dependencies(vec![DependencyRequest::new(
                        inner,
                        RequestKind::Instance,
                    )]),
            ));
        }

        Ok(None)
    }

    /// Reports instance cycles. A cycle where every edge defers construction
    /// (Provider/Lazy/Producer) is satisfiable and stays silent.
    fn find_cycles(&mut self, entry_points: &[ResolvedEntryPoint]) {
        let mut states: HashMap<String, VisitState> = HashMap::new();
        let mut stack: Vec<StackEntry> = Vec::new();
        let mut reported: HashSet<Vec<String>> = HashSet::new();

        for entry_point in entry_points {
            self.visit(
                &entry_point.key,
                entry_point.kind,
                &mut states,
                &mut stack,
                &mut reported,
            );
        }
    }

    fn visit(
        &mut self,
        key: &Key,
        entering: RequestKind,
        states: &mut HashMap<String, VisitState>,
        stack: &mut Vec<StackEntry>,
        reported: &mut HashSet<Vec<String>>,
    ) {
        let ident = key.identifier_string();
        match states.get(&ident) {
            Some(VisitState::Done) => return,
            Some(VisitState::InProgress) => {
                let position = stack
                    .iter()
                    .position(|entry| entry.ident == ident)
                    .expect("in-progress node on stack");
                let cycle = &stack[position..];
                let all_indirect = entering.is_indirect()
                    && cycle[1..].iter().all(|entry| entry.entering.is_indirect());
                if all_indirect {
                    return;
                }
                let mut signature: Vec<String> =
                    cycle.iter().map(|entry| entry.ident.clone()).collect();
                signature.sort();
                if !reported.insert(signature) {
                    return;
                }
                let names: Vec<String> = stack.iter().map(|entry| entry.name.clone()).collect();
                self.log.report(dependency_cycle(&names, position));
                return;
            }
            None => {}
        }

        let Some(binding) = self
            .bindings
            .get(&ident)
            .and_then(|candidates| candidates.first())
            .cloned()
        else {
            states.insert(ident, VisitState::Done);
            return;
        };

        states.insert(ident.clone(), VisitState::InProgress);
        stack.push(StackEntry {
            ident: ident.clone(),
            name: binding.describe(),
            entering,
        });
        for dependency in &binding.dependencies {
            self.visit(&dependency.key, dependency.kind, states, stack, reported);
        }
        stack.pop();
        states.insert(ident, VisitState::Done);
    }
}

enum VisitState {
    InProgress,
    Done,
}

struct StackEntry {
    ident: String,
    name: String,
    entering: RequestKind,
}

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

//! Walks a built [BindingGraph] and reports every invariant violation it can
//! find. Checks are independent; none stops the others from running, and the
//! graph is never mutated, so re-validating yields the same report.

use std::collections::{HashMap, HashSet};

use crate::accessibility::{is_fully_accessible, visible_type, CodeLocation};
use crate::binding::{Binding, BindingKind, RequestKind};
use crate::error::{Diagnostic, DiagnosticKind};
use crate::graph::BindingGraph;
use crate::key::KeyFactory;
use crate::manifest::{
    BindingDecl, BindingType, ComponentDecl, CreatorDecl, CreatorMethodDecl, DependencyDecl,
    Manifest, MultibindingType,
};
use crate::type_data::TypeData;

/// All errors found for one component tree. A non-clean report stops code
/// generation for this component only.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub component: TypeData,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

pub fn validate_graph(manifest: &Manifest, graph: &BindingGraph) -> ValidationReport {
    let mut report = ValidationReport {
        component: graph.component.type_data.clone(),
        diagnostics: Vec::new(),
    };
    validate_into(manifest, graph, &mut Vec::new(), &mut report);
    report
}

fn validate_into(
    manifest: &Manifest,
    graph: &BindingGraph,
    ancestor_scopes: &mut Vec<(TypeData, TypeData)>,
    report: &mut ValidationReport,
) {
    check_accessibility(manifest, graph, report);
    check_scopes(graph, ancestor_scopes, report);
    check_scoped_requests(graph, report);
    check_multibinding_declarations(manifest, &graph.component, report);
    check_creator(&graph.component, report);
    check_entry_point_conflicts(&graph.component, report);
    check_production_requests(graph, report);

    let depth = ancestor_scopes.len();
    for scope in &graph.component.scopes {
        ancestor_scopes.push((graph.component.type_data.clone(), scope.clone()));
    }
    for child in &graph.children {
        validate_into(manifest, child, ancestor_scopes, report);
    }
    ancestor_scopes.truncate(depth);
}

fn code_location(component: &ComponentDecl) -> CodeLocation {
    CodeLocation::new(&component.type_data.field_crate, &component.module_path)
}

/// Every binding's implementation type and every dependency type must be
/// nameable from the module the component's code is generated into.
fn check_accessibility(manifest: &Manifest, graph: &BindingGraph, report: &mut ValidationReport) {
    let from = code_location(&graph.component);
    let mut checked: HashSet<String> = HashSet::new();
    for binding in graph.bindings_in_order() {
        check_type_accessible(
            manifest,
            &binding.key.type_data,
            &from,
            &binding.declaration,
            &mut checked,
            report,
        );
        for dependency in &binding.dependencies {
            check_type_accessible(
                manifest,
                &dependency.key.type_data,
                &from,
                &binding.declaration,
                &mut checked,
                report,
            );
        }
    }
}

fn check_type_accessible(
    manifest: &Manifest,
    type_data: &TypeData,
    from: &CodeLocation,
    element: &str,
    checked: &mut HashSet<String>,
    report: &mut ValidationReport,
) {
    if !checked.insert(type_data.identifier_string()) {
        return;
    }
    // The generator substitutes registered re-export aliases, so judge the
    // spelling it will actually emit.
    let spelled = visible_type(manifest, type_data, from);
    if !is_fully_accessible(manifest, &spelled, from) {
        report.diagnostics.push(Diagnostic::new(
            DiagnosticKind::InaccessibleType,
            element,
            &format!(
                "{} is not accessible from {}::{}",
                type_data.readable(),
                from.crate_,
                from.module_path
            ),
        ));
    }
}

/// A scoped binding must be installed in a component declaring its scope, and
/// one scope may not be claimed twice along a parent→child chain.
fn check_scopes(
    graph: &BindingGraph,
    ancestor_scopes: &[(TypeData, TypeData)],
    report: &mut ValidationReport,
) {
    let component = &graph.component;
    for scope in &component.scopes {
        if let Some((ancestor, _)) = ancestor_scopes
            .iter()
            .find(|(_, ancestor_scope)| ancestor_scope == scope)
        {
            report.diagnostics.push(Diagnostic::new(
                DiagnosticKind::ScopeMismatch,
                &component.type_data.canonical_string_path(),
                &format!(
                    "scope {} on {} is already claimed by ancestor component {}",
                    scope.readable(),
                    component.type_data.readable(),
                    ancestor.readable()
                ),
            ));
        }
    }

    for binding in graph.bindings_in_order() {
        let Some(scope) = &binding.scope else {
            continue;
        };
        // The scope may be owned here or anywhere up the chain; a scope
        // declared only further down never covers this component.
        let declared = component.scopes.contains(scope)
            || ancestor_scopes
                .iter()
                .any(|(_, ancestor_scope)| ancestor_scope == scope);
        if !declared {
            report.diagnostics.push(Diagnostic::new(
                DiagnosticKind::ScopeMismatch,
                &binding.declaration,
                &format!(
                    "{} is scoped with {} but neither {} nor an ancestor component declares that scope",
                    binding.describe(),
                    scope.readable(),
                    component.type_data.readable()
                ),
            ));
        }
    }
}

/// A scoped binding hands out shared references; its consumers must spell
/// the dependency `& T`. Conversely an unscoped instance cannot be borrowed,
/// there is no one to own it.
fn check_scoped_requests(graph: &BindingGraph, report: &mut ValidationReport) {
    let mut check_edge =
        |target: Option<&Binding>, kind: RequestKind, reference: bool, element: &str| {
            let Some(target) = target else { return };
            if kind != RequestKind::Instance {
                return;
            }
            if target.scope.is_some() && !reference {
                report.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::InvalidRequest,
                    element,
                    &format!(
                        "unable to provide scoped binding as regular type {}\nrequested by: {}",
                        target.describe(),
                        element
                    ),
                ));
            } else if target.scope.is_none() && reference {
                report.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::InvalidRequest,
                    element,
                    &format!(
                        "unable to borrow unscoped binding {}\nrequested by: {}",
                        target.describe(),
                        element
                    ),
                ));
            }
        };
    for binding in graph.bindings_in_order() {
        for dependency in &binding.dependencies {
            check_edge(
                graph.lookup(&dependency.key),
                dependency.kind,
                dependency.reference,
                &binding.declaration,
            );
        }
    }
    for entry_point in &graph.entry_points {
        let element = format!(
            "{}.{}",
            graph.component.type_data.canonical_string_path(),
            entry_point.declaration.name
        );
        check_edge(
            graph.lookup(&entry_point.key),
            entry_point.kind,
            entry_point.reference,
            &element,
        );
    }
}

fn is_framework_wrapper(type_data: &TypeData) -> bool {
    matches!(
        type_data.canonical().path.as_str(),
        "stiletto::Provider" | "stiletto::Lazy" | "stiletto::Producer" | "stiletto::Produced"
    )
}

fn has_placeholder(type_data: &TypeData) -> bool {
    type_data.is_placeholder() || type_data.args.iter().any(has_placeholder)
}

/// Shape of multibinding declarations: concrete collections of concrete,
/// non-framework element types. Exactly one error per offending declaration,
/// naming the first violated rule.
fn check_multibinding_declarations(
    manifest: &Manifest,
    component: &ComponentDecl,
    report: &mut ValidationReport,
) {
    for module_type in &component.modules {
        let module = manifest.find_module(module_type).expect("verified module");
        for decl in &module.bindings {
            let element = decl.element_path(&module.type_data);
            if let Some(message) = multibinding_shape_error(decl) {
                report.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::MalformedMultibinding,
                    &element,
                    &format!("{}: {}", element, message),
                ));
            }
        }
    }
}

fn multibinding_shape_error(decl: &BindingDecl) -> Option<String> {
    match decl.binding_type {
        BindingType::Multibinds => {
            let type_data = &decl.type_data;
            if type_data.is_unit() {
                return Some("multibinds declaration must return a collection, not ()".to_owned());
            }
            match type_data.canonical().path.as_str() {
                "std::vec::Vec" => {
                    if type_data.args.len() != 1 {
                        return Some(
                            "multibinds Vec declaration must name its element type".to_owned(),
                        );
                    }
                }
                "std::collections::HashMap" => {
                    if type_data.args.len() != 2 {
                        return Some(
                            "multibinds HashMap declaration must name its key and value types"
                                .to_owned(),
                        );
                    }
                }
                _ => {
                    return Some(format!(
                        "multibinds declaration must return Vec<T> or HashMap<K, V>, not {}",
                        type_data.readable()
                    ))
                }
            }
            if has_placeholder(type_data) {
                return Some(
                    "multibinds declaration may not use _ for its element types".to_owned(),
                );
            }
            if type_data.args.iter().any(is_framework_wrapper) {
                return Some(
                    "multibinds declaration may not bind framework types".to_owned(),
                );
            }
            None
        }
        _ => match decl.multibinding {
            MultibindingType::None => None,
            MultibindingType::IntoVec | MultibindingType::IntoMap => {
                if is_framework_wrapper(&decl.type_data) {
                    return Some("multibinding contribution may not bind framework types".to_owned());
                }
                if has_placeholder(&decl.type_data) {
                    return Some("multibinding contribution may not use _".to_owned());
                }
                None
            }
            MultibindingType::ElementsIntoVec => {
                let canonical = decl.type_data.canonical();
                if canonical.path != "std::vec::Vec" || canonical.args.len() != 1 {
                    return Some(
                        "elements contribution must return Vec<T> of the bound element type"
                            .to_owned(),
                    );
                }
                if canonical.args.iter().any(is_framework_wrapper) {
                    return Some("multibinding contribution may not bind framework types".to_owned());
                }
                if has_placeholder(&canonical) {
                    return Some("multibinding contribution may not use _".to_owned());
                }
                None
            }
        },
    }
}

/// Creator shape: at most one build method, setters of exactly one plain
/// parameter returning unit or the creator itself.
fn check_creator(component: &ComponentDecl, report: &mut ValidationReport) {
    let Some(creator) = &component.creator else {
        return;
    };
    let build_methods: Vec<&CreatorMethodDecl> = creator
        .methods
        .iter()
        .filter(|method| method.return_type.as_ref() == Some(&component.type_data))
        .collect();
    if build_methods.len() > 1 {
        report.diagnostics.push(Diagnostic::new(
            DiagnosticKind::MalformedCreator,
            &creator.type_data.canonical_string_path(),
            &format!(
                "{} declares more than one build method:\n\t{}",
                creator.type_data.readable(),
                build_methods
                    .iter()
                    .map(|method| describe_creator_method(creator, method))
                    .collect::<Vec<String>>()
                    .join("\n\t")
            ),
        ));
    }
    for method in &creator.methods {
        if build_methods.contains(&method) {
            for parameter in &method.parameters {
                check_creator_parameter(creator, method, parameter, report);
            }
            continue;
        }
        let element = format!(
            "{}.{}",
            creator.type_data.canonical_string_path(),
            method.name
        );
        if method.parameters.len() != 1 {
            report.diagnostics.push(Diagnostic::new(
                DiagnosticKind::MalformedCreator,
                &element,
                &format!(
                    "{} must take exactly one parameter",
                    describe_creator_method(creator, method)
                ),
            ));
            continue;
        }
        check_creator_parameter(creator, method, &method.parameters[0], report);
        if let Some(return_type) = &method.return_type {
            if return_type != &creator.type_data {
                report.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::MalformedCreator,
                    &element,
                    &format!(
                        "{} must return nothing or the creator type",
                        describe_creator_method(creator, method)
                    ),
                ));
            }
        }
    }
}

fn check_creator_parameter(
    creator: &CreatorDecl,
    method: &CreatorMethodDecl,
    parameter: &DependencyDecl,
    report: &mut ValidationReport,
) {
    let element = format!(
        "{}.{}",
        creator.type_data.canonical_string_path(),
        method.name
    );
    if is_framework_wrapper(&parameter.type_data) {
        report.diagnostics.push(Diagnostic::new(
            DiagnosticKind::MalformedCreator,
            &element,
            &format!(
                "{} may not take the framework type {}",
                describe_creator_method(creator, method),
                parameter.type_data.readable()
            ),
        ));
    } else if has_placeholder(&parameter.type_data) {
        report.diagnostics.push(Diagnostic::new(
            DiagnosticKind::MalformedCreator,
            &element,
            &format!(
                "{} may not take a _ parameter",
                describe_creator_method(creator, method)
            ),
        ));
    }
}

/// Cites the original declaring type for inherited creator methods.
fn describe_creator_method(creator: &CreatorDecl, method: &CreatorMethodDecl) -> String {
    let declared_in = method.declared_in.as_ref().unwrap_or(&creator.type_data);
    format!("{}.{}", declared_in.canonical_string_path(), method.name)
}

/// Two supertraits declaring the same zero-parameter method with different
/// keys cannot both be implemented; identical keys merge silently.
fn check_entry_point_conflicts(component: &ComponentDecl, report: &mut ValidationReport) {
    let mut by_name: HashMap<&str, Vec<(String, String, String)>> = HashMap::new();
    let mut name_order: Vec<&str> = Vec::new();
    for (entry_point, declared_in) in component.all_entry_points() {
        let element = format!(
            "{}.{}",
            declared_in.canonical_string_path(),
            entry_point.name
        );
        let signature = match KeyFactory::for_declaration(
            &entry_point.type_data,
            &entry_point.qualifiers,
            &element,
        ) {
            Ok(key) => format!("{}/{}", key.identifier_string(), entry_point.injects_members),
            Err(_) => continue,
        };
        if !by_name.contains_key(entry_point.name.as_str()) {
            name_order.push(&entry_point.name);
        }
        by_name.entry(&entry_point.name).or_default().push((
            signature,
            element,
            entry_point.type_data.readable(),
        ));
    }
    for name in name_order {
        let declarations = &by_name[name];
        let distinct: HashSet<&String> = declarations.iter().map(|(sig, _, _)| sig).collect();
        if distinct.len() < 2 {
            continue;
        }
        report.diagnostics.push(Diagnostic::new(
            DiagnosticKind::ConflictingEntryPoints,
            &component.type_data.canonical_string_path(),
            &format!(
                "{} can only implement {} once, conflicting declarations:\n\t{}",
                component.type_data.readable(),
                name,
                declarations
                    .iter()
                    .map(|(_, element, returned)| format!("{} -> {}", element, returned))
                    .collect::<Vec<String>>()
                    .join("\n\t")
            ),
        ));
    }
}

/// Production bindings construct through a producer; plain instance requests
/// would bypass the failure channel.
fn check_production_requests(graph: &BindingGraph, report: &mut ValidationReport) {
    let mut check_edge = |target: Option<&Binding>, kind: RequestKind, element: &str| {
        let Some(target) = target else { return };
        if matches!(target.kind, BindingKind::Production { .. })
            && !matches!(kind, RequestKind::Producer | RequestKind::Produced)
        {
            report.diagnostics.push(Diagnostic::new(
                DiagnosticKind::InvalidRequest,
                element,
                &format!(
                    "{} may only be requested through Producer or Produced",
                    target.describe()
                ),
            ));
        }
    };
    for binding in graph.bindings_in_order() {
        for dependency in &binding.dependencies {
            check_edge(
                graph.binding_for(&dependency.key),
                dependency.kind,
                &binding.declaration,
            );
        }
    }
    for entry_point in &graph.entry_points {
        let element = format!(
            "{}.{}",
            graph.component.type_data.canonical_string_path(),
            entry_point.declaration.name
        );
        check_edge(
            graph.binding_for(&entry_point.key),
            entry_point.kind,
            &element,
        );
    }
}

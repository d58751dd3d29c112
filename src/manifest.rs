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

//! The declaration model: everything the resolver knows about one compilation
//! unit, parsed ahead of time into explicit data. A frontend (or a test)
//! builds a [Manifest]; nothing in the engine reaches back into a compiler.

use anyhow::{bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::annotation::{AnnotationData, AnnotationValue};
use crate::type_data::TypeData;

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct Manifest {
    pub components: Vec<ComponentDecl>,
    pub modules: Vec<ModuleDecl>,
    pub injectables: Vec<InjectableDecl>,
    /// Visibility registry. Types absent from it are treated as public.
    pub type_decls: Vec<TypeDecl>,
    pub merged_crates: Vec<String>,
}

impl Manifest {
    pub fn new() -> Manifest {
        Default::default()
    }

    pub fn clear(&mut self) {
        self.components.clear();
        self.modules.clear();
        self.injectables.clear();
        self.type_decls.clear();
        self.merged_crates.clear();
    }

    pub fn merge_from(&mut self, other: &Manifest) {
        self.components.extend_from_slice(other.components.as_slice());
        self.modules.extend_from_slice(other.modules.as_slice());
        self.injectables
            .extend_from_slice(other.injectables.as_slice());
        self.type_decls.extend_from_slice(other.type_decls.as_slice());
        self.merged_crates
            .extend_from_slice(other.merged_crates.as_slice());
    }

    pub fn from_json(json: &str) -> Result<Manifest> {
        let manifest: Manifest =
            serde_json::from_str(json).with_context(|| "cannot parse manifest")?;
        manifest.verify()?;
        Ok(manifest)
    }

    pub fn load(path: &std::path::Path) -> Result<Manifest> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read manifest {}", path.display()))?;
        Manifest::from_json(&json)
    }

    /// Structural sanity of the declarations themselves, before any graph
    /// work: names must be identifiers, and cross-references must land.
    pub fn verify(&self) -> Result<()> {
        for module in &self.modules {
            for binding in &module.bindings {
                verify_name(&binding.name, &module.type_data)?;
            }
        }
        for component in &self.components {
            for entry_point in &component.entry_points {
                verify_name(&entry_point.name, &component.type_data)?;
            }
            for module in &component.modules {
                if self.find_module(module).is_none() {
                    bail!(
                        "{} installs unknown module {}",
                        component.type_data.readable(),
                        module.readable()
                    );
                }
            }
            for subcomponent in &component.subcomponents {
                if self.find_component(subcomponent).is_none() {
                    bail!(
                        "{} declares unknown subcomponent {}",
                        component.type_data.readable(),
                        subcomponent.readable()
                    );
                }
            }
        }
        Ok(())
    }

    pub fn find_component(&self, type_data: &TypeData) -> Option<&ComponentDecl> {
        let identifier = type_data.identifier_string();
        self.components
            .iter()
            .find(|component| component.type_data.identifier_string() == identifier)
    }

    pub fn find_module(&self, type_data: &TypeData) -> Option<&ModuleDecl> {
        let identifier = type_data.identifier_string();
        self.modules
            .iter()
            .find(|module| module.type_data.identifier_string() == identifier)
    }

    pub fn find_injectable(&self, type_data: &TypeData) -> Option<&InjectableDecl> {
        let identifier = type_data.canonical().identifier_string();
        self.injectables
            .iter()
            .find(|injectable| injectable.type_data.canonical().identifier_string() == identifier)
    }

    pub fn find_type_decl(&self, type_data: &TypeData) -> Option<&TypeDecl> {
        let path = type_data.canonical();
        let path = path.canonical_string_path();
        self.type_decls
            .iter()
            .find(|decl| decl.type_data.canonical().canonical_string_path() == path)
    }

    pub fn root_components(&self) -> impl Iterator<Item = &ComponentDecl> {
        self.components
            .iter()
            .filter(|component| component.kind == ComponentKind::Component)
    }
}

lazy_static! {
    static ref NAME_PATTERN: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

fn verify_name(name: &str, owner: &TypeData) -> Result<()> {
    if !NAME_PATTERN.is_match(name) {
        bail!("{}: invalid method name {:?}", owner.readable(), name);
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone, Copy)]
pub enum ComponentKind {
    Component,
    Subcomponent,
}

impl Default for ComponentKind {
    fn default() -> Self {
        ComponentKind::Component
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct ComponentDecl {
    pub type_data: TypeData,
    pub kind: ComponentKind,
    /// Module path generated code for this component lives in, e.g.
    /// `crate::app`. Accessibility is judged from here.
    pub module_path: String,
    pub modules: Vec<TypeData>,
    pub dependencies: Vec<ComponentDependencyDecl>,
    pub entry_points: Vec<EntryPointDecl>,
    pub subcomponents: Vec<TypeData>,
    /// Scope annotations this component owns.
    pub scopes: Vec<TypeData>,
    pub creator: Option<CreatorDecl>,
    /// Supertraits whose entry points this component inherits.
    pub supertraits: Vec<SupertraitDecl>,
}

impl ComponentDecl {
    pub fn new() -> Self {
        Default::default()
    }

    /// Entry points in declaration order: the component's own, then each
    /// supertrait's.
    pub fn all_entry_points(&self) -> Vec<(&EntryPointDecl, &TypeData)> {
        let mut result: Vec<(&EntryPointDecl, &TypeData)> = self
            .entry_points
            .iter()
            .map(|entry_point| (entry_point, &self.type_data))
            .collect();
        for supertrait in &self.supertraits {
            result.extend(
                supertrait
                    .entry_points
                    .iter()
                    .map(|entry_point| (entry_point, &supertrait.type_data)),
            );
        }
        result
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct SupertraitDecl {
    pub type_data: TypeData,
    pub entry_points: Vec<EntryPointDecl>,
}

/// A provision method on a component interface, a supertrait of one, or a
/// component dependency.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct EntryPointDecl {
    pub name: String,
    pub type_data: TypeData,
    pub qualifiers: Vec<AnnotationData>,
    /// `fn inject(&self, target: &mut T)` style: `type_data` is the target
    /// whose `#[inject]` fields get populated.
    pub injects_members: bool,
}

impl EntryPointDecl {
    pub fn new() -> Self {
        Default::default()
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct ComponentDependencyDecl {
    pub type_data: TypeData,
    pub provisions: Vec<EntryPointDecl>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct ModuleDecl {
    pub type_data: TypeData,
    pub bindings: Vec<BindingDecl>,
}

impl ModuleDecl {
    pub fn new() -> Self {
        Default::default()
    }
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone, Copy)]
pub enum BindingType {
    Provides,
    Produces,
    Binds,
    BindsOptionOf,
    Multibinds,
}

impl Default for BindingType {
    fn default() -> Self {
        BindingType::Provides
    }
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone, Copy)]
pub enum MultibindingType {
    None,
    IntoVec,
    ElementsIntoVec,
    IntoMap,
}

impl Default for MultibindingType {
    fn default() -> Self {
        MultibindingType::None
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct BindingDecl {
    pub name: String,
    pub binding_type: BindingType,
    /// The bound type. For [BindingType::Multibinds] the declared collection
    /// type; for [BindingType::BindsOptionOf] the wrapped type.
    pub type_data: TypeData,
    pub qualifiers: Vec<AnnotationData>,
    pub dependencies: Vec<DependencyDecl>,
    pub scopes: Vec<TypeData>,
    pub multibinding: MultibindingType,
    pub map_key: Option<AnnotationValue>,
    /// Associated function on the module type, as opposed to a method on a
    /// module instance held by the component.
    pub field_static: bool,
}

impl BindingDecl {
    pub fn new(binding_type: BindingType) -> Self {
        BindingDecl {
            binding_type,
            field_static: true,
            ..Default::default()
        }
    }

    pub fn element_path(&self, module: &TypeData) -> String {
        format!("{}.{}", module.canonical_string_path(), self.name)
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct DependencyDecl {
    pub name: String,
    pub type_data: TypeData,
    pub qualifiers: Vec<AnnotationData>,
}

impl DependencyDecl {
    pub fn new() -> Self {
        Default::default()
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct InjectableDecl {
    pub type_data: TypeData,
    pub ctor_name: String,
    pub dependencies: Vec<DependencyDecl>,
    /// Fields populated by members injection, in declaration order.
    pub fields: Vec<FieldDecl>,
    pub scopes: Vec<TypeData>,
}

impl InjectableDecl {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn element_path(&self) -> String {
        format!(
            "{}::{}",
            self.type_data.canonical_string_path(),
            self.ctor_name
        )
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct FieldDecl {
    pub name: String,
    pub type_data: TypeData,
    pub qualifiers: Vec<AnnotationData>,
    pub injected: bool,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone, Copy)]
pub enum CreatorKind {
    Builder,
    Factory,
}

impl Default for CreatorKind {
    fn default() -> Self {
        CreatorKind::Builder
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct CreatorDecl {
    pub type_data: TypeData,
    pub kind: CreatorKind,
    pub methods: Vec<CreatorMethodDecl>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct CreatorMethodDecl {
    pub name: String,
    pub parameters: Vec<DependencyDecl>,
    /// None for unit.
    pub return_type: Option<TypeData>,
    /// Setter parameter is bound directly into the graph instead of naming a
    /// module or component dependency.
    pub bound_instance: bool,
    /// Where the method was originally declared, when inherited.
    pub declared_in: Option<TypeData>,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone, Copy)]
pub enum DeclaredVisibility {
    Public,
    Crate,
    /// Private to the module it is defined in (and that module's children).
    Module,
}

impl Default for DeclaredVisibility {
    fn default() -> Self {
        DeclaredVisibility::Public
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct TypeDecl {
    pub type_data: TypeData,
    pub visibility: DeclaredVisibility,
    /// Module path the type is defined in, e.g. `crate::internal`.
    pub defined_in: String,
    /// Public re-export alias generated code may spell when the declared
    /// path itself is not nameable.
    pub exported_name: Option<TypeData>,
}

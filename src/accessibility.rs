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

//! Whether generated code placed in a component's module may name a type.
//! Types not present in the manifest's visibility registry (std, prelude,
//! other crates' public surface) are assumed public.

use crate::manifest::{DeclaredVisibility, Manifest};
use crate::type_data::TypeData;

/// Where generated code lives: the component's crate and module path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLocation {
    pub crate_: String,
    pub module_path: String,
}

impl CodeLocation {
    pub fn new(crate_: &str, module_path: &str) -> Self {
        CodeLocation {
            crate_: crate_.to_owned(),
            module_path: module_path.to_owned(),
        }
    }
}

/// True when `from` is `defined_in` itself or nested inside it.
fn module_reaches(from: &str, defined_in: &str) -> bool {
    from == defined_in || from.starts_with(&format!("{}::", defined_in))
}

/// Accessibility of the type's own declaration, ignoring arguments.
pub fn is_accessible(manifest: &Manifest, type_data: &TypeData, from: &CodeLocation) -> bool {
    let decl = match manifest.find_type_decl(type_data) {
        Some(decl) => decl,
        None => return true,
    };
    match decl.visibility {
        DeclaredVisibility::Public => true,
        DeclaredVisibility::Crate => decl.type_data.field_crate == from.crate_,
        DeclaredVisibility::Module => {
            decl.type_data.field_crate == from.crate_
                && module_reaches(&from.module_path, &decl.defined_in)
        }
    }
}

/// Accessibility of the type and, recursively, every type argument.
pub fn is_fully_accessible(manifest: &Manifest, type_data: &TypeData, from: &CodeLocation) -> bool {
    is_accessible(manifest, type_data, from)
        && type_data
            .args
            .iter()
            .all(|arg| is_fully_accessible(manifest, arg, from))
}

/// The spelling generated code should use: the registered public re-export
/// alias when the declared path is not nameable from `from`, recursively
/// through arguments.
pub fn visible_type(manifest: &Manifest, type_data: &TypeData, from: &CodeLocation) -> TypeData {
    let mut result = type_data.clone();
    if !is_accessible(manifest, type_data, from) {
        if let Some(decl) = manifest.find_type_decl(type_data) {
            if let Some(exported) = &decl.exported_name {
                let mut exported = exported.clone();
                exported.trait_object = type_data.trait_object;
                exported.field_ref = type_data.field_ref;
                result = exported;
            }
        }
    }
    result.args = result
        .args
        .iter()
        .map(|arg| visible_type(manifest, arg, from))
        .collect();
    result
}

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

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone, Copy)]
pub enum TypeRoot {
    UNSPECIFIED = 0,
    GLOBAL = 1,
    CRATE = 2,
    PRIMITIVE = 3,
}

impl Default for TypeRoot {
    fn default() -> Self {
        TypeRoot::UNSPECIFIED
    }
}

lazy_static! {
    /// auto used types that do not need fully qualified paths.
    static ref PRELUDE_V1: HashMap<String, String> = {
        let mut m = HashMap::<String, String>::new();
        m.insert("Box".into(), "std::boxed::Box".into());
        m.insert("Option".into(), "std::option::Option".into());
        m.insert("Result".into(), "std::result::Result".into());
        m.insert("String".into(), "std::string::String".into());
        m.insert("Vec".into(), "std::vec::Vec".into());
        m.insert("HashMap".into(), "std::collections::HashMap".into());
        m.insert("Provider".into(), "stiletto::Provider".into());
        m.insert("Lazy".into(), "stiletto::Lazy".into());
        m.insert("Producer".into(), "stiletto::Producer".into());
        m.insert("Produced".into(), "stiletto::Produced".into());
        m
    };
}

lazy_static! {
    /// primitive data types with no path
    static ref PRIMITIVES: HashSet<String> = {
        let mut m = HashSet::<String>::new();
        m.insert("i8".to_owned());
        m.insert("u8".to_owned());
        m.insert("i16".to_owned());
        m.insert("u16".to_owned());
        m.insert("i32".to_owned());
        m.insert("u32".to_owned());
        m.insert("i64".to_owned());
        m.insert("u64".to_owned());
        m.insert("i128".to_owned());
        m.insert("u128".to_owned());
        m.insert("isize".to_owned());
        m.insert("usize".to_owned());
        m.insert("f32".to_owned());
        m.insert("f64".to_owned());
        m.insert("bool".to_owned());
        m.insert("char".to_owned());
        m
    };
}

lazy_static! {
    /// std modules that are re-exports of core, so a `core::` spelling names
    /// the same type as the `std::` one.
    static ref CORE_STD_MODULES: HashSet<String> = {
        let mut m = HashSet::<String>::new();
        m.insert("option".to_owned());
        m.insert("result".to_owned());
        m.insert("cell".to_owned());
        m.insert("cmp".to_owned());
        m.insert("convert".to_owned());
        m.insert("fmt".to_owned());
        m.insert("iter".to_owned());
        m.insert("marker".to_owned());
        m.insert("mem".to_owned());
        m.insert("ops".to_owned());
        m.insert("pin".to_owned());
        m.insert("time".to_owned());
        m
    };
}

/// Structural description of a type as the declaration model spells it.
///
/// Identity is the mangled [identifier](TypeData::identifier): two values
/// naming the same canonical path with the same arguments and modifiers are
/// equal regardless of how they were spelled.
#[derive(Debug, Serialize, Deserialize, Clone, Default, Eq)]
pub struct TypeData {
    pub root: TypeRoot,
    pub path: String,
    /// Crate the path is anchored in, for [TypeRoot::CRATE] types.
    pub field_crate: String,
    pub args: Vec<TypeData>,
    pub trait_object: bool,
    pub field_ref: bool,
    pub identifier_suffix: String,
}

impl PartialEq for TypeData {
    fn eq(&self, other: &Self) -> bool {
        self.identifier_string().eq(&other.identifier_string())
    }
}

impl Hash for TypeData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier_string().hash(state)
    }
}

impl TypeData {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn global(path: &str) -> Self {
        TypeData {
            root: TypeRoot::GLOBAL,
            path: path.to_owned(),
            ..Default::default()
        }
    }

    pub fn primitive(name: &str) -> Self {
        TypeData {
            root: TypeRoot::PRIMITIVE,
            path: name.to_owned(),
            ..Default::default()
        }
    }

    pub fn local(crate_: &str, path: &str) -> Self {
        TypeData {
            root: TypeRoot::CRATE,
            path: path.to_owned(),
            field_crate: crate_.to_owned(),
            ..Default::default()
        }
    }

    /// The unit type. Used by declarations that produce nothing, which is
    /// only ever legal for creator setters.
    pub fn unit() -> Self {
        TypeData::primitive("()")
    }

    pub fn string() -> Self {
        TypeData::global("std::string::String")
    }

    pub fn with_args(mut self, args: Vec<TypeData>) -> Self {
        self.args = args;
        self
    }

    pub fn boxed_of(inner: TypeData) -> Self {
        TypeData::global("std::boxed::Box").with_args(vec![inner])
    }

    pub fn option_of(inner: TypeData) -> Self {
        TypeData::global("std::option::Option").with_args(vec![inner])
    }

    pub fn vec_of(inner: TypeData) -> Self {
        TypeData::global("std::vec::Vec").with_args(vec![inner])
    }

    pub fn map_of(key: TypeData, value: TypeData) -> Self {
        TypeData::global("std::collections::HashMap").with_args(vec![key, value])
    }

    pub fn is_unit(&self) -> bool {
        self.root == TypeRoot::PRIMITIVE && self.path == "()"
    }

    /// A `_` argument, standing in for a type the declaration left open.
    pub fn is_placeholder(&self) -> bool {
        self.path == "_"
    }

    /// Resolves a prelude name (`Vec`, `Provider`, ...) or primitive spelled
    /// without a path, so manifests may use short forms.
    pub fn from_source_name(name: &str) -> Option<Self> {
        if let Some(full) = PRELUDE_V1.get(name) {
            return Some(TypeData::global(full));
        }
        if PRIMITIVES.contains(name) {
            return Some(TypeData::primitive(name));
        }
        None
    }

    /// Rewrites spellings that alias a canonical type into that canonical
    /// form, recursively through arguments:
    ///
    /// - `std::primitive::i32` / `core::primitive::i32` become the primitive
    ///   `i32`, so every spelling of a primitive is one key.
    /// - `core::option::Option` and friends become their `std::` re-export
    ///   paths.
    pub fn canonical(&self) -> TypeData {
        let mut result = self.clone();
        if result.root == TypeRoot::GLOBAL {
            if let Some(primitive) = result
                .path
                .strip_prefix("std::primitive::")
                .or_else(|| result.path.strip_prefix("core::primitive::"))
            {
                if PRIMITIVES.contains(primitive) {
                    result.root = TypeRoot::PRIMITIVE;
                    result.path = primitive.to_owned();
                }
            } else if let Some(rest) = result.path.strip_prefix("core::") {
                if let Some((module, _)) = rest.split_once("::") {
                    if CORE_STD_MODULES.contains(module) {
                        result.path = format!("std::{}", rest);
                    }
                }
            }
        }
        result.args = result.args.iter().map(TypeData::canonical).collect();
        result
    }

    /// Full path of the type in universal form.
    ///
    /// Modifiers like & are omitted
    pub fn canonical_string_path(&self) -> String {
        let prefix = self.get_prefix();
        match self.root {
            TypeRoot::GLOBAL => format!("{}::{}", prefix, self.path_with_args(None)),
            TypeRoot::CRATE => format!(
                "{}::{}::{}",
                prefix,
                self.field_crate,
                self.path_with_args(None)
            ),
            TypeRoot::PRIMITIVE => format!("{}{}", prefix, self.path),
            TypeRoot::UNSPECIFIED => panic!("canonical_string_path: root unspecified"),
        }
    }

    /// Full path of the type in local form (use crate:: within `current_crate`).
    ///
    /// Modifiers like & are omitted
    pub fn local_string_path(&self, current_crate: &str) -> String {
        let prefix = self.get_prefix();
        match self.root {
            TypeRoot::GLOBAL => format!("{}::{}", prefix, self.path_with_args(Some(current_crate))),
            TypeRoot::CRATE => {
                if current_crate.eq(&self.field_crate) {
                    format!(
                        "{}crate::{}",
                        prefix,
                        self.path_with_args(Some(current_crate))
                    )
                } else {
                    format!(
                        "{}{}::{}",
                        prefix,
                        self.field_crate,
                        self.path_with_args(Some(current_crate))
                    )
                }
            }
            TypeRoot::PRIMITIVE => format!("{}{}", prefix, self.path),
            TypeRoot::UNSPECIFIED => panic!("local_string_path: root unspecified"),
        }
    }

    fn get_prefix(&self) -> String {
        let mut prefix = String::new();
        if self.field_ref {
            prefix.push_str("& ");
        }
        if self.trait_object {
            prefix.push_str("dyn ");
        }
        prefix
    }

    /// Full path in local form, as a parsed type that can be quoted into
    /// generated code.
    pub fn syn_type(&self, current_crate: &str) -> syn::Type {
        syn::parse_str(&self.local_string_path(current_crate)).unwrap_or_else(|_| {
            panic!(
                "cannot parse type path {}",
                self.local_string_path(current_crate)
            )
        })
    }

    /// Unique identifier token representing the type.
    ///
    /// Modifiers like & are included.
    pub fn identifier(&self) -> syn::Ident {
        quote::format_ident!("{}", self.identifier_string())
    }

    pub fn identifier_string(&self) -> String {
        format!(
            "{}{}",
            self.canonical_string_path()
                .replace("::", "ⵆ")
                .replace('<', "ᐸ")
                .replace('>', "ᐳ")
                .replace(' ', "_")
                .replace('\'', "ᐠ")
                .replace('&', "ε")
                .replace(',', "ᒧ")
                .replace('(', "ᑫ")
                .replace(')', "ᑬ"),
            self.identifier_suffix
        )
    }

    /// Human readable form.
    pub fn readable(&self) -> String {
        let mut prefix = String::new();
        if self.field_ref {
            prefix.push_str("ref ");
        }
        format!("{}{}", prefix, self.canonical_string_path())
    }

    fn path_with_args(&self, local: Option<&str>) -> String {
        if self.args.is_empty() {
            return self.path.clone();
        }
        let args = self
            .args
            .iter()
            .map(|t| match local {
                Some(current_crate) => t.local_string_path(current_crate),
                None => t.canonical_string_path(),
            })
            .collect::<Vec<String>>()
            .join(",");
        format!("{}<{}>", self.path, args)
    }
}

#[test]
fn canonical_string_path_global_prepends_colons() {
    assert_eq!(
        TypeData::global("std::string::String").canonical_string_path(),
        "::std::string::String"
    );
}

#[test]
fn canonical_string_path_crate_includes_crate_name() {
    assert_eq!(
        TypeData::local("my_crate", "foo::Bar").canonical_string_path(),
        "::my_crate::foo::Bar"
    );
}

#[test]
fn local_string_path_same_crate_uses_crate_prefix() {
    assert_eq!(
        TypeData::local("my_crate", "foo::Bar").local_string_path("my_crate"),
        "crate::foo::Bar"
    );
}

#[test]
fn local_string_path_other_crate_uses_crate_name() {
    assert_eq!(
        TypeData::local("my_crate", "foo::Bar").local_string_path("other"),
        "my_crate::foo::Bar"
    );
}

#[test]
fn canonical_std_primitive_path_equals_bare_primitive() {
    assert_eq!(
        TypeData::global("std::primitive::i32").canonical(),
        TypeData::primitive("i32")
    );
}

#[test]
fn canonical_core_primitive_path_equals_bare_primitive() {
    assert_eq!(
        TypeData::global("core::primitive::bool").canonical(),
        TypeData::primitive("bool")
    );
}

#[test]
fn canonical_core_reexport_equals_std_path() {
    assert_eq!(
        TypeData::global("core::option::Option")
            .with_args(vec![TypeData::string()])
            .canonical(),
        TypeData::option_of(TypeData::string())
    );
}

#[test]
fn canonical_recurses_into_args() {
    assert_eq!(
        TypeData::vec_of(TypeData::global("std::primitive::u8")).canonical(),
        TypeData::vec_of(TypeData::primitive("u8"))
    );
}

#[test]
fn canonical_leaves_unknown_core_module_alone() {
    let t = TypeData::global("core::arch::Weird");
    assert_eq!(t.canonical(), t);
}

#[test]
fn identifier_distinguishes_args() {
    assert_ne!(
        TypeData::vec_of(TypeData::string()).identifier_string(),
        TypeData::vec_of(TypeData::primitive("i32")).identifier_string()
    );
}

#[test]
fn identifier_ref_differs_from_value() {
    let mut r = TypeData::string();
    r.field_ref = true;
    assert_ne!(
        r.identifier_string(),
        TypeData::string().identifier_string()
    );
}

#[test]
fn readable_trait_object_keeps_dyn() {
    let mut t = TypeData::local("my_crate", "Printer");
    t.trait_object = true;
    assert_eq!(t.readable(), "dyn ::my_crate::Printer");
}

#[test]
fn from_source_name_resolves_prelude_and_primitives() {
    assert_eq!(
        TypeData::from_source_name("Vec"),
        Some(TypeData::global("std::vec::Vec"))
    );
    assert_eq!(
        TypeData::from_source_name("u64"),
        Some(TypeData::primitive("u64"))
    );
    assert_eq!(TypeData::from_source_name("Unknown"), None);
}

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

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use crate::annotation::AnnotationData;
use crate::binding::RequestKind;
use crate::error::{Diagnostic, DiagnosticKind};
use crate::manifest::DependencyDecl;
use crate::type_data::{TypeData, TypeRoot};

/// Identity of one multibinding contribution: the aggregate collection key is
/// shared, each contribution stays its own key.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct ContributionId {
    pub module: TypeData,
    pub name: String,
}

/// What can be injected: a canonical type plus an optional qualifier.
///
/// Keys compare value-based. The type is stored canonicalized, so every
/// spelling of a primitive (bare, `std::primitive::`, `core::primitive::`)
/// is the same key, and qualifier equality includes nested annotation
/// values.
#[derive(Debug, Serialize, Deserialize, Clone, Default, Eq)]
pub struct Key {
    pub type_data: TypeData,
    pub qualifier: Option<AnnotationData>,
    pub contribution: Option<ContributionId>,
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.identifier_string().eq(&other.identifier_string())
    }
}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier_string().hash(state)
    }
}

impl Key {
    pub fn for_type(type_data: &TypeData) -> Key {
        Key {
            type_data: type_data.canonical(),
            qualifier: None,
            contribution: None,
        }
    }

    pub fn qualified(type_data: &TypeData, qualifier: Option<AnnotationData>) -> Key {
        Key {
            type_data: type_data.canonical(),
            qualifier,
            contribution: None,
        }
    }

    pub fn with_contribution(mut self, module: &TypeData, name: &str) -> Key {
        self.contribution = Some(ContributionId {
            module: module.clone(),
            name: name.to_owned(),
        });
        self
    }

    /// The aggregate key this contribution key belongs to.
    pub fn without_contribution(&self) -> Key {
        Key {
            type_data: self.type_data.clone(),
            qualifier: self.qualifier.clone(),
            contribution: None,
        }
    }

    /// Mangled identifier unique to this key, usable as a method name in
    /// generated code.
    pub fn identifier(&self) -> syn::Ident {
        quote::format_ident!("{}", self.identifier_string())
    }

    pub fn identifier_string(&self) -> String {
        let mut result = String::new();
        if let Some(ref qualifier) = self.qualifier {
            result.push_str(&format!("ᑕ{}ᑐ_", qualifier.identifier_string()));
        }
        result.push_str(&self.type_data.identifier_string());
        if let Some(ref contribution) = self.contribution {
            result.push_str(&format!(
                "_ᗕ{}ᗒ{}",
                contribution.module.identifier_string(),
                contribution.name
            ));
        }
        result
    }

    /// Human readable form.
    pub fn readable(&self) -> String {
        let mut prefix = String::new();
        if let Some(ref qualifier) = self.qualifier {
            prefix.push_str(&format!("#[qualified({})] ", qualifier.stable_string()));
        }
        format!("{}{}", prefix, self.type_data.readable())
    }
}

/// Builds keys from declaration sites.
pub struct KeyFactory;

impl KeyFactory {
    /// Key for a bound/provided type with its declared qualifiers. More than
    /// one qualifier at one site is malformed.
    pub fn for_declaration(
        type_data: &TypeData,
        qualifiers: &[AnnotationData],
        element: &str,
    ) -> Result<Key, Diagnostic> {
        if qualifiers.len() > 1 {
            return Err(Diagnostic::new(
                DiagnosticKind::TooManyQualifiers,
                element,
                &format!(
                    "{}: at most one qualifier allowed, found:\n\t{}",
                    element,
                    qualifiers
                        .iter()
                        .map(AnnotationData::stable_string)
                        .collect::<Vec<String>>()
                        .join("\n\t")
                ),
            ));
        }
        Ok(Key::qualified(type_data, qualifiers.first().cloned()))
    }

    /// Key, request kind and reference-ness for a dependency site. Framework
    /// wrappers are stripped: `Provider<T>` asks for `T` through a provider,
    /// and so on; `& T` asks to borrow `T`.
    pub fn for_dependency(
        dependency: &DependencyDecl,
        element: &str,
    ) -> Result<(Key, RequestKind, bool), Diagnostic> {
        let (inner, kind, reference) = Self::strip_request_wrapper(&dependency.type_data);
        let key = Self::for_declaration(&inner, &dependency.qualifiers, element)?;
        Ok((key, kind, reference))
    }

    fn strip_request_wrapper(type_data: &TypeData) -> (TypeData, RequestKind, bool) {
        let mut canonical = type_data.canonical();
        let reference = canonical.field_ref;
        canonical.field_ref = false;
        if canonical.root == TypeRoot::GLOBAL && canonical.args.len() == 1 {
            let kind = match canonical.path.as_str() {
                "stiletto::Provider" => Some(RequestKind::Provider),
                "stiletto::Lazy" => Some(RequestKind::Lazy),
                "stiletto::Producer" => Some(RequestKind::Producer),
                "stiletto::Produced" => Some(RequestKind::Produced),
                _ => None,
            };
            if let Some(kind) = kind {
                return (canonical.args[0].clone(), kind, reference);
            }
        }
        (canonical, RequestKind::Instance, reference)
    }
}

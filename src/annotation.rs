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

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::type_data::TypeData;

/// One member value of an annotation.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone, Hash)]
pub enum AnnotationValue {
    Bool(bool),
    Int(i64),
    Str(String),
    /// Path of an enum variant, e.g. `crate::Flavor::Vanilla`.
    EnumValue(TypeData),
    /// A type used as a value.
    Type(TypeData),
    Annotation(Box<AnnotationData>),
    Array(Vec<AnnotationValue>),
}

impl AnnotationValue {
    /// Deterministic text form, used for equality and for printing map keys
    /// in diagnostics.
    pub fn stable_string(&self) -> String {
        match self {
            AnnotationValue::Bool(v) => format!("{}", v),
            AnnotationValue::Int(v) => format!("{}", v),
            AnnotationValue::Str(v) => format!("{:?}", v),
            AnnotationValue::EnumValue(t) => t.canonical_string_path(),
            AnnotationValue::Type(t) => t.canonical_string_path(),
            AnnotationValue::Annotation(a) => a.stable_string(),
            AnnotationValue::Array(values) => format!(
                "[{}]",
                values
                    .iter()
                    .map(AnnotationValue::stable_string)
                    .collect::<Vec<String>>()
                    .join(",")
            ),
        }
    }
}

/// An annotation applied at a declaration site, parsed into explicit values.
///
/// Equality is value-based through [stable_string](AnnotationData::stable_string),
/// so nested annotations and arrays compare by content, and member order as
/// written does not matter.
#[derive(Debug, Serialize, Deserialize, Clone, Default, Eq)]
pub struct AnnotationData {
    pub type_data: TypeData,
    pub values: BTreeMap<String, AnnotationValue>,
}

impl PartialEq for AnnotationData {
    fn eq(&self, other: &Self) -> bool {
        self.stable_string().eq(&other.stable_string())
    }
}

impl Hash for AnnotationData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.stable_string().hash(state)
    }
}

impl AnnotationData {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn of(type_data: TypeData) -> Self {
        AnnotationData {
            type_data,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, name: &str, value: AnnotationValue) -> Self {
        self.values.insert(name.to_owned(), value);
        self
    }

    pub fn stable_string(&self) -> String {
        if self.values.is_empty() {
            return format!("@{}", self.type_data.canonical_string_path());
        }
        let members = self
            .values
            .iter()
            .map(|(name, value)| format!("{}={}", name, value.stable_string()))
            .collect::<Vec<String>>()
            .join(",");
        format!("@{}({})", self.type_data.canonical_string_path(), members)
    }

    /// Identifier-safe form, usable as part of a mangled method name.
    pub fn identifier_string(&self) -> String {
        self.stable_string()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect()
    }
}

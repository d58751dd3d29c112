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

use crate::annotation::AnnotationValue;
use crate::key::Key;
use crate::manifest::{BindingDecl, InjectableDecl};
use crate::type_data::TypeData;

/// How a dependency edge asks for its key.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone, Copy, Hash)]
pub enum RequestKind {
    Instance,
    Provider,
    Lazy,
    Producer,
    Produced,
}

impl RequestKind {
    /// An indirect request defers construction behind a callable, which is
    /// what makes a cycle satisfiable.
    pub fn is_indirect(&self) -> bool {
        matches!(
            self,
            RequestKind::Provider | RequestKind::Lazy | RequestKind::Producer
        )
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct DependencyRequest {
    pub key: Key,
    pub kind: RequestKind,
    /// The site spelled `& T`: it wants to borrow, which is how scoped
    /// bindings are consumed.
    pub reference: bool,
    /// The contribution is a collection whose elements all join the
    /// aggregate, instead of one element.
    pub flattened: bool,
}

impl DependencyRequest {
    pub fn new(key: Key, kind: RequestKind) -> Self {
        DependencyRequest {
            key,
            kind,
            reference: false,
            flattened: false,
        }
    }

    pub fn referenced(mut self, reference: bool) -> Self {
        self.reference = reference;
        self
    }
}

/// A concrete rule producing a value for a key.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub enum BindingKind {
    /// Synthesized from an injectable type's constructor.
    Injection { injectable: InjectableDecl },
    /// A module method constructing the value.
    Provides { module: TypeData, binding: BindingDecl },
    /// A module method producing a value that may fail; only reachable
    /// through `Producer`/`Produced` requests.
    Production { module: TypeData, binding: BindingDecl },
    /// A module method delegating the key to its single dependency.
    Delegate { module: TypeData, binding: BindingDecl },
    /// Aggregated `Vec<T>` assembled from contributions.
    MultiboundVec,
    /// Aggregated `HashMap<K, V>`; entries are in contribution order.
    MultiboundMap { entries: Vec<(AnnotationValue, Key)> },
    /// `Option<T>`, `Some` iff the underlying key is bound.
    Optional { underlying: Option<Key> },
    /// The component (or subcomponent) instance itself.
    ComponentBinding { component: TypeData },
    /// An instance handed to the creator for a declared component dependency.
    ComponentDependency { dependency: TypeData },
    /// One provision method on a component dependency.
    ComponentDependencyMethod { dependency: TypeData, method: String },
    /// A value handed directly to a creator setter.
    BoundInstance { creator: TypeData, method: String },
    /// Populates `#[inject]` fields of an existing instance.
    MembersInjector { injectable: InjectableDecl },
    /// Auto `Box<T>` from a bound `T`.
    Boxed,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct Binding {
    pub key: Key,
    pub kind: BindingKind,
    pub dependencies: Vec<DependencyRequest>,
    pub scope: Option<TypeData>,
    /// Component the binding resolved in.
    pub owner: TypeData,
    /// Readable path of the declaring element, for diagnostics.
    pub declaration: String,
}

impl Binding {
    pub fn new(key: Key, kind: BindingKind, owner: &TypeData, declaration: &str) -> Self {
        Binding {
            key,
            kind,
            dependencies: Vec::new(),
            scope: None,
            owner: owner.clone(),
            declaration: declaration.to_owned(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<DependencyRequest>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_scope(mut self, scope: Option<TypeData>) -> Self {
        self.scope = scope;
        self
    }

    /// Human readable name for a binding: declaration plus a parenthesized
    /// kind tag.
    pub fn describe(&self) -> String {
        match &self.kind {
            BindingKind::Injection { .. } => format!("{} (injectable)", self.declaration),
            BindingKind::Provides { .. } => format!("{} (module provides)", self.declaration),
            BindingKind::Production { .. } => format!("{} (module produces)", self.declaration),
            BindingKind::Delegate { .. } => format!("{} (module binds)", self.declaration),
            BindingKind::MultiboundVec | BindingKind::MultiboundMap { .. } => {
                format!("{} (multibinding)", self.key.readable())
            }
            BindingKind::Optional { .. } => format!("{} (optional binding)", self.key.readable()),
            BindingKind::ComponentBinding { .. } => format!("{} (component)", self.declaration),
            BindingKind::ComponentDependency { .. } => {
                format!("{} (component dependency)", self.declaration)
            }
            BindingKind::ComponentDependencyMethod { .. } => {
                format!("{} (component dependency method)", self.declaration)
            }
            BindingKind::BoundInstance { .. } => format!("{} (bound instance)", self.declaration),
            BindingKind::MembersInjector { .. } => {
                format!("{} (members injector)", self.key.readable())
            }
            BindingKind::Boxed => format!("{} (auto boxed)", self.key.readable()),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_data::TypeData;

    #[test]
    fn indirect_kinds_are_provider_lazy_producer() {
        assert!(RequestKind::Provider.is_indirect());
        assert!(RequestKind::Lazy.is_indirect());
        assert!(RequestKind::Producer.is_indirect());
        assert!(!RequestKind::Instance.is_indirect());
        assert!(!RequestKind::Produced.is_indirect());
    }

    #[test]
    fn describe_tags_kind() {
        let owner = TypeData::local("test", "MyComponent");
        let binding = Binding::new(
            Key::for_type(&TypeData::string()),
            BindingKind::Provides {
                module: TypeData::local("test", "M"),
                binding: BindingDecl::default(),
            },
            &owner,
            "::test::M.provide_string",
        );
        assert_eq!(
            binding.describe(),
            "::test::M.provide_string (module provides)"
        );
    }
}

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

use std::fmt;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What went wrong. One variant per class of failure the resolver, validator
/// or driver can report.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    #[error("missing binding")]
    MissingBinding,
    #[error("duplicated binding")]
    DuplicateBinding,
    #[error("duplicated map key")]
    DuplicateMapKey,
    #[error("dependency cycle")]
    DependencyCycle,
    #[error("scope mismatch")]
    ScopeMismatch,
    #[error("inaccessible type")]
    InaccessibleType,
    #[error("malformed multibinding declaration")]
    MalformedMultibinding,
    #[error("malformed creator")]
    MalformedCreator,
    #[error("conflicting entry points")]
    ConflictingEntryPoints,
    #[error("unresolvable type")]
    UnresolvableType,
    #[error("invalid request")]
    InvalidRequest,
    #[error("too many qualifiers")]
    TooManyQualifiers,
    #[error("invalid processor option")]
    InvalidOption,
    #[error("invalid manifest")]
    InvalidManifest,
}

/// A single compiler-style message, attached to the declaration it originated
/// from. Diagnostics are plain data; they never unwind past the driver.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Readable path of the originating declaration, e.g.
    /// `crate::StringModule.provide_string`.
    pub element: String,
    pub message: String,
    /// Request chain from an entry point down to the failing element, most
    /// recent request first.
    pub trace: Vec<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(kind: DiagnosticKind, element: &str, message: &str) -> Self {
        Diagnostic {
            kind,
            element: element.to_owned(),
            message: message.to_owned(),
            trace: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_trace(mut self, trace: &[String]) -> Self {
        self.trace = trace.to_vec();
        self
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for requester in &self.trace {
            write!(f, "\nrequested by: {}", requester)?;
        }
        Ok(())
    }
}

/// Accumulates diagnostics for one pass. Appending never fails and never
/// short-circuits; callers inspect the log when the pass completes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiagnosticLog {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, other: DiagnosticLog) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[must_use]
pub fn missing_binding(type_readable: &str, ancestors: &[String]) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::MissingBinding,
        ancestors.last().map(String::as_str).unwrap_or(""),
        &format!(
            "missing bindings for {}\nrequested by: {}",
            type_readable,
            ancestors.join("\nrequested by: ")
        ),
    )
    .with_trace(ancestors)
}

#[must_use]
pub fn duplicated_binding(path: &str, declarations: &[String]) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::DuplicateBinding,
        path,
        &format!(
            "found duplicated bindings for {}, provided by:\n\t{}",
            path,
            declarations.join("\n\t")
        ),
    )
}

/// Renders the request chain of a cycle, marking where the chain loops back
/// into itself.
///
/// ```text
/// *-- crate::Foo (injectable)
/// |   crate::Bar (module provides)
/// *-> crate::Foo (injectable)
/// ```
pub fn cycle_chain(ancestors: &[String], loop_start: usize) -> String {
    let mut s = String::new();
    for (i, ancestor) in ancestors.iter().enumerate() {
        if i == 0 {
            s.push_str(&format!("*-- {}\n", ancestor));
        } else if i < loop_start {
            s.push_str(&format!("|   {}\n", ancestor));
        } else if i == loop_start {
            s.push_str(&format!("*-> {}\n", ancestor));
        } else {
            s.push_str(&format!("    {}\n", ancestor));
        }
    }
    s
}

#[must_use]
pub fn dependency_cycle(ancestors: &[String], loop_start: usize) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::DependencyCycle,
        ancestors.get(loop_start).map(String::as_str).unwrap_or(""),
        &format!(
            "Cyclic dependency detected:\n{}",
            cycle_chain(ancestors, loop_start)
        ),
    )
    .with_trace(ancestors)
}

#[test]
fn cycle_chain_marks_loop_entry() {
    let ancestors = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];
    let chain = cycle_chain(&ancestors, 1);
    assert_eq!(chain, "*-- a\n*-> b\n    c\n");
}

#[test]
fn missing_binding_joins_requesters() {
    let d = missing_binding(
        "crate::Foo",
        &["crate::Bar.bar".to_owned(), "crate::MyComponent.foo".to_owned()],
    );
    assert_eq!(d.kind, DiagnosticKind::MissingBinding);
    assert!(d
        .message
        .contains("missing bindings for crate::Foo\nrequested by: crate::Bar.bar"));
}

#[test]
fn diagnostic_display_appends_trace() {
    let d = Diagnostic::new(DiagnosticKind::ScopeMismatch, "crate::Foo", "scope error")
        .with_trace(&["crate::Bar".to_owned()]);
    assert_eq!(d.to_string(), "scope error\nrequested by: crate::Bar");
}

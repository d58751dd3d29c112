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

//! Drives processing rounds over one compilation unit. The host hands in a
//! capability set — a [TypeResolver], a [Diagnostics] sink and a [CodeSink] —
//! and calls [Processor::process_round] once per round until nothing defers.
//! Each root component is handled independently: its failures never stop a
//! sibling from validating and generating.

use anyhow::Result;
use backtrace::Backtrace;
use std::collections::BTreeMap;

use crate::codegen::{generate_component, GeneratedUnit};
use crate::config::CompilerOptions;
use crate::error::{Diagnostic, DiagnosticKind, DiagnosticLog};
use crate::graph::{build_graph, GraphResult};
use crate::manifest::Manifest;
use crate::type_data::TypeData;
use crate::validate::validate_graph;

/// Whether a referenced type can be inspected this round.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Resolution {
    Resolved,
    /// The type may exist after other generators run; retry next round.
    NotYetResolvable,
    Missing,
}

pub trait TypeResolver {
    fn resolve(&self, type_data: &TypeData) -> Resolution;
}

/// Host with every type known up front; single-round processing.
pub struct AllResolved;

impl TypeResolver for AllResolved {
    fn resolve(&self, _type_data: &TypeData) -> Resolution {
        Resolution::Resolved
    }
}

pub trait Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl Diagnostics for DiagnosticLog {
    fn report(&mut self, diagnostic: Diagnostic) {
        DiagnosticLog::report(self, diagnostic);
    }
}

pub trait CodeSink {
    fn emit(&mut self, unit: GeneratedUnit) -> Result<()>;
}

/// Keeps generated units in memory; what tests and in-process hosts use.
#[derive(Default)]
pub struct MemorySink {
    pub units: Vec<GeneratedUnit>,
}

impl MemorySink {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn unit(&self, name: &str) -> Option<&GeneratedUnit> {
        self.units.iter().find(|unit| unit.name == name)
    }
}

impl CodeSink for MemorySink {
    fn emit(&mut self, unit: GeneratedUnit) -> Result<()> {
        self.units.push(unit);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RoundOutcome {
    /// Root components whose graphs referenced not-yet-resolvable types.
    pub deferred: Vec<TypeData>,
    /// Names of units emitted this round.
    pub generated: Vec<String>,
}

pub struct Processor {
    options: CompilerOptions,
}

impl Processor {
    pub fn new(options: CompilerOptions) -> Self {
        Processor { options }
    }

    /// Parses host options first; malformed ones are reported and fall back
    /// to defaults.
    pub fn from_option_map(
        options: &BTreeMap<String, String>,
        diagnostics: &mut dyn Diagnostics,
    ) -> Self {
        let mut log = DiagnosticLog::new();
        let parsed = CompilerOptions::from_option_map(options, &mut log);
        for diagnostic in log.into_vec() {
            diagnostics.report(diagnostic);
        }
        Processor::new(parsed)
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// One processing round. Diagnostics of a component that merely deferred
    /// are discarded along with its partial graph; the component resolves
    /// from scratch next round.
    pub fn process_round(
        &self,
        manifest: &Manifest,
        resolver: &dyn TypeResolver,
        diagnostics: &mut dyn Diagnostics,
        sink: &mut dyn CodeSink,
        last_round: bool,
    ) -> Result<RoundOutcome> {
        let mut outcome = RoundOutcome::default();
        for component in manifest.root_components() {
            let mut log = DiagnosticLog::new();
            let graph = match build_graph(manifest, component, resolver, &mut log) {
                GraphResult::Deferred {
                    component: deferred,
                    waiting_on,
                } => {
                    if last_round {
                        diagnostics.report(self.unresolvable(&deferred, &waiting_on));
                    } else {
                        outcome.deferred.push(deferred);
                    }
                    continue;
                }
                GraphResult::Built(graph) => graph,
            };

            let mut failed = !log.is_empty();
            for diagnostic in log.into_vec() {
                diagnostics.report(diagnostic);
            }
            let report = validate_graph(manifest, &graph);
            failed |= !report.is_clean();
            for diagnostic in report.diagnostics {
                diagnostics.report(diagnostic);
            }
            if failed {
                continue;
            }

            let unit = generate_component(manifest, &graph, &self.options);
            log!("generated {} for {}", unit.name, component.type_data.readable());
            outcome.generated.push(unit.name.clone());
            sink.emit(unit)?;
        }
        Ok(outcome)
    }

    /// Drives rounds to a fixpoint for hosts that have no own round loop:
    /// keeps going while deferral makes progress, then runs the final round.
    pub fn process(
        &self,
        manifest: &Manifest,
        resolver: &dyn TypeResolver,
        diagnostics: &mut dyn Diagnostics,
        sink: &mut dyn CodeSink,
    ) -> Result<RoundOutcome> {
        let mut previous_deferred = usize::MAX;
        loop {
            let outcome = self.process_round(manifest, resolver, diagnostics, sink, false)?;
            if outcome.deferred.is_empty() {
                return Ok(outcome);
            }
            if outcome.deferred.len() >= previous_deferred {
                return self.process_round(manifest, resolver, diagnostics, sink, true);
            }
            previous_deferred = outcome.deferred.len();
        }
    }

    fn unresolvable(&self, component: &TypeData, waiting_on: &TypeData) -> Diagnostic {
        let mut message = format!(
            "{} is still unresolvable at the final processing round, required by {}",
            waiting_on.readable(),
            component.readable()
        );
        if self.options.include_stacktrace_with_deferred_errors {
            message.push_str(&format!("\n{:#?}", Backtrace::new()));
        }
        Diagnostic::new(
            DiagnosticKind::UnresolvableType,
            &component.canonical_string_path(),
            &message,
        )
    }
}

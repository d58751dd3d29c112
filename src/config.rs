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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Diagnostic, DiagnosticKind, DiagnosticLog};

pub const OPTION_FAST_INIT: &str = "stiletto.fastInit";
pub const OPTION_KEYS_PER_COMPONENT_SHARD: &str = "stiletto.keysPerComponentShard";
pub const OPTION_GENERATED_TYPE_VISIBLE: &str = "stiletto.generatedTypeVisible";
pub const OPTION_INCLUDE_STACKTRACE: &str = "stiletto.includeStacktraceWithDeferredErrors";

/// Processor configuration, parsed once from the host's option map and then
/// threaded unchanged through the builder, validator and generator.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct CompilerOptions {
    /// Route provider-backed bindings through a switching provider instead of
    /// one closure per binding.
    pub fast_init: bool,
    /// Upper bound on bindings cached in one generated struct before a new
    /// shard is started.
    pub keys_per_component_shard: usize,
    /// Make the generated impl struct `pub` so callers can name the concrete
    /// type instead of only the component trait object.
    pub generated_type_visible: bool,
    /// Attach a captured backtrace to unresolvable-type errors reported at
    /// the final round.
    pub include_stacktrace_with_deferred_errors: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            fast_init: false,
            keys_per_component_shard: 3500,
            generated_type_visible: false,
            include_stacktrace_with_deferred_errors: false,
        }
    }
}

impl CompilerOptions {
    /// Parses the host option map. Malformed values and unknown `stiletto.`
    /// keys are reported, and the affected option keeps its default; other
    /// hosts' options pass through silently.
    pub fn from_option_map(
        options: &BTreeMap<String, String>,
        log: &mut DiagnosticLog,
    ) -> CompilerOptions {
        let mut result = CompilerOptions::default();
        for (key, value) in options {
            match key.as_str() {
                OPTION_FAST_INIT => {
                    parse_switch(key, value, &mut result.fast_init, log);
                }
                OPTION_GENERATED_TYPE_VISIBLE => {
                    parse_switch(key, value, &mut result.generated_type_visible, log);
                }
                OPTION_INCLUDE_STACKTRACE => {
                    parse_switch(
                        key,
                        value,
                        &mut result.include_stacktrace_with_deferred_errors,
                        log,
                    );
                }
                OPTION_KEYS_PER_COMPONENT_SHARD => match value.parse::<usize>() {
                    Ok(n) if n > 0 => result.keys_per_component_shard = n,
                    _ => log.report(Diagnostic::new(
                        DiagnosticKind::InvalidOption,
                        key,
                        &format!("{}: positive integer expected, got {:?}", key, value),
                    )),
                },
                other => {
                    if other.starts_with("stiletto.") {
                        log.report(Diagnostic::new(
                            DiagnosticKind::InvalidOption,
                            key,
                            &format!("unknown option {}", key),
                        ));
                    }
                }
            }
        }
        result
    }
}

fn parse_switch(key: &str, value: &str, target: &mut bool, log: &mut DiagnosticLog) {
    match value {
        "enabled" => *target = true,
        "disabled" => *target = false,
        other => log.report(Diagnostic::new(
            DiagnosticKind::InvalidOption,
            key,
            &format!("{}: 'enabled' or 'disabled' expected, got {:?}", key, other),
        )),
    }
}

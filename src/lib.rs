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

//! Compile-time dependency-injection graph resolver and code generator.
//!
//! A host (a build script, a compiler plugin shim, or a test) describes one
//! compilation unit as a [Manifest](manifest::Manifest): its components,
//! modules, injectable types and their visibility. A [Processor](processor::Processor)
//! resolves each root component's entry points into a
//! [BindingGraph](graph::BindingGraph), validates it, and emits one generated
//! Rust source unit per component through the host's
//! [CodeSink](processor::CodeSink). Failures surface as
//! [Diagnostic](error::Diagnostic) values attached to the declaration that
//! caused them, never as panics.
//!
//! The crate also carries the small runtime surface generated code leans on:
//! [Provider], [Lazy], [Once], [Producer], [Produced] and [MembersInjector].

#[macro_use]
pub mod log;

pub mod accessibility;
pub mod annotation;
pub mod binding;
pub mod codegen;
pub mod config;
pub mod error;
pub mod graph;
pub mod key;
pub mod manifest;
pub mod processor;
pub mod type_data;
pub mod validate;

mod runtime;

pub use runtime::{
    Lazy, MembersInjector, Once, Produced, Producer, ProductionError, Provider,
};

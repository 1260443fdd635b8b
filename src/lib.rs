// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]
// - 'file/backend.rs' uses mmap to map a file into memory

//! # dotprobe
//!
//! Side-effect-free inspection of .NET assemblies. `dotprobe` reads a managed module's
//! identity and build metadata straight from its PE/ECMA-335 structures, never executing
//! or loading it into a runtime, and resolves every assembly it references against what
//! is actually installed next to it or in a shared assembly cache.
//!
//! The question it answers: *what is this binary, what does it claim to need, is what it
//! needs actually present, and if present, is it a different version than requested?*
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! let result = dotprobe::probe("bin/Release/MyApp.exe");
//!
//! println!("{}: {}", result.file_name().unwrap_or("?"), result.error_level());
//! if let Some(name) = result.display_name() {
//!     println!("  {name}");
//! }
//!
//! for dependency in result.dependencies() {
//!     let mark = if dependency.satisfied() { " " } else { "?" };
//!     println!("  {mark} {}", dependency.requested_name());
//!     if dependency.redirected() {
//!         println!("      -> {}", dependency.resolved_difference().unwrap_or_default());
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - PE container access (memory-mapped or in-memory) and the Win32 version resource
//! - [`metadata`] - the CLI header, metadata root, heaps and the handful of tables needed
//!   to recover assembly identity, references and assembly-level attributes
//! - [`probe`] - the probing engine: [`probe::ModuleProber`], its compute-once cache,
//!   isolation contexts, the dependency resolver and the identity diff
//!
//! Failures never escape a probe. Every [`probe::ProbeResult`] carries an
//! [`probe::ErrorLevel`]; the [`Error`] type is what the lower layers and the pluggable
//! collaborators ([`probe::IdentityParser`], [`probe::PropertiesReader`]) report.
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger itself.

#[macro_use]
pub(crate) mod error;

pub mod file;
pub mod metadata;
pub mod prelude;
pub mod probe;

#[cfg(test)]
pub(crate) mod test;

pub use error::Error;

/// `dotprobe` Result type
pub type Result<T> = std::result::Result<T, Error>;

use std::sync::Arc;

/// Probes the module at `path` through the process-wide [`probe::ModuleProber::global`].
pub fn probe(path: impl AsRef<str>) -> Arc<probe::ProbeResult> {
    probe::ModuleProber::global().probe(path.as_ref())
}

/// Resolves and probes the module named by a display-name `identity` through the
/// process-wide [`probe::ModuleProber::global`].
pub fn probe_identity(identity: impl AsRef<str>) -> Arc<probe::ProbeResult> {
    probe::ModuleProber::global().probe_identity(identity.as_ref())
}

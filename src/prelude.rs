//! # dotprobe Prelude
//!
//! The types most callers need, in one import.
//!
//! ```rust,no_run
//! use dotprobe::prelude::*;
//!
//! let prober = ModuleProber::new(ProberConfig::system());
//! let result = prober.probe("MyApp.exe");
//! if result.error_level() == ErrorLevel::Success {
//!     for dependency in result.dependencies() {
//!         println!("{}", dependency.requested_name());
//!     }
//! }
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotprobe operations
pub use crate::Error;

/// The result type used throughout dotprobe
pub use crate::Result;

// ================================================================================================
// Probing
// ================================================================================================

/// The probing engine and its results
pub use crate::probe::{
    AssemblyDependency, ErrorLevel, ModuleIdentity, ModuleProber, ModuleProberBuilder,
    ProbeResult,
};

/// Configuration
pub use crate::probe::{CacheLayout, IsolationMode, ProberConfig, SharedCacheRoot};

/// Collaborator traits and their defaults
pub use crate::probe::{
    FallbackPolicy, FileProperties, IdentityParser, ParserFactory, PropertiesReader,
    SimpleNameFallback,
};

/// The identity diff
pub use crate::probe::identity_difference;

// ================================================================================================
// Metadata
// ================================================================================================

/// Low-level file access
pub use crate::file::{File, VersionInfo};

/// Metadata view and identity types
pub use crate::metadata::{
    identity::{AssemblyName, AssemblyVersion, ProcessorArchitecture, PublicKeyToken},
    AssemblyView,
};

//! The probing engine.
//!
//! [`ModuleProber`] is the entry point. Given a path or an assembly display name it runs one
//! probe inside an isolation context, reads the module's identity through an
//! [`IdentityParser`], resolves every declared reference with a [`DependencyResolver`] and
//! caches the resulting [`ProbeResult`] for the rest of its lifetime.
//!
//! # Outcomes
//!
//! A probe never fails. Its [`ErrorLevel`] says how far it got:
//!
//! - [`ErrorLevel::Success`] - metadata was read, dependencies resolved
//! - [`ErrorLevel::ReflectionError`] - the file exists but is not a readable managed module
//! - [`ErrorLevel::FileNotFound`] - nothing at the path, or no module for the identity
//! - [`ErrorLevel::ArgumentError`] - missing, blank or malformed input
//!
//! # Dependency resolution
//!
//! References are resolved strictly first: a candidate must match every attribute the
//! reference specifies. After a version mismatch the [`FallbackPolicy`] may propose a
//! same-named module next to the dependent one, which is then accepted at whatever version it
//! has. Such a dependency is reported as satisfied and redirected, with
//! [`identity_difference`] naming what changed.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotprobe::probe::{ErrorLevel, ModuleProber, ProberConfig};
//!
//! let prober = ModuleProber::new(ProberConfig::system());
//! let result = prober.probe_identity("System.Xml, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089");
//!
//! match result.error_level() {
//!     ErrorLevel::Success => println!("found at {}", result.location().unwrap().display()),
//!     level => println!("{level}: {}", result.error().unwrap_or_default()),
//! }
//! ```

mod cache;
mod config;
mod dependency;
mod diff;
mod isolation;
mod locator;
mod module;
mod parser;
mod prober;
mod properties;
mod resolver;
mod result;

pub use cache::{CacheKey, ProbeCache};
pub use config::{
    IsolationMode, ProberConfig, ENV_FALLBACK_EXTENSION, ENV_SEARCH_PATH, ENV_SHARED_CACHE,
};
pub use dependency::AssemblyDependency;
pub use diff::identity_difference;
pub use isolation::{
    serve_worker, InProcessIsolation, Isolation, ProbeServices, WorkerIsolation, WorkerRequest,
};
pub use locator::{system_shared_caches, CacheLayout, Candidate, ModuleLocator, SharedCacheRoot};
pub use module::ModuleIdentity;
pub use parser::{IdentityParser, MetadataParser, MetadataParserFactory, ParserFactory};
pub use prober::{ModuleProber, ModuleProberBuilder};
pub use properties::{FileProperties, PropertiesReader, ResourceVersionReader};
pub use resolver::{
    DependencyResolver, FallbackPolicy, Resolved, SimpleNameFallback, DEFAULT_FALLBACK_EXTENSION,
};
pub use result::{ErrorLevel, ProbeRequest, ProbeResult};

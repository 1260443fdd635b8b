//! Resolution of declared dependencies to concrete modules.
//!
//! Resolution is strict first: the [`IdentityParser`] must find a module matching every
//! attribute the reference specifies. Only when that fails because of a version mismatch is
//! the [`FallbackPolicy`] asked for a relaxed candidate, which is accepted whatever its
//! version.

use std::path::{Path, PathBuf};

use crate::{
    probe::{locator::entry_ignore_case, AssemblyDependency, IdentityParser, ModuleIdentity},
    Error, Result,
};

/// Extension probed by [`SimpleNameFallback`] unless configured otherwise.
pub const DEFAULT_FALLBACK_EXTENSION: &str = "dll";

/// Proposes a relaxed candidate after a strict lookup failed with a version mismatch.
pub trait FallbackPolicy: Send + Sync {
    /// Path of the module to accept instead of `requested`, or `None` for no retry.
    fn candidate(&self, requested: &str, base_dir: Option<&Path>) -> Option<PathBuf>;
}

/// Retries with `<simple-name>.<extension>` next to the resolving module.
///
/// References without a `,` carry no version to relax and are never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleNameFallback {
    extension: String,
}

impl SimpleNameFallback {
    /// A fallback probing files with `extension` (without the dot).
    pub fn new(extension: impl Into<String>) -> Self {
        SimpleNameFallback {
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    /// The extension probed.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }
}

impl Default for SimpleNameFallback {
    fn default() -> Self {
        SimpleNameFallback::new(DEFAULT_FALLBACK_EXTENSION)
    }
}

impl FallbackPolicy for SimpleNameFallback {
    fn candidate(&self, requested: &str, base_dir: Option<&Path>) -> Option<PathBuf> {
        let (simple_name, _) = requested.split_once(',')?;
        let simple_name = simple_name.trim();
        if simple_name.is_empty() {
            return None;
        }

        let file_name = format!("{simple_name}.{}", self.extension);
        let dir = match base_dir {
            Some(dir) => dir.to_path_buf(),
            None => match std::env::current_dir() {
                Ok(dir) => dir,
                Err(_) => return Some(PathBuf::from(file_name)),
            },
        };
        Some(entry_ignore_case(&dir, &file_name, false).unwrap_or_else(|| dir.join(file_name)))
    }
}

/// A module found for an identity.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// The module's identity
    pub module: ModuleIdentity,
    /// True if found through the fallback policy
    pub relaxed: bool,
}

/// Resolves identity strings within one isolation context.
pub struct DependencyResolver<'a> {
    parser: &'a dyn IdentityParser,
    fallback: &'a dyn FallbackPolicy,
    base_dir: Option<&'a Path>,
}

impl<'a> DependencyResolver<'a> {
    /// A resolver reading through `parser`, relaxing through `fallback`, relative to
    /// `base_dir`.
    pub fn new(
        parser: &'a dyn IdentityParser,
        fallback: &'a dyn FallbackPolicy,
        base_dir: Option<&'a Path>,
    ) -> Self {
        DependencyResolver {
            parser,
            fallback,
            base_dir,
        }
    }

    /// Finds the module for `identity`, retrying once through the fallback policy after a
    /// version mismatch.
    ///
    /// # Errors
    /// The strict lookup's error when no retry applies, otherwise the relaxed lookup's.
    pub fn resolve_module(&self, identity: &str) -> Result<Resolved> {
        match self.parser.parse_identity(identity) {
            Ok(module) => Ok(Resolved {
                module,
                relaxed: false,
            }),
            Err(error @ Error::VersionMismatch { .. }) => {
                let Some(path) = self.fallback.candidate(identity, self.base_dir) else {
                    return Err(error);
                };

                log::debug!(
                    "'{identity}' not found as requested ({error}), retrying with {}",
                    path.display()
                );
                let module = self.parser.parse_path(&path)?;
                Ok(Resolved {
                    module,
                    relaxed: true,
                })
            }
            Err(error) => Err(error),
        }
    }

    /// Resolves one raw reference into a dependency record. Never fails: an unresolvable
    /// reference is recorded as unsatisfied.
    #[must_use]
    pub fn resolve(&self, requested: &str) -> AssemblyDependency {
        match self.resolve_module(requested) {
            Ok(resolved) => AssemblyDependency::resolved(
                requested,
                &resolved.module.display_name,
                &resolved.module.location,
                resolved.relaxed,
            ),
            Err(error) => {
                log::debug!("'{requested}' is unsatisfied: {error}");
                AssemblyDependency::unresolved(requested, error.to_string())
            }
        }
    }
}

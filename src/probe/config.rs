use std::{env, ffi::OsStr, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::probe::{
    locator::{system_shared_caches, CacheLayout, ModuleLocator, SharedCacheRoot},
    resolver::DEFAULT_FALLBACK_EXTENSION,
};

/// Additional probing directories, as a platform path list.
pub const ENV_SEARCH_PATH: &str = "DOTPROBE_SEARCH_PATH";
/// Additional shared caches with per-name layout, as a platform path list.
pub const ENV_SHARED_CACHE: &str = "DOTPROBE_SHARED_CACHE";
/// Extension probed by the version-relaxation retry.
pub const ENV_FALLBACK_EXTENSION: &str = "DOTPROBE_FALLBACK_EXTENSION";

/// Where probes run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IsolationMode {
    /// In a scoped context inside the calling process
    #[default]
    InProcess,
    /// In a worker process per probe, started as `<program> worker`
    Worker(PathBuf),
}

/// Configuration of a [`crate::probe::ModuleProber`].
///
/// ```rust,no_run
/// use dotprobe::probe::{CacheLayout, ProberConfig, SharedCacheRoot};
///
/// let config = ProberConfig::new()
///     .with_search_path("/opt/app/lib")
///     .with_shared_cache(SharedCacheRoot::new("/usr/lib/mono/gac", CacheLayout::PerName))
///     .fallback_extension("exe");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProberConfig {
    locator: ModuleLocator,
    base_dir: Option<PathBuf>,
    fallback_extension: String,
    isolation: IsolationMode,
}

impl ProberConfig {
    /// An empty configuration: no shared caches, no search paths, in-process isolation.
    #[must_use]
    pub fn new() -> Self {
        ProberConfig {
            locator: ModuleLocator::new(),
            base_dir: None,
            fallback_extension: DEFAULT_FALLBACK_EXTENSION.to_string(),
            isolation: IsolationMode::InProcess,
        }
    }

    /// The platform's shared caches plus the `DOTPROBE_*` environment overrides.
    #[must_use]
    pub fn system() -> Self {
        let mut config = ProberConfig::new();
        for cache in system_shared_caches() {
            config = config.with_shared_cache(cache);
        }
        config.with_env()
    }

    /// Applies `DOTPROBE_SEARCH_PATH`, `DOTPROBE_SHARED_CACHE` and
    /// `DOTPROBE_FALLBACK_EXTENSION`.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        for path in path_list(env::var_os(ENV_SEARCH_PATH).as_deref()) {
            self = self.with_search_path(path);
        }
        for path in path_list(env::var_os(ENV_SHARED_CACHE).as_deref()) {
            self = self.with_shared_cache(SharedCacheRoot::new(path, CacheLayout::PerName));
        }
        if let Ok(extension) = env::var(ENV_FALLBACK_EXTENSION) {
            if !extension.trim().is_empty() {
                self = self.fallback_extension(extension.trim());
            }
        }
        self
    }

    pub(crate) fn with_locator(mut self, locator: ModuleLocator) -> Self {
        self.locator = locator;
        self
    }

    /// Adds a probing directory, searched after the resolving module's directory.
    #[must_use]
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.locator = self.locator.with_search_path(path);
        self
    }

    /// Adds a shared cache root.
    #[must_use]
    pub fn with_shared_cache(mut self, cache: SharedCacheRoot) -> Self {
        self.locator = self.locator.with_shared_cache(cache);
        self
    }

    /// Drops every configured shared cache.
    #[must_use]
    pub fn without_shared_caches(mut self) -> Self {
        self.locator = self.locator.without_shared_caches();
        self
    }

    /// Directory by-identity probes resolve relative to; the current directory if unset.
    #[must_use]
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Extension of the file probed by the version-relaxation retry.
    #[must_use]
    pub fn fallback_extension(mut self, extension: impl Into<String>) -> Self {
        self.fallback_extension = extension.into();
        self
    }

    /// Where probes run.
    #[must_use]
    pub fn isolation(mut self, mode: IsolationMode) -> Self {
        self.isolation = mode;
        self
    }

    /// The candidate locator.
    #[must_use]
    pub fn locator(&self) -> &ModuleLocator {
        &self.locator
    }

    /// The configured base directory for by-identity probes.
    #[must_use]
    pub fn identity_base_dir(&self) -> Option<&std::path::Path> {
        self.base_dir.as_deref()
    }

    /// The version-relaxation extension.
    #[must_use]
    pub fn relaxation_extension(&self) -> &str {
        &self.fallback_extension
    }

    /// The isolation mode.
    #[must_use]
    pub fn isolation_mode(&self) -> &IsolationMode {
        &self.isolation
    }
}

impl Default for ProberConfig {
    fn default() -> Self {
        ProberConfig::system()
    }
}

fn path_list(value: Option<&OsStr>) -> Vec<PathBuf> {
    value
        .map(|value| {
            env::split_paths(value)
                .filter(|path| !path.as_os_str().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

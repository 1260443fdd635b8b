//! Compute-once cache of probe results.
//!
//! Each key owns a [`OnceLock`] cell. The map's shard lock is only held while fetching the
//! cell, so callers probing unrelated keys never wait on each other, while callers racing on
//! one key block on that key's cell until the single computation finishes.

use std::{
    path::Path,
    sync::{Arc, OnceLock},
};

use dashmap::DashMap;

use crate::probe::ProbeResult;

/// Normalized identity of a probe request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    name: String,
    is_assembly_identity: bool,
}

impl CacheKey {
    /// Normalizes `name`: trimmed; made absolute against the current directory for path
    /// requests (lexically, without touching the file); missing input becomes empty.
    #[must_use]
    pub fn new(name: Option<&str>, is_assembly_identity: bool) -> Self {
        let trimmed = name.map(str::trim).unwrap_or_default();

        let name = if trimmed.is_empty() || is_assembly_identity {
            trimmed.to_string()
        } else {
            std::path::absolute(Path::new(trimmed))
                .map_or_else(|_| trimmed.to_string(), |path| path.to_string_lossy().into_owned())
        };

        CacheKey {
            name,
            is_assembly_identity,
        }
    }

    /// The normalized input.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for identity requests.
    #[must_use]
    pub fn is_assembly_identity(&self) -> bool {
        self.is_assembly_identity
    }
}

/// Read-through cache: at most one computation per key, results kept forever.
#[derive(Default)]
pub struct ProbeCache {
    entries: DashMap<CacheKey, Arc<OnceLock<Arc<ProbeResult>>>>,
}

impl ProbeCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached result for `key`, computing it with `probe` if this is the first request.
    pub fn get_or_probe<F>(&self, key: CacheKey, probe: F) -> Arc<ProbeResult>
    where
        F: FnOnce(&CacheKey) -> Arc<ProbeResult>,
    {
        let cell = Arc::clone(self.entries.entry(key.clone()).or_default().value());

        Arc::clone(cell.get_or_init(|| {
            log::debug!("cache miss for '{}'", key.name);
            probe(&key)
        }))
    }

    /// The cached result for `key`, if already computed.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Arc<ProbeResult>> {
        self.entries
            .get(key)
            .and_then(|cell| cell.value().get().cloned())
    }

    /// Number of keys seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was probed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

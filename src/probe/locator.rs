//! Candidate enumeration for strict identity resolution.
//!
//! Candidates come from shared assembly caches first, then from probing directories (the
//! resolving module's directory, then configured search paths). Only existing files are
//! returned; whether a candidate actually matches is decided by the parser that reads it.

use std::{
    cmp::Ordering,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Directory layout of a shared assembly cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheLayout {
    /// `<root>/<name>/<any>/<name>.dll`, as in the Windows GAC and the Mono gac
    PerName,
    /// `<root>/<version>/<name>.dll`, as in .NET shared frameworks; newest version first
    PerVersion,
}

/// One shared assembly cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SharedCacheRoot {
    /// Root directory
    pub path: PathBuf,
    /// How modules are laid out below `path`
    pub layout: CacheLayout,
}

impl SharedCacheRoot {
    /// A cache at `path` with the given layout.
    pub fn new(path: impl Into<PathBuf>, layout: CacheLayout) -> Self {
        SharedCacheRoot {
            path: path.into(),
            layout,
        }
    }
}

/// A file that may hold the requested module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Path of the file
    pub path: PathBuf,
    /// True if found in a shared cache
    pub shared: bool,
}

/// Where to look for modules by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleLocator {
    shared_caches: Vec<SharedCacheRoot>,
    search_paths: Vec<PathBuf>,
}

const EXTENSIONS: [&str; 2] = ["dll", "exe"];

impl ModuleLocator {
    /// A locator without caches or search paths; only the base directory is probed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a shared cache, searched before any directory.
    #[must_use]
    pub fn with_shared_cache(mut self, cache: SharedCacheRoot) -> Self {
        self.shared_caches.push(cache);
        self
    }

    /// Adds a probing directory, searched after the base directory.
    #[must_use]
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Removes all shared caches.
    #[must_use]
    pub fn without_shared_caches(mut self) -> Self {
        self.shared_caches.clear();
        self
    }

    /// The configured shared caches, in search order.
    #[must_use]
    pub fn shared_caches(&self) -> &[SharedCacheRoot] {
        &self.shared_caches
    }

    /// The configured search paths, in search order.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// True if `path` lies below one of the shared cache roots.
    #[must_use]
    pub fn is_shared(&self, path: &Path) -> bool {
        self.shared_caches
            .iter()
            .any(|cache| path.starts_with(&cache.path))
    }

    /// All existing files that may hold module `name`, in search order.
    #[must_use]
    pub fn candidates(&self, name: &str, base_dir: Option<&Path>) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return candidates;
        }

        for cache in &self.shared_caches {
            let found = match cache.layout {
                CacheLayout::PerName => entry_ignore_case(&cache.path, name, true)
                    .map(|dir| versioned(&dir, name))
                    .unwrap_or_default(),
                CacheLayout::PerVersion => versioned(&cache.path, name),
            };
            candidates.extend(found.into_iter().map(|path| Candidate { path, shared: true }));
        }

        let probing_dirs = base_dir
            .into_iter()
            .chain(self.search_paths.iter().map(PathBuf::as_path));
        for dir in probing_dirs {
            log::trace!("probing {} for '{name}'", dir.display());
            let nested_dir = entry_ignore_case(dir, name, true);
            let direct = EXTENSIONS
                .iter()
                .filter_map(|extension| entry_ignore_case(dir, &format!("{name}.{extension}"), false));
            let nested = EXTENSIONS.iter().filter_map(|extension| {
                let nested_dir = nested_dir.as_deref()?;
                entry_ignore_case(nested_dir, &format!("{name}.{extension}"), false)
            });

            for path in direct.chain(nested) {
                if !candidates.iter().any(|c: &Candidate| c.path == path) {
                    candidates.push(Candidate {
                        path,
                        shared: false,
                    });
                }
            }
        }

        candidates
    }
}

/// The entry of `dir` called `name`, compared ASCII case-insensitively as assembly names
/// are. An exact match wins; otherwise the first match in name order.
pub(crate) fn entry_ignore_case(dir: &Path, name: &str, is_dir: bool) -> Option<PathBuf> {
    let wanted = |path: &Path| if is_dir { path.is_dir() } else { path.is_file() };

    let exact = dir.join(name);
    if wanted(exact.as_path()) {
        return Some(exact);
    }

    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|entry_name| entry_name.eq_ignore_ascii_case(name))
        })
        .map(|entry| entry.path())
        .filter(|path| wanted(path.as_path()))
        .collect();
    found.sort();
    found.into_iter().next()
}

fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_dir())
        .collect()
}

/// `<dir>/<any>/<name>.dll`, highest version directory first.
fn versioned(dir: &Path, name: &str) -> Vec<PathBuf> {
    let mut versions = subdirectories(dir);
    versions.sort_by(|a, b| compare_versions(b, a));

    versions
        .into_iter()
        .inspect(|version| log::trace!("probing {} for '{name}'", version.display()))
        .filter_map(|version| entry_ignore_case(&version, &format!("{name}.dll"), false))
        .collect()
}

/// Orders directories named like versions (`8.0.1`, `v4.0_4.0.0.0__b77a5c561934e089`)
/// numerically, falling back to the name.
fn compare_versions(a: &Path, b: &Path) -> Ordering {
    let key = |path: &Path| -> Vec<u64> {
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .split(|c: char| !c.is_ascii_digit())
            .filter(|part| !part.is_empty())
            .map(|part| part.parse().unwrap_or(u64::MAX))
            .collect()
    };

    key(a).cmp(&key(b)).then_with(|| a.cmp(b))
}

/// The well-known shared caches of the current platform that exist on this machine.
#[must_use]
pub fn system_shared_caches() -> Vec<SharedCacheRoot> {
    let mut caches = Vec::new();

    if cfg!(windows) {
        let windir = std::env::var_os("WINDIR")
            .map_or_else(|| PathBuf::from(r"C:\Windows"), PathBuf::from);
        for gac in ["GAC_MSIL", "GAC_64", "GAC_32"] {
            caches.push(SharedCacheRoot::new(
                windir.join("Microsoft.NET").join("assembly").join(gac),
                CacheLayout::PerName,
            ));
        }
        for gac in ["GAC_MSIL", "GAC_64", "GAC_32", "GAC"] {
            caches.push(SharedCacheRoot::new(
                windir.join("assembly").join(gac),
                CacheLayout::PerName,
            ));
        }
    } else {
        for gac in [
            "/usr/lib/mono/gac",
            "/usr/local/lib/mono/gac",
            "/Library/Frameworks/Mono.framework/Versions/Current/lib/mono/gac",
        ] {
            caches.push(SharedCacheRoot::new(gac, CacheLayout::PerName));
        }
    }

    let mut dotnet_roots: Vec<PathBuf> = std::env::var_os("DOTNET_ROOT")
        .map(PathBuf::from)
        .into_iter()
        .collect();
    if cfg!(windows) {
        let program_files = std::env::var_os("ProgramFiles")
            .map_or_else(|| PathBuf::from(r"C:\Program Files"), PathBuf::from);
        dotnet_roots.push(program_files.join("dotnet"));
    } else {
        dotnet_roots.extend(
            ["/usr/share/dotnet", "/usr/lib/dotnet", "/usr/local/share/dotnet"]
                .into_iter()
                .map(PathBuf::from),
        );
    }

    for root in dotnet_roots {
        caches.push(SharedCacheRoot::new(
            root.join("shared").join("Microsoft.NETCore.App"),
            CacheLayout::PerVersion,
        ));
    }

    caches.retain(|cache| cache.path.is_dir());
    caches.dedup();
    caches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn probing_directories() {
        let base = tempfile::tempdir().unwrap();
        let extra = tempfile::tempdir().unwrap();
        touch(&base.path().join("Dep.exe"));
        touch(&base.path().join("Dep").join("Dep.dll"));
        touch(&extra.path().join("Dep.dll"));

        let locator = ModuleLocator::new().with_search_path(extra.path());
        let paths: Vec<PathBuf> = locator
            .candidates("Dep", Some(base.path()))
            .into_iter()
            .map(|candidate| candidate.path)
            .collect();

        assert_eq!(
            paths,
            vec![
                base.path().join("Dep.exe"),
                base.path().join("Dep").join("Dep.dll"),
                extra.path().join("Dep.dll"),
            ]
        );
    }

    #[test]
    fn shared_caches_first() {
        let base = tempfile::tempdir().unwrap();
        let gac = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        touch(&base.path().join("Dep.dll"));
        touch(&gac.path().join("Dep").join("1.0.0.0__null").join("Dep.dll"));
        touch(&shared.path().join("6.0.25").join("Dep.dll"));
        touch(&shared.path().join("8.0.1").join("Dep.dll"));
        touch(&shared.path().join("10.0.0").join("Other.dll"));

        let locator = ModuleLocator::new()
            .with_shared_cache(SharedCacheRoot::new(gac.path(), CacheLayout::PerName))
            .with_shared_cache(SharedCacheRoot::new(shared.path(), CacheLayout::PerVersion));
        let candidates = locator.candidates("Dep", Some(base.path()));

        assert_eq!(candidates.len(), 4);
        assert_eq!(
            candidates[0].path,
            gac.path().join("Dep").join("1.0.0.0__null").join("Dep.dll")
        );
        assert_eq!(candidates[1].path, shared.path().join("8.0.1").join("Dep.dll"));
        assert_eq!(candidates[2].path, shared.path().join("6.0.25").join("Dep.dll"));
        assert!(candidates[..3].iter().all(|candidate| candidate.shared));
        assert!(!candidates[3].shared);

        assert!(locator.is_shared(&candidates[1].path));
        assert!(!locator.is_shared(&candidates[3].path));
    }

    #[test]
    fn names_ignore_case() {
        let base = tempfile::tempdir().unwrap();
        let gac = tempfile::tempdir().unwrap();
        touch(&base.path().join("Dep.dll"));
        touch(&base.path().join("DEP").join("dep.EXE"));
        touch(&gac.path().join("Dep").join("1.0.0.0__null").join("Dep.dll"));

        let locator = ModuleLocator::new()
            .with_shared_cache(SharedCacheRoot::new(gac.path(), CacheLayout::PerName));
        let paths: Vec<PathBuf> = locator
            .candidates("dep", Some(base.path()))
            .into_iter()
            .map(|candidate| candidate.path)
            .collect();

        assert_eq!(
            paths,
            vec![
                gac.path().join("Dep").join("1.0.0.0__null").join("Dep.dll"),
                base.path().join("Dep.dll"),
                base.path().join("DEP").join("dep.EXE"),
            ]
        );
    }

    #[test]
    fn exact_entry_preferred() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("Dep.dll"));

        assert_eq!(
            entry_ignore_case(dir.path(), "Dep.dll", false),
            Some(dir.path().join("Dep.dll"))
        );
        assert_eq!(
            entry_ignore_case(dir.path(), "DEP.DLL", false),
            Some(dir.path().join("Dep.dll"))
        );
        assert_eq!(entry_ignore_case(dir.path(), "dep.dll", true), None);
        assert_eq!(entry_ignore_case(dir.path(), "Other.dll", false), None);
    }

    #[test]
    fn rejects_path_like_names() {
        let base = tempfile::tempdir().unwrap();
        touch(&base.path().join("Dep.dll"));

        let locator = ModuleLocator::new();
        assert!(locator.candidates("../Dep", Some(base.path())).is_empty());
        assert!(locator.candidates("", Some(base.path())).is_empty());
        assert!(locator.candidates("Missing", Some(base.path())).is_empty());
    }
}

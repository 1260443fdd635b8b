use std::{
    path::{Path, PathBuf},
    sync::{Arc, OnceLock, Weak},
};

use serde::{Deserialize, Serialize};

use crate::probe::{
    diff::identity_difference,
    prober::{ModuleProber, ProberInner},
    ProbeResult,
};

/// One declared dependency of a probed module and what it resolved to.
///
/// `redirected` implies `satisfied`, and `resolved_difference` is present exactly when the
/// dependency is satisfied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyDependency {
    requested_name: String,
    satisfied: bool,
    resolved_name: Option<String>,
    redirected: bool,
    resolved_difference: Option<String>,
    resolved_location: Option<PathBuf>,
    relaxed: bool,
    failure: Option<String>,
    #[serde(skip)]
    owner: Weak<ProberInner>,
    #[serde(skip)]
    module: OnceLock<Arc<ProbeResult>>,
}

impl AssemblyDependency {
    pub(crate) fn resolved(
        requested_name: &str,
        resolved_name: &str,
        location: &Path,
        relaxed: bool,
    ) -> Self {
        AssemblyDependency {
            requested_name: requested_name.to_string(),
            satisfied: true,
            resolved_name: Some(resolved_name.to_string()),
            redirected: requested_name != resolved_name,
            resolved_difference: Some(identity_difference(requested_name, resolved_name)),
            resolved_location: Some(location.to_path_buf()),
            relaxed,
            failure: None,
            owner: Weak::new(),
            module: OnceLock::new(),
        }
    }

    pub(crate) fn unresolved(requested_name: &str, failure: String) -> Self {
        AssemblyDependency {
            requested_name: requested_name.to_string(),
            satisfied: false,
            resolved_name: None,
            redirected: false,
            resolved_difference: None,
            resolved_location: None,
            relaxed: false,
            failure: Some(failure),
            owner: Weak::new(),
            module: OnceLock::new(),
        }
    }

    pub(crate) fn bind(&mut self, owner: Weak<ProberInner>) {
        self.owner = owner;
    }

    /// The identity as declared in the referencing module's metadata.
    #[must_use]
    pub fn requested_name(&self) -> &str {
        &self.requested_name
    }

    /// True if a concrete module was found.
    #[must_use]
    pub fn satisfied(&self) -> bool {
        self.satisfied
    }

    /// Identity of the module found.
    #[must_use]
    pub fn resolved_name(&self) -> Option<&str> {
        self.resolved_name.as_deref()
    }

    /// True if the module found is not exactly the one requested.
    #[must_use]
    pub fn redirected(&self) -> bool {
        self.redirected
    }

    /// Attribute fragments of the resolved identity missing from the requested one.
    #[must_use]
    pub fn resolved_difference(&self) -> Option<&str> {
        self.resolved_difference.as_deref()
    }

    /// Path of the module found.
    #[must_use]
    pub fn resolved_location(&self) -> Option<&Path> {
        self.resolved_location.as_deref()
    }

    /// True if the module was only found after dropping the version from the request.
    #[must_use]
    pub fn relaxed(&self) -> bool {
        self.relaxed
    }

    /// Why resolution failed.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Probes the dependency itself, once, through the prober that produced it (or the
    /// global prober when that one is gone).
    ///
    /// A satisfied dependency is probed by its resolved location; an unsatisfied one by its
    /// requested identity, which yields the corresponding failure.
    pub fn resolve_module(&self) -> Arc<ProbeResult> {
        let result = self.module.get_or_init(|| {
            let prober = self
                .owner
                .upgrade()
                .map_or_else(|| ModuleProber::global().clone(), ModuleProber::from_inner);

            match &self.resolved_location {
                Some(location) => prober.probe(&location.to_string_lossy()),
                None => prober.probe_identity(&self.requested_name),
            }
        });

        Arc::clone(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_resolution() {
        let name = "Dep, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null";
        let dependency = AssemblyDependency::resolved(name, name, Path::new("/lib/Dep.dll"), false);

        assert!(dependency.satisfied());
        assert!(!dependency.redirected());
        assert_eq!(dependency.resolved_difference(), Some(""));
        assert_eq!(dependency.resolved_location(), Some(Path::new("/lib/Dep.dll")));
    }

    #[test]
    fn redirected_resolution() {
        let dependency = AssemblyDependency::resolved(
            "Dep, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null",
            "Dep, Version=2.0.0.0, Culture=neutral, PublicKeyToken=null",
            Path::new("/lib/Dep.dll"),
            true,
        );

        assert!(dependency.satisfied());
        assert!(dependency.redirected());
        assert!(dependency.relaxed());
        assert_eq!(dependency.resolved_difference(), Some("Version=2.0.0.0"));
    }

    #[test]
    fn unresolved() {
        let dependency = AssemblyDependency::unresolved("Gone", "Could not locate 'Gone'".into());

        assert!(!dependency.satisfied());
        assert!(!dependency.redirected());
        assert!(dependency.resolved_name().is_none());
        assert!(dependency.resolved_difference().is_none());
        assert_eq!(dependency.failure(), Some("Could not locate 'Gone'"));
    }

    #[test]
    fn serialized_form_skips_handles() {
        let dependency = AssemblyDependency::unresolved("Gone", "missing".into());
        let json = serde_json::to_string(&dependency).unwrap();
        assert!(!json.contains("owner"));

        let back: AssemblyDependency = serde_json::from_str(&json).unwrap();
        assert_eq!(back.requested_name(), "Gone");
        assert!(back.module.get().is_none());
    }
}

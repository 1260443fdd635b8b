use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::metadata::identity::ProcessorArchitecture;

/// Identity and build metadata of one managed module, as produced by an
/// [`crate::probe::IdentityParser`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleIdentity {
    /// Canonical identity: name, version, culture and public key token
    pub display_name: String,
    /// Simple assembly name
    pub name: String,
    /// Target platform
    pub architecture: ProcessorArchitecture,
    /// Culture; empty for the invariant culture
    pub culture: String,
    /// Four-part assembly version
    pub assembly_version: String,
    /// Execution engine version from the metadata root, e.g. `v4.0.30319`
    pub runtime_version: String,
    /// `FileVersion` of the Win32 version resource
    pub file_version: Option<String>,
    /// `ProductVersion` of the Win32 version resource
    pub product_version: Option<String>,
    /// File name without directory
    pub file_name: String,
    /// Absolute path of the module
    pub location: PathBuf,
    /// True if the module was found below a shared assembly cache root
    pub is_in_shared_cache: bool,
    /// From `DebuggableAttribute`; `None` when the attribute is absent
    pub is_debug_build: Option<bool>,
    /// From `TargetFrameworkAttribute`
    pub target_framework: Option<String>,
    /// Display names of the referenced assemblies, in metadata order
    pub references: Vec<String>,
}

use std::{
    path::{Path, PathBuf},
    sync::Weak,
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::{
    metadata::identity::ProcessorArchitecture,
    probe::{prober::ProberInner, AssemblyDependency, FileProperties, ModuleIdentity},
    Error,
};

/// Outcome class of a probe, ordered by severity for display.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum ErrorLevel {
    /// Metadata was read
    Success = 0,
    /// The file exists but is not a readable or compatible managed module
    ReflectionError = 1,
    /// The file (or the module for an identity) does not exist
    FileNotFound = 2,
    /// The input was missing, blank or not a valid path or identity
    ArgumentError = 3,
}

impl ErrorLevel {
    /// Numeric value, used as process exit code.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        self as i32
    }
}

impl From<&Error> for ErrorLevel {
    fn from(error: &Error) -> Self {
        match error {
            error if error.is_invalid_argument() => ErrorLevel::ArgumentError,
            error if error.is_not_found() => ErrorLevel::FileNotFound,
            _ => ErrorLevel::ReflectionError,
        }
    }
}

/// What was asked for: a path or an assembly display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProbeRequest {
    /// The normalized input
    pub name: String,
    /// True if `name` is an assembly display name rather than a path
    pub is_assembly_identity: bool,
}

/// Everything learned about one module.
///
/// Created once per distinct input and never mutated afterwards. A failed probe still
/// carries whatever could be determined: file name and location for path probes, and file
/// and product versions when the version resource was readable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    request: ProbeRequest,
    error_level: ErrorLevel,
    error: Option<String>,
    module: Option<ModuleIdentity>,
    file_name: Option<String>,
    location: Option<PathBuf>,
    file_version: Option<String>,
    product_version: Option<String>,
    dependencies: Vec<AssemblyDependency>,
}

impl ProbeResult {
    pub(crate) fn succeeded(
        request: ProbeRequest,
        mut module: ModuleIdentity,
        properties: FileProperties,
        dependencies: Vec<AssemblyDependency>,
    ) -> Self {
        module.file_version.clone_from(&properties.file_version);
        module.product_version.clone_from(&properties.product_version);

        ProbeResult {
            request,
            error_level: ErrorLevel::Success,
            error: None,
            file_name: Some(module.file_name.clone()),
            location: Some(module.location.clone()),
            file_version: properties.file_version,
            product_version: properties.product_version,
            module: Some(module),
            dependencies,
        }
    }

    pub(crate) fn failed(request: ProbeRequest, error: &Error) -> Self {
        ProbeResult {
            request,
            error_level: ErrorLevel::from(error),
            error: Some(error.to_string()),
            module: None,
            file_name: None,
            location: None,
            file_version: None,
            product_version: None,
            dependencies: Vec::new(),
        }
    }

    /// Attaches best-effort file information to a failed result.
    pub(crate) fn with_file(mut self, location: &Path, properties: FileProperties) -> Self {
        self.file_name = location
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        self.location = Some(location.to_path_buf());
        self.file_version = properties.file_version;
        self.product_version = properties.product_version;
        self
    }

    /// Lets the dependencies expand themselves through `owner`.
    pub(crate) fn bind(&mut self, owner: &Weak<ProberInner>) {
        for dependency in &mut self.dependencies {
            dependency.bind(owner.clone());
        }
    }

    /// The request this result answers.
    #[must_use]
    pub fn request(&self) -> &ProbeRequest {
        &self.request
    }

    /// The outcome class.
    #[must_use]
    pub fn error_level(&self) -> ErrorLevel {
        self.error_level
    }

    /// True if metadata was read.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error_level == ErrorLevel::Success
    }

    /// Why the probe failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The module identity, on success.
    #[must_use]
    pub fn module(&self) -> Option<&ModuleIdentity> {
        self.module.as_ref()
    }

    /// Canonical identity string.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.module.as_ref().map(|module| module.display_name.as_str())
    }

    /// Target platform.
    #[must_use]
    pub fn architecture(&self) -> Option<ProcessorArchitecture> {
        self.module.as_ref().map(|module| module.architecture)
    }

    /// Culture; empty for neutral.
    #[must_use]
    pub fn culture(&self) -> Option<&str> {
        self.module.as_ref().map(|module| module.culture.as_str())
    }

    /// Assembly version.
    #[must_use]
    pub fn assembly_version(&self) -> Option<&str> {
        self.module
            .as_ref()
            .map(|module| module.assembly_version.as_str())
    }

    /// Runtime version the module was built against.
    #[must_use]
    pub fn runtime_version(&self) -> Option<&str> {
        self.module
            .as_ref()
            .map(|module| module.runtime_version.as_str())
    }

    /// True if the module was found in a shared assembly cache.
    #[must_use]
    pub fn is_in_shared_cache(&self) -> bool {
        self.module
            .as_ref()
            .is_some_and(|module| module.is_in_shared_cache)
    }

    /// Debug build flag; `None` unless the probe succeeded and the module carries a
    /// `DebuggableAttribute`.
    #[must_use]
    pub fn is_debug_build(&self) -> Option<bool> {
        self.module.as_ref().and_then(|module| module.is_debug_build)
    }

    /// Target framework moniker.
    #[must_use]
    pub fn target_framework(&self) -> Option<&str> {
        self.module
            .as_ref()
            .and_then(|module| module.target_framework.as_deref())
    }

    /// File name without directory.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Absolute path.
    #[must_use]
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// `FileVersion` of the version resource.
    #[must_use]
    pub fn file_version(&self) -> Option<&str> {
        self.file_version.as_deref()
    }

    /// `ProductVersion` of the version resource.
    #[must_use]
    pub fn product_version(&self) -> Option<&str> {
        self.product_version.as_deref()
    }

    /// Resolved first-level dependencies, sorted by requested name; empty on failure.
    #[must_use]
    pub fn dependencies(&self) -> &[AssemblyDependency] {
        &self.dependencies
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    file::{File, VersionInfo},
    Error, Result,
};

/// File-level version information, independent of managed metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileProperties {
    /// `FileVersion` of the version resource
    pub file_version: Option<String>,
    /// `ProductVersion` of the version resource
    pub product_version: Option<String>,
}

/// Reads [`FileProperties`]; doubles as the existence check of by-path probes.
pub trait PropertiesReader: Send + Sync {
    /// Reads the properties of the file at `path`.
    ///
    /// # Errors
    /// A not-found error if `path` does not name an existing file. Files that exist but
    /// carry no readable version information yield empty properties, not an error.
    fn read(&self, path: &Path) -> Result<FileProperties>;
}

/// [`PropertiesReader`] decoding the Win32 `VS_VERSIONINFO` resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceVersionReader;

impl PropertiesReader for ResourceVersionReader {
    fn read(&self, path: &Path) -> Result<FileProperties> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(Error::NotFound(path.display().to_string()));
        }

        let info = match File::from_file(path).and_then(|file| VersionInfo::read(&file)) {
            Ok(info) => info,
            Err(error) if error.is_not_found() => return Err(error),
            Err(error) => {
                log::debug!("no version resource in {}: {error}", path.display());
                None
            }
        };

        Ok(info.map_or_else(FileProperties::default, |info| FileProperties {
            file_version: info.file_version(),
            product_version: info.product_version(),
        }))
    }
}

//! The identity parser contract and its default, metadata-reading implementation.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;

use crate::{
    file::File,
    metadata::{identity::AssemblyName, AssemblyView},
    probe::{locator::ModuleLocator, ModuleIdentity},
    Error, Result,
};

/// Turns a path or an identity string into a [`ModuleIdentity`].
///
/// Implementations read metadata only and never execute code from the module. One parser is
/// created per isolation context, so anything it keeps loaded lives exactly as long as the
/// probe that uses it.
pub trait IdentityParser {
    /// Reads the module at `path`.
    ///
    /// # Errors
    /// A not-found error if the file does not exist, a format error if it is not a readable
    /// managed module.
    fn parse_path(&self, path: &Path) -> Result<ModuleIdentity>;

    /// Locates and reads the module named by the display name `identity`, requiring every
    /// attribute the name specifies to match.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] for a malformed name, [`Error::VersionMismatch`] if only
    /// modules with different attributes exist, [`Error::NotFound`] if none exists.
    fn parse_identity(&self, identity: &str) -> Result<ModuleIdentity>;
}

/// Creates the parser of one isolation context.
pub trait ParserFactory: Send + Sync {
    /// A fresh parser scoped to `base_dir`, the directory relative lookups start from.
    ///
    /// # Errors
    /// Any error here fails the probe the context was created for.
    fn create(&self, base_dir: Option<&Path>) -> Result<Box<dyn IdentityParser>>;
}

/// [`ParserFactory`] for [`MetadataParser`].
#[derive(Debug, Clone, Default)]
pub struct MetadataParserFactory {
    locator: Arc<ModuleLocator>,
}

impl MetadataParserFactory {
    /// A factory whose parsers resolve identities through `locator`.
    #[must_use]
    pub fn new(locator: ModuleLocator) -> Self {
        MetadataParserFactory {
            locator: Arc::new(locator),
        }
    }
}

impl ParserFactory for MetadataParserFactory {
    fn create(&self, base_dir: Option<&Path>) -> Result<Box<dyn IdentityParser>> {
        Ok(Box::new(MetadataParser::new(
            Arc::clone(&self.locator),
            base_dir.map(Path::to_path_buf),
        )))
    }
}

/// Reads identities straight from ECMA-335 metadata.
///
/// Every file it opens stays mapped in the parser until the parser is dropped, so repeated
/// lookups of the same candidate within one probe only parse it once.
pub struct MetadataParser {
    locator: Arc<ModuleLocator>,
    base_dir: Option<PathBuf>,
    modules: DashMap<PathBuf, Arc<ModuleIdentity>>,
    files: DashMap<PathBuf, Arc<File>>,
}

impl MetadataParser {
    /// A parser resolving identities through `locator`, relative to `base_dir`.
    #[must_use]
    pub fn new(locator: Arc<ModuleLocator>, base_dir: Option<PathBuf>) -> Self {
        MetadataParser {
            locator,
            base_dir,
            modules: DashMap::new(),
            files: DashMap::new(),
        }
    }

    /// Number of files currently mapped by this parser.
    #[must_use]
    pub fn loaded(&self) -> usize {
        self.files.len()
    }

    fn load(&self, path: &Path) -> Result<Arc<File>> {
        if let Some(file) = self.files.get(path) {
            return Ok(Arc::clone(file.value()));
        }

        let file = Arc::new(File::from_file(path)?);
        self.files.insert(path.to_path_buf(), Arc::clone(&file));
        Ok(file)
    }

    fn read(&self, path: &Path) -> Result<Arc<ModuleIdentity>> {
        let location = std::path::absolute(path)?;
        if let Some(module) = self.modules.get(&location) {
            return Ok(Arc::clone(module.value()));
        }

        let file = self.load(&location)?;
        let view = AssemblyView::new(&file)?;
        let name = view.assembly_name()?;

        let module = Arc::new(ModuleIdentity {
            display_name: name.display_name(),
            name: name.name.clone(),
            architecture: view.architecture(),
            culture: name.culture.clone().unwrap_or_default(),
            assembly_version: name.version.unwrap_or_default().to_string(),
            runtime_version: view.runtime_version().to_string(),
            file_version: None,
            product_version: None,
            file_name: location
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            is_in_shared_cache: self.locator.is_shared(&location),
            is_debug_build: view.debuggable()?,
            target_framework: view.target_framework()?,
            references: view.references()?,
            location: location.clone(),
        });

        self.modules.insert(location, Arc::clone(&module));
        Ok(module)
    }
}

impl IdentityParser for MetadataParser {
    fn parse_path(&self, path: &Path) -> Result<ModuleIdentity> {
        self.read(path).map(|module| (*module).clone())
    }

    fn parse_identity(&self, identity: &str) -> Result<ModuleIdentity> {
        let requested = AssemblyName::parse(identity)?;

        let mut mismatch = None;
        let mut bad_image = None;

        for candidate in self
            .locator
            .candidates(&requested.name, self.base_dir.as_deref())
        {
            let module = match self.read(&candidate.path) {
                Ok(module) => module,
                Err(error) => {
                    log::trace!("skipping {}: {error}", candidate.path.display());
                    if bad_image.is_none() && !error.is_not_found() {
                        bad_image = Some(error);
                    }
                    continue;
                }
            };

            let found = AssemblyName::parse(&module.display_name)?;
            if found.satisfies(&requested) {
                return Ok((*module).clone());
            }

            if mismatch.is_none() && found.name.eq_ignore_ascii_case(&requested.name) {
                mismatch = Some(module.display_name.clone());
            }
        }

        if let Some(found) = mismatch {
            return Err(Error::VersionMismatch {
                requested: identity.trim().to_string(),
                found,
            });
        }

        Err(bad_image.unwrap_or_else(|| Error::NotFound(identity.trim().to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{metadata::identity::ProcessorArchitecture, test::ImageBuilder};

    fn parser(base: &Path) -> MetadataParser {
        MetadataParser::new(Arc::new(ModuleLocator::new()), Some(base.to_path_buf()))
    }

    #[test]
    fn parse_path_reads_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = ImageBuilder::new("App")
            .version(3, 2, 1, 0)
            .reference("Dep, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null")
            .debuggable_flags(true, true)
            .write_to(dir.path(), "App.exe");

        let parser = parser(dir.path());
        let module = parser.parse_path(&path).unwrap();

        assert_eq!(
            module.display_name,
            "App, Version=3.2.1.0, Culture=neutral, PublicKeyToken=null"
        );
        assert_eq!(module.name, "App");
        assert_eq!(module.assembly_version, "3.2.1.0");
        assert_eq!(module.culture, "");
        assert_eq!(module.architecture, ProcessorArchitecture::MSIL);
        assert_eq!(module.file_name, "App.exe");
        assert!(module.location.is_absolute());
        assert!(!module.is_in_shared_cache);
        assert_eq!(module.is_debug_build, Some(true));
        assert_eq!(module.references.len(), 1);
        assert_eq!(parser.loaded(), 1);

        parser.parse_path(&path).unwrap();
        assert_eq!(parser.loaded(), 1);
    }

    #[test]
    fn parse_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let parser = parser(dir.path());

        let missing = parser.parse_path(&dir.path().join("missing.dll")).unwrap_err();
        assert!(missing.is_not_found());

        let native = ImageBuilder::native("Native").write_to(dir.path(), "Native.dll");
        assert!(matches!(parser.parse_path(&native), Err(Error::NotSupported)));

        let empty = dir.path().join("Empty.dll");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(parser.parse_path(&empty), Err(Error::Empty)));
    }

    #[test]
    fn parse_identity_strict() {
        let dir = tempfile::tempdir().unwrap();
        ImageBuilder::new("Dep")
            .version(2, 0, 0, 0)
            .write_to(dir.path(), "Dep.dll");
        let parser = parser(dir.path());

        let module = parser.parse_identity("Dep").unwrap();
        assert_eq!(module.assembly_version, "2.0.0.0");

        let module = parser
            .parse_identity("dep, Version=2.0.0.0, Culture=neutral, PublicKeyToken=null")
            .unwrap();
        assert_eq!(module.name, "Dep");

        match parser.parse_identity("Dep, Version=1.0.0.0") {
            Err(Error::VersionMismatch { requested, found }) => {
                assert_eq!(requested, "Dep, Version=1.0.0.0");
                assert_eq!(
                    found,
                    "Dep, Version=2.0.0.0, Culture=neutral, PublicKeyToken=null"
                );
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(matches!(
            parser.parse_identity("Missing, Version=1.0.0.0"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            parser.parse_identity("Dep, Version=x"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn parse_identity_bad_image() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Broken.dll"), b"not a portable executable").unwrap();

        let error = parser(dir.path()).parse_identity("Broken").unwrap_err();
        assert!(!error.is_not_found());
        assert!(!matches!(error, Error::VersionMismatch { .. }));
    }

    #[test]
    fn parse_identity_prefers_match_over_earlier_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let extra = tempfile::tempdir().unwrap();
        ImageBuilder::new("Dep")
            .version(2, 0, 0, 0)
            .write_to(dir.path(), "Dep.dll");
        ImageBuilder::new("Dep")
            .version(1, 0, 0, 0)
            .write_to(extra.path(), "Dep.dll");

        let parser = MetadataParser::new(
            Arc::new(ModuleLocator::new().with_search_path(extra.path())),
            Some(dir.path().to_path_buf()),
        );
        let module = parser.parse_identity("Dep, Version=1.0.0.0").unwrap();
        assert_eq!(module.assembly_version, "1.0.0.0");
    }
}

//! Instrumented [`ParserFactory`] implementations.

use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use crate::{
    probe::{
        IdentityParser, MetadataParserFactory, ModuleIdentity, ModuleLocator, ParserFactory,
    },
    Error, Result,
};

/// Delegates to [`MetadataParserFactory`] and counts the parsers created.
#[derive(Clone)]
pub(crate) struct CountingFactory {
    inner: MetadataParserFactory,
    created: Arc<AtomicUsize>,
}

impl CountingFactory {
    pub(crate) fn new(locator: ModuleLocator) -> Self {
        CountingFactory {
            inner: MetadataParserFactory::new(locator),
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ParserFactory for CountingFactory {
    fn create(&self, base_dir: Option<&Path>) -> Result<Box<dyn IdentityParser>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.inner.create(base_dir)
    }
}

struct PanickingParser;

impl IdentityParser for PanickingParser {
    fn parse_path(&self, path: &Path) -> Result<ModuleIdentity> {
        panic!("corrupt image at {}", path.display())
    }

    fn parse_identity(&self, identity: &str) -> Result<ModuleIdentity> {
        panic!("corrupt image for {identity}")
    }
}

/// Creates parsers that panic on every call.
pub(crate) struct PanickingFactory;

impl ParserFactory for PanickingFactory {
    fn create(&self, _base_dir: Option<&Path>) -> Result<Box<dyn IdentityParser>> {
        Ok(Box::new(PanickingParser))
    }
}

/// Fails to create any parser.
pub(crate) struct FailingFactory;

impl ParserFactory for FailingFactory {
    fn create(&self, _base_dir: Option<&Path>) -> Result<Box<dyn IdentityParser>> {
        Err(Error::Isolation("no parser available".into()))
    }
}

use std::sync::{Arc, OnceLock};

use rayon::prelude::*;

use crate::{
    probe::{
        cache::{CacheKey, ProbeCache},
        isolation::{InProcessIsolation, Isolation, ProbeServices, WorkerIsolation},
        parser::MetadataParserFactory,
        properties::ResourceVersionReader,
        FallbackPolicy, IsolationMode, ParserFactory, ProbeRequest, ProbeResult, ProberConfig,
        PropertiesReader, SimpleNameFallback,
    },
    Error,
};

pub(crate) struct ProberInner {
    cache: ProbeCache,
    services: ProbeServices,
    isolation: Box<dyn Isolation>,
}

static GLOBAL: OnceLock<ModuleProber> = OnceLock::new();

/// Probes modules and caches what it learns.
///
/// Every distinct input is probed exactly once for the prober's lifetime; later requests,
/// including concurrent ones, share the first result. Cloning is cheap and clones share the
/// cache.
///
/// ```rust,no_run
/// use dotprobe::probe::{ModuleProber, ProberConfig};
///
/// let prober = ModuleProber::new(ProberConfig::system().with_search_path("/opt/app/lib"));
/// let result = prober.probe("/opt/app/App.exe");
/// for dependency in result.dependencies() {
///     if dependency.satisfied() {
///         let module = dependency.resolve_module();
///         println!("{}", module.display_name().unwrap_or_default());
///     }
/// }
/// ```
#[derive(Clone)]
pub struct ModuleProber {
    inner: Arc<ProberInner>,
}

impl ModuleProber {
    /// A prober with the default collaborators for `config`.
    #[must_use]
    pub fn new(config: ProberConfig) -> Self {
        ModuleProber::builder(config).build()
    }

    /// A builder for a prober with custom collaborators.
    #[must_use]
    pub fn builder(config: ProberConfig) -> ModuleProberBuilder {
        ModuleProberBuilder::new(config)
    }

    /// The process-wide prober, configured with [`ProberConfig::system`] on first use.
    pub fn global() -> &'static ModuleProber {
        GLOBAL.get_or_init(|| ModuleProber::new(ProberConfig::system()))
    }

    pub(crate) fn from_inner(inner: Arc<ProberInner>) -> Self {
        ModuleProber { inner }
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &ProberConfig {
        self.inner.services.config()
    }

    /// Probes `name`, a path or (with `is_assembly_identity`) an assembly display name.
    ///
    /// Never fails: missing or blank input yields [`crate::probe::ErrorLevel::ArgumentError`],
    /// every other failure is classified into the result.
    pub fn create(&self, name: Option<&str>, is_assembly_identity: bool) -> Arc<ProbeResult> {
        let key = CacheKey::new(name, is_assembly_identity);
        self.inner.cache.get_or_probe(key, |key| self.execute(key))
    }

    /// Probes the module at `path`.
    pub fn probe(&self, path: &str) -> Arc<ProbeResult> {
        self.create(Some(path), false)
    }

    /// Locates and probes the module named by the display name `identity`.
    pub fn probe_identity(&self, identity: &str) -> Arc<ProbeResult> {
        self.create(Some(identity), true)
    }

    /// Probes every path in parallel, preserving input order.
    pub fn probe_many<S>(&self, paths: &[S]) -> Vec<Arc<ProbeResult>>
    where
        S: AsRef<str> + Sync,
    {
        paths
            .par_iter()
            .map(|path| self.probe(path.as_ref()))
            .collect()
    }

    /// Number of distinct inputs probed so far.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.inner.cache.len()
    }

    fn execute(&self, key: &CacheKey) -> Arc<ProbeResult> {
        let request = ProbeRequest {
            name: key.name().to_string(),
            is_assembly_identity: key.is_assembly_identity(),
        };

        let mut result = if request.name.is_empty() {
            ProbeResult::failed(
                request,
                &Error::InvalidArgument("no module name given".to_string()),
            )
        } else {
            match self.inner.isolation.run(&request, &self.inner.services) {
                Ok(result) => result,
                Err(error) => {
                    log::debug!("probe of '{}' failed: {error}", request.name);
                    ProbeResult::failed(request, &error)
                }
            }
        };

        result.bind(&Arc::downgrade(&self.inner));
        Arc::new(result)
    }
}

/// Builds a [`ModuleProber`] with custom collaborators.
pub struct ModuleProberBuilder {
    config: ProberConfig,
    factory: Option<Arc<dyn ParserFactory>>,
    properties: Option<Arc<dyn PropertiesReader>>,
    fallback: Option<Arc<dyn FallbackPolicy>>,
    isolation: Option<Box<dyn Isolation>>,
}

impl ModuleProberBuilder {
    fn new(config: ProberConfig) -> Self {
        ModuleProberBuilder {
            config,
            factory: None,
            properties: None,
            fallback: None,
            isolation: None,
        }
    }

    /// Creates the parser of each isolation context.
    #[must_use]
    pub fn parser_factory(mut self, factory: Arc<dyn ParserFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Reads file-level properties and checks existence.
    #[must_use]
    pub fn properties_reader(mut self, reader: Arc<dyn PropertiesReader>) -> Self {
        self.properties = Some(reader);
        self
    }

    /// Proposes relaxed candidates after version mismatches.
    #[must_use]
    pub fn fallback_policy(mut self, policy: Arc<dyn FallbackPolicy>) -> Self {
        self.fallback = Some(policy);
        self
    }

    /// Overrides the isolation derived from the configuration's [`IsolationMode`].
    #[must_use]
    pub fn isolation(mut self, isolation: Box<dyn Isolation>) -> Self {
        self.isolation = Some(isolation);
        self
    }

    /// The prober.
    #[must_use]
    pub fn build(self) -> ModuleProber {
        let factory = self.factory.unwrap_or_else(|| {
            Arc::new(MetadataParserFactory::new(self.config.locator().clone()))
        });
        let properties = self
            .properties
            .unwrap_or_else(|| Arc::new(ResourceVersionReader));
        let fallback = self.fallback.unwrap_or_else(|| {
            Arc::new(SimpleNameFallback::new(self.config.relaxation_extension()))
        });
        let isolation = self
            .isolation
            .unwrap_or_else(|| -> Box<dyn Isolation> {
                match self.config.isolation_mode() {
                    IsolationMode::InProcess => Box::new(InProcessIsolation),
                    IsolationMode::Worker(program) => Box::new(WorkerIsolation::new(program)),
                }
            });

        ModuleProber {
            inner: Arc::new(ProberInner {
                cache: ProbeCache::new(),
                services: ProbeServices::new(self.config, factory, properties, fallback),
                isolation,
            }),
        }
    }
}

//! Isolation contexts: where one probe runs and what it may leave behind.
//!
//! A probe maps the target and any dependency candidates into memory. Those mappings must
//! not outlive the probe, otherwise probing a large tree keeps every binary it ever touched
//! mapped. [`InProcessIsolation`] scopes them to a [`ProbeContext`] that owns a fresh parser
//! and drops it on every exit path, panics included. [`WorkerIsolation`] goes further and
//! runs the probe in a short-lived child process that only hands back the serialized
//! result.

use std::{
    any::Any,
    ffi::OsString,
    io::{Read, Write},
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    probe::{
        locator::ModuleLocator, parser::MetadataParserFactory,
        properties::ResourceVersionReader, AssemblyDependency, DependencyResolver,
        FallbackPolicy, FileProperties, IdentityParser, ModuleIdentity, ParserFactory,
        ProbeRequest, ProbeResult, ProberConfig, PropertiesReader, SimpleNameFallback,
    },
    Error, Result,
};

/// The collaborators a probe runs with.
#[derive(Clone)]
pub struct ProbeServices {
    factory: Arc<dyn ParserFactory>,
    properties: Arc<dyn PropertiesReader>,
    fallback: Arc<dyn FallbackPolicy>,
    config: ProberConfig,
}

impl ProbeServices {
    /// Services with explicit collaborators.
    pub fn new(
        config: ProberConfig,
        factory: Arc<dyn ParserFactory>,
        properties: Arc<dyn PropertiesReader>,
        fallback: Arc<dyn FallbackPolicy>,
    ) -> Self {
        ProbeServices {
            factory,
            properties,
            fallback,
            config,
        }
    }

    /// The default collaborators for `config`: metadata parsing through its locator, the
    /// version resource reader and a simple-name fallback with its extension.
    #[must_use]
    pub fn from_config(config: ProberConfig) -> Self {
        let factory = Arc::new(MetadataParserFactory::new(config.locator().clone()));
        let fallback = Arc::new(SimpleNameFallback::new(config.relaxation_extension()));
        ProbeServices::new(config, factory, Arc::new(ResourceVersionReader), fallback)
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &ProberConfig {
        &self.config
    }
}

/// Runs one probe request.
pub trait Isolation: Send + Sync {
    /// Produces the result for `request`.
    ///
    /// Classified failures (missing file, bad image, bad identity) come back as a failed
    /// [`ProbeResult`]. `Err` is reserved for failures of the isolation mechanism itself,
    /// which the caller classifies.
    ///
    /// # Errors
    /// Context creation failed, the parser panicked or a worker misbehaved.
    fn run(&self, request: &ProbeRequest, services: &ProbeServices) -> Result<ProbeResult>;
}

/// One probe's scope: a parser created for it alone and dropped with it.
struct ProbeContext<'a> {
    services: &'a ProbeServices,
    base_dir: Option<PathBuf>,
    parser: Box<dyn IdentityParser>,
}

impl<'a> ProbeContext<'a> {
    fn enter(services: &'a ProbeServices, base_dir: Option<PathBuf>) -> Result<Self> {
        log::debug!(
            "entering probe context in {}",
            base_dir
                .as_deref()
                .map_or_else(|| "<none>".into(), |dir| dir.display().to_string())
        );

        let parser = services.factory.create(base_dir.as_deref())?;
        Ok(ProbeContext {
            services,
            base_dir,
            parser,
        })
    }

    fn probe_path(&self, request: &ProbeRequest) -> Result<ProbeResult> {
        let path = Path::new(&request.name);

        let properties = match self.services.properties.read(path) {
            Ok(properties) => properties,
            Err(error) => {
                log::debug!("{}: {error}", path.display());
                return Ok(ProbeResult::failed(request.clone(), &error)
                    .with_file(path, FileProperties::default()));
            }
        };

        match self.parser.parse_path(path) {
            Ok(module) => {
                let dependencies = self.dependencies(&module)?;
                Ok(ProbeResult::succeeded(
                    request.clone(),
                    module,
                    properties,
                    dependencies,
                ))
            }
            Err(error) => {
                log::debug!("{}: {error}", path.display());
                Ok(ProbeResult::failed(request.clone(), &error).with_file(path, properties))
            }
        }
    }

    fn probe_identity(&self, request: &ProbeRequest) -> Result<ProbeResult> {
        let resolver = DependencyResolver::new(
            self.parser.as_ref(),
            self.services.fallback.as_ref(),
            self.base_dir.as_deref(),
        );

        match resolver.resolve_module(&request.name) {
            Ok(resolved) => {
                let properties = self
                    .services
                    .properties
                    .read(&resolved.module.location)
                    .unwrap_or_else(|error| {
                        log::debug!("{}: {error}", resolved.module.location.display());
                        FileProperties::default()
                    });
                let dependencies = self.dependencies(&resolved.module)?;
                Ok(ProbeResult::succeeded(
                    request.clone(),
                    resolved.module,
                    properties,
                    dependencies,
                ))
            }
            Err(error) => {
                log::debug!("'{}': {error}", request.name);
                Ok(ProbeResult::failed(request.clone(), &error))
            }
        }
    }

    /// Resolves the references of `module` relative to its own directory, sorted by
    /// requested name.
    fn dependencies(&self, module: &ModuleIdentity) -> Result<Vec<AssemblyDependency>> {
        let module_dir = module.location.parent();

        let scoped;
        let parser: &dyn IdentityParser = if module_dir == self.base_dir.as_deref() {
            self.parser.as_ref()
        } else {
            scoped = self.services.factory.create(module_dir)?;
            scoped.as_ref()
        };

        let resolver = DependencyResolver::new(parser, self.services.fallback.as_ref(), module_dir);
        let mut dependencies: Vec<AssemblyDependency> = module
            .references
            .iter()
            .map(|requested| resolver.resolve(requested))
            .collect();

        dependencies.sort_by(|a, b| a.requested_name().cmp(b.requested_name()));
        Ok(dependencies)
    }
}

impl Drop for ProbeContext<'_> {
    fn drop(&mut self) {
        log::debug!(
            "tearing down probe context in {}",
            self.base_dir
                .as_deref()
                .map_or_else(|| "<none>".into(), |dir| dir.display().to_string())
        );
    }
}

fn probe_in_context(request: &ProbeRequest, services: &ProbeServices) -> Result<ProbeResult> {
    if request.is_assembly_identity {
        let base_dir = match services.config.identity_base_dir() {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir()?,
        };
        ProbeContext::enter(services, Some(base_dir))?.probe_identity(request)
    } else {
        let base_dir = Path::new(&request.name).parent().map(Path::to_path_buf);
        ProbeContext::enter(services, base_dir)?.probe_path(request)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs probes on the calling thread inside a [`ProbeContext`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessIsolation;

impl Isolation for InProcessIsolation {
    fn run(&self, request: &ProbeRequest, services: &ProbeServices) -> Result<ProbeResult> {
        match panic::catch_unwind(AssertUnwindSafe(|| probe_in_context(request, services))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::warn!("parser panicked while probing '{}': {message}", request.name);
                Err(Error::Isolation(format!("parser panicked: {message}")))
            }
        }
    }
}

/// What a worker process receives on stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// The probe to run
    pub request: ProbeRequest,
    /// Where to look for modules by name
    pub locator: ModuleLocator,
    /// Base directory of by-identity probes
    pub base_dir: Option<PathBuf>,
    /// Extension of the version-relaxation retry
    pub fallback_extension: String,
}

impl WorkerRequest {
    fn new(request: &ProbeRequest, config: &ProberConfig) -> Self {
        WorkerRequest {
            request: request.clone(),
            locator: config.locator().clone(),
            base_dir: config.identity_base_dir().map(Path::to_path_buf),
            fallback_extension: config.relaxation_extension().to_string(),
        }
    }

    fn config(&self) -> ProberConfig {
        let config = ProberConfig::new()
            .with_locator(self.locator.clone())
            .fallback_extension(self.fallback_extension.clone());
        match &self.base_dir {
            Some(dir) => config.base_dir(dir),
            None => config,
        }
    }
}

/// Runs each probe in a child process speaking the worker protocol.
///
/// The worker always uses the default collaborators; custom ones installed on the prober
/// are not forwarded.
#[derive(Debug, Clone)]
pub struct WorkerIsolation {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerIsolation {
    /// Workers started as `<program> worker`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        WorkerIsolation {
            program: program.into(),
            args: vec![OsString::from("worker")],
        }
    }

    /// Replaces the worker's arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl Isolation for WorkerIsolation {
    fn run(&self, request: &ProbeRequest, services: &ProbeServices) -> Result<ProbeResult> {
        let payload = serde_json::to_vec(&WorkerRequest::new(request, &services.config))
            .map_err(|error| Error::Isolation(format!("cannot encode request: {error}")))?;

        log::debug!("spawning worker {} for '{}'", self.program.display(), request.name);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|error| {
                Error::Isolation(format!("cannot start {}: {error}", self.program.display()))
            })?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| Error::Isolation("worker stdin unavailable".into()))?;
            stdin
                .write_all(&payload)
                .map_err(|error| Error::Isolation(format!("cannot send request: {error}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|error| Error::Isolation(format!("worker failed: {error}")))?;
        if !output.status.success() {
            log::warn!("worker for '{}' exited with {}", request.name, output.status);
            return Err(Error::Isolation(format!("worker exited with {}", output.status)));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|error| Error::Isolation(format!("malformed worker reply: {error}")))
    }
}

/// Serves exactly one worker request: reads a [`WorkerRequest`] from `input`, probes it
/// in-process and writes the [`ProbeResult`] to `output`.
///
/// # Errors
/// The request could not be decoded or the result could not be written.
pub fn serve_worker<R: Read, W: Write>(input: R, mut output: W) -> Result<()> {
    let worker: WorkerRequest = serde_json::from_reader(input)
        .map_err(|error| Error::Isolation(format!("malformed worker request: {error}")))?;

    let services = ProbeServices::from_config(worker.config());
    let result = InProcessIsolation
        .run(&worker.request, &services)
        .unwrap_or_else(|error| ProbeResult::failed(worker.request.clone(), &error));

    serde_json::to_writer(&mut output, &result)
        .map_err(|error| Error::Isolation(format!("cannot send result: {error}")))?;
    output.flush()?;
    Ok(())
}

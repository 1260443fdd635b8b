use anyhow::Context;
use dotprobe::probe::{
    AssemblyDependency, CacheLayout, ErrorLevel, IsolationMode, ModuleProber, ProberConfig,
    SharedCacheRoot,
};

use crate::app::GlobalOptions;

/// Build the prober described by the global options.
pub fn prober(opts: &GlobalOptions) -> anyhow::Result<ModuleProber> {
    let mut config = if opts.no_system_cache {
        ProberConfig::new().with_env()
    } else {
        ProberConfig::system()
    };

    for dir in &opts.search_path {
        config = config.with_search_path(dir);
    }
    for dir in &opts.shared_cache {
        config = config.with_shared_cache(SharedCacheRoot::new(dir, CacheLayout::PerName));
    }

    if opts.isolate {
        let program = std::env::current_exe().context("cannot locate the dotprobe executable")?;
        config = config.isolation(IsolationMode::Worker(program));
    }

    Ok(ModuleProber::new(config))
}

pub fn banner() -> String {
    format!("dotprobe v{}", env!("CARGO_PKG_VERSION"))
}

/// Reports a missing target the way a failed probe would.
pub fn usage(command: &str) -> ErrorLevel {
    eprintln!("Usage: dotprobe {command} <TARGET>...");
    ErrorLevel::ArgumentError
}

/// The worst of `levels`, `Success` if empty.
pub fn highest(levels: impl IntoIterator<Item = ErrorLevel>) -> ErrorLevel {
    levels.into_iter().max().unwrap_or(ErrorLevel::Success)
}

/// Short resolution state of a dependency.
pub fn status(dependency: &AssemblyDependency) -> &'static str {
    match (dependency.satisfied(), dependency.relaxed(), dependency.redirected()) {
        (false, _, _) => "missing",
        (true, true, _) => "relaxed",
        (true, false, true) => "redirected",
        (true, false, false) => "ok",
    }
}

pub fn or_unknown(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("unknown")
}

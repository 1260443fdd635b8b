use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// dotprobe - side-effect-free .NET assembly identity and dependency probing
#[derive(Debug, Parser)]
#[command(name = "dotprobe", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Probe each target in a separate worker process.
    #[arg(long, global = true)]
    pub isolate: bool,

    /// Additional directory to resolve dependencies from (repeatable).
    #[arg(long, value_name = "DIR", global = true)]
    pub search_path: Vec<PathBuf>,

    /// Additional shared assembly cache with GAC layout (repeatable).
    #[arg(long, value_name = "DIR", global = true)]
    pub shared_cache: Vec<PathBuf>,

    /// Ignore the platform's well-known shared assembly caches.
    #[arg(long, global = true)]
    pub no_system_cache: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Display identity, build metadata and dependencies of one or more modules.
    Info {
        /// Paths of the modules, or assembly display names with --identity.
        #[arg(value_name = "TARGET")]
        targets: Vec<String>,

        /// Treat targets as assembly display names (e.g. "System.Xml, Version=4.0.0.0").
        #[arg(long)]
        identity: bool,
    },

    /// Display how each dependency of a module resolved.
    Deps {
        /// Path of the module, or an assembly display name with --identity.
        #[arg(value_name = "TARGET")]
        target: Option<String>,

        /// Treat the target as an assembly display name.
        #[arg(long)]
        identity: bool,

        /// Probe every resolved dependency one level further.
        #[arg(long)]
        expand: bool,
    },

    /// Serve one probe request read from stdin (used by --isolate).
    #[command(hide = true)]
    Worker,
}

use std::sync::Arc;

use dotprobe::probe::{ErrorLevel, ProbeResult};

use crate::{
    app::GlobalOptions,
    commands::common::{banner, highest, or_unknown, prober, usage},
    output::print_output,
};

pub fn run(targets: &[String], identity: bool, opts: &GlobalOptions) -> anyhow::Result<ErrorLevel> {
    if targets.is_empty() {
        return Ok(usage("info"));
    }

    let prober = prober(opts)?;
    let results: Vec<Arc<ProbeResult>> = if identity {
        targets
            .iter()
            .map(|target| prober.probe_identity(target))
            .collect()
    } else {
        prober.probe_many(targets)
    };

    let reports: Vec<&ProbeResult> = results.iter().map(|result| &**result).collect();
    print_output(reports.as_slice(), opts, |reports| {
        println!("{}", banner());
        for (target, result) in targets.iter().zip(reports) {
            println!();
            print_result(target, result);
        }
    })?;

    Ok(highest(results.iter().map(|result| result.error_level())))
}

fn print_result(target: &str, result: &ProbeResult) {
    println!("{}", result.file_name().unwrap_or(target));
    println!();

    match result.error_level() {
        ErrorLevel::Success => {
            if let Some(name) = result.display_name() {
                println!("{name}");
            }
            println!("Runtime:          {}", or_unknown(result.runtime_version()));
            if let Some(architecture) = result.architecture() {
                println!("Architecture:     {architecture}");
            }
            let culture = result.culture().filter(|c| !c.is_empty()).unwrap_or("neutral");
            println!("Culture:          {culture}");
            println!("Assembly version: {}", or_unknown(result.assembly_version()));
            println!("File version:     {}", or_unknown(result.file_version()));
            println!("Product version:  {}", or_unknown(result.product_version()));
            let debug = match result.is_debug_build() {
                Some(true) => "yes",
                Some(false) => "no",
                None => "unknown",
            };
            println!("Debug build:      {debug}");
            if let Some(framework) = result.target_framework() {
                println!("Target framework: {framework}");
            }
            if result.is_in_shared_cache() {
                println!("Shared cache:     yes");
            }

            println!();
            println!("Dependencies:");
            for dependency in result.dependencies() {
                let mark = if dependency.satisfied() { "" } else { "?" };
                println!("  {mark:<2}{}", dependency.requested_name());
                if dependency.redirected() {
                    println!(
                        "      -> {}",
                        dependency.resolved_difference().unwrap_or_default()
                    );
                }
            }
        }
        ErrorLevel::FileNotFound => println!("File not found"),
        _ => {
            println!("File version:     {}", or_unknown(result.file_version()));
            println!("Product version:  {}", or_unknown(result.product_version()));
            if let Some(error) = result.error() {
                log::debug!("{target}: {error}");
            }
        }
    }
}

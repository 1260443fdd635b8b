use dotprobe::probe::{AssemblyDependency, ErrorLevel, ProbeResult};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::{banner, highest, prober, status, usage},
    output::{print_output, TabWriter},
};

#[derive(Debug, Serialize)]
pub struct DependencyReport<'a> {
    #[serde(flatten)]
    pub dependency: &'a AssemblyDependency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded: Option<ExpandedModule>,
}

/// One level of expansion of a dependency.
#[derive(Debug, Serialize)]
pub struct ExpandedModule {
    pub error_level: ErrorLevel,
    pub display_name: Option<String>,
    pub unsatisfied: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DepsReport<'a> {
    pub target: &'a str,
    pub error_level: ErrorLevel,
    pub display_name: Option<&'a str>,
    pub dependencies: Vec<DependencyReport<'a>>,
}

fn expand(dependency: &AssemblyDependency) -> ExpandedModule {
    let module = dependency.resolve_module();
    ExpandedModule {
        error_level: module.error_level(),
        display_name: module.display_name().map(str::to_string),
        unsatisfied: module
            .dependencies()
            .iter()
            .filter(|d| !d.satisfied())
            .map(|d| d.requested_name().to_string())
            .collect(),
    }
}

pub fn run(
    target: Option<&str>,
    identity: bool,
    expand_modules: bool,
    opts: &GlobalOptions,
) -> anyhow::Result<ErrorLevel> {
    let Some(target) = target else {
        return Ok(usage("deps"));
    };

    let prober = prober(opts)?;
    let result = if identity {
        prober.probe_identity(target)
    } else {
        prober.probe(target)
    };

    let report = DepsReport {
        target,
        error_level: result.error_level(),
        display_name: result.display_name(),
        dependencies: result
            .dependencies()
            .iter()
            .map(|dependency| DependencyReport {
                dependency,
                expanded: (expand_modules && dependency.satisfied()).then(|| expand(dependency)),
            })
            .collect(),
    };

    print_output(&report, opts, |report| print_report(report, &result))?;

    let expanded = report
        .dependencies
        .iter()
        .filter_map(|d| d.expanded.as_ref().map(|e| e.error_level));
    Ok(highest(std::iter::once(result.error_level()).chain(expanded)))
}

fn print_report(report: &DepsReport<'_>, result: &ProbeResult) {
    println!("{}", banner());
    println!();
    println!("{}", report.display_name.unwrap_or(report.target));

    if !result.is_success() {
        println!("{}: {}", report.error_level, result.error().unwrap_or_default());
        return;
    }
    if report.dependencies.is_empty() {
        println!("No dependencies.");
        return;
    }
    println!();

    let expanded = report.dependencies.iter().any(|d| d.expanded.is_some());
    let mut headers = vec!["Status", "Requested", "Difference", "Location"];
    if expanded {
        headers.extend(["Probe", "Unsatisfied"]);
    }

    let mut tw = TabWriter::new(&headers).indent("  ");
    for entry in &report.dependencies {
        let dependency = entry.dependency;
        let mut row = vec![
            status(dependency).to_string(),
            dependency.requested_name().to_string(),
            dependency.resolved_difference().unwrap_or_default().to_string(),
            dependency
                .resolved_location()
                .map(|path| path.display().to_string())
                .or_else(|| dependency.failure().map(str::to_string))
                .unwrap_or_default(),
        ];
        if expanded {
            match &entry.expanded {
                Some(module) => {
                    row.push(module.error_level.to_string());
                    row.push(module.unsatisfied.len().to_string());
                }
                None => row.extend([String::new(), String::new()]),
            }
        }
        tw.row(row);
    }
    tw.print();
}

use std::io;

use anyhow::Context;
use dotprobe::probe::{serve_worker, ErrorLevel};

/// Answer the single request a parent `dotprobe --isolate` sends on stdin.
pub fn run() -> anyhow::Result<ErrorLevel> {
    serve_worker(io::stdin().lock(), io::stdout().lock()).context("worker request failed")?;
    Ok(ErrorLevel::Success)
}

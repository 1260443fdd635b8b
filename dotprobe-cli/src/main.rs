// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

mod app;
mod commands;
mod output;

use std::process::ExitCode;

use clap::Parser;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // dotprobe info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("dotprobe", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    let level = match &cli.command {
        Command::Info { targets, identity } => {
            commands::info::run(targets, *identity, &cli.global)?
        }
        Command::Deps {
            target,
            identity,
            expand,
        } => commands::deps::run(target.as_deref(), *identity, *expand, &cli.global)?,
        Command::Worker => commands::worker::run()?,
    };

    Ok(ExitCode::from(level.exit_code() as u8))
}

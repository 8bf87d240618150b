// Copyright 2025 eraflo
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

//! Command line front end: instantiate every definition of a library against
//! an in-process session, tick until idle, print the outputs as JSON.

mod config;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use kiln_agents::AssetController;
use kiln_control::AssetUpdater;
use kiln_core::{AssetKind, AssetSource, CreationMode};
use kiln_infra::{Library, MemorySession};
use std::fs;
use std::path::PathBuf;

use crate::config::RuntimeConfig;
use crate::report::RunReport;

#[derive(Parser, Debug)]
#[command(name = "kiln-runtime", version, about)]
struct Cli {
    /// Definition library to instantiate (RON).
    library: PathBuf,

    /// Runtime configuration (RON). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tick limit, overriding the configured `max_idle_ticks`.
    #[arg(long)]
    max_ticks: Option<usize>,

    /// Read the library into memory before handing it to the session.
    #[arg(long)]
    from_memory: bool,

    /// Print compact JSON instead of pretty JSON.
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RuntimeConfig::from_ron_file(path)?,
        None => RuntimeConfig::default(),
    };

    let text = fs::read_to_string(&cli.library)
        .with_context(|| format!("Failed to read library '{}'", cli.library.display()))?;
    let library = Library::from_ron_str(&text)
        .with_context(|| format!("Invalid library in '{}'", cli.library.display()))?;
    log::info!(
        "Runtime: library '{}' has {} definition(s).",
        library.name,
        library.definitions.len()
    );

    let mut session = MemorySession::new();
    let mut updater = AssetUpdater::with_config(config.updater.clone());
    for index in 0..library.definitions.len() {
        let source = AssetSource {
            path: Some(cli.library.clone()),
            load_from_memory: cli.from_memory,
            always_overwrite: false,
        };
        let mut controller = AssetController::new(
            AssetKind::Definition,
            source,
            config.controller.clone(),
            CreationMode::Fresh,
        );
        controller
            .select_subasset(index)
            .with_context(|| format!("Failed to select definition {index}"))?;
        controller.request_reload();
        updater.add(controller);
    }

    let max_ticks = cli.max_ticks.unwrap_or(updater.config().max_idle_ticks);
    let outcome = updater.run_until_idle(&mut session, max_ticks);
    log::info!(
        "Runtime: {} event(s) in {} tick(s).",
        outcome.events.len(),
        outcome.ticks
    );

    let report = RunReport::collect(&updater, &outcome);
    let json = if cli.compact {
        serde_json::to_string(&report)
    } else {
        serde_json::to_string_pretty(&report)
    }
    .context("Failed to serialize the run report")?;
    println!("{json}");

    updater.destroy_all(&mut session);

    anyhow::ensure!(
        outcome.idle,
        "assets were still busy after {} tick(s)",
        outcome.ticks
    );
    anyhow::ensure!(
        report.failures() == 0,
        "{} asset(s) failed to build",
        report.failures()
    );
    Ok(())
}

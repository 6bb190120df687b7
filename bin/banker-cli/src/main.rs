// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # banker
//!
//! Command-line interface for the Banker's-algorithm allocator.
//!
//! ## Usage
//! ```bash
//! # Run a workload: one thread per client against one shared pool
//! banker simulate scenarios/textbook.toml
//!
//! # Same, machine-readable
//! banker simulate scenarios/textbook.toml --json
//!
//! # Is this allocation table safe? (exit code 1 if not)
//! banker check scenarios/snapshot.toml
//! ```

mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "banker",
    about = "Deadlock-avoiding resource allocation (Banker's algorithm)",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file and report per-client results and allocator stats.
    Simulate {
        /// Path to the scenario TOML file.
        path: std::path::PathBuf,

        /// Print the report as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Evaluate a static allocation snapshot for safety.
    Check {
        /// Path to the snapshot TOML file.
        path: std::path::PathBuf,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Simulate { path, json } => commands::simulate::execute(path, json).await,
        Commands::Check { path, json } => commands::check::execute(path, json).await,
    }
}

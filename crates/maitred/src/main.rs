// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maitred - job and transaction lifecycle engine for concierge dispatch.
//!
//! This is the binary entry point for the Maitred engine.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

mod sender;
mod serve;
mod status;
mod sweep;

/// Maitred - job and transaction lifecycle engine.
#[derive(Parser, Debug)]
#[command(name = "maitred", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the engine with the scheduled expiry sweeper until interrupted.
    Serve,
    /// Run one expiry sweep pass and print the report.
    Sweep {
        /// Maximum jobs to examine this pass (defaults to the configured
        /// sweeper batch limit).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show job counts, overdue holds, and lifecycle counter totals.
    Status {
        /// Output structured JSON for scripting.
        #[arg(long)]
        json: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup.
    let config = match maitred_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            maitred_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Sweep { limit }) => sweep::run_sweep(&config, limit).await,
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        None => {
            println!("maitred: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `maitred status` command implementation.
//!
//! Reads job counts per status, the overdue-hold backlog, and lifecycle
//! counter totals straight from the database. If `--json` is passed,
//! outputs structured JSON for scripting. If `--plain` is passed or stdout
//! is not a TTY, disables colors.

use std::io::IsTerminal;
use std::sync::Arc;

use serde::Serialize;

use maitred_config::model::MaitredConfig;
use maitred_core::time::now_iso;
use maitred_core::MaitredError;
use maitred_counters::{names, CounterRegistry};
use maitred_storage::queries::jobs;
use maitred_storage::{Database, StatusCount};

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub database_path: String,
    pub total_jobs: i64,
    pub overdue_pending: i64,
    pub jobs: Vec<JobCountEntry>,
    pub counters: Vec<CounterEntry>,
}

#[derive(Debug, Serialize)]
pub struct JobCountEntry {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct CounterEntry {
    pub name: String,
    pub total: i64,
    pub shards: u32,
}

/// Run the `maitred status` command.
pub async fn run_status(
    config: &MaitredConfig,
    json: bool,
    plain: bool,
) -> Result<(), MaitredError> {
    let db = Arc::new(
        Database::open_with_busy_timeout(
            &config.storage.database_path,
            config.storage.busy_timeout_ms,
        )
        .await?,
    );

    let now = now_iso();
    let counts = jobs::status_counts(&db).await?;
    let overdue = jobs::overdue_pending_count(&db, &now).await?;

    let registry = CounterRegistry::new(db.connection().clone(), config.counters.default_shards);
    let mut counters = Vec::new();
    for name in [
        names::JOBS_CREATED,
        names::JOBS_DISPATCHED,
        names::JOBS_CONFIRMED,
        names::JOBS_DECLINED,
        names::JOBS_CANCELLED,
        names::JOBS_EXPIRED,
        names::JOBS_REVIEW,
        names::JOBS_FAILED,
    ] {
        if let Some(total) = registry.total(name).await? {
            counters.push(CounterEntry {
                name: total.name,
                total: total.total,
                shards: total.shard_count,
            });
        }
    }

    db.close().await?;

    let total_jobs: i64 = counts.iter().map(|c| c.count).sum();

    if json {
        let response = StatusResponse {
            database_path: config.storage.database_path.clone(),
            total_jobs,
            overdue_pending: overdue,
            jobs: counts
                .iter()
                .map(|c| JobCountEntry {
                    status: c.status.clone(),
                    count: c.count,
                })
                .collect(),
            counters,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&response).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(
            &config.storage.database_path,
            total_jobs,
            overdue,
            &counts,
            &counters,
            use_color,
        );
    }

    Ok(())
}

/// Print the status report with optional colors.
fn print_status(
    database_path: &str,
    total_jobs: i64,
    overdue: i64,
    counts: &[StatusCount],
    counters: &[CounterEntry],
    use_color: bool,
) {
    println!();
    println!("  maitred status");
    println!("  {}", "-".repeat(35));
    println!("    Database: {database_path}");
    println!("    Jobs:     {total_jobs}");

    for entry in counts {
        println!("      {:<16} {}", entry.status, entry.count);
    }

    if use_color {
        use colored::Colorize;
        let overdue_str = overdue.to_string();
        println!(
            "    Overdue:  {}",
            if overdue > 0 {
                overdue_str.red()
            } else {
                overdue_str.green()
            }
        );
    } else {
        println!("    Overdue:  {overdue}");
    }

    if !counters.is_empty() {
        println!("    Counters:");
        for entry in counters {
            println!(
                "      {:<16} {} ({} shards)",
                entry.name, entry.total, entry.shards
            );
        }
    }
    println!();
}

// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `maitred sweep` command implementation.
//!
//! Runs exactly one expiry sweep pass against the configured database and
//! prints the report. Useful from cron or for manual catch-up after
//! downtime; the serve loop runs the same pass on its own schedule.

use std::sync::Arc;

use maitred_config::model::MaitredConfig;
use maitred_core::MaitredError;
use maitred_lifecycle::{LifecycleEngine, SweepReport};
use maitred_storage::Database;
use maitred_threads::KeywordReplyParser;

use crate::sender::LogSender;

/// Run the `maitred sweep` command.
///
/// `limit` overrides the configured batch limit for this pass only.
pub async fn run_sweep(config: &MaitredConfig, limit: Option<usize>) -> Result<(), MaitredError> {
    crate::serve::init_tracing(&config.engine.log_level);

    let db = Arc::new(
        Database::open_with_busy_timeout(
            &config.storage.database_path,
            config.storage.busy_timeout_ms,
        )
        .await?,
    );
    let engine = LifecycleEngine::new(
        db.clone(),
        Arc::new(LogSender),
        Arc::new(KeywordReplyParser),
        config.holds.clone(),
        &config.counters,
    );

    let limit = limit.unwrap_or(config.sweeper.batch_limit);
    let report = engine.run_timeout_sweep(limit).await?;
    print_report(&report);

    let purged = maitred_idempotency::purge_expired(&db).await?;
    if purged > 0 {
        println!("  purged {purged} lapsed idempotency records");
    }

    db.close().await?;
    Ok(())
}

fn print_report(report: &SweepReport) {
    println!();
    println!("  maitred sweep");
    println!("  {}", "-".repeat(35));
    println!("    Processed: {}", report.processed);
    println!("    Expired:   {}", report.expired.len());
    println!("    Review:    {}", report.review.len());
    println!("    Errors:    {}", report.errors.len());
    for error in &report.errors {
        println!("      {} -> {}", error.job_id, error.message);
    }
    println!();
}

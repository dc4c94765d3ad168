// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `maitred serve` command implementation.
//!
//! Opens storage (running migrations), wires the lifecycle engine and the
//! scheduled expiry sweeper, and runs until SIGINT/SIGTERM. The WAL is
//! checkpointed on the way out.

use std::sync::Arc;

use tracing::info;

use maitred_config::model::MaitredConfig;
use maitred_core::MaitredError;
use maitred_lifecycle::LifecycleEngine;
use maitred_storage::Database;
use maitred_sweeper::{install_signal_handler, SweepRunner};
use maitred_threads::KeywordReplyParser;

use crate::sender::LogSender;

/// Runs the `maitred serve` command.
///
/// The sweep loop is the only scheduled work; inbound traffic arrives
/// through whatever host embeds the engine. Shutdown is cooperative via
/// the signal handler's cancellation token.
pub async fn run_serve(config: MaitredConfig) -> Result<(), MaitredError> {
    init_tracing(&config.engine.log_level);

    info!(
        instance = %config.engine.instance_name,
        database = %config.storage.database_path,
        "starting maitred serve"
    );

    let db = Arc::new(
        Database::open_with_busy_timeout(
            &config.storage.database_path,
            config.storage.busy_timeout_ms,
        )
        .await?,
    );

    let engine = Arc::new(LifecycleEngine::new(
        db.clone(),
        Arc::new(LogSender),
        Arc::new(KeywordReplyParser),
        config.holds.clone(),
        &config.counters,
    ));

    let cancel = install_signal_handler();
    let runner = SweepRunner::new(engine, config.sweeper.clone());
    runner.run(cancel).await;

    db.close().await?;
    info!("maitred serve stopped");
    Ok(())
}

/// Initialize the tracing subscriber for this process.
///
/// `RUST_LOG` overrides the configured level when set.
pub(crate) fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("maitred={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

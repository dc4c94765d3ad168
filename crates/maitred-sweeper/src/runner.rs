// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The scheduled sweep loop.
//!
//! Expiry is authoritative here: no storage TTL is trusted to fire on time.
//! The runner ticks on a fixed interval, runs one bounded sweep pass per
//! tick, and cleans lapsed idempotency markers while it is at it. A pass
//! that fails is logged and the loop keeps ticking.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use maitred_config::model::SweeperConfig;
use maitred_idempotency::purge_expired;
use maitred_lifecycle::LifecycleEngine;

/// Owns the periodic sweep schedule for one engine.
pub struct SweepRunner {
    engine: Arc<LifecycleEngine>,
    config: SweeperConfig,
}

impl SweepRunner {
    pub fn new(engine: Arc<LifecycleEngine>, config: SweeperConfig) -> Self {
        Self { engine, config }
    }

    /// Tick until `cancel` fires.
    ///
    /// The first tick fires immediately, so a backlog accumulated while the
    /// process was down gets swept at boot rather than one interval later.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.config.interval_secs,
            batch_limit = self.config.batch_limit,
            "sweep loop started"
        );
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.interval_secs));
        // A pass that outruns the interval delays the next tick instead of
        // bursting to catch up.
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.pass().await;
                }
                _ = cancel.cancelled() => {
                    info!("sweep loop shutting down");
                    break;
                }
            }
        }
    }

    /// One sweep pass plus guard-table upkeep.
    pub async fn pass(&self) {
        match self.engine.run_timeout_sweep(self.config.batch_limit).await {
            Ok(report) if !report.errors.is_empty() => {
                warn!(
                    errors = report.errors.len(),
                    processed = report.processed,
                    "sweep pass finished with errors"
                );
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "sweep pass failed");
            }
        }

        match purge_expired(self.engine.database()).await {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "lapsed idempotency markers purged"),
            Err(e) => warn!(error = %e, "idempotency purge failed"),
        }
    }
}

/// Installs handlers for SIGTERM and SIGINT (Ctrl+C).
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is
/// received. The handler task runs in the background until then.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

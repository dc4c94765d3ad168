// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The timeout sweep: authoritative expiry for lapsed holds.
//!
//! Each pass scans a bounded batch of pending jobs whose hold window is
//! missing or behind `now` and applies the expiry edge to each in its own
//! transaction. The scan is a hint, never the truth: every job is re-read
//! and re-checked inside its transaction, so a confirm that lands between
//! scan and sweep wins and the sweep skips the job. One job's failure is
//! recorded and the batch continues.

use tracing::{debug, info, warn};

use maitred_core::time::now_iso;
use maitred_core::{JobStatus, MaitredError};
use maitred_counters::names;
use maitred_storage::map_tr_err;
use maitred_storage::queries::jobs;

use crate::engine::LifecycleEngine;
use crate::outcome::{SweepError, SweepReport, TransitionOutcome};
use crate::tx::{load_job_tx, overdue_target, transition_tx};

impl LifecycleEngine {
    /// Run one sweep pass over at most `limit` overdue jobs.
    pub async fn run_timeout_sweep(&self, limit: usize) -> Result<SweepReport, MaitredError> {
        let now = now_iso();
        let ids = jobs::overdue_pending_ids(self.database(), &now, limit).await?;
        let mut report = SweepReport {
            processed: ids.len(),
            ..SweepReport::default()
        };

        for job_id in ids {
            match self.expire_one(&job_id).await {
                Ok(Some(JobStatus::Expired)) => {
                    self.counters()
                        .bump_job_event(names::JOBS_EXPIRED, &job_id)
                        .await;
                    report.expired.push(job_id);
                }
                Ok(Some(JobStatus::TimeoutReview)) => {
                    self.counters()
                        .bump_job_event(names::JOBS_REVIEW, &job_id)
                        .await;
                    report.review.push(job_id);
                }
                // Resolved, deleted, or no longer overdue between scan and
                // transaction; nothing to do.
                Ok(_) => {}
                Err(e) => {
                    warn!(job_id, error = %e, "sweep transition failed, continuing");
                    report.errors.push(SweepError {
                        job_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        if report.processed > 0 {
            info!(
                processed = report.processed,
                expired = report.expired.len(),
                review = report.review.len(),
                errors = report.errors.len(),
                "sweep pass complete"
            );
        } else {
            debug!("sweep pass found nothing overdue");
        }
        Ok(report)
    }

    /// Expire a single job in its own transaction. Returns the applied
    /// status, or `None` when the job no longer needs sweeping.
    async fn expire_one(&self, job_id: &str) -> Result<Option<JobStatus>, MaitredError> {
        let job_id_owned = job_id.to_string();
        self.database()
            .connection()
            .call(
                move |conn| -> Result<Result<Option<JobStatus>, MaitredError>, rusqlite::Error> {
                    let tx = conn.transaction()?;
                    let mut loaded = match load_job_tx(&tx, &job_id_owned)? {
                        Ok(Some(l)) => l,
                        Ok(None) => return Ok(Ok(None)),
                        Err(e) => return Ok(Err(e)),
                    };
                    let now = now_iso();
                    if loaded.job.status.is_terminal() || !loaded.job.is_overdue(&now) {
                        return Ok(Ok(None));
                    }
                    let target = overdue_target(&loaded.job);
                    match transition_tx(&tx, &mut loaded, target, "sweeper", None, &now)? {
                        TransitionOutcome::Applied { status } => {
                            tx.commit()?;
                            Ok(Ok(Some(status)))
                        }
                        _ => Ok(Ok(None)),
                    }
                },
            )
            .await
            .map_err(map_tr_err)?
    }
}

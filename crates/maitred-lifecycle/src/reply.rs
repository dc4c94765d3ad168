// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound merchant replies.
//!
//! A reply arrives as raw text plus the sender's identity, nothing more. It
//! is matched to the newest job awaiting that merchant and routed by the
//! reply-parser collaborator: clear yes/no applies the confirm/decline path,
//! everything else is preserved verbatim for an operator. An ambiguous reply
//! never resolves a job on its own, and it never resets the hold clock.

use tracing::{info, warn};

use maitred_core::time::now_iso;
use maitred_core::{MaitredError, ReplyIntent, UnresolvedReply};
use maitred_idempotency::confirm_key;
use maitred_storage::queries::jobs;
use maitred_storage::map_tr_err;

use crate::engine::LifecycleEngine;
use crate::outcome::{ConfirmOutcome, ReplyOutcome, TransitionOutcome};
use crate::tx::{load_job_tx, persist_job_tx};

impl LifecycleEngine {
    /// Apply a free-text provider reply from `from_identity`.
    pub async fn apply_provider_reply(
        &self,
        raw_text: &str,
        from_identity: &str,
    ) -> Result<ReplyOutcome, MaitredError> {
        let Some(job_id) =
            jobs::latest_awaiting_for_merchant(self.database(), from_identity).await?
        else {
            info!(from_identity, "reply matches no awaiting job");
            return Ok(ReplyOutcome::NoMatchingJob);
        };

        let parsed = self.parser.parse(raw_text);
        info!(
            job_id,
            from_identity,
            intent = %parsed.intent,
            confidence = %parsed.confidence,
            "provider reply parsed"
        );

        match parsed.intent {
            ReplyIntent::Confirm => {
                let key = confirm_key(&job_id, from_identity);
                let outcome = self.confirm_job(&job_id, from_identity, &key).await?;
                Ok(match outcome {
                    ConfirmOutcome::Confirmed { code } => ReplyOutcome::Confirmed { job_id, code },
                    ConfirmOutcome::AlreadyTerminal { status, .. } => {
                        ReplyOutcome::AlreadyTerminal { job_id, status }
                    }
                    ConfirmOutcome::HoldExpired => ReplyOutcome::HoldExpired { job_id },
                    ConfirmOutcome::InvalidTransition { from } => {
                        warn!(job_id, %from, "confirm reply raced an illegal edge");
                        ReplyOutcome::NoMatchingJob
                    }
                    ConfirmOutcome::NotFound => ReplyOutcome::NoMatchingJob,
                })
            }
            ReplyIntent::Reject => {
                let outcome = self
                    .decline_job(&job_id, from_identity, Some(raw_text))
                    .await?;
                Ok(match outcome {
                    TransitionOutcome::Applied { .. } => ReplyOutcome::Declined { job_id },
                    TransitionOutcome::AlreadyTerminal { status } => {
                        ReplyOutcome::AlreadyTerminal { job_id, status }
                    }
                    TransitionOutcome::InvalidTransition { from } => {
                        warn!(job_id, %from, "reject reply raced an illegal edge");
                        ReplyOutcome::NoMatchingJob
                    }
                    TransitionOutcome::NotFound => ReplyOutcome::NoMatchingJob,
                })
            }
            ReplyIntent::NeedMoreInfo | ReplyIntent::RequiresHuman => {
                self.note_unresolved_reply(&job_id, raw_text, from_identity)
                    .await
            }
        }
    }

    /// Store an ambiguous reply for a human: status untouched, one audit row,
    /// operator flag raised. The hold keeps running so an unanswered question
    /// still lands in review or expiry on schedule.
    async fn note_unresolved_reply(
        &self,
        job_id: &str,
        raw_text: &str,
        from_identity: &str,
    ) -> Result<ReplyOutcome, MaitredError> {
        let job_id_owned = job_id.to_string();
        let text = raw_text.to_string();
        let identity = from_identity.to_string();
        let outcome = self
            .database()
            .connection()
            .call(
                move |conn| -> Result<Result<ReplyOutcome, MaitredError>, rusqlite::Error> {
                    let tx = conn.transaction()?;
                    let mut loaded = match load_job_tx(&tx, &job_id_owned)? {
                        Ok(Some(l)) => l,
                        Ok(None) => return Ok(Ok(ReplyOutcome::NoMatchingJob)),
                        Err(e) => return Ok(Err(e)),
                    };
                    let status = loaded.job.status;
                    if status.is_terminal() {
                        return Ok(Ok(ReplyOutcome::AlreadyTerminal {
                            job_id: job_id_owned.clone(),
                            status,
                        }));
                    }
                    let now = now_iso();
                    loaded.job.unresolved_reply = Some(UnresolvedReply {
                        text: text.clone(),
                        from_identity: identity.clone(),
                        received_at: now.clone(),
                    });
                    loaded.job.needs_operator = true;
                    loaded.job.updated_at = now.clone();
                    persist_job_tx(&tx, &loaded)?;
                    jobs::append_audit(
                        &tx,
                        &loaded.job.id,
                        "reply-noted",
                        &identity,
                        Some(&text),
                        &now,
                    )?;
                    tx.commit()?;
                    Ok(Ok(ReplyOutcome::NeedsOperator {
                        job_id: job_id_owned.clone(),
                    }))
                },
            )
            .await
            .map_err(map_tr_err)??;

        if matches!(outcome, ReplyOutcome::NeedsOperator { .. }) {
            info!(job_id, from_identity, "ambiguous reply held for operator");
        }
        Ok(outcome)
    }
}

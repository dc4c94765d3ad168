// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The confirmation gate.
//!
//! When a thread is awaiting a yes/no on a parked action, the gate gets the
//! first look at every inbound message. A clear yes or no runs the parked
//! engine operation and answers in plain language; anything else re-prompts.
//! The gate steps aside (`handled: false`) for what is not its decision:
//! threads in normal state, senders other than the expected one, and pending
//! actions that went stale while nobody was looking.

use std::sync::Arc;

use tracing::{debug, info};

use maitred_config::model::GateConfig;
use maitred_core::time::{now_iso, now_offset_iso};
use maitred_core::{
    AuthContext, JobStatus, MaitredError, MessageDirection, PendingAction, PendingKind, Thread,
    ThreadMessage, ThreadState,
};
use maitred_idempotency::{confirm_key, submit_key};
use maitred_lifecycle::tx::{load_thread_tx, persist_thread_tx};
use maitred_lifecycle::{ConfirmOutcome, LifecycleEngine, TransitionOutcome};
use maitred_storage::map_tr_err;
use maitred_storage::queries::threads;
use maitred_threads::{generate_message_id, is_affirmative, is_negative};

/// What the gate did with one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum GateAction {
    /// The gate did not engage.
    None,
    /// The pending action was stale; cleared so normal processing sees the
    /// message fresh.
    ClearedExpired,
    Confirmed { job_id: String, code: String },
    Declined { job_id: String },
    Submitted { job_id: String },
    Cancelled { job_id: String },
    /// The hold lapsed under the pending action; the job is expired or in
    /// review and the sender was told so.
    Lapsed { job_id: String },
    /// The job had already settled some other way; pending cleared.
    Settled { job_id: String },
    /// The draft is still missing fields; pending kept so a fixed draft can
    /// be approved with another yes.
    Incomplete { job_id: String },
    Reprompted,
}

impl GateAction {
    fn keeps_pending(&self) -> bool {
        matches!(
            self,
            GateAction::Reprompted | GateAction::Incomplete { .. }
        )
    }
}

/// Result of [`ConfirmationGate::handle`]. When `handled` is false the
/// caller routes the message through normal processing.
#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    pub handled: bool,
    pub reply: Option<String>,
    pub action: GateAction,
}

impl GateOutcome {
    fn pass() -> Self {
        Self {
            handled: false,
            reply: None,
            action: GateAction::None,
        }
    }
}

/// Front door for inbound messages on threads that may hold a decision.
pub struct ConfirmationGate {
    engine: Arc<LifecycleEngine>,
    expiry_buffer_secs: i64,
}

impl ConfirmationGate {
    pub fn new(engine: Arc<LifecycleEngine>, config: &GateConfig) -> Self {
        Self {
            engine,
            expiry_buffer_secs: config.expiry_buffer_secs,
        }
    }

    /// Run one inbound message through the gate.
    ///
    /// Engages only when `thread_id` is awaiting confirmation with a pending
    /// action; every other case passes through untouched. Handled messages
    /// and their replies are recorded on the thread.
    pub async fn handle(
        &self,
        thread_id: &str,
        from_actor: &str,
        text: &str,
    ) -> Result<GateOutcome, MaitredError> {
        let Some(thread) = self.load_thread(thread_id).await? else {
            return Ok(GateOutcome::pass());
        };
        if thread.state != ThreadState::AwaitingConfirmation {
            return Ok(GateOutcome::pass());
        }
        let Some(pending) = thread.pending_action.clone() else {
            return Ok(GateOutcome::pass());
        };

        // A pending action that expired more than the buffer ago is moot;
        // within the buffer the engine still gets to answer authoritatively,
        // so a borderline yes produces "that expired" instead of silence.
        let stale_before = now_offset_iso(-self.expiry_buffer_secs);
        if pending.expires_at < stale_before {
            debug!(
                thread_id,
                job_id = %pending.ref_id,
                "pending action went stale, clearing and falling through"
            );
            self.settle(thread_id, true, Vec::new()).await?;
            return Ok(GateOutcome {
                handled: false,
                reply: None,
                action: GateAction::ClearedExpired,
            });
        }

        // The decision belongs to one actor; nobody else's words consume it.
        if pending
            .expected_actor_id
            .as_deref()
            .is_some_and(|expected| expected != from_actor)
        {
            debug!(thread_id, from_actor, "sender is not the expected actor");
            return Ok(GateOutcome::pass());
        }

        let outcome = if is_affirmative(text) {
            self.affirm(&pending, from_actor).await?
        } else if is_negative(text) {
            self.refuse(&pending, from_actor, text).await?
        } else {
            GateOutcome {
                handled: true,
                reply: Some(format!(
                    "just to be sure, is that a yes or a no? still waiting on: {}",
                    pending.summary
                )),
                action: GateAction::Reprompted,
            }
        };

        let now = now_iso();
        let mut messages = vec![ThreadMessage {
            id: generate_message_id(),
            thread_id: thread_id.to_string(),
            direction: MessageDirection::Inbound,
            actor_id: from_actor.to_string(),
            body: text.to_string(),
            created_at: now.clone(),
        }];
        if let Some(reply) = &outcome.reply {
            messages.push(ThreadMessage {
                id: generate_message_id(),
                thread_id: thread_id.to_string(),
                direction: MessageDirection::Outbound,
                actor_id: "maitred".to_string(),
                body: reply.clone(),
                created_at: now,
            });
        }
        self.settle(thread_id, !outcome.action.keeps_pending(), messages)
            .await?;

        info!(
            thread_id,
            from_actor,
            action = ?outcome.action,
            "gate handled inbound message"
        );
        Ok(outcome)
    }

    /// Affirmative path: run the parked operation under its idempotency key.
    async fn affirm(
        &self,
        pending: &PendingAction,
        from_actor: &str,
    ) -> Result<GateOutcome, MaitredError> {
        let job_id = pending.ref_id.clone();
        match pending.kind {
            PendingKind::ConfirmJob => {
                let key = confirm_key(&pending.ref_id, from_actor);
                let outcome = self
                    .engine
                    .confirm_job(&pending.ref_id, from_actor, &key)
                    .await?;
                Ok(match outcome {
                    ConfirmOutcome::Confirmed { code } => GateOutcome {
                        handled: true,
                        reply: Some(format!(
                            "confirmed, thank you. confirmation code {code}."
                        )),
                        action: GateAction::Confirmed { job_id, code },
                    },
                    ConfirmOutcome::HoldExpired => self.lapsed(pending, job_id),
                    ConfirmOutcome::AlreadyTerminal {
                        status: JobStatus::Expired,
                        ..
                    } => self.lapsed(pending, job_id),
                    ConfirmOutcome::AlreadyTerminal { status, code } => {
                        let reply = match code {
                            Some(code) => {
                                format!("that one is already {status}, confirmation code {code}.")
                            }
                            None => format!("that one is already {status}."),
                        };
                        GateOutcome {
                            handled: true,
                            reply: Some(reply),
                            action: GateAction::Settled { job_id },
                        }
                    }
                    ConfirmOutcome::InvalidTransition { .. } | ConfirmOutcome::NotFound => {
                        self.inactive(job_id)
                    }
                })
            }
            PendingKind::SubmitJob => {
                let key = submit_key(&pending.ref_id, from_actor);
                let auth = AuthContext::user(from_actor);
                match self
                    .engine
                    .submit_job(&pending.ref_id, &auth, &key)
                    .await
                {
                    Ok(TransitionOutcome::Applied { .. }) => Ok(GateOutcome {
                        handled: true,
                        reply: Some("locked in, sending it out now.".to_string()),
                        action: GateAction::Submitted { job_id },
                    }),
                    Ok(TransitionOutcome::AlreadyTerminal {
                        status: JobStatus::Expired,
                    }) => Ok(self.lapsed(pending, job_id)),
                    Ok(TransitionOutcome::AlreadyTerminal { status }) => Ok(GateOutcome {
                        handled: true,
                        reply: Some(format!("that one is already {status}.")),
                        action: GateAction::Settled { job_id },
                    }),
                    Ok(TransitionOutcome::InvalidTransition { .. }) => Ok(GateOutcome {
                        handled: true,
                        reply: Some("that one is already in motion.".to_string()),
                        action: GateAction::Settled { job_id },
                    }),
                    Ok(TransitionOutcome::NotFound) => Ok(self.inactive(job_id)),
                    Err(MaitredError::Validation(message)) => Ok(GateOutcome {
                        handled: true,
                        reply: Some(format!("can't send it out yet: {message}")),
                        action: GateAction::Incomplete { job_id },
                    }),
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Negative path: decline a dispatched job, cancel an unsent draft.
    async fn refuse(
        &self,
        pending: &PendingAction,
        from_actor: &str,
        text: &str,
    ) -> Result<GateOutcome, MaitredError> {
        let job_id = pending.ref_id.clone();
        let outcome = match pending.kind {
            PendingKind::ConfirmJob => {
                self.engine
                    .decline_job(&pending.ref_id, from_actor, Some(text))
                    .await?
            }
            PendingKind::SubmitJob => {
                self.engine
                    .cancel_job(&pending.ref_id, &AuthContext::user(from_actor), text)
                    .await?
            }
        };
        Ok(match outcome {
            TransitionOutcome::Applied { .. } => match pending.kind {
                PendingKind::ConfirmJob => GateOutcome {
                    handled: true,
                    reply: Some("understood, marked as declined.".to_string()),
                    action: GateAction::Declined { job_id },
                },
                PendingKind::SubmitJob => GateOutcome {
                    handled: true,
                    reply: Some("cancelled, nothing was sent.".to_string()),
                    action: GateAction::Cancelled { job_id },
                },
            },
            TransitionOutcome::AlreadyTerminal { status } => GateOutcome {
                handled: true,
                reply: Some(format!("that one is already {status}, nothing more needed.")),
                action: GateAction::Settled { job_id },
            },
            TransitionOutcome::InvalidTransition { .. } | TransitionOutcome::NotFound => {
                self.inactive(job_id)
            }
        })
    }

    /// Plain-language reply for a hold that lapsed before the answer landed.
    fn lapsed(&self, pending: &PendingAction, job_id: String) -> GateOutcome {
        GateOutcome {
            handled: true,
            reply: Some(format!(
                "that {} expired, want me to try again?",
                pending.summary
            )),
            action: GateAction::Lapsed { job_id },
        }
    }

    fn inactive(&self, job_id: String) -> GateOutcome {
        GateOutcome {
            handled: true,
            reply: Some("that request is no longer active.".to_string()),
            action: GateAction::Settled { job_id },
        }
    }

    async fn load_thread(&self, thread_id: &str) -> Result<Option<Thread>, MaitredError> {
        let id = thread_id.to_string();
        let loaded = self
            .engine
            .database()
            .connection()
            .call(move |conn| load_thread_tx(conn, &id))
            .await
            .map_err(map_tr_err)??;
        Ok(loaded.map(|l| l.thread))
    }

    /// Write back the thread flip and any recorded messages in one commit.
    async fn settle(
        &self,
        thread_id: &str,
        clear_pending: bool,
        messages: Vec<ThreadMessage>,
    ) -> Result<(), MaitredError> {
        let id = thread_id.to_string();
        self.engine
            .database()
            .connection()
            .call(
                move |conn| -> Result<Result<(), MaitredError>, rusqlite::Error> {
                    let tx = conn.transaction()?;
                    let mut loaded = match load_thread_tx(&tx, &id)? {
                        Ok(Some(l)) => l,
                        Ok(None) => return Ok(Ok(())),
                        Err(e) => return Ok(Err(e)),
                    };
                    if clear_pending {
                        loaded.thread.pending_action = None;
                        loaded.thread.state = ThreadState::Normal;
                    }
                    loaded.thread.updated_at = now_iso();
                    persist_thread_tx(&tx, &loaded)?;
                    for message in &messages {
                        threads::insert_message(&tx, message)?;
                    }
                    tx.commit()?;
                    Ok(Ok(()))
                },
            )
            .await
            .map_err(map_tr_err)?
    }
}

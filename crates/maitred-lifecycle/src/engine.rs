// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The lifecycle engine: the only mutation path for jobs.
//!
//! Every transition re-reads the job inside a SQLite transaction, validates
//! the edge against the status graph, applies it together with exactly one
//! audit row, and commits. Concurrent callers serialize on the transaction;
//! whichever commits first wins and the loser observes the new state. There
//! is no lock anywhere else.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use maitred_config::model::{CounterConfig, HoldConfig};
use maitred_core::time::{now_iso, now_offset_iso};
use maitred_core::{
    ActionType, AuthContext, DispatchEvidence, Job, JobStatus, MaitredError, MerchantTarget,
    NotificationSender, PendingAction, PendingKind, ReplyParser, Role, Thread, ThreadState,
    JOB_SCHEMA_VERSION, THREAD_SCHEMA_VERSION,
};
use maitred_counters::{names, CounterRegistry};
use maitred_idempotency::{self as idempotency, IdempotencyCheck, OpKind};
use maitred_storage::queries::jobs;
use maitred_storage::schema;
use maitred_storage::{map_tr_err, Database, JOBS_COLLECTION};
use maitred_threads::{compute_thread_id, ThreadKey};

use crate::actions::{hold_window_secs, validate_action_data};
use crate::code::generate_confirmation_code;
use crate::outcome::{ConfirmOutcome, DispatchOutcome, ReviewResolution, TransitionOutcome};
use crate::snapshot::{create_price_snapshot, validate_price_immutability};
use crate::tx::{
    load_job_tx, load_thread_tx, overdue_target, persist_job_tx, persist_thread_tx, transition_tx,
    LoadedThread,
};

/// Price terms quoted when a listing is attached to a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub listing_id: String,
    pub amount_minor: i64,
    pub currency: String,
}

/// Inputs for a new draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub action_type: ActionType,
    pub action_data: Value,
    pub merchant_target: Option<MerchantTarget>,
    pub price: Option<PriceQuote>,
}

/// Partial draft update. `action_data` keys are shallow-merged over the
/// stored object; price fields are checked against the captured snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftPatch {
    pub action_data: Option<Value>,
    pub merchant_target: Option<MerchantTarget>,
    pub price: Option<PriceQuote>,
}

/// Result of the dispatch claim transaction.
enum DispatchClaim {
    /// This caller won the edge and owes the single send.
    Claimed(Box<Job>),
    Settled(DispatchOutcome),
}

/// Shared handle over storage and the two outbound collaborators.
///
/// Cheap to clone behind an `Arc`; all state lives in storage.
pub struct LifecycleEngine {
    db: Arc<Database>,
    sender: Arc<dyn NotificationSender>,
    pub(crate) parser: Arc<dyn ReplyParser>,
    counters: Arc<CounterRegistry>,
    holds: HoldConfig,
}

impl LifecycleEngine {
    pub fn new(
        db: Arc<Database>,
        sender: Arc<dyn NotificationSender>,
        parser: Arc<dyn ReplyParser>,
        holds: HoldConfig,
        counters: &CounterConfig,
    ) -> Self {
        let registry = Arc::new(CounterRegistry::new(
            db.connection().clone(),
            counters.default_shards,
        ));
        Self {
            db,
            sender,
            parser,
            counters: registry,
            holds,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn counters(&self) -> &CounterRegistry {
        &self.counters
    }

    /// Create a draft in `collecting` with the action-type hold window.
    ///
    /// Required fields are validated up front; nothing is written for an
    /// incomplete request.
    pub async fn create_job_draft(
        &self,
        request: CreateJobRequest,
        auth: &AuthContext,
    ) -> Result<Job, MaitredError> {
        validate_action_data(request.action_type, &request.action_data)?;

        let now = now_iso();
        let hold_expires_at = now_offset_iso(hold_window_secs(&self.holds, request.action_type));
        let price_snapshot = request
            .price
            .as_ref()
            .map(|q| create_price_snapshot(&q.listing_id, q.amount_minor, &q.currency));
        let job = Job {
            id: format!("job-{}", Uuid::new_v4()),
            status: JobStatus::Collecting,
            action_type: request.action_type,
            action_data: request.action_data,
            owner_user_id: auth.actor_id.clone(),
            merchant_target: request.merchant_target,
            price_snapshot,
            hold_expires_at: Some(hold_expires_at),
            dispatch_evidence: None,
            confirmation_code: None,
            unresolved_reply: None,
            needs_operator: false,
            schema_version: JOB_SCHEMA_VERSION,
            created_at: now.clone(),
            updated_at: now,
        };

        let stored = job.clone();
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                jobs::insert(&tx, &stored)?;
                jobs::append_audit(
                    &tx,
                    &stored.id,
                    "created",
                    &stored.owner_user_id,
                    None,
                    &stored.created_at,
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.counters
            .bump_job_event(names::JOBS_CREATED, &job.id)
            .await;
        info!(job_id = %job.id, action_type = %job.action_type, "job draft created");
        Ok(job)
    }

    /// Patch a draft in `collecting` or `confirming`.
    ///
    /// Not a transition: no audit row, status unchanged. Any price fields on
    /// the patch are checked against the captured snapshot first; a mismatch
    /// rejects the whole patch.
    pub async fn update_job_draft(
        &self,
        job_id: &str,
        patch: DraftPatch,
        auth: &AuthContext,
    ) -> Result<TransitionOutcome, MaitredError> {
        if let Some(data) = &patch.action_data {
            if !data.is_object() {
                return Err(MaitredError::Validation(
                    "action_data patch must be a JSON object".to_string(),
                ));
            }
        }

        let job_id_owned = job_id.to_string();
        let outcome = self
            .db
            .connection()
            .call(
                move |conn| -> Result<Result<TransitionOutcome, MaitredError>, rusqlite::Error> {
                    let tx = conn.transaction()?;
                    let mut loaded = match load_job_tx(&tx, &job_id_owned)? {
                        Ok(Some(l)) => l,
                        Ok(None) => return Ok(Ok(TransitionOutcome::NotFound)),
                        Err(e) => return Ok(Err(e)),
                    };
                    let status = loaded.job.status;
                    if status.is_terminal() {
                        return Ok(Ok(TransitionOutcome::AlreadyTerminal { status }));
                    }
                    if !matches!(status, JobStatus::Collecting | JobStatus::Confirming) {
                        return Ok(Ok(TransitionOutcome::InvalidTransition { from: status }));
                    }

                    if let Some(quote) = &patch.price {
                        match &loaded.job.price_snapshot {
                            Some(existing) => {
                                if let Err(e) = validate_price_immutability(
                                    &loaded.job.id,
                                    existing,
                                    Some(quote.amount_minor),
                                    Some(&quote.currency),
                                ) {
                                    return Ok(Err(e));
                                }
                                // Same terms re-quoted: the original capture stands.
                            }
                            None => {
                                loaded.job.price_snapshot = Some(create_price_snapshot(
                                    &quote.listing_id,
                                    quote.amount_minor,
                                    &quote.currency,
                                ));
                            }
                        }
                    }
                    if let Some(data) = &patch.action_data {
                        if let (Some(existing), Some(incoming)) =
                            (loaded.job.action_data.as_object_mut(), data.as_object())
                        {
                            for (key, value) in incoming {
                                existing.insert(key.clone(), value.clone());
                            }
                        }
                    }
                    if let Some(target) = patch.merchant_target {
                        loaded.job.merchant_target = Some(target);
                    }
                    loaded.job.updated_at = now_iso();
                    persist_job_tx(&tx, &loaded)?;
                    tx.commit()?;
                    Ok(Ok(TransitionOutcome::Applied { status }))
                },
            )
            .await
            .map_err(map_tr_err)??;

        if matches!(outcome, TransitionOutcome::Applied { .. }) {
            debug!(job_id, actor = %auth.actor_id, "draft updated");
        }
        Ok(outcome)
    }

    /// `collecting -> confirming` after re-checking required fields.
    pub async fn submit_job(
        &self,
        job_id: &str,
        auth: &AuthContext,
        idempotency_key: &str,
    ) -> Result<TransitionOutcome, MaitredError> {
        if let IdempotencyCheck::Duplicate { cached } =
            idempotency::check(&self.db, idempotency_key).await
        {
            if let Some(value) = cached {
                match serde_json::from_value::<TransitionOutcome>(value) {
                    Ok(outcome) => {
                        info!(job_id, key = idempotency_key, "duplicate submit suppressed");
                        return Ok(outcome);
                    }
                    Err(e) => {
                        warn!(key = idempotency_key, error = %e, "cached submit outcome undecodable, re-running");
                    }
                }
            }
        }

        let job_id_owned = job_id.to_string();
        let actor = auth.actor_id.clone();
        let outcome = self
            .db
            .connection()
            .call(
                move |conn| -> Result<Result<TransitionOutcome, MaitredError>, rusqlite::Error> {
                    let tx = conn.transaction()?;
                    let mut loaded = match load_job_tx(&tx, &job_id_owned)? {
                        Ok(Some(l)) => l,
                        Ok(None) => return Ok(Ok(TransitionOutcome::NotFound)),
                        Err(e) => return Ok(Err(e)),
                    };
                    if let Err(e) =
                        validate_action_data(loaded.job.action_type, &loaded.job.action_data)
                    {
                        return Ok(Err(e));
                    }
                    let outcome = transition_tx(
                        &tx,
                        &mut loaded,
                        JobStatus::Confirming,
                        &actor,
                        None,
                        &now_iso(),
                    )?;
                    if matches!(outcome, TransitionOutcome::Applied { .. }) {
                        tx.commit()?;
                    }
                    Ok(Ok(outcome))
                },
            )
            .await
            .map_err(map_tr_err)??;

        // Only settled outcomes are worth replaying; a validation failure or
        // illegal edge may be legal on a later attempt under the same key.
        if matches!(
            outcome,
            TransitionOutcome::Applied { .. } | TransitionOutcome::AlreadyTerminal { .. }
        ) {
            let cached = serde_json::to_value(&outcome)
                .map_err(|e| MaitredError::Internal(format!("submit outcome failed to encode: {e}")))?;
            idempotency::record(&self.db, idempotency_key, OpKind::UserApi, Some(cached)).await?;
        }
        if matches!(outcome, TransitionOutcome::Applied { .. }) {
            info!(job_id, actor = %auth.actor_id, "job submitted for dispatch");
        }
        Ok(outcome)
    }

    /// Dispatch a complete draft to its merchant target.
    ///
    /// Three phases: the claim transaction takes the `-> dispatched` edge
    /// (losing a race means no send at all), then exactly one send through
    /// the notification collaborator, then a second write records the
    /// evidence and parks a pending confirmation on the merchant's dispatch
    /// thread. A failed send leaves the job `dispatched` with
    /// `delivered: false` evidence; it is never retried here.
    pub async fn dispatch_job(
        &self,
        job_id: &str,
        auth: &AuthContext,
    ) -> Result<DispatchOutcome, MaitredError> {
        let Some(job) = self.get_job(job_id).await? else {
            return Ok(DispatchOutcome::NotFound);
        };
        let Some(target) = job.merchant_target.clone() else {
            return Err(MaitredError::Validation(format!(
                "job {job_id} has no merchant target to dispatch"
            )));
        };
        authorize_dispatch(job_id, &target, auth)?;

        let job_id_owned = job_id.to_string();
        let actor = auth.actor_id.clone();
        let claim = self
            .db
            .connection()
            .call(
                move |conn| -> Result<Result<DispatchClaim, MaitredError>, rusqlite::Error> {
                    let tx = conn.transaction()?;
                    let mut loaded = match load_job_tx(&tx, &job_id_owned)? {
                        Ok(Some(l)) => l,
                        Ok(None) => {
                            return Ok(Ok(DispatchClaim::Settled(DispatchOutcome::NotFound)))
                        }
                        Err(e) => return Ok(Err(e)),
                    };
                    let from = loaded.job.status;
                    if from == JobStatus::Dispatched {
                        return Ok(Ok(DispatchClaim::Settled(DispatchOutcome::AlreadyDispatched)));
                    }
                    if from.is_terminal() {
                        return Ok(Ok(DispatchClaim::Settled(DispatchOutcome::AlreadyTerminal {
                            status: from,
                        })));
                    }
                    // The fast path dispatches straight out of `collecting`,
                    // so completeness is re-checked on the committed copy.
                    if let Err(e) =
                        validate_action_data(loaded.job.action_type, &loaded.job.action_data)
                    {
                        return Ok(Err(e));
                    }
                    if loaded.job.merchant_target.is_none() {
                        return Ok(Err(MaitredError::Validation(format!(
                            "job {} has no merchant target to dispatch",
                            loaded.job.id
                        ))));
                    }
                    match transition_tx(
                        &tx,
                        &mut loaded,
                        JobStatus::Dispatched,
                        &actor,
                        None,
                        &now_iso(),
                    )? {
                        TransitionOutcome::Applied { .. } => {
                            tx.commit()?;
                            Ok(Ok(DispatchClaim::Claimed(Box::new(loaded.job))))
                        }
                        TransitionOutcome::InvalidTransition { from } => Ok(Ok(
                            DispatchClaim::Settled(DispatchOutcome::InvalidTransition { from }),
                        )),
                        TransitionOutcome::AlreadyTerminal { status } => Ok(Ok(
                            DispatchClaim::Settled(DispatchOutcome::AlreadyTerminal { status }),
                        )),
                        TransitionOutcome::NotFound => {
                            Ok(Ok(DispatchClaim::Settled(DispatchOutcome::NotFound)))
                        }
                    }
                },
            )
            .await
            .map_err(map_tr_err)??;

        let job = match claim {
            DispatchClaim::Settled(outcome) => return Ok(outcome),
            DispatchClaim::Claimed(job) => *job,
        };
        self.counters
            .bump_job_event(names::JOBS_DISPATCHED, job_id)
            .await;

        let sent_at = now_iso();
        let evidence = match self.sender.send(&job, &target).await {
            Ok(send) => DispatchEvidence {
                channel: send.channel,
                message_id: send.message_id,
                sent_at,
                delivered: send.delivered,
                failure_reason: send.failure_reason,
            },
            Err(e) => {
                warn!(job_id, error = %e, "dispatch send failed");
                DispatchEvidence {
                    channel: "unknown".to_string(),
                    message_id: None,
                    sent_at,
                    delivered: false,
                    failure_reason: Some(e.to_string()),
                }
            }
        };
        let delivered = evidence.delivered;

        let thread_key = ThreadKey::dispatch(
            target.merchant_ref().to_string(),
            match &target {
                MerchantTarget::Listed { business_id } => Some(business_id.clone()),
                MerchantTarget::Unlisted { .. } => None,
            },
        );
        let thread_id = compute_thread_id(&thread_key)?;
        let pending = PendingAction {
            kind: PendingKind::ConfirmJob,
            ref_id: job.id.clone(),
            expires_at: job
                .hold_expires_at
                .clone()
                .unwrap_or_else(|| evidence.sent_at.clone()),
            summary: format!("{} request {}", job.action_type, job.id),
            expected_actor_id: Some(target.merchant_ref().to_string()),
            created_at: evidence.sent_at.clone(),
        };

        let job_id_owned = job_id.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<Result<(), MaitredError>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let mut loaded = match load_job_tx(&tx, &job_id_owned)? {
                    Ok(Some(l)) => l,
                    Ok(None) => return Ok(Ok(())),
                    Err(e) => return Ok(Err(e)),
                };
                let now = now_iso();
                loaded.job.dispatch_evidence = Some(evidence);
                loaded.job.updated_at = now.clone();
                persist_job_tx(&tx, &loaded)?;
                // A merchant can only answer a message that arrived; parking
                // a confirmation on a failed send would have the gate prompt
                // about a question nobody received.
                if delivered {
                    if let Err(e) = park_pending_tx(&tx, &thread_id, &thread_key, pending, &now)? {
                        return Ok(Err(e));
                    }
                }
                tx.commit()?;
                Ok(Ok(()))
            })
            .await
            .map_err(map_tr_err)??;

        info!(job_id, delivered, "job dispatched");
        Ok(DispatchOutcome::Dispatched { delivered })
    }

    /// Merchant (or operator) confirmation of a dispatched job.
    ///
    /// The idempotency key makes retried calls return the first outcome
    /// verbatim; the transaction makes concurrent first calls race safely.
    /// A confirm that arrives after the hold lapsed applies the expiry edge
    /// itself rather than waiting for the sweeper.
    pub async fn confirm_job(
        &self,
        job_id: &str,
        actor: &str,
        idempotency_key: &str,
    ) -> Result<ConfirmOutcome, MaitredError> {
        if let IdempotencyCheck::Duplicate { cached } =
            idempotency::check(&self.db, idempotency_key).await
        {
            if let Some(value) = cached {
                match serde_json::from_value::<ConfirmOutcome>(value) {
                    Ok(outcome) => {
                        info!(job_id, key = idempotency_key, "duplicate confirm suppressed");
                        return Ok(outcome);
                    }
                    Err(e) => {
                        warn!(key = idempotency_key, error = %e, "cached confirm outcome undecodable, re-running");
                    }
                }
            }
            // A duplicate without a payload falls through: the transaction
            // finds the job terminal and answers already-terminal.
        }

        let job_id_owned = job_id.to_string();
        let actor_owned = actor.to_string();
        let (outcome, applied) = self
            .db
            .connection()
            .call(
                move |conn| -> Result<
                    Result<(ConfirmOutcome, Option<JobStatus>), MaitredError>,
                    rusqlite::Error,
                > {
                    let tx = conn.transaction()?;
                    let mut loaded = match load_job_tx(&tx, &job_id_owned)? {
                        Ok(Some(l)) => l,
                        Ok(None) => return Ok(Ok((ConfirmOutcome::NotFound, None))),
                        Err(e) => return Ok(Err(e)),
                    };
                    let now = now_iso();
                    let from = loaded.job.status;
                    if from.is_terminal() {
                        return Ok(Ok((
                            ConfirmOutcome::AlreadyTerminal {
                                status: from,
                                code: loaded.job.confirmation_code.clone(),
                            },
                            None,
                        )));
                    }
                    // `timeout-review` jobs are already past their hold; a
                    // late confirm there is exactly the evidence the review
                    // was waiting for, so only still-pending holds lapse.
                    if from != JobStatus::TimeoutReview && loaded.job.is_overdue(&now) {
                        let target = overdue_target(&loaded.job);
                        if let TransitionOutcome::Applied { status } = transition_tx(
                            &tx,
                            &mut loaded,
                            target,
                            "system",
                            Some("hold lapsed before confirmation"),
                            &now,
                        )? {
                            tx.commit()?;
                            return Ok(Ok((ConfirmOutcome::HoldExpired, Some(status))));
                        }
                        return Ok(Ok((ConfirmOutcome::InvalidTransition { from }, None)));
                    }

                    let code = generate_confirmation_code();
                    loaded.job.confirmation_code = Some(code.clone());
                    loaded.job.needs_operator = false;
                    match transition_tx(
                        &tx,
                        &mut loaded,
                        JobStatus::Confirmed,
                        &actor_owned,
                        None,
                        &now,
                    )? {
                        TransitionOutcome::Applied { status } => {
                            tx.commit()?;
                            Ok(Ok((ConfirmOutcome::Confirmed { code }, Some(status))))
                        }
                        TransitionOutcome::InvalidTransition { from } => {
                            Ok(Ok((ConfirmOutcome::InvalidTransition { from }, None)))
                        }
                        TransitionOutcome::AlreadyTerminal { status } => Ok(Ok((
                            ConfirmOutcome::AlreadyTerminal { status, code: None },
                            None,
                        ))),
                        TransitionOutcome::NotFound => Ok(Ok((ConfirmOutcome::NotFound, None))),
                    }
                },
            )
            .await
            .map_err(map_tr_err)??;

        match applied {
            Some(JobStatus::Confirmed) => {
                self.counters
                    .bump_job_event(names::JOBS_CONFIRMED, job_id)
                    .await;
                info!(job_id, actor, "job confirmed");
            }
            Some(JobStatus::Expired) => {
                self.counters
                    .bump_job_event(names::JOBS_EXPIRED, job_id)
                    .await;
                info!(job_id, actor, "confirm arrived after hold expiry");
            }
            Some(JobStatus::TimeoutReview) => {
                self.counters
                    .bump_job_event(names::JOBS_REVIEW, job_id)
                    .await;
                info!(job_id, actor, "overdue job routed to review on confirm");
            }
            _ => {}
        }

        if matches!(
            outcome,
            ConfirmOutcome::Confirmed { .. }
                | ConfirmOutcome::AlreadyTerminal { .. }
                | ConfirmOutcome::HoldExpired
        ) {
            let cached = serde_json::to_value(&outcome)
                .map_err(|e| MaitredError::Internal(format!("confirm outcome failed to encode: {e}")))?;
            idempotency::record(
                &self.db,
                idempotency_key,
                OpKind::JobTransition,
                Some(cached),
            )
            .await?;
        }
        Ok(outcome)
    }

    /// Merchant refusal: `dispatched | timeout-review -> declined`.
    pub async fn decline_job(
        &self,
        job_id: &str,
        actor: &str,
        note: Option<&str>,
    ) -> Result<TransitionOutcome, MaitredError> {
        let outcome = self
            .simple_transition(
                job_id,
                JobStatus::Declined,
                actor.to_string(),
                note.map(str::to_string),
            )
            .await?;
        if matches!(outcome, TransitionOutcome::Applied { .. }) {
            self.counters
                .bump_job_event(names::JOBS_DECLINED, job_id)
                .await;
            info!(job_id, actor, "job declined");
        }
        Ok(outcome)
    }

    /// Owner or operator withdrawal from any non-terminal state.
    pub async fn cancel_job(
        &self,
        job_id: &str,
        auth: &AuthContext,
        reason: &str,
    ) -> Result<TransitionOutcome, MaitredError> {
        let job_id_owned = job_id.to_string();
        let actor = auth.actor_id.clone();
        let role = auth.role;
        let reason_owned = reason.to_string();
        let outcome = self
            .db
            .connection()
            .call(
                move |conn| -> Result<Result<TransitionOutcome, MaitredError>, rusqlite::Error> {
                    let tx = conn.transaction()?;
                    let mut loaded = match load_job_tx(&tx, &job_id_owned)? {
                        Ok(Some(l)) => l,
                        Ok(None) => return Ok(Ok(TransitionOutcome::NotFound)),
                        Err(e) => return Ok(Err(e)),
                    };
                    if role != Role::Operator && loaded.job.owner_user_id != actor {
                        return Ok(Err(MaitredError::Unauthorized(format!(
                            "{actor} is neither the owner of {job_id_owned} nor an operator"
                        ))));
                    }
                    let outcome = transition_tx(
                        &tx,
                        &mut loaded,
                        JobStatus::Cancelled,
                        &actor,
                        Some(&reason_owned),
                        &now_iso(),
                    )?;
                    if matches!(outcome, TransitionOutcome::Applied { .. }) {
                        tx.commit()?;
                    }
                    Ok(Ok(outcome))
                },
            )
            .await
            .map_err(map_tr_err)??;

        if matches!(outcome, TransitionOutcome::Applied { .. }) {
            self.counters
                .bump_job_event(names::JOBS_CANCELLED, job_id)
                .await;
            info!(job_id, actor = %auth.actor_id, reason, "job cancelled");
        }
        Ok(outcome)
    }

    /// Unrecoverable processing error: any non-terminal state -> `failed`.
    pub async fn fail_job(
        &self,
        job_id: &str,
        reason: &str,
    ) -> Result<TransitionOutcome, MaitredError> {
        let outcome = self
            .simple_transition(
                job_id,
                JobStatus::Failed,
                "system".to_string(),
                Some(reason.to_string()),
            )
            .await?;
        if matches!(outcome, TransitionOutcome::Applied { .. }) {
            self.counters
                .bump_job_event(names::JOBS_FAILED, job_id)
                .await;
            warn!(job_id, reason, "job failed");
        }
        Ok(outcome)
    }

    /// Operator decision on a `timeout-review` job.
    pub async fn resolve_review(
        &self,
        job_id: &str,
        resolution: ReviewResolution,
        auth: &AuthContext,
    ) -> Result<TransitionOutcome, MaitredError> {
        if auth.role != Role::Operator {
            return Err(MaitredError::Unauthorized(format!(
                "review resolution requires the operator role, got {}",
                auth.role
            )));
        }

        let job_id_owned = job_id.to_string();
        let actor = auth.actor_id.clone();
        let outcome = self
            .db
            .connection()
            .call(
                move |conn| -> Result<Result<TransitionOutcome, MaitredError>, rusqlite::Error> {
                    let tx = conn.transaction()?;
                    let mut loaded = match load_job_tx(&tx, &job_id_owned)? {
                        Ok(Some(l)) => l,
                        Ok(None) => return Ok(Ok(TransitionOutcome::NotFound)),
                        Err(e) => return Ok(Err(e)),
                    };
                    let from = loaded.job.status;
                    if from.is_terminal() {
                        return Ok(Ok(TransitionOutcome::AlreadyTerminal { status: from }));
                    }
                    if from != JobStatus::TimeoutReview {
                        return Ok(Ok(TransitionOutcome::InvalidTransition { from }));
                    }
                    if resolution == ReviewResolution::Confirm {
                        loaded.job.confirmation_code = Some(generate_confirmation_code());
                    }
                    loaded.job.needs_operator = false;
                    let outcome = transition_tx(
                        &tx,
                        &mut loaded,
                        resolution.target(),
                        &actor,
                        None,
                        &now_iso(),
                    )?;
                    if matches!(outcome, TransitionOutcome::Applied { .. }) {
                        tx.commit()?;
                    }
                    Ok(Ok(outcome))
                },
            )
            .await
            .map_err(map_tr_err)??;

        if let TransitionOutcome::Applied { status } = outcome {
            let counter = match status {
                JobStatus::Confirmed => names::JOBS_CONFIRMED,
                JobStatus::Declined => names::JOBS_DECLINED,
                JobStatus::Expired => names::JOBS_EXPIRED,
                _ => names::JOBS_CANCELLED,
            };
            self.counters.bump_job_event(counter, job_id).await;
            info!(job_id, actor = %auth.actor_id, resolution = %status, "review resolved");
        }
        Ok(outcome)
    }

    /// Read one job through the tolerant reader. Never writes, even when the
    /// stored document needed upgrading.
    pub async fn get_job(&self, job_id: &str) -> Result<Option<Job>, MaitredError> {
        let Some(doc) = jobs::get_doc(&self.db, job_id).await? else {
            return Ok(None);
        };
        let migrated = schema::migrate_to_current(JOBS_COLLECTION, doc)?;
        let job = serde_json::from_value(migrated.doc).map_err(|e| {
            MaitredError::Internal(format!("job {job_id} document failed to decode: {e}"))
        })?;
        Ok(Some(job))
    }

    /// One-edge transition with no extra checks beyond the graph.
    async fn simple_transition(
        &self,
        job_id: &str,
        next: JobStatus,
        actor: String,
        note: Option<String>,
    ) -> Result<TransitionOutcome, MaitredError> {
        let job_id_owned = job_id.to_string();
        self.db
            .connection()
            .call(
                move |conn| -> Result<Result<TransitionOutcome, MaitredError>, rusqlite::Error> {
                    let tx = conn.transaction()?;
                    let mut loaded = match load_job_tx(&tx, &job_id_owned)? {
                        Ok(Some(l)) => l,
                        Ok(None) => return Ok(Ok(TransitionOutcome::NotFound)),
                        Err(e) => return Ok(Err(e)),
                    };
                    let outcome = transition_tx(
                        &tx,
                        &mut loaded,
                        next,
                        &actor,
                        note.as_deref(),
                        &now_iso(),
                    )?;
                    if matches!(outcome, TransitionOutcome::Applied { .. }) {
                        tx.commit()?;
                    }
                    Ok(Ok(outcome))
                },
            )
            .await
            .map_err(map_tr_err)?
    }
}

/// Listed targets are merchant-scoped: operators and agents pass, merchants
/// must carry the matching `business_id`, plain users are refused. Unlisted
/// targets have no business to scope to.
fn authorize_dispatch(
    job_id: &str,
    target: &MerchantTarget,
    auth: &AuthContext,
) -> Result<(), MaitredError> {
    let MerchantTarget::Listed { business_id } = target else {
        return Ok(());
    };
    match auth.role {
        Role::Operator | Role::Agent => Ok(()),
        Role::Merchant if auth.business_id.as_deref() == Some(business_id.as_str()) => Ok(()),
        Role::Merchant => Err(MaitredError::Unauthorized(format!(
            "merchant {} is not scoped to business {business_id} for job {job_id}",
            auth.actor_id
        ))),
        Role::User => Err(MaitredError::Unauthorized(format!(
            "user {} cannot dispatch job {job_id} to listed business {business_id}",
            auth.actor_id
        ))),
    }
}

/// Flip the merchant dispatch thread to `awaiting-confirmation`, creating it
/// on first contact. Runs inside the evidence-write transaction.
fn park_pending_tx(
    conn: &rusqlite::Connection,
    thread_id: &str,
    key: &ThreadKey,
    pending: PendingAction,
    now: &str,
) -> Result<Result<(), MaitredError>, rusqlite::Error> {
    let mut loaded = match load_thread_tx(conn, thread_id)? {
        Ok(Some(l)) => l,
        Ok(None) => LoadedThread {
            thread: Thread {
                id: thread_id.to_string(),
                thread_type: key.thread_type,
                actor_id: key.actor_id.clone(),
                business_id: key.business_id.clone(),
                state: ThreadState::Normal,
                pending_action: None,
                schema_version: THREAD_SCHEMA_VERSION,
                created_at: now.to_string(),
                updated_at: now.to_string(),
            },
            from_version: THREAD_SCHEMA_VERSION,
            migrated: false,
        },
        Err(e) => return Ok(Err(e)),
    };
    loaded.thread.state = ThreadState::AwaitingConfirmation;
    loaded.thread.pending_action = Some(pending);
    loaded.thread.updated_at = now.to_string();
    persist_thread_tx(conn, &loaded)?;
    Ok(Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    use maitred_core::SendOutcome;
    use maitred_storage::queries::threads;
    use maitred_threads::KeywordReplyParser;

    #[derive(Clone, Copy)]
    enum SendMode {
        Deliver,
        FailDelivery,
        Error,
    }

    struct RecordingSender {
        sent: Mutex<Vec<String>>,
        mode: SendMode,
    }

    #[async_trait]
    impl NotificationSender for RecordingSender {
        async fn send(
            &self,
            job: &Job,
            _target: &MerchantTarget,
        ) -> Result<SendOutcome, MaitredError> {
            self.sent.lock().unwrap().push(job.id.clone());
            match self.mode {
                SendMode::Deliver => Ok(SendOutcome {
                    delivered: true,
                    message_id: Some(format!("wamid-{}", job.id)),
                    channel: "chat".to_string(),
                    failure_reason: None,
                }),
                SendMode::FailDelivery => Ok(SendOutcome {
                    delivered: false,
                    message_id: None,
                    channel: "chat".to_string(),
                    failure_reason: Some("recipient unreachable".to_string()),
                }),
                SendMode::Error => Err(MaitredError::Notification {
                    message: "gateway returned 500".to_string(),
                    source: None,
                }),
            }
        }
    }

    struct TestEngine {
        engine: LifecycleEngine,
        sender: Arc<RecordingSender>,
        _dir: tempfile::TempDir,
    }

    async fn test_engine(holds: HoldConfig, mode: SendMode) -> TestEngine {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Arc::new(Database::open(path.to_str().unwrap()).await.unwrap());
        let sender = Arc::new(RecordingSender {
            sent: Mutex::new(Vec::new()),
            mode,
        });
        let engine = LifecycleEngine::new(
            db,
            sender.clone(),
            Arc::new(KeywordReplyParser),
            holds,
            &CounterConfig::default(),
        );
        TestEngine {
            engine,
            sender,
            _dir: dir,
        }
    }

    fn lapsed_holds() -> HoldConfig {
        HoldConfig {
            taxi_secs: -60,
            reservation_secs: -60,
            activity_secs: -60,
            experience_secs: -60,
            supplies_secs: -60,
        }
    }

    fn taxi_request(target: Option<MerchantTarget>) -> CreateJobRequest {
        CreateJobRequest {
            action_type: ActionType::Taxi,
            action_data: json!({"pickup": "Pier 7", "dropoff": "Hotel Mar"}),
            merchant_target: target,
            price: None,
        }
    }

    fn unlisted() -> MerchantTarget {
        MerchantTarget::Unlisted {
            name: "Harbor Cabs".to_string(),
            phone: "+15550001111".to_string(),
        }
    }

    async fn seed_job(engine: &LifecycleEngine, job: Job) {
        engine
            .database()
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                jobs::insert(conn, &job)
            })
            .await
            .unwrap();
    }

    fn review_job(id: &str) -> Job {
        let now = now_iso();
        Job {
            id: id.to_string(),
            status: JobStatus::TimeoutReview,
            action_type: ActionType::Taxi,
            action_data: json!({"pickup": "a", "dropoff": "b"}),
            owner_user_id: "user-1".to_string(),
            merchant_target: Some(unlisted()),
            price_snapshot: None,
            hold_expires_at: Some("2020-01-01T00:00:00.000Z".to_string()),
            dispatch_evidence: None,
            confirmation_code: None,
            unresolved_reply: None,
            needs_operator: true,
            schema_version: JOB_SCHEMA_VERSION,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn incomplete_draft_is_rejected_without_a_write() {
        let t = test_engine(HoldConfig::default(), SendMode::Deliver).await;
        let request = CreateJobRequest {
            action_type: ActionType::Taxi,
            action_data: json!({"pickup": "Pier 7"}),
            merchant_target: None,
            price: None,
        };
        let err = t
            .engine
            .create_job_draft(request, &AuthContext::user("user-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, MaitredError::Validation(_)));
        assert!(err.to_string().contains("dropoff"));

        let counts = jobs::status_counts(t.engine.database()).await.unwrap();
        assert!(counts.is_empty());
    }

    #[tokio::test]
    async fn create_seeds_audit_and_counter() {
        let t = test_engine(HoldConfig::default(), SendMode::Deliver).await;
        let job = t
            .engine
            .create_job_draft(taxi_request(None), &AuthContext::user("user-1"))
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Collecting);
        assert!(job.hold_expires_at.is_some());

        let audit = jobs::get_audit(t.engine.database(), &job.id).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].transition, "created");
        assert_eq!(audit[0].actor, "user-1");

        let total = t
            .engine
            .counters()
            .total(names::JOBS_CREATED)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(total.total, 1);
    }

    #[tokio::test]
    async fn draft_patch_merges_fields_and_guards_the_snapshot() {
        let t = test_engine(HoldConfig::default(), SendMode::Deliver).await;
        let auth = AuthContext::user("user-1");
        let request = CreateJobRequest {
            price: Some(PriceQuote {
                listing_id: "listing-9".to_string(),
                amount_minor: 4_500,
                currency: "USD".to_string(),
            }),
            ..taxi_request(None)
        };
        let job = t.engine.create_job_draft(request, &auth).await.unwrap();
        let captured = job.price_snapshot.clone().unwrap();

        // Re-quoting identical terms passes and keeps the original capture.
        let patch = DraftPatch {
            price: Some(PriceQuote {
                listing_id: "listing-9".to_string(),
                amount_minor: 4_500,
                currency: "USD".to_string(),
            }),
            ..DraftPatch::default()
        };
        let outcome = t.engine.update_job_draft(&job.id, patch, &auth).await.unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::Applied {
                status: JobStatus::Collecting
            }
        );

        // A different amount is tampering; the whole patch is rejected.
        let patch = DraftPatch {
            action_data: Some(json!({"dropoff": "Airport"})),
            price: Some(PriceQuote {
                listing_id: "listing-9".to_string(),
                amount_minor: 9_900,
                currency: "USD".to_string(),
            }),
            ..DraftPatch::default()
        };
        let err = t
            .engine
            .update_job_draft(&job.id, patch, &auth)
            .await
            .unwrap_err();
        assert!(matches!(err, MaitredError::PriceTamper { .. }));
        let stored = t.engine.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.price_snapshot.unwrap(), captured);
        assert_eq!(stored.action_data["dropoff"], "Hotel Mar");

        // A plain field patch merges shallowly.
        let patch = DraftPatch {
            action_data: Some(json!({"dropoff": "Airport"})),
            ..DraftPatch::default()
        };
        t.engine.update_job_draft(&job.id, patch, &auth).await.unwrap();
        let stored = t.engine.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.action_data["dropoff"], "Airport");
        assert_eq!(stored.action_data["pickup"], "Pier 7");
        assert_eq!(stored.status, JobStatus::Collecting);
    }

    #[tokio::test]
    async fn submit_rechecks_completeness_and_suppresses_duplicates() {
        let t = test_engine(HoldConfig::default(), SendMode::Deliver).await;
        let auth = AuthContext::user("user-1");
        let job = t
            .engine
            .create_job_draft(taxi_request(None), &auth)
            .await
            .unwrap();

        // Null out a required field after creation; submit must refuse.
        let patch = DraftPatch {
            action_data: Some(json!({"dropoff": null})),
            ..DraftPatch::default()
        };
        t.engine.update_job_draft(&job.id, patch, &auth).await.unwrap();
        let err = t
            .engine
            .submit_job(&job.id, &auth, "submit-key-1")
            .await
            .unwrap_err();
        assert!(matches!(err, MaitredError::Validation(_)));

        let patch = DraftPatch {
            action_data: Some(json!({"dropoff": "Hotel Mar"})),
            ..DraftPatch::default()
        };
        t.engine.update_job_draft(&job.id, patch, &auth).await.unwrap();
        let outcome = t
            .engine
            .submit_job(&job.id, &auth, "submit-key-1")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::Applied {
                status: JobStatus::Confirming
            }
        );

        // Same key again: cached outcome, no second audit row.
        let duplicate = t
            .engine
            .submit_job(&job.id, &auth, "submit-key-1")
            .await
            .unwrap();
        assert_eq!(duplicate, outcome);
        let audit = jobs::get_audit(t.engine.database(), &job.id).await.unwrap();
        assert_eq!(audit.len(), 2);
    }

    #[tokio::test]
    async fn dispatch_claims_the_edge_sends_once_and_parks_the_thread() {
        let t = test_engine(HoldConfig::default(), SendMode::Deliver).await;
        let job = t
            .engine
            .create_job_draft(taxi_request(Some(unlisted())), &AuthContext::user("user-1"))
            .await
            .unwrap();

        let outcome = t
            .engine
            .dispatch_job(&job.id, &AuthContext::agent("concierge"))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Dispatched { delivered: true });

        let stored = t.engine.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Dispatched);
        let evidence = stored.dispatch_evidence.unwrap();
        assert!(evidence.delivered);
        assert_eq!(evidence.channel, "chat");
        assert!(evidence.message_id.unwrap().starts_with("wamid-"));

        let thread_id =
            compute_thread_id(&ThreadKey::dispatch("+15550001111", None)).unwrap();
        let doc = threads::get_doc(t.engine.database(), &thread_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["state"], "awaiting-confirmation");
        assert_eq!(doc["pending_action"]["kind"], "confirm-job");
        assert_eq!(doc["pending_action"]["ref_id"], job.id);
        assert_eq!(doc["pending_action"]["expected_actor_id"], "+15550001111");

        // Re-dispatch: the claim is already taken, nothing is re-sent.
        let again = t
            .engine
            .dispatch_job(&job.id, &AuthContext::agent("concierge"))
            .await
            .unwrap();
        assert_eq!(again, DispatchOutcome::AlreadyDispatched);
        assert_eq!(t.sender.sent.lock().unwrap().len(), 1);

        let total = t
            .engine
            .counters()
            .total(names::JOBS_DISPATCHED)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(total.total, 1);
    }

    #[tokio::test]
    async fn dispatch_to_listed_business_is_merchant_scoped() {
        let t = test_engine(HoldConfig::default(), SendMode::Deliver).await;
        let listed = MerchantTarget::Listed {
            business_id: "biz-1".to_string(),
        };
        let job = t
            .engine
            .create_job_draft(taxi_request(Some(listed)), &AuthContext::user("user-1"))
            .await
            .unwrap();

        let err = t
            .engine
            .dispatch_job(&job.id, &AuthContext::user("user-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, MaitredError::Unauthorized(_)));

        let err = t
            .engine
            .dispatch_job(&job.id, &AuthContext::merchant("staff-2", "biz-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, MaitredError::Unauthorized(_)));
        assert!(t.sender.sent.lock().unwrap().is_empty());

        let outcome = t
            .engine
            .dispatch_job(&job.id, &AuthContext::merchant("staff-1", "biz-1"))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Dispatched { delivered: true });
    }

    #[tokio::test]
    async fn failed_send_keeps_the_job_dispatched_with_evidence() {
        let t = test_engine(HoldConfig::default(), SendMode::Error).await;
        let job = t
            .engine
            .create_job_draft(taxi_request(Some(unlisted())), &AuthContext::user("user-1"))
            .await
            .unwrap();
        let outcome = t
            .engine
            .dispatch_job(&job.id, &AuthContext::agent("concierge"))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Dispatched { delivered: false });

        let stored = t.engine.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Dispatched);
        let evidence = stored.dispatch_evidence.unwrap();
        assert!(!evidence.delivered);
        assert!(evidence.failure_reason.unwrap().contains("gateway"));

        // No pending confirmation for a message nobody received.
        let thread_id =
            compute_thread_id(&ThreadKey::dispatch("+15550001111", None)).unwrap();
        assert!(threads::get_doc(t.engine.database(), &thread_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn confirm_sets_a_code_once_and_replays_through_the_guard() {
        let t = test_engine(HoldConfig::default(), SendMode::Deliver).await;
        let job = t
            .engine
            .create_job_draft(taxi_request(Some(unlisted())), &AuthContext::user("user-1"))
            .await
            .unwrap();
        t.engine
            .dispatch_job(&job.id, &AuthContext::agent("concierge"))
            .await
            .unwrap();

        let key = maitred_idempotency::confirm_key(&job.id, "+15550001111");
        let outcome = t
            .engine
            .confirm_job(&job.id, "+15550001111", &key)
            .await
            .unwrap();
        let ConfirmOutcome::Confirmed { code } = outcome.clone() else {
            panic!("expected confirmed, got {outcome:?}");
        };
        assert_eq!(code.len(), 6);

        // Retried call: identical outcome, audit untouched.
        let replay = t
            .engine
            .confirm_job(&job.id, "+15550001111", &key)
            .await
            .unwrap();
        assert_eq!(replay, outcome);
        let audit = jobs::get_audit(t.engine.database(), &job.id).await.unwrap();
        assert_eq!(audit.len(), 3);
        let transitions: Vec<&str> = audit.iter().map(|r| r.transition.as_str()).collect();
        assert_eq!(transitions, ["created", "dispatched", "confirmed"]);

        // A different caller keying differently still gets the stored code.
        let other = t
            .engine
            .confirm_job(&job.id, "operator-1", "other-key")
            .await
            .unwrap();
        assert_eq!(
            other,
            ConfirmOutcome::AlreadyTerminal {
                status: JobStatus::Confirmed,
                code: Some(code),
            }
        );

        let total = t
            .engine
            .counters()
            .total(names::JOBS_CONFIRMED)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(total.total, 1);
    }

    #[tokio::test]
    async fn late_confirm_applies_the_expiry_edge() {
        let t = test_engine(lapsed_holds(), SendMode::Deliver).await;
        let job = t
            .engine
            .create_job_draft(taxi_request(Some(unlisted())), &AuthContext::user("user-1"))
            .await
            .unwrap();
        t.engine
            .dispatch_job(&job.id, &AuthContext::agent("concierge"))
            .await
            .unwrap();

        let outcome = t
            .engine
            .confirm_job(&job.id, "+15550001111", "late-key")
            .await
            .unwrap();
        assert_eq!(outcome, ConfirmOutcome::HoldExpired);

        let stored = t.engine.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Expired);
        assert!(stored.confirmation_code.is_none());

        // The lazy expiry was recorded under the key too.
        let replay = t
            .engine
            .confirm_job(&job.id, "+15550001111", "late-key")
            .await
            .unwrap();
        assert_eq!(replay, ConfirmOutcome::HoldExpired);

        let total = t
            .engine
            .counters()
            .total(names::JOBS_EXPIRED)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(total.total, 1);
    }

    #[tokio::test]
    async fn cancel_requires_owner_or_operator() {
        let t = test_engine(HoldConfig::default(), SendMode::Deliver).await;
        let job = t
            .engine
            .create_job_draft(taxi_request(None), &AuthContext::user("user-1"))
            .await
            .unwrap();

        let err = t
            .engine
            .cancel_job(&job.id, &AuthContext::user("user-2"), "not mine")
            .await
            .unwrap_err();
        assert!(matches!(err, MaitredError::Unauthorized(_)));
        let stored = t.engine.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Collecting);

        let outcome = t
            .engine
            .cancel_job(&job.id, &AuthContext::user("user-1"), "changed plans")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::Applied {
                status: JobStatus::Cancelled
            }
        );
        let audit = jobs::get_audit(t.engine.database(), &job.id).await.unwrap();
        assert_eq!(audit.last().unwrap().note.as_deref(), Some("changed plans"));

        // Operators may cancel anyone's job.
        let other = t
            .engine
            .create_job_draft(taxi_request(None), &AuthContext::user("user-3"))
            .await
            .unwrap();
        let outcome = t
            .engine
            .cancel_job(&other.id, &AuthContext::operator("op-1"), "fraud hold")
            .await
            .unwrap();
        assert!(matches!(outcome, TransitionOutcome::Applied { .. }));
    }

    #[tokio::test]
    async fn fail_is_reachable_from_any_pending_state() {
        let t = test_engine(HoldConfig::default(), SendMode::Deliver).await;
        let job = t
            .engine
            .create_job_draft(taxi_request(Some(unlisted())), &AuthContext::user("user-1"))
            .await
            .unwrap();
        t.engine
            .dispatch_job(&job.id, &AuthContext::agent("concierge"))
            .await
            .unwrap();

        let outcome = t
            .engine
            .fail_job(&job.id, "payment processor unreachable")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::Applied {
                status: JobStatus::Failed
            }
        );
        let audit = jobs::get_audit(t.engine.database(), &job.id).await.unwrap();
        assert_eq!(audit.last().unwrap().actor, "system");

        // Terminal now; a second failure attempt is a no-op.
        let again = t.engine.fail_job(&job.id, "again").await.unwrap();
        assert_eq!(
            again,
            TransitionOutcome::AlreadyTerminal {
                status: JobStatus::Failed
            }
        );
    }

    #[tokio::test]
    async fn review_resolution_is_operator_only_and_exits_review() {
        let t = test_engine(HoldConfig::default(), SendMode::Deliver).await;
        seed_job(&t.engine, review_job("job-review")).await;

        let err = t
            .engine
            .resolve_review(
                "job-review",
                ReviewResolution::Confirm,
                &AuthContext::merchant("staff-1", "biz-1"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MaitredError::Unauthorized(_)));

        let outcome = t
            .engine
            .resolve_review(
                "job-review",
                ReviewResolution::Confirm,
                &AuthContext::operator("op-1"),
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::Applied {
                status: JobStatus::Confirmed
            }
        );
        let stored = t.engine.get_job("job-review").await.unwrap().unwrap();
        assert!(stored.confirmation_code.is_some());
        assert!(!stored.needs_operator);

        // Only timeout-review jobs can be resolved.
        let job = t
            .engine
            .create_job_draft(taxi_request(None), &AuthContext::user("user-1"))
            .await
            .unwrap();
        let outcome = t
            .engine
            .resolve_review(&job.id, ReviewResolution::Expire, &AuthContext::operator("op-1"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::InvalidTransition {
                from: JobStatus::Collecting
            }
        );
    }

    #[tokio::test]
    async fn dispatch_straight_from_collecting_is_the_fast_path() {
        let t = test_engine(HoldConfig::default(), SendMode::Deliver).await;
        let job = t
            .engine
            .create_job_draft(taxi_request(Some(unlisted())), &AuthContext::user("user-1"))
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Collecting);

        let outcome = t
            .engine
            .dispatch_job(&job.id, &AuthContext::operator("op-1"))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Dispatched { delivered: true });
        let audit = jobs::get_audit(t.engine.database(), &job.id).await.unwrap();
        let transitions: Vec<&str> = audit.iter().map(|r| r.transition.as_str()).collect();
        assert_eq!(transitions, ["created", "dispatched"]);
    }
}

// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end integration tests for the complete dispatch lifecycle.
//!
//! Each test creates an isolated TestHarness with temp SQLite, the mock
//! sender, and all required subsystems. Tests are independent and
//! order-insensitive.

use maitred_core::{AuthContext, JobStatus, MaitredError};
use maitred_counters::names;
use maitred_gate::GateAction;
use maitred_lifecycle::{
    ConfirmOutcome, CreateJobRequest, DraftPatch, PriceQuote, ReplyOutcome, ReviewResolution,
    TransitionOutcome,
};
use maitred_storage::queries::jobs;
use maitred_test_utils::{InboundResult, SendMode, TestHarness};

const MERCHANT: &str = "+15550001111";

// ---- Test 1: Taxi scenario end to end ----

#[tokio::test]
async fn test_taxi_dispatch_and_merchant_yes_confirms() {
    let harness = TestHarness::builder().build().await.unwrap();
    let (job, _thread_id) = harness.dispatch_taxi("user-1", MERCHANT).await.unwrap();

    let result = harness
        .inbound_merchant_message(MERCHANT, "yes")
        .await
        .unwrap();
    let InboundResult::Gate(outcome) = result else {
        panic!("expected the gate to own the yes, got {result:?}");
    };
    let GateAction::Confirmed { job_id, code } = outcome.action else {
        panic!("expected a confirmation, got {:?}", outcome.action);
    };
    assert_eq!(job_id, job.id);

    let stored = harness.engine.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Confirmed);
    assert_eq!(stored.confirmation_code.as_deref(), Some(code.as_str()));

    // Exactly three audit rows for the whole journey.
    let audit = jobs::get_audit(harness.engine.database(), &job.id)
        .await
        .unwrap();
    let transitions: Vec<&str> = audit.iter().map(|r| r.transition.as_str()).collect();
    assert_eq!(transitions, vec!["created", "dispatched", "confirmed"]);

    for name in [
        names::JOBS_CREATED,
        names::JOBS_DISPATCHED,
        names::JOBS_CONFIRMED,
    ] {
        let total = harness
            .engine
            .counters()
            .total(name)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(total.total, 1, "counter {name} should be 1");
    }
}

// ---- Test 2: Confirm idempotency ----

#[tokio::test]
async fn test_duplicate_confirm_replays_the_cached_outcome() {
    let harness = TestHarness::builder().build().await.unwrap();
    let (job, _) = harness.dispatch_taxi("user-1", MERCHANT).await.unwrap();

    let first = harness
        .engine
        .confirm_job(&job.id, MERCHANT, "confirm-key-1")
        .await
        .unwrap();
    let ConfirmOutcome::Confirmed { code } = &first else {
        panic!("expected a fresh confirmation, got {first:?}");
    };

    // Same key: the cached outcome comes back verbatim, no new writes.
    let replay = harness
        .engine
        .confirm_job(&job.id, MERCHANT, "confirm-key-1")
        .await
        .unwrap();
    assert_eq!(replay, first);

    let audit = jobs::get_audit(harness.engine.database(), &job.id)
        .await
        .unwrap();
    assert_eq!(audit.len(), 3, "replay must not append audit rows");

    // A different key still hands the merchant their code.
    let retry = harness
        .engine
        .confirm_job(&job.id, MERCHANT, "confirm-key-2")
        .await
        .unwrap();
    assert_eq!(
        retry,
        ConfirmOutcome::AlreadyTerminal {
            status: JobStatus::Confirmed,
            code: Some(code.clone()),
        }
    );
}

// ---- Test 3: Terminal immutability ----

#[tokio::test]
async fn test_terminal_jobs_reject_further_transitions() {
    let harness = TestHarness::builder().build().await.unwrap();
    let (job, _) = harness.dispatch_taxi("user-1", MERCHANT).await.unwrap();
    harness
        .engine
        .confirm_job(&job.id, MERCHANT, "confirm-key-1")
        .await
        .unwrap();

    let cancel = harness
        .engine
        .cancel_job(&job.id, &AuthContext::user("user-1"), "changed my mind")
        .await
        .unwrap();
    assert_eq!(
        cancel,
        TransitionOutcome::AlreadyTerminal {
            status: JobStatus::Confirmed
        }
    );

    let fail = harness
        .engine
        .fail_job(&job.id, "late processing error")
        .await
        .unwrap();
    assert_eq!(
        fail,
        TransitionOutcome::AlreadyTerminal {
            status: JobStatus::Confirmed
        }
    );

    let stored = harness.engine.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Confirmed);
}

// ---- Test 4: Sweep of an overdue backlog ----

#[tokio::test]
async fn test_sweep_expires_fifty_overdue_jobs_exactly_once() {
    let harness = TestHarness::builder().with_hold_secs(-60).build().await.unwrap();

    let mut ids = Vec::new();
    for i in 0..50 {
        let phone = format!("+1555000{i:04}");
        let (job, _) = harness.dispatch_taxi("user-1", &phone).await.unwrap();
        ids.push(job.id);
    }

    let report = harness.engine.run_timeout_sweep(100).await.unwrap();
    assert_eq!(report.processed, 50);
    assert_eq!(report.expired.len(), 50);
    assert!(report.review.is_empty());
    assert!(report.errors.is_empty());

    for id in &ids {
        let stored = harness.engine.get_job(id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Expired);
    }

    let second = harness.engine.run_timeout_sweep(100).await.unwrap();
    assert_eq!(second.processed, 0);

    let expired = harness
        .engine
        .counters()
        .total(names::JOBS_EXPIRED)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(expired.total, 50);
}

// ---- Test 5: Stale gate pending falls through to lazy expiry ----

#[tokio::test]
async fn test_stale_pending_falls_through_to_lazy_expiry() {
    let harness = TestHarness::builder().with_hold_secs(-60).build().await.unwrap();
    let (job, _) = harness.dispatch_taxi("user-1", MERCHANT).await.unwrap();

    // The pending confirmation expired more than the gate buffer ago; the
    // gate clears it and steps aside, and the reply path applies the
    // expiry edge instead of confirming.
    let result = harness
        .inbound_merchant_message(MERCHANT, "yes")
        .await
        .unwrap();
    assert_eq!(
        result,
        InboundResult::Reply(ReplyOutcome::HoldExpired {
            job_id: job.id.clone()
        })
    );

    let stored = harness.engine.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Expired);
}

// ---- Test 6: Price snapshot immutability ----

#[tokio::test]
async fn test_price_tamper_is_rejected_and_the_snapshot_survives() {
    let harness = TestHarness::builder().build().await.unwrap();
    let auth = AuthContext::user("user-1");

    let request = CreateJobRequest {
        action_type: maitred_core::ActionType::Taxi,
        action_data: serde_json::json!({"pickup": "Pier 7", "dropoff": "Hotel Mar"}),
        merchant_target: None,
        price: Some(PriceQuote {
            listing_id: "lst-404".to_string(),
            amount_minor: 4500,
            currency: "USD".to_string(),
        }),
    };
    let job = harness.engine.create_job_draft(request, &auth).await.unwrap();

    let patch = DraftPatch {
        price: Some(PriceQuote {
            listing_id: "lst-404".to_string(),
            amount_minor: 3900,
            currency: "USD".to_string(),
        }),
        ..DraftPatch::default()
    };
    let err = harness
        .engine
        .update_job_draft(&job.id, patch, &auth)
        .await
        .unwrap_err();
    assert!(
        matches!(&err, MaitredError::PriceTamper { job_id, .. } if *job_id == job.id),
        "expected a price tamper rejection, got {err:?}"
    );

    let stored = harness.engine.get_job(&job.id).await.unwrap().unwrap();
    let snapshot = stored.price_snapshot.unwrap();
    assert_eq!(snapshot.amount_minor, 4500);
    assert_eq!(snapshot.currency, "USD");
}

// ---- Test 7: Failed delivery ----

#[tokio::test]
async fn test_failed_delivery_keeps_the_job_dispatched_with_evidence() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.sender.set_mode(SendMode::FailDelivery).await;

    let (job, _) = harness.dispatch_taxi("user-1", MERCHANT).await.unwrap();

    let stored = harness.engine.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Dispatched);
    let evidence = stored.dispatch_evidence.unwrap();
    assert!(!evidence.delivered);
    assert_eq!(evidence.failure_reason.as_deref(), Some("recipient unreachable"));

    // No pending was parked for a message nobody received, but a merchant
    // who heard another way can still answer through the reply path.
    let result = harness
        .inbound_merchant_message(MERCHANT, "yes")
        .await
        .unwrap();
    let InboundResult::Reply(ReplyOutcome::Confirmed { job_id, .. }) = result else {
        panic!("expected the reply path to confirm, got {result:?}");
    };
    assert_eq!(job_id, job.id);
}

// ---- Test 8: Ambiguous reply survives to operator resolution ----

#[tokio::test]
async fn test_ambiguous_reply_routes_to_review_and_operator_resolves() {
    let harness = TestHarness::builder().with_hold_secs(-60).build().await.unwrap();
    let (job, _) = harness.dispatch_taxi("user-1", MERCHANT).await.unwrap();

    let result = harness
        .inbound_merchant_message(MERCHANT, "maybe, how much is it?")
        .await
        .unwrap();
    assert_eq!(
        result,
        InboundResult::Reply(ReplyOutcome::NeedsOperator {
            job_id: job.id.clone()
        })
    );

    // The unresolved reply routes the lapsed hold to review, not expiry.
    let report = harness.engine.run_timeout_sweep(10).await.unwrap();
    assert_eq!(report.review, vec![job.id.clone()]);
    let stored = harness.engine.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::TimeoutReview);
    let unresolved = stored.unresolved_reply.unwrap();
    assert_eq!(unresolved.text, "maybe, how much is it?");
    assert_eq!(unresolved.from_identity, MERCHANT);

    let resolved = harness
        .engine
        .resolve_review(&job.id, ReviewResolution::Confirm, &AuthContext::operator("ops-1"))
        .await
        .unwrap();
    assert_eq!(
        resolved,
        TransitionOutcome::Applied {
            status: JobStatus::Confirmed
        }
    );
    let stored = harness.engine.get_job(&job.id).await.unwrap().unwrap();
    assert!(stored.confirmation_code.is_some());
}

// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete engine stack on a temp SQLite
//! database: lifecycle engine, confirmation gate, mock sender, keyword
//! parser. `inbound_merchant_message()` routes a reply the way the service
//! does, gate first and parser second.

use std::sync::Arc;

use maitred_config::model::MaitredConfig;
use maitred_core::{ActionType, AuthContext, Job, MaitredError, MerchantTarget};
use maitred_gate::{ConfirmationGate, GateOutcome};
use maitred_lifecycle::{CreateJobRequest, DispatchOutcome, LifecycleEngine, ReplyOutcome};
use maitred_storage::Database;
use maitred_threads::{compute_thread_id, KeywordReplyParser, ThreadKey};

use crate::mock_sender::MockSender;

/// How one inbound message was consumed.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundResult {
    /// The gate owned the message.
    Gate(GateOutcome),
    /// The gate passed; the reply parser routed it.
    Reply(ReplyOutcome),
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: MaitredConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: MaitredConfig::default(),
        }
    }

    /// Set every hold window to the same number of seconds. Negative values
    /// create jobs that are overdue from the moment of creation.
    pub fn with_hold_secs(mut self, secs: i64) -> Self {
        self.config.holds.taxi_secs = secs;
        self.config.holds.reservation_secs = secs;
        self.config.holds.activity_secs = secs;
        self.config.holds.experience_secs = secs;
        self.config.holds.supplies_secs = secs;
        self
    }

    /// Set the gate's pending-expiry grace window.
    pub fn with_gate_buffer_secs(mut self, secs: i64) -> Self {
        self.config.gate.expiry_buffer_secs = secs;
        self
    }

    /// Set the sweeper batch limit.
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.config.sweeper.batch_limit = limit;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(mut self) -> Result<TestHarness, MaitredError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| MaitredError::Storage {
            source: Box::new(e),
        })?;
        let db_path = temp_dir.path().join("test.db");
        self.config.storage.database_path = db_path.to_string_lossy().into_owned();

        let db = Arc::new(Database::open(&self.config.storage.database_path).await?);
        let sender = Arc::new(MockSender::new());
        let engine = Arc::new(LifecycleEngine::new(
            db,
            sender.clone(),
            Arc::new(KeywordReplyParser),
            self.config.holds.clone(),
            &self.config.counters,
        ));
        let gate = ConfirmationGate::new(engine.clone(), &self.config.gate);

        Ok(TestHarness {
            engine,
            gate,
            sender,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment on a temp database.
pub struct TestHarness {
    /// The lifecycle engine under test.
    pub engine: Arc<LifecycleEngine>,
    /// Gate wired to the same engine.
    pub gate: ConfirmationGate,
    /// The mock dispatch channel; every send attempt is captured here.
    pub sender: Arc<MockSender>,
    /// The configuration the stack was built from.
    pub config: MaitredConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Draft and dispatch one taxi job to an unlisted merchant phone.
    ///
    /// Returns the job and the dispatch thread id the merchant's replies
    /// arrive on.
    pub async fn dispatch_taxi(
        &self,
        owner: &str,
        phone: &str,
    ) -> Result<(Job, String), MaitredError> {
        let request = CreateJobRequest {
            action_type: ActionType::Taxi,
            action_data: serde_json::json!({
                "pickup": "Pier 7",
                "dropoff": "Hotel Mar",
            }),
            merchant_target: Some(MerchantTarget::Unlisted {
                name: "Harbor Cabs".to_string(),
                phone: phone.to_string(),
            }),
            price: None,
        };
        let job = self
            .engine
            .create_job_draft(request, &AuthContext::user(owner))
            .await?;
        let outcome = self
            .engine
            .dispatch_job(&job.id, &AuthContext::agent("concierge"))
            .await?;
        if !matches!(outcome, DispatchOutcome::Dispatched { .. }) {
            return Err(MaitredError::Internal(format!(
                "test dispatch did not go out: {outcome:?}"
            )));
        }
        let thread_id = compute_thread_id(&ThreadKey::dispatch(phone, None))?;
        Ok((job, thread_id))
    }

    /// Route one inbound merchant message the way the service does: the
    /// gate gets first refusal, the reply parser handles the rest.
    pub async fn inbound_merchant_message(
        &self,
        phone: &str,
        text: &str,
    ) -> Result<InboundResult, MaitredError> {
        let thread_id = compute_thread_id(&ThreadKey::dispatch(phone, None))?;
        let outcome = self.gate.handle(&thread_id, phone, text).await?;
        if outcome.handled {
            return Ok(InboundResult::Gate(outcome));
        }
        let reply = self.engine.apply_provider_reply(text, phone).await?;
        Ok(InboundResult::Reply(reply))
    }
}

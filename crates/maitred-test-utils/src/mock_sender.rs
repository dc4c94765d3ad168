// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock notification sender for deterministic testing.
//!
//! `MockSender` implements `NotificationSender` with a switchable outcome
//! mode and captures every dispatch attempt for assertion in tests.

use async_trait::async_trait;
use tokio::sync::Mutex;

use maitred_core::{Job, MaitredError, MerchantTarget, NotificationSender, SendOutcome};

/// What `send` does after recording the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Report successful delivery with a mock message id.
    Deliver,
    /// Report the send as undelivered, the way a bounced message would.
    FailDelivery,
    /// Fail the call itself, the way an unreachable gateway would.
    Error,
}

/// One captured dispatch attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct SentDispatch {
    pub job_id: String,
    pub merchant_ref: String,
}

/// A mock dispatch channel.
///
/// Every attempt lands in `sent()` regardless of mode, so tests can assert
/// both "sent exactly once" and "never reached the wire" cases.
pub struct MockSender {
    mode: Mutex<SendMode>,
    sent: Mutex<Vec<SentDispatch>>,
}

impl MockSender {
    /// New sender that delivers everything.
    pub fn new() -> Self {
        Self {
            mode: Mutex::new(SendMode::Deliver),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Switch the outcome mode for subsequent sends.
    pub async fn set_mode(&self, mode: SendMode) {
        *self.mode.lock().await = mode;
    }

    /// All dispatch attempts, in order.
    pub async fn sent(&self) -> Vec<SentDispatch> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }
}

impl Default for MockSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSender for MockSender {
    async fn send(
        &self,
        job: &Job,
        target: &MerchantTarget,
    ) -> Result<SendOutcome, MaitredError> {
        self.sent.lock().await.push(SentDispatch {
            job_id: job.id.clone(),
            merchant_ref: target.merchant_ref().to_string(),
        });

        match *self.mode.lock().await {
            SendMode::Deliver => Ok(SendOutcome {
                delivered: true,
                message_id: Some(format!("mock-msg-{}", uuid::Uuid::new_v4().simple())),
                channel: "mock".to_string(),
                failure_reason: None,
            }),
            SendMode::FailDelivery => Ok(SendOutcome {
                delivered: false,
                message_id: None,
                channel: "mock".to_string(),
                failure_reason: Some("recipient unreachable".to_string()),
            }),
            SendMode::Error => Err(MaitredError::Notification {
                message: "mock gateway unavailable".to_string(),
                source: None,
            }),
        }
    }
}

// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Log-channel notification sender.
//!
//! Delivery mechanics live behind [`NotificationSender`]; this binary ships
//! the log channel, which writes the outbound dispatch to the structured log
//! and reports it delivered. A messaging gateway slots in behind the same
//! trait without touching the engine.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use maitred_core::{Job, MaitredError, MerchantTarget, NotificationSender, SendOutcome};

pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(
        &self,
        job: &Job,
        target: &MerchantTarget,
    ) -> Result<SendOutcome, MaitredError> {
        let message_id = format!("log-{}", Uuid::new_v4().simple());
        info!(
            job_id = %job.id,
            action_type = %job.action_type,
            merchant_ref = %target.merchant_ref(),
            message_id = %message_id,
            "dispatch message written to log channel"
        );
        Ok(SendOutcome {
            delivered: true,
            message_id: Some(message_id),
            channel: "log".to_string(),
            failure_reason: None,
        })
    }
}

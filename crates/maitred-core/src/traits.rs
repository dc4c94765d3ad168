// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits implemented by outbound integrations.
//!
//! The engine coordinates everything through storage; delivery of dispatch
//! messages and interpretation of free-text replies are the only two seams
//! it delegates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::MaitredError;
use crate::job::{Job, MerchantTarget};

/// Result of one outbound dispatch attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutcome {
    pub delivered: bool,
    pub message_id: Option<String>,
    /// Channel label recorded in dispatch evidence ("sms", "chat", "log").
    pub channel: String,
    pub failure_reason: Option<String>,
}

/// Delivers dispatch messages to merchants.
///
/// The engine calls [`NotificationSender::send`] at most once per dispatch
/// claim and never retries. A failed send is recorded as evidence with
/// `delivered: false` and left for the sweeper and operators.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, job: &Job, target: &MerchantTarget)
        -> Result<SendOutcome, MaitredError>;
}

/// What a free-text provider reply means.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ReplyIntent {
    Confirm,
    Reject,
    NeedMoreInfo,
    RequiresHuman,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ReplyConfidence {
    High,
    Medium,
    Low,
}

/// Classified provider reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedReply {
    pub intent: ReplyIntent,
    pub confidence: ReplyConfidence,
}

/// Classifies raw reply text into an intent.
///
/// Implementations own the confidence discipline: report `confirm`/`reject`
/// only when certain. The engine acts on those two intents as-is and routes
/// everything else to a human.
pub trait ReplyParser: Send + Sync {
    fn parse(&self, text: &str) -> ParsedReply;
}

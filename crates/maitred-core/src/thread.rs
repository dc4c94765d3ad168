// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation thread documents.
//!
//! Threads are created lazily on first message and never deleted; the gate
//! flips a thread between `normal` and `awaiting-confirmation` by setting and
//! clearing `pending_action`.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Schema version written for new and rewritten thread documents.
pub const THREAD_SCHEMA_VERSION: i64 = 1;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ThreadType {
    /// Actor's personal concierge thread.
    General,
    /// Customer-facing thread with a business.
    BusinessPublic,
    /// Staff-side operational thread of a business.
    BusinessOps,
    /// Dispatch pool thread; global or scoped to one fleet.
    Dispatch,
}

impl ThreadType {
    /// Short tag mixed into the deterministic thread id.
    pub fn tag(self) -> &'static str {
        match self {
            ThreadType::General => "gen",
            ThreadType::BusinessPublic => "pub",
            ThreadType::BusinessOps => "ops",
            ThreadType::Dispatch => "disp",
        }
    }

    /// Whether this thread type must carry a business id.
    pub fn requires_business(self) -> bool {
        matches!(self, ThreadType::BusinessPublic | ThreadType::BusinessOps)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ThreadState {
    Normal,
    AwaitingConfirmation,
}

/// Which engine operation a pending action resolves to when affirmed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum PendingKind {
    /// Merchant confirming a dispatched job.
    ConfirmJob,
    /// User approving their own draft for dispatch.
    SubmitJob,
}

/// An action parked on a thread, waiting for a yes/no from one actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub kind: PendingKind,
    /// Id of the job the action refers to.
    pub ref_id: String,
    pub expires_at: String,
    /// One-line human description used for re-prompts.
    pub summary: String,
    /// When set, only this actor's replies engage the gate.
    pub expected_actor_id: Option<String>,
    pub created_at: String,
}

/// The full thread document, persisted as JSON in the `doc` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub thread_type: ThreadType,
    pub actor_id: String,
    pub business_id: Option<String>,
    pub state: ThreadState,
    pub pending_action: Option<PendingAction>,
    #[serde(default)]
    pub schema_version: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

/// One message in a thread. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub thread_id: String,
    pub direction: MessageDirection,
    pub actor_id: String,
    pub body: String,
    pub created_at: String,
}

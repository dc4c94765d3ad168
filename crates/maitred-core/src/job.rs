// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job documents and the lifecycle status graph.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Schema version written for new and rewritten job documents.
pub const JOB_SCHEMA_VERSION: i64 = 2;

/// Lifecycle status of a job.
///
/// The legal edges form a fixed graph; [`JobStatus::can_transition_to`] is
/// the single source of truth consulted inside every transition transaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    /// Draft being assembled; required fields may still be missing.
    Collecting,
    /// Complete draft awaiting the requesting user's go-ahead.
    Confirming,
    /// Sent to the merchant; awaiting their answer.
    Dispatched,
    /// Merchant accepted. Terminal.
    Confirmed,
    /// Merchant refused. Terminal.
    Declined,
    /// Withdrawn by the owner or an operator. Terminal.
    Cancelled,
    /// Hold window lapsed without resolution. Terminal.
    Expired,
    /// Overdue but flagged for a human decision instead of silent expiry.
    TimeoutReview,
    /// Unrecoverable processing error. Terminal.
    Failed,
}

impl JobStatus {
    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Confirmed
                | JobStatus::Declined
                | JobStatus::Cancelled
                | JobStatus::Expired
                | JobStatus::Failed
        )
    }

    /// Statuses legally reachable from this one.
    pub fn successors(self) -> &'static [JobStatus] {
        use JobStatus::*;
        match self {
            Collecting => &[Confirming, Dispatched, Cancelled, Expired, Failed],
            Confirming => &[Dispatched, Cancelled, Expired, TimeoutReview, Failed],
            Dispatched => &[Confirmed, Declined, Cancelled, Expired, TimeoutReview, Failed],
            TimeoutReview => &[Confirmed, Declined, Expired, Cancelled, Failed],
            Confirmed | Declined | Cancelled | Expired | Failed => &[],
        }
    }

    /// Whether the edge `self -> next` exists in the graph.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        self.successors().contains(&next)
    }
}

/// What kind of real-world action a job books or orders.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    Taxi,
    Supplies,
    Reservation,
    Activity,
    Experience,
}

/// Where a job gets dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MerchantTarget {
    /// A business registered on the platform.
    Listed { business_id: String },
    /// An ad-hoc merchant known only by name and phone number.
    Unlisted { name: String, phone: String },
}

impl MerchantTarget {
    /// Identity string that inbound replies are matched against.
    pub fn merchant_ref(&self) -> &str {
        match self {
            MerchantTarget::Listed { business_id } => business_id,
            MerchantTarget::Unlisted { phone, .. } => phone,
        }
    }
}

/// Price captured when a listing is attached to a draft.
///
/// `hash` covers every other field; once captured, amount and currency are
/// immutable for the life of the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub listing_id: String,
    /// Amount in minor currency units (cents, fils, ...).
    pub amount_minor: i64,
    /// ISO 4217 code, e.g. "USD".
    pub currency: String,
    pub captured_at: String,
    pub hash: String,
}

/// Record of the single outbound send attempt for a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchEvidence {
    pub channel: String,
    pub message_id: Option<String>,
    pub sent_at: String,
    pub delivered: bool,
    pub failure_reason: Option<String>,
}

/// A provider reply the parser could not resolve to confirm/reject.
///
/// Stored verbatim for the operator; its presence routes the job to
/// `timeout-review` instead of `expired` when the hold lapses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedReply {
    pub text: String,
    pub from_identity: String,
    pub received_at: String,
}

/// The full job document, persisted as JSON in the `doc` column.
///
/// Scalar columns (`status`, `action_type`, `merchant_ref`, ...) are
/// extracted from this document and written in the same transaction; the
/// document is the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub action_type: ActionType,
    /// Action-specific fields (pickup, party_size, ...). Required keys per
    /// action type are validated on create and submit.
    pub action_data: serde_json::Value,
    pub owner_user_id: String,
    pub merchant_target: Option<MerchantTarget>,
    pub price_snapshot: Option<PriceSnapshot>,
    /// End of the hold window. A missing value on a pending status counts
    /// as overdue, never as "no deadline".
    pub hold_expires_at: Option<String>,
    pub dispatch_evidence: Option<DispatchEvidence>,
    pub confirmation_code: Option<String>,
    pub unresolved_reply: Option<UnresolvedReply>,
    #[serde(default)]
    pub needs_operator: bool,
    #[serde(default)]
    pub schema_version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Job {
    /// Identity string replies to this job arrive from, if a target is set.
    pub fn merchant_ref(&self) -> Option<&str> {
        self.merchant_target.as_ref().map(|t| t.merchant_ref())
    }

    /// Whether the hold window has lapsed at `now` (canonical ISO string).
    pub fn is_overdue(&self, now: &str) -> bool {
        match &self.hold_expires_at {
            Some(expiry) => expiry.as_str() < now,
            None => true,
        }
    }
}

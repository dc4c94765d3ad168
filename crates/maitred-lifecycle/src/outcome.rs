// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured operation outcomes.
//!
//! Illegal edges, already-terminal jobs, and duplicate requests are ordinary
//! results the caller branches on, not errors. Outcomes serialize because
//! the idempotency guard caches them verbatim.

use serde::{Deserialize, Serialize};

use maitred_core::JobStatus;

/// Result of a confirm attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum ConfirmOutcome {
    /// Transitioned to `confirmed`; carries the freshly generated code.
    Confirmed { code: String },
    /// The job already reached a terminal status. `code` is the stored
    /// confirmation code when that status is `confirmed`, so a duplicate
    /// confirm still hands the merchant their code.
    AlreadyTerminal {
        status: JobStatus,
        code: Option<String>,
    },
    /// The hold lapsed before the confirm arrived; the expiry edge was
    /// applied in the same transaction.
    HoldExpired,
    /// Confirm is not a legal edge from the current status.
    InvalidTransition { from: JobStatus },
    NotFound,
}

/// Result of a plain transition attempt (submit, decline, cancel, fail,
/// review resolution, draft update).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum TransitionOutcome {
    Applied { status: JobStatus },
    AlreadyTerminal { status: JobStatus },
    InvalidTransition { from: JobStatus },
    NotFound,
}

/// Result of a dispatch attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum DispatchOutcome {
    /// The dispatch claim was applied and the send ran exactly once.
    /// `delivered: false` means the job stays dispatched with failure
    /// evidence for the sweeper and operators.
    Dispatched { delivered: bool },
    /// Another caller already claimed the dispatch; nothing was re-sent.
    AlreadyDispatched,
    AlreadyTerminal { status: JobStatus },
    InvalidTransition { from: JobStatus },
    NotFound,
}

/// Result of applying an inbound provider reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum ReplyOutcome {
    Confirmed { job_id: String, code: String },
    Declined { job_id: String },
    /// Ambiguous reply; stored for an operator, status unchanged.
    NeedsOperator { job_id: String },
    /// The hold lapsed before the reply; expiry was applied instead.
    HoldExpired { job_id: String },
    AlreadyTerminal { job_id: String, status: JobStatus },
    NoMatchingJob,
}

/// Operator decision that resolves a `timeout-review` job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewResolution {
    Confirm,
    Decline,
    Expire,
    Cancel,
}

impl ReviewResolution {
    pub fn target(self) -> JobStatus {
        match self {
            ReviewResolution::Confirm => JobStatus::Confirmed,
            ReviewResolution::Decline => JobStatus::Declined,
            ReviewResolution::Expire => JobStatus::Expired,
            ReviewResolution::Cancel => JobStatus::Cancelled,
        }
    }
}

/// Report of one sweep pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// Overdue candidates examined this pass.
    pub processed: usize,
    /// Jobs transitioned to `expired`.
    pub expired: Vec<String>,
    /// Jobs routed to `timeout-review` for an operator.
    pub review: Vec<String>,
    pub errors: Vec<SweepError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepError {
    pub job_id: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_outcome_round_trips_through_the_cache_shape() {
        let outcome = ConfirmOutcome::Confirmed {
            code: "ABC234".into(),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["outcome"], "confirmed");
        assert_eq!(value["code"], "ABC234");
        let back: ConfirmOutcome = serde_json::from_value(value).unwrap();
        assert_eq!(back, outcome);

        let terminal = ConfirmOutcome::AlreadyTerminal {
            status: JobStatus::Declined,
            code: None,
        };
        let value = serde_json::to_value(&terminal).unwrap();
        assert_eq!(value["outcome"], "already-terminal");
        assert_eq!(value["status"], "declined");
    }

    #[test]
    fn review_resolutions_map_to_terminal_statuses() {
        for resolution in [
            ReviewResolution::Confirm,
            ReviewResolution::Decline,
            ReviewResolution::Expire,
            ReviewResolution::Cancel,
        ] {
            assert!(resolution.target().is_terminal());
            assert!(JobStatus::TimeoutReview.can_transition_to(resolution.target()));
        }
    }
}

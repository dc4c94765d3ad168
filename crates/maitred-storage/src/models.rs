// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row structs for tables that are read as rows rather than as documents.

use serde::{Deserialize, Serialize};

/// One audit trail entry.
///
/// `transition` is `created` for the seed row, the target status for a
/// state change, or `reply-noted` for an ambiguous provider reply recorded
/// without a status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRow {
    pub job_id: String,
    pub seq: i64,
    pub transition: String,
    pub actor: String,
    pub note: Option<String>,
    pub created_at: String,
}

/// Job count for one status, used by the status report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

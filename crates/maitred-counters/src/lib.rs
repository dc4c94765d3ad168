// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sharded counters for engine telemetry.
//!
//! Counters are advisory: every lifecycle transition bumps one, and none of
//! them is allowed to fail the transition that fed it.

pub mod registry;

pub use registry::{CounterRegistry, CounterTotal};

/// Engine counter names, one per audited lifecycle event.
pub mod names {
    pub const JOBS_CREATED: &str = "jobs_created";
    pub const JOBS_DISPATCHED: &str = "jobs_dispatched";
    pub const JOBS_CONFIRMED: &str = "jobs_confirmed";
    pub const JOBS_DECLINED: &str = "jobs_declined";
    pub const JOBS_CANCELLED: &str = "jobs_cancelled";
    pub const JOBS_EXPIRED: &str = "jobs_expired";
    pub const JOBS_REVIEW: &str = "jobs_review";
    pub const JOBS_FAILED: &str = "jobs_failed";
}

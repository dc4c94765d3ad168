// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The job lifecycle engine.
//!
//! [`LifecycleEngine`] owns every job state change: draft creation and
//! editing, submission, merchant dispatch, confirm/decline/cancel/fail,
//! operator review, inbound reply routing, and the timeout sweep. All of
//! it funnels through one transactional shape (see [`tx`]) so status, doc,
//! and audit trail move together or not at all.

pub mod actions;
pub mod code;
pub mod engine;
pub mod outcome;
mod reply;
pub mod snapshot;
mod sweep;
pub mod tx;

pub use actions::{hold_window_secs, required_fields, validate_action_data};
pub use code::generate_confirmation_code;
pub use engine::{CreateJobRequest, DraftPatch, LifecycleEngine, PriceQuote};
pub use outcome::{
    ConfirmOutcome, DispatchOutcome, ReplyOutcome, ReviewResolution, SweepError, SweepReport,
    TransitionOutcome,
};
pub use snapshot::{create_price_snapshot, validate_price_immutability, verify_price_snapshot};

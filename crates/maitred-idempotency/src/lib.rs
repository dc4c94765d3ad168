// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotency guard for the maitred engine.
//!
//! External deliveries get retried (webhooks, impatient users, crashed
//! clients); this crate makes re-execution harmless by remembering, per
//! canonical key, that an operation already ran and what it produced.

pub mod guard;
pub mod keys;

pub use guard::{
    check, check_tx, purge_expired, record, record_tx, IdempotencyCheck, OpKind,
};
pub use keys::{confirm_key, counter_key, submit_key};

// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Maitred lifecycle engine.
//!
//! This crate provides the error type, the persisted domain model (jobs,
//! threads, pending actions), and the collaborator traits implemented by
//! outbound integrations. Everything here is pure data and pure functions;
//! nothing touches storage.

pub mod auth;
pub mod error;
pub mod job;
pub mod thread;
pub mod time;
pub mod traits;

// Re-export key items at crate root for ergonomic imports.
pub use auth::{AuthContext, Role};
pub use error::MaitredError;
pub use job::{
    ActionType, DispatchEvidence, Job, JobStatus, MerchantTarget, PriceSnapshot, UnresolvedReply,
    JOB_SCHEMA_VERSION,
};
pub use thread::{
    MessageDirection, PendingAction, PendingKind, Thread, ThreadMessage, ThreadState, ThreadType,
    THREAD_SCHEMA_VERSION,
};
pub use traits::{
    NotificationSender, ParsedReply, ReplyConfidence, ReplyIntent, ReplyParser, SendOutcome,
};

// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread identity and reply vocabulary.

pub mod identity;
pub mod vocab;

pub use identity::{compute_thread_id, generate_message_id, ThreadKey};
pub use vocab::{is_affirmative, is_negative, normalize, KeywordReplyParser};

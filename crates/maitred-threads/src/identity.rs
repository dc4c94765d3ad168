// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic thread ids.
//!
//! Messages for one actor and scope arrive over several channels; hashing
//! the identity tuple makes them all land in the same thread without any
//! lookup table. Ids are `thr-{tag}-{hash}` so a log line alone tells you
//! what kind of conversation it was.

use sha2::{Digest, Sha256};

use maitred_core::{MaitredError, ThreadType};

/// Identity tuple a thread id is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadKey {
    pub thread_type: ThreadType,
    pub actor_id: String,
    pub business_id: Option<String>,
}

impl ThreadKey {
    /// Personal concierge thread for one actor.
    pub fn general(actor_id: impl Into<String>) -> Self {
        Self {
            thread_type: ThreadType::General,
            actor_id: actor_id.into(),
            business_id: None,
        }
    }

    /// Customer-facing thread between an actor and a business.
    pub fn business_public(actor_id: impl Into<String>, business_id: impl Into<String>) -> Self {
        Self {
            thread_type: ThreadType::BusinessPublic,
            actor_id: actor_id.into(),
            business_id: Some(business_id.into()),
        }
    }

    /// Staff-side thread of a business.
    pub fn business_ops(actor_id: impl Into<String>, business_id: impl Into<String>) -> Self {
        Self {
            thread_type: ThreadType::BusinessOps,
            actor_id: actor_id.into(),
            business_id: Some(business_id.into()),
        }
    }

    /// Dispatch thread; global pool without a business id, per-fleet with.
    pub fn dispatch(actor_id: impl Into<String>, business_id: Option<String>) -> Self {
        Self {
            thread_type: ThreadType::Dispatch,
            actor_id: actor_id.into(),
            business_id,
        }
    }
}

/// Derive the stable thread id for an identity tuple. Pure, no I/O.
///
/// Every component is length-framed before hashing, so ("ab", "c") and
/// ("a", "bc") cannot produce the same preimage, and the type tag is both
/// hashed and prefixed, so ids never collide across thread types.
pub fn compute_thread_id(key: &ThreadKey) -> Result<String, MaitredError> {
    if key.thread_type.requires_business() && key.business_id.is_none() {
        return Err(MaitredError::Validation(format!(
            "{} thread requires a business id",
            key.thread_type
        )));
    }

    let mut hasher = Sha256::new();
    frame(&mut hasher, key.thread_type.tag().as_bytes());
    frame(&mut hasher, key.actor_id.as_bytes());
    if let Some(business_id) = &key.business_id {
        frame(&mut hasher, business_id.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());

    Ok(format!("thr-{}-{}", key.thread_type.tag(), &digest[..32]))
}

fn frame(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// Globally unique message id with a time-ordered prefix.
pub fn generate_message_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple();
    format!("msg-{millis}-{suffix}")
}

// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Maitred lifecycle engine.

use thiserror::Error;

/// The primary error type used across all Maitred crates.
///
/// Lifecycle *outcomes* (already terminal, invalid edge, duplicate request,
/// ambiguous reply) are not errors; they are returned as structured values
/// from the engine operations. Errors here mean the operation itself could
/// not run or was rejected outright.
#[derive(Debug, Error)]
pub enum MaitredError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A request failed domain validation (missing required fields, malformed
    /// input, unknown status value).
    #[error("validation error: {0}")]
    Validation(String),

    /// The acting principal is not allowed to perform the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A price update disagreed with the captured snapshot, or a stored
    /// snapshot no longer matches its recorded hash.
    #[error("price snapshot violation for job {job_id}: {detail}")]
    PriceTamper { job_id: String, detail: String },

    /// A stored document's schema version is below the supported floor for
    /// its collection. Versions above the current one are tolerated on read.
    #[error("unsupported {collection} document version {version} (minimum supported {minimum})")]
    SchemaVersion {
        collection: String,
        version: i64,
        minimum: i64,
    },

    /// Outbound notification delivery failed before a send attempt could be
    /// accounted for.
    #[error("notification error: {message}")]
    Notification {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

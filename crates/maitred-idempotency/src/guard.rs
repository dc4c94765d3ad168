// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Replay suppression over the `idempotency_records` table.
//!
//! A record maps a canonical key to the outcome of the operation that first
//! ran under it. Checks fail open: a broken guard degrades to duplicate side
//! effects, never to a refused operation. Records expire by wall clock and
//! lapsed rows stop suppressing immediately, deletion happens lazily via
//! [`purge_expired`].

use rusqlite::params;
use serde_json::Value;
use strum::{Display, EnumString};
use tracing::error;

use maitred_core::time::{now_iso, now_offset_iso};
use maitred_core::MaitredError;
use maitred_storage::{map_tr_err, Database};

/// What kind of operation a record suppresses; sets the retention window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OpKind {
    /// Inbound provider delivery. Providers retry for up to a day.
    Webhook,
    /// User-initiated request, e.g. a double-tapped submit.
    UserApi,
    /// Internal lifecycle transition replay.
    JobTransition,
}

impl OpKind {
    pub fn ttl_seconds(self) -> i64 {
        match self {
            OpKind::Webhook => 24 * 60 * 60,
            OpKind::UserApi => 60 * 60,
            OpKind::JobTransition => 60 * 60,
        }
    }
}

/// Outcome of a key lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyCheck {
    /// The operation already ran; `cached` is its stored outcome, verbatim.
    Duplicate { cached: Option<Value> },
    /// No live record; the caller should execute and then [`record`].
    Fresh,
}

/// Look up `key` inside the caller's transaction.
pub fn check_tx(
    conn: &rusqlite::Connection,
    key: &str,
    now: &str,
) -> Result<IdempotencyCheck, rusqlite::Error> {
    let result = conn.query_row(
        "SELECT result, expires_at FROM idempotency_records WHERE key = ?1",
        params![key],
        |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, String>(1)?,
            ))
        },
    );
    match result {
        Ok((cached, expires_at)) => {
            if expires_at.as_str() <= now {
                return Ok(IdempotencyCheck::Fresh);
            }
            let cached = match cached {
                Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?),
                None => None,
            };
            Ok(IdempotencyCheck::Duplicate { cached })
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(IdempotencyCheck::Fresh),
        Err(e) => Err(e),
    }
}

/// Write (or overwrite) the record for `key` inside the caller's
/// transaction, so the record commits atomically with the operation's own
/// writes.
pub fn record_tx(
    conn: &rusqlite::Connection,
    key: &str,
    op_kind: OpKind,
    result: Option<&Value>,
    executed_at: &str,
) -> Result<(), rusqlite::Error> {
    let result_json = match result {
        Some(v) => Some(
            serde_json::to_string(v)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
        ),
        None => None,
    };
    let expires_at = now_offset_iso(op_kind.ttl_seconds());
    conn.execute(
        "INSERT OR REPLACE INTO idempotency_records (key, op_kind, executed_at, expires_at, result)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![key, op_kind.to_string(), executed_at, expires_at, result_json],
    )?;
    Ok(())
}

/// Look up `key`, failing open on storage errors.
pub async fn check(db: &Database, key: &str) -> IdempotencyCheck {
    let key_owned = key.to_string();
    let result = db
        .connection()
        .call(move |conn| -> Result<IdempotencyCheck, rusqlite::Error> {
            check_tx(conn, &key_owned, &now_iso())
        })
        .await;
    match result {
        Ok(check) => check,
        Err(e) => {
            error!(key, error = %e, "idempotency check failed, treating as fresh");
            IdempotencyCheck::Fresh
        }
    }
}

/// Record an executed operation.
///
/// Failures surface: losing the record would silently disable replay
/// suppression for this key.
pub async fn record(
    db: &Database,
    key: &str,
    op_kind: OpKind,
    result: Option<Value>,
) -> Result<(), MaitredError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            record_tx(conn, &key, op_kind, result.as_ref(), &now_iso())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete lapsed records. Returns the number removed.
pub async fn purge_expired(db: &Database) -> Result<usize, MaitredError> {
    db.connection()
        .call(|conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "DELETE FROM idempotency_records WHERE expires_at <= ?1",
                params![now_iso()],
            )
        })
        .await
        .map_err(map_tr_err)
}

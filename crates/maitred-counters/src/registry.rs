// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sharded counters backed by SQLite.
//!
//! Each counter spreads its value across N shard rows; an increment bumps
//! one randomly chosen shard and totals sum them, so hot counters don't
//! serialize on a single row. Counters initialize lazily on first use and a
//! counter keeps the shard count it was created with even if the configured
//! default changes later.

use rand::Rng;
use rusqlite::params;
use tracing::warn;

use maitred_core::time::now_iso;
use maitred_core::MaitredError;
use maitred_idempotency::{check_tx, counter_key, record_tx, IdempotencyCheck, OpKind};
use maitred_storage::map_tr_err;

/// Aggregated view of one counter.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterTotal {
    pub name: String,
    pub total: i64,
    pub shard_count: u32,
    pub last_updated: Option<String>,
}

/// Handle for counter reads and writes.
pub struct CounterRegistry {
    conn: tokio_rusqlite::Connection,
    default_shards: u32,
}

impl CounterRegistry {
    pub fn new(conn: tokio_rusqlite::Connection, default_shards: u32) -> Self {
        Self {
            conn,
            // A zero shard count would make every increment a no-op.
            default_shards: default_shards.max(1),
        }
    }

    /// Create `name` with an explicit shard count, ahead of first use.
    ///
    /// Returns the shard count on record, which is the existing one when the
    /// counter was already created; shard counts are fixed at creation.
    pub async fn initialize(&self, name: &str, shard_count: u32) -> Result<u32, MaitredError> {
        let name = name.to_string();
        let shard_count = shard_count.max(1);
        self.conn
            .call(move |conn| -> Result<u32, rusqlite::Error> {
                let tx = conn.transaction()?;
                let shards = ensure_tx(&tx, &name, shard_count, &now_iso())?;
                tx.commit()?;
                Ok(shards)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Bump `name` by `delta`.
    pub async fn increment(&self, name: &str, delta: i64) -> Result<(), MaitredError> {
        let name = name.to_string();
        let default_shards = self.default_shards;
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                let now = now_iso();
                let shards = ensure_tx(&tx, &name, default_shards, &now)?;
                bump_tx(&tx, &name, shards, delta, &now)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Bump `name` by one for a specific event, at most once.
    ///
    /// The marker and the shard write commit in the same transaction, so a
    /// replayed event either sees the marker or reruns the whole thing.
    /// Returns whether the bump was applied.
    pub async fn increment_once(&self, name: &str, event_key: &str) -> Result<bool, MaitredError> {
        let name = name.to_string();
        let event_key = event_key.to_string();
        let default_shards = self.default_shards;
        self.conn
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let tx = conn.transaction()?;
                let now = now_iso();
                if let IdempotencyCheck::Duplicate { .. } = check_tx(&tx, &event_key, &now)? {
                    return Ok(false);
                }
                let shards = ensure_tx(&tx, &name, default_shards, &now)?;
                bump_tx(&tx, &name, shards, 1, &now)?;
                record_tx(&tx, &event_key, OpKind::JobTransition, None, &now)?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Bump an engine counter for one job event, swallowing failures.
    ///
    /// Lifecycle transitions must never fail because telemetry did.
    pub async fn bump_job_event(&self, counter: &str, job_id: &str) {
        let key = counter_key(counter, job_id);
        if let Err(e) = self.increment_once(counter, &key).await {
            warn!(counter, job_id, error = %e, "counter bump failed");
        }
    }

    /// Aggregate total for `name`, or None if the counter was never used.
    pub async fn total(&self, name: &str) -> Result<Option<CounterTotal>, MaitredError> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CounterTotal>, rusqlite::Error> {
                let shard_count = conn.query_row(
                    "SELECT shard_count FROM counters WHERE name = ?1",
                    params![name],
                    |row| row.get::<_, u32>(0),
                );
                let shard_count = match shard_count {
                    Ok(count) => count,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e),
                };
                let (total, last_updated) = conn.query_row(
                    "SELECT COALESCE(SUM(value), 0), MAX(updated_at)
                     FROM counter_shards WHERE name = ?1",
                    params![name],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, Option<String>>(1)?,
                        ))
                    },
                )?;
                Ok(Some(CounterTotal {
                    name,
                    total,
                    shard_count,
                    last_updated,
                }))
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Create the counter and its shard rows if absent; returns the shard count
/// actually on record.
fn ensure_tx(
    conn: &rusqlite::Connection,
    name: &str,
    default_shards: u32,
    now: &str,
) -> Result<u32, rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO counters (name, shard_count, created_at) VALUES (?1, ?2, ?3)",
        params![name, default_shards, now],
    )?;
    let shards: u32 = conn.query_row(
        "SELECT shard_count FROM counters WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    for shard in 0..shards {
        conn.execute(
            "INSERT OR IGNORE INTO counter_shards (name, shard, value, updated_at)
             VALUES (?1, ?2, 0, ?3)",
            params![name, shard, now],
        )?;
    }
    Ok(shards)
}

fn bump_tx(
    conn: &rusqlite::Connection,
    name: &str,
    shards: u32,
    delta: i64,
    now: &str,
) -> Result<(), rusqlite::Error> {
    let shard = rand::thread_rng().gen_range(0..shards);
    conn.execute(
        "UPDATE counter_shards SET value = value + ?3, updated_at = ?4
         WHERE name = ?1 AND shard = ?2",
        params![name, shard, delta, now],
    )?;
    Ok(())
}

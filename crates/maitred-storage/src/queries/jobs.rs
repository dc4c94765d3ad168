// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job row access.
//!
//! Sync functions run inside a caller's transaction and keep the JSON
//! document and its extracted scalar columns in step; async functions wrap
//! plain reads for callers that hold only a [`Database`].

use maitred_core::{Job, MaitredError};
use rusqlite::params;
use serde_json::Value;

use crate::database::{map_tr_err, Database};
use crate::models::{AuditRow, StatusCount};

fn doc_json(job: &Job) -> Result<String, rusqlite::Error> {
    serde_json::to_string(job).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn doc_value(raw: &str) -> Result<Value, rusqlite::Error> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Read the raw document for a job. No schema-version handling; callers run
/// the result through the tolerant reader.
pub fn read_doc(conn: &rusqlite::Connection, id: &str) -> Result<Option<Value>, rusqlite::Error> {
    let result = conn.query_row("SELECT doc FROM jobs WHERE id = ?1", params![id], |row| {
        row.get::<_, String>(0)
    });
    match result {
        Ok(raw) => Ok(Some(doc_value(&raw)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Insert a new job row.
pub fn insert(conn: &rusqlite::Connection, job: &Job) -> Result<(), rusqlite::Error> {
    let doc = doc_json(job)?;
    conn.execute(
        "INSERT INTO jobs (id, doc, status, action_type, owner_user_id, merchant_ref,
                           hold_expires_at, schema_version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            job.id,
            doc,
            job.status.to_string(),
            job.action_type.to_string(),
            job.owner_user_id,
            job.merchant_ref(),
            job.hold_expires_at,
            job.schema_version,
            job.created_at,
            job.updated_at,
        ],
    )?;
    Ok(())
}

/// Rewrite a job row, document and extracted columns together.
pub fn update(conn: &rusqlite::Connection, job: &Job) -> Result<(), rusqlite::Error> {
    let doc = doc_json(job)?;
    conn.execute(
        "UPDATE jobs SET doc = ?2, status = ?3, merchant_ref = ?4, hold_expires_at = ?5,
                         schema_version = ?6, updated_at = ?7
         WHERE id = ?1",
        params![
            job.id,
            doc,
            job.status.to_string(),
            job.merchant_ref(),
            job.hold_expires_at,
            job.schema_version,
            job.updated_at,
        ],
    )?;
    Ok(())
}

/// Append one audit row, continuing the per-job sequence.
pub fn append_audit(
    conn: &rusqlite::Connection,
    job_id: &str,
    transition: &str,
    actor: &str,
    note: Option<&str>,
    created_at: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO job_audit (job_id, seq, transition, actor, note, created_at)
         VALUES (?1,
                 (SELECT COALESCE(MAX(seq), 0) + 1 FROM job_audit WHERE job_id = ?1),
                 ?2, ?3, ?4, ?5)",
        params![job_id, transition, actor, note, created_at],
    )?;
    Ok(())
}

/// Raw document fetch by id.
pub async fn get_doc(db: &Database, id: &str) -> Result<Option<Value>, MaitredError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Value>, rusqlite::Error> { read_doc(conn, &id) })
        .await
        .map_err(map_tr_err)
}

/// Audit trail for a job in sequence order.
pub async fn get_audit(db: &Database, job_id: &str) -> Result<Vec<AuditRow>, MaitredError> {
    let job_id = job_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<AuditRow>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT job_id, seq, transition, actor, note, created_at
                 FROM job_audit WHERE job_id = ?1 ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(params![job_id], |row| {
                Ok(AuditRow {
                    job_id: row.get(0)?,
                    seq: row.get(1)?,
                    transition: row.get(2)?,
                    actor: row.get(3)?,
                    note: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?;
            let mut audit = Vec::new();
            for row in rows {
                audit.push(row?);
            }
            Ok(audit)
        })
        .await
        .map_err(map_tr_err)
}

/// Ids of pending jobs whose hold window is missing or lapsed at `now`.
///
/// A NULL window sorts first, so jobs with no deadline at all drain before
/// dated ones. `timeout-review` is excluded: those jobs already belong to an
/// operator.
pub async fn overdue_pending_ids(
    db: &Database,
    now: &str,
    limit: usize,
) -> Result<Vec<String>, MaitredError> {
    let now = now.to_string();
    let limit = limit as i64;
    db.connection()
        .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id FROM jobs
                 WHERE status IN ('collecting', 'confirming', 'dispatched')
                   AND (hold_expires_at IS NULL OR hold_expires_at < ?1)
                 ORDER BY hold_expires_at ASC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![now, limit], |row| row.get::<_, String>(0))?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(row?);
            }
            Ok(ids)
        })
        .await
        .map_err(map_tr_err)
}

/// Count of jobs the next sweep would pick up.
pub async fn overdue_pending_count(db: &Database, now: &str) -> Result<i64, MaitredError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM jobs
                 WHERE status IN ('collecting', 'confirming', 'dispatched')
                   AND (hold_expires_at IS NULL OR hold_expires_at < ?1)",
                params![now],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// The job an inbound merchant reply most plausibly answers: the newest
/// job awaiting that merchant, by `updated_at`.
pub async fn latest_awaiting_for_merchant(
    db: &Database,
    merchant_ref: &str,
) -> Result<Option<String>, MaitredError> {
    let merchant_ref = merchant_ref.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
            let result = conn.query_row(
                "SELECT id FROM jobs
                 WHERE merchant_ref = ?1 AND status IN ('dispatched', 'timeout-review')
                 ORDER BY updated_at DESC
                 LIMIT 1",
                params![merchant_ref],
                |row| row.get::<_, String>(0),
            );
            match result {
                Ok(id) => Ok(Some(id)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Job counts grouped by status.
pub async fn status_counts(db: &Database) -> Result<Vec<StatusCount>, MaitredError> {
    db.connection()
        .call(|conn| -> Result<Vec<StatusCount>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM jobs GROUP BY status ORDER BY status ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(StatusCount {
                    status: row.get(0)?,
                    count: row.get(1)?,
                })
            })?;
            let mut counts = Vec::new();
            for row in rows {
                counts.push(row?);
            }
            Ok(counts)
        })
        .await
        .map_err(map_tr_err)
}

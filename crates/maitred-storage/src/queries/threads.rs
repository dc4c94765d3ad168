// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread and message row access.
//!
//! Thread ids are deterministic, so writes are upserts: the first message in
//! a conversation creates the row, later gate flips rewrite it.

use maitred_core::{MaitredError, Thread, ThreadMessage};
use rusqlite::params;
use serde_json::Value;

use crate::database::{map_tr_err, Database};

fn doc_json(thread: &Thread) -> Result<String, rusqlite::Error> {
    serde_json::to_string(thread)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn doc_value(raw: &str) -> Result<Value, rusqlite::Error> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Read the raw document for a thread. Callers run the result through the
/// tolerant reader.
pub fn read_doc(conn: &rusqlite::Connection, id: &str) -> Result<Option<Value>, rusqlite::Error> {
    let result = conn.query_row(
        "SELECT doc FROM threads WHERE id = ?1",
        params![id],
        |row| row.get::<_, String>(0),
    );
    match result {
        Ok(raw) => Ok(Some(doc_value(&raw)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Create or rewrite a thread row.
pub fn upsert(conn: &rusqlite::Connection, thread: &Thread) -> Result<(), rusqlite::Error> {
    let doc = doc_json(thread)?;
    conn.execute(
        "INSERT INTO threads (id, doc, thread_type, state, actor_id, business_id,
                              schema_version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
             doc = excluded.doc,
             state = excluded.state,
             schema_version = excluded.schema_version,
             updated_at = excluded.updated_at",
        params![
            thread.id,
            doc,
            thread.thread_type.to_string(),
            thread.state.to_string(),
            thread.actor_id,
            thread.business_id,
            thread.schema_version,
            thread.created_at,
            thread.updated_at,
        ],
    )?;
    Ok(())
}

/// Append one message to a thread.
pub fn insert_message(
    conn: &rusqlite::Connection,
    message: &ThreadMessage,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO thread_messages (id, thread_id, direction, actor_id, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            message.id,
            message.thread_id,
            message.direction.to_string(),
            message.actor_id,
            message.body,
            message.created_at,
        ],
    )?;
    Ok(())
}

/// Raw document fetch by thread id.
pub async fn get_doc(db: &Database, id: &str) -> Result<Option<Value>, MaitredError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Value>, rusqlite::Error> { read_doc(conn, &id) })
        .await
        .map_err(map_tr_err)
}

/// Messages in a thread, oldest first.
pub async fn list_messages(
    db: &Database,
    thread_id: &str,
) -> Result<Vec<ThreadMessage>, MaitredError> {
    let thread_id = thread_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<ThreadMessage>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, thread_id, direction, actor_id, body, created_at
                 FROM thread_messages WHERE thread_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![thread_id], |row| {
                let direction: String = row.get(2)?;
                let direction = direction.parse().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(ThreadMessage {
                    id: row.get(0)?,
                    thread_id: row.get(1)?,
                    direction,
                    actor_id: row.get(3)?,
                    body: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

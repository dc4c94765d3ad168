// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-transaction building blocks shared by the engine operations.
//!
//! Every lifecycle operation follows the same shape: open a transaction,
//! load the job through the tolerant reader, re-check status against the
//! graph, mutate, persist document + scalar columns + audit row together,
//! commit. These helpers run inside the caller's `rusqlite::Transaction`;
//! domain failures travel in the inner `Result` so the closure's outer
//! error type stays `rusqlite::Error`.

use maitred_core::{Job, JobStatus, MaitredError, Thread};
use maitred_storage::queries::{jobs, threads};
use maitred_storage::schema;
use maitred_storage::{JOBS_COLLECTION, THREADS_COLLECTION};

use crate::outcome::TransitionOutcome;

/// A job pulled through the tolerant reader, with enough provenance to log
/// the upgrade if this transaction ends up persisting it.
#[derive(Debug, Clone)]
pub struct LoadedJob {
    pub job: Job,
    pub from_version: i64,
    pub migrated: bool,
}

/// Load and upgrade a job inside a transaction.
///
/// `Ok(Ok(None))` means no such job; schema-floor violations and undecodable
/// documents surface as domain errors in the inner `Result`.
pub fn load_job_tx(
    conn: &rusqlite::Connection,
    job_id: &str,
) -> Result<Result<Option<LoadedJob>, MaitredError>, rusqlite::Error> {
    let Some(doc) = jobs::read_doc(conn, job_id)? else {
        return Ok(Ok(None));
    };
    let migrated = match schema::migrate_to_current(JOBS_COLLECTION, doc) {
        Ok(m) => m,
        Err(e) => return Ok(Err(e)),
    };
    match serde_json::from_value::<Job>(migrated.doc) {
        Ok(job) => Ok(Ok(Some(LoadedJob {
            job,
            from_version: migrated.from_version,
            migrated: migrated.migrated,
        }))),
        Err(e) => Ok(Err(MaitredError::Internal(format!(
            "job {job_id} document failed to decode: {e}"
        )))),
    }
}

/// Rewrite the job row from the in-memory document; if the load upgraded an
/// old schema version, the migration log row commits alongside it.
pub fn persist_job_tx(
    conn: &rusqlite::Connection,
    loaded: &LoadedJob,
) -> Result<(), rusqlite::Error> {
    jobs::update(conn, &loaded.job)?;
    if loaded.migrated {
        schema::log_doc_migration(
            conn,
            JOBS_COLLECTION,
            &loaded.job.id,
            loaded.from_version,
            loaded.job.schema_version,
        )?;
    }
    Ok(())
}

/// Apply one status edge: graph check, document rewrite, audit row.
///
/// Mutations the caller staged on `loaded.job` (confirmation code, dispatch
/// evidence, cleared flags) persist with the transition. Terminal and
/// illegal-edge cases leave the row untouched.
pub fn transition_tx(
    conn: &rusqlite::Connection,
    loaded: &mut LoadedJob,
    next: JobStatus,
    actor: &str,
    note: Option<&str>,
    now: &str,
) -> Result<TransitionOutcome, rusqlite::Error> {
    let from = loaded.job.status;
    if from.is_terminal() {
        return Ok(TransitionOutcome::AlreadyTerminal { status: from });
    }
    if !from.can_transition_to(next) {
        return Ok(TransitionOutcome::InvalidTransition { from });
    }
    loaded.job.status = next;
    loaded.job.updated_at = now.to_string();
    persist_job_tx(conn, loaded)?;
    jobs::append_audit(conn, &loaded.job.id, &next.to_string(), actor, note, now)?;
    Ok(TransitionOutcome::Applied { status: next })
}

/// A thread pulled through the tolerant reader.
#[derive(Debug, Clone)]
pub struct LoadedThread {
    pub thread: Thread,
    pub from_version: i64,
    pub migrated: bool,
}

/// Load and upgrade a thread inside a transaction.
pub fn load_thread_tx(
    conn: &rusqlite::Connection,
    thread_id: &str,
) -> Result<Result<Option<LoadedThread>, MaitredError>, rusqlite::Error> {
    let Some(doc) = threads::read_doc(conn, thread_id)? else {
        return Ok(Ok(None));
    };
    let migrated = match schema::migrate_to_current(THREADS_COLLECTION, doc) {
        Ok(m) => m,
        Err(e) => return Ok(Err(e)),
    };
    match serde_json::from_value::<Thread>(migrated.doc) {
        Ok(thread) => Ok(Ok(Some(LoadedThread {
            thread,
            from_version: migrated.from_version,
            migrated: migrated.migrated,
        }))),
        Err(e) => Ok(Err(MaitredError::Internal(format!(
            "thread {thread_id} document failed to decode: {e}"
        )))),
    }
}

/// Upsert the thread row; logs the schema upgrade when the load performed
/// one, same as [`persist_job_tx`].
pub fn persist_thread_tx(
    conn: &rusqlite::Connection,
    loaded: &LoadedThread,
) -> Result<(), rusqlite::Error> {
    threads::upsert(conn, &loaded.thread)?;
    if loaded.migrated {
        schema::log_doc_migration(
            conn,
            THREADS_COLLECTION,
            &loaded.thread.id,
            loaded.from_version,
            loaded.thread.schema_version,
        )?;
    }
    Ok(())
}

/// Where an overdue pending job goes: `timeout-review` when a human already
/// left evidence worth judging, `expired` otherwise.
pub fn overdue_target(job: &Job) -> JobStatus {
    let wants_review = job.unresolved_reply.is_some() || job.needs_operator;
    if wants_review && job.status.can_transition_to(JobStatus::TimeoutReview) {
        JobStatus::TimeoutReview
    } else {
        JobStatus::Expired
    }
}

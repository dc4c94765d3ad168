// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema-version tolerant document reader.
//!
//! Stored documents carry a `schema_version`; deployed code and stored data
//! evolve independently, so reads upgrade old shapes in memory through an
//! ordered chain of pure migration functions. Versions above the current one
//! are tolerated with a warning (a newer writer may be live); versions below
//! the collection minimum are hard errors.

use serde_json::Value;
use tracing::warn;

use maitred_core::MaitredError;

pub const JOBS_COLLECTION: &str = "jobs";
pub const THREADS_COLLECTION: &str = "threads";

/// Declared versions per collection: (minimum supported, current).
fn version_bounds(collection: &str) -> Result<(i64, i64), MaitredError> {
    match collection {
        JOBS_COLLECTION => Ok((0, 2)),
        THREADS_COLLECTION => Ok((0, 1)),
        other => Err(MaitredError::Internal(format!(
            "unknown document collection `{other}`"
        ))),
    }
}

/// Version this build writes for a collection.
pub fn current_version(collection: &str) -> Result<i64, MaitredError> {
    version_bounds(collection).map(|(_, current)| current)
}

/// Version recorded in a document; missing or malformed means 0 (legacy).
pub fn doc_version(doc: &Value) -> i64 {
    doc.get("schema_version")
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

/// Reject documents below the collection's supported floor; tolerate
/// documents from the future.
pub fn validate_schema_version(collection: &str, version: i64) -> Result<(), MaitredError> {
    let (minimum, current) = version_bounds(collection)?;
    if version < minimum {
        return Err(MaitredError::SchemaVersion {
            collection: collection.to_string(),
            version,
            minimum,
        });
    }
    if version > current {
        warn!(
            collection,
            version, current, "document version is newer than this build; reading leniently"
        );
    }
    Ok(())
}

/// Result of running a document through the migration chain.
#[derive(Debug, Clone)]
pub struct MigratedDoc {
    pub doc: Value,
    pub from_version: i64,
    pub migrated: bool,
}

/// Upgrade `doc` to the collection's current schema version in memory.
///
/// Documents at or above the current version pass through untouched apart
/// from version validation. Persisting the upgraded document is the caller's
/// decision: transition transactions rewrite and log it, plain reads don't.
pub fn migrate_to_current(collection: &str, mut doc: Value) -> Result<MigratedDoc, MaitredError> {
    let from_version = doc_version(&doc);
    validate_schema_version(collection, from_version)?;

    let (_, current) = version_bounds(collection)?;
    if from_version >= current {
        return Ok(MigratedDoc {
            doc,
            from_version,
            migrated: false,
        });
    }

    let mut version = from_version;
    while version < current {
        doc = match (collection, version) {
            (JOBS_COLLECTION, 0) => job_v0_to_v1(doc),
            (JOBS_COLLECTION, 1) => job_v1_to_v2(doc),
            (THREADS_COLLECTION, 0) => thread_v0_to_v1(doc),
            _ => {
                return Err(MaitredError::Internal(format!(
                    "no migration step for {collection} v{version}"
                )))
            }
        };
        version += 1;
    }

    if let Some(obj) = doc.as_object_mut() {
        obj.insert("schema_version".to_string(), Value::from(current));
    }

    Ok(MigratedDoc {
        doc,
        from_version,
        migrated: true,
    })
}

/// Record a persisted read-path upgrade. Runs inside the caller's
/// transaction so the rewrite and its log row commit together.
pub fn log_doc_migration(
    conn: &rusqlite::Connection,
    collection: &str,
    doc_id: &str,
    from_version: i64,
    to_version: i64,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO doc_migration_log (collection, doc_id, from_version, to_version)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![collection, doc_id, from_version, to_version],
    )?;
    Ok(())
}

/// v0 stored `merchant_target` as a bare phone string.
fn job_v0_to_v1(mut doc: Value) -> Value {
    if let Some(obj) = doc.as_object_mut() {
        let phone = obj
            .get("merchant_target")
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(phone) = phone {
            obj.insert(
                "merchant_target".to_string(),
                serde_json::json!({ "kind": "unlisted", "name": "", "phone": phone }),
            );
        }
    }
    doc
}

/// v1 recorded dispatch results as flat `dispatch_channel` /
/// `dispatch_message_id` fields; v2 groups them into a `dispatch_evidence`
/// object.
fn job_v1_to_v2(mut doc: Value) -> Value {
    if let Some(obj) = doc.as_object_mut() {
        let channel = obj
            .remove("dispatch_channel")
            .and_then(|v| v.as_str().map(str::to_string));
        let message_id = obj
            .remove("dispatch_message_id")
            .filter(|v| v.is_string());
        if let Some(channel) = channel {
            let sent_at = obj
                .get("updated_at")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let delivered = message_id.is_some();
            obj.insert(
                "dispatch_evidence".to_string(),
                serde_json::json!({
                    "channel": channel,
                    "message_id": message_id,
                    "sent_at": sent_at,
                    "delivered": delivered,
                    "failure_reason": null,
                }),
            );
        }
    }
    doc
}

/// v0 threads tracked gate state as an `awaiting` boolean.
fn thread_v0_to_v1(mut doc: Value) -> Value {
    if let Some(obj) = doc.as_object_mut() {
        let awaiting = obj
            .remove("awaiting")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let state = if awaiting {
            "awaiting-confirmation"
        } else {
            "normal"
        };
        obj.insert("state".to_string(), Value::from(state));
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use maitred_core::{Job, MerchantTarget, Thread, ThreadState};
    use serde_json::json;

    fn legacy_job_doc() -> Value {
        json!({
            "id": "job-legacy",
            "status": "dispatched",
            "action_type": "taxi",
            "action_data": { "pickup": "Pier 7", "dropoff": "Hotel Mar" },
            "owner_user_id": "user-1",
            "merchant_target": "+15550001111",
            "hold_expires_at": "2026-01-01T00:10:00.000Z",
            "created_at": "2026-01-01T00:00:00.000Z",
            "updated_at": "2026-01-01T00:01:00.000Z"
        })
    }

    #[test]
    fn v0_job_reads_back_at_current_version() {
        let migrated = migrate_to_current(JOBS_COLLECTION, legacy_job_doc()).unwrap();
        assert!(migrated.migrated);
        assert_eq!(migrated.from_version, 0);
        assert_eq!(doc_version(&migrated.doc), 2);

        // Bare phone became a tagged unlisted target, and the document now
        // parses into the current struct.
        let job: Job = serde_json::from_value(migrated.doc).unwrap();
        match job.merchant_target {
            Some(MerchantTarget::Unlisted { phone, .. }) => {
                assert_eq!(phone, "+15550001111");
            }
            other => panic!("expected unlisted target, got {other:?}"),
        }
        assert_eq!(job.schema_version, 2);
    }

    #[test]
    fn v1_flat_dispatch_fields_become_evidence() {
        let mut doc = legacy_job_doc();
        let obj = doc.as_object_mut().unwrap();
        obj.insert("schema_version".into(), json!(1));
        obj.insert(
            "merchant_target".into(),
            json!({ "kind": "listed", "business_id": "biz-1" }),
        );
        obj.insert("dispatch_channel".into(), json!("sms"));
        obj.insert("dispatch_message_id".into(), json!("msg-123"));

        let migrated = migrate_to_current(JOBS_COLLECTION, doc).unwrap();
        assert!(migrated.migrated);
        assert_eq!(migrated.from_version, 1);

        let evidence = &migrated.doc["dispatch_evidence"];
        assert_eq!(evidence["channel"], "sms");
        assert_eq!(evidence["message_id"], "msg-123");
        assert_eq!(evidence["delivered"], true);
        assert!(migrated.doc.get("dispatch_channel").is_none());
        assert!(migrated.doc.get("dispatch_message_id").is_none());
    }

    #[test]
    fn current_version_doc_passes_through_untouched() {
        let mut doc = legacy_job_doc();
        doc.as_object_mut()
            .unwrap()
            .insert("schema_version".into(), json!(2));
        let before = doc.clone();

        let migrated = migrate_to_current(JOBS_COLLECTION, doc).unwrap();
        assert!(!migrated.migrated);
        assert_eq!(migrated.doc, before);
    }

    #[test]
    fn future_version_is_tolerated() {
        let mut doc = legacy_job_doc();
        doc.as_object_mut()
            .unwrap()
            .insert("schema_version".into(), json!(7));

        let migrated = migrate_to_current(JOBS_COLLECTION, doc).unwrap();
        assert!(!migrated.migrated);
        assert_eq!(doc_version(&migrated.doc), 7);
    }

    #[test]
    fn below_minimum_version_is_rejected() {
        let mut doc = legacy_job_doc();
        doc.as_object_mut()
            .unwrap()
            .insert("schema_version".into(), json!(-1));

        let err = migrate_to_current(JOBS_COLLECTION, doc).unwrap_err();
        match err {
            MaitredError::SchemaVersion {
                collection,
                version,
                minimum,
            } => {
                assert_eq!(collection, "jobs");
                assert_eq!(version, -1);
                assert_eq!(minimum, 0);
            }
            other => panic!("expected SchemaVersion error, got {other:?}"),
        }
    }

    #[test]
    fn v0_thread_awaiting_flag_becomes_state() {
        let doc = json!({
            "id": "thr-gen-abc",
            "thread_type": "general",
            "actor_id": "user-1",
            "awaiting": true,
            "created_at": "2026-01-01T00:00:00.000Z",
            "updated_at": "2026-01-01T00:00:00.000Z"
        });

        let migrated = migrate_to_current(THREADS_COLLECTION, doc).unwrap();
        assert!(migrated.migrated);

        let thread: Thread = serde_json::from_value(migrated.doc).unwrap();
        assert_eq!(thread.state, ThreadState::AwaitingConfirmation);
        assert_eq!(thread.schema_version, 1);
        assert!(thread.pending_action.is_none());
    }

    #[test]
    fn v0_thread_without_awaiting_is_normal() {
        let doc = json!({
            "id": "thr-gen-abc",
            "thread_type": "general",
            "actor_id": "user-1",
            "created_at": "2026-01-01T00:00:00.000Z",
            "updated_at": "2026-01-01T00:00:00.000Z"
        });

        let migrated = migrate_to_current(THREADS_COLLECTION, doc).unwrap();
        let thread: Thread = serde_json::from_value(migrated.doc).unwrap();
        assert_eq!(thread.state, ThreadState::Normal);
    }

    #[test]
    fn unknown_collection_is_internal_error() {
        let err = migrate_to_current("listings", json!({})).unwrap_err();
        assert!(matches!(err, MaitredError::Internal(_)));
    }
}

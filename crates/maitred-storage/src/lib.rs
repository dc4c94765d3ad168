// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the maitred engine.
//!
//! One [`Database`] per process wraps a single serialized connection; every
//! write in the system funnels through it. Documents are stored as JSON with
//! extracted scalar columns for querying, and reads pass through the
//! schema-version tolerant layer in [`schema`].

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod schema;

pub use database::{map_sql_err, map_tr_err, Database};
pub use models::{AuditRow, StatusCount};
pub use schema::{MigratedDoc, JOBS_COLLECTION, THREADS_COLLECTION};

// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table family.
//!
//! Only the tables shared by several crates live here; the idempotency and
//! counter crates own the SQL for their private tables.

pub mod jobs;
pub mod threads;

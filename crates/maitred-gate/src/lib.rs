// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-thread confirmation gate.

pub mod gate;

pub use gate::{ConfirmationGate, GateAction, GateOutcome};

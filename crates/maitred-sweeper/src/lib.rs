// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled expiry sweeping.

pub mod runner;

pub use runner::{install_signal_handler, SweepRunner};

// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared test infrastructure for Maitred integration tests.
//!
//! Provides [`TestHarness`] for assembling a full engine stack on a temp
//! database and [`MockSender`] for capturing dispatch sends without a real
//! messaging gateway.

pub mod harness;
pub mod mock_sender;

pub use harness::{InboundResult, TestHarness, TestHarnessBuilder};
pub use mock_sender::{MockSender, SendMode, SentDispatch};

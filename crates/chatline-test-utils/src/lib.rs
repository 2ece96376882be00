// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Chatline integration tests.
//!
//! Provides a fault-injecting store and a harness that wires a `ChatClient`
//! to it, for deterministic tests without a real backend.
//!
//! # Components
//!
//! - [`FlakyStore`] - In-memory store wrapper with failure switches, call
//!   counters and yield points
//! - [`RecordingObserver`] - Snapshot observer that captures every delivery
//! - [`TestHarness`] - Builder-configured `ChatClient` over a `FlakyStore`

pub mod flaky_store;
pub mod harness;
pub mod recording_observer;

pub use flaky_store::FlakyStore;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use recording_observer::RecordingObserver;

// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable client-side key/value storage for the visitor identity.

use crate::error::ChatlineError;
use crate::traits::adapter::Adapter;

/// Small durable key/value store that survives reloads.
pub trait IdentityStorage: Adapter {
    /// Reads the value stored under `key`.
    fn load(&self, key: &str) -> Result<Option<String>, ChatlineError>;

    /// Persists `value` under `key`, replacing any previous value.
    fn store(&self, key: &str, value: &str) -> Result<(), ChatlineError>;
}

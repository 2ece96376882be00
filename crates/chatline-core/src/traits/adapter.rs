// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait that all store adapters must implement.

use async_trait::async_trait;

use crate::error::ChatlineError;
use crate::types::{AdapterType, HealthStatus};

/// The base trait for all Chatline store adapters.
///
/// Every adapter (session store, message store, blob store, identity storage)
/// implements this trait, which provides identity and health check capabilities.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// Returns the kind of adapter.
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, ChatlineError>;
}

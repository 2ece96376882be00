// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blob store trait for media uploads.

use async_trait::async_trait;

use crate::error::ChatlineError;
use crate::traits::adapter::Adapter;
use crate::types::MediaBlob;

/// Content store that holds uploaded media and hands out URLs.
#[async_trait]
pub trait BlobStore: Adapter {
    /// Stores `blob` at `path` and returns a URL that resolves to it.
    async fn upload(&self, path: &str, blob: &MediaBlob) -> Result<String, ChatlineError>;
}

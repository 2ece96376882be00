// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory content store for media uploads.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use chatline_core::{Adapter, AdapterType, BlobStore, ChatlineError, HealthStatus, MediaBlob};

/// Keeps uploaded blobs in memory and hands out `{base_url}/{path}` URLs.
pub struct MemoryBlobStore {
    base_url: String,
    blobs: Mutex<HashMap<String, MediaBlob>>,
}

impl MemoryBlobStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            blobs: Mutex::new(HashMap::new()),
        }
    }

    /// The blob stored at `path`, if any.
    pub fn get(&self, path: &str) -> Option<MediaBlob> {
        self.blobs
            .lock()
            .ok()
            .and_then(|blobs| blobs.get(path).cloned())
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|blobs| blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Adapter for MemoryBlobStore {
    fn name(&self) -> &str {
        "memory-blob"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::BlobStore
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatlineError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, blob: &MediaBlob) -> Result<String, ChatlineError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| ChatlineError::remote("upload", "blob store lock poisoned"))?;
        blobs.insert(path.to_string(), blob.clone());
        debug!(path, bytes = blob.len(), "blob uploaded");
        Ok(format!("{}/{}", self.base_url, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_returns_url_under_base() {
        let store = MemoryBlobStore::new("memory://media/");
        let blob = MediaBlob::new("a.png", "image/png", vec![9]);
        let url = store.upload("chat_media/s1/1_a.png", &blob).await.unwrap();
        assert_eq!(url, "memory://media/chat_media/s1/1_a.png");
        assert_eq!(store.get("chat_media/s1/1_a.png"), Some(blob));
        assert_eq!(store.len(), 1);
    }
}

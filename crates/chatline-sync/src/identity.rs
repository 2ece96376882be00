// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stable anonymous visitor identity.

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use chatline_config::model::VisitorConfig;
use chatline_core::{ChatlineError, IdentityStorage, VisitorId};

/// Resolves the visitor id, generating and persisting it on first use.
///
/// The resolved id is cached, so durable storage is read at most once per
/// provider and written at most once per device.
pub struct VisitorIdentityProvider {
    storage: Arc<dyn IdentityStorage>,
    key: String,
    cached: Mutex<Option<VisitorId>>,
}

impl VisitorIdentityProvider {
    pub fn new(storage: Arc<dyn IdentityStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            cached: Mutex::new(None),
        }
    }

    pub fn from_config(storage: Arc<dyn IdentityStorage>, config: &VisitorConfig) -> Self {
        Self::new(storage, config.storage_key.clone())
    }

    /// Returns the persisted visitor id, creating one if none exists.
    ///
    /// A blank stored value counts as absent.
    pub fn get_or_create_visitor_id(&self) -> Result<VisitorId, ChatlineError> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| ChatlineError::Internal("visitor identity lock poisoned".into()))?;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let id = match self.storage.load(&self.key)? {
            Some(value) if !value.trim().is_empty() => {
                debug!(storage = self.storage.name(), "visitor id loaded");
                VisitorId::new(value.trim())
            }
            _ => {
                let id = VisitorId::new(uuid::Uuid::new_v4().to_string());
                self.storage.store(&self.key, id.as_str())?;
                info!(visitor_id = %id, storage = self.storage.name(), "visitor id created");
                id
            }
        };

        *cached = Some(id.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_storage::MemoryIdentityStorage;

    #[test]
    fn generates_once_and_persists() {
        let storage = Arc::new(MemoryIdentityStorage::new());
        let provider = VisitorIdentityProvider::new(storage.clone(), "vid");
        let first = provider.get_or_create_visitor_id().unwrap();
        let second = provider.get_or_create_visitor_id().unwrap();
        assert_eq!(first, second);
        assert_eq!(storage.load("vid").unwrap().as_deref(), Some(first.as_str()));

        let reloaded = VisitorIdentityProvider::new(storage, "vid");
        assert_eq!(reloaded.get_or_create_visitor_id().unwrap(), first);
    }

    #[test]
    fn blank_value_is_replaced() {
        let storage = Arc::new(MemoryIdentityStorage::new());
        storage.store("vid", "   ").unwrap();
        let provider = VisitorIdentityProvider::new(storage.clone(), "vid");
        let id = provider.get_or_create_visitor_id().unwrap();
        assert!(!id.as_str().trim().is_empty());
        assert_eq!(storage.load("vid").unwrap().as_deref(), Some(id.as_str()));
    }

    #[test]
    fn existing_value_is_reused() {
        let storage = Arc::new(MemoryIdentityStorage::new());
        storage.store("vid", "abcdef123").unwrap();
        let provider = VisitorIdentityProvider::new(storage, "vid");
        assert_eq!(provider.get_or_create_visitor_id().unwrap().as_str(), "abcdef123");
    }
}

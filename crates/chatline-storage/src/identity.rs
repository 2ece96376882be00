// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable key/value storage for the visitor identity.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use chatline_core::{Adapter, AdapterType, ChatlineError, HealthStatus, IdentityStorage};

fn storage_error(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> ChatlineError {
    ChatlineError::IdentityStorage { source: err.into() }
}

/// Stores keys in a small JSON object on disk.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash never leaves a half-written identity file.
pub struct FileIdentityStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileIdentityStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, ChatlineError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(storage_error),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(storage_error(err)),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), ChatlineError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(storage_error)?;
        }
        let json = serde_json::to_string_pretty(map).map_err(storage_error)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(storage_error)?;
        std::fs::rename(&tmp, &self.path).map_err(storage_error)?;
        Ok(())
    }
}

#[async_trait]
impl Adapter for FileIdentityStorage {
    fn name(&self) -> &str {
        "file-identity"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::IdentityStorage
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatlineError> {
        match self.read_map() {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(err) => Ok(HealthStatus::Unhealthy(err.to_string())),
        }
    }
}

impl IdentityStorage for FileIdentityStorage {
    fn load(&self, key: &str) -> Result<Option<String>, ChatlineError> {
        Ok(self.read_map()?.remove(key))
    }

    fn store(&self, key: &str, value: &str) -> Result<(), ChatlineError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| storage_error("identity write lock poisoned"))?;
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)?;
        debug!(path = %self.path.display(), key, "identity stored");
        Ok(())
    }
}

/// Process-local identity storage; forgets everything on drop.
#[derive(Default)]
pub struct MemoryIdentityStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryIdentityStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Adapter for MemoryIdentityStorage {
    fn name(&self) -> &str {
        "memory-identity"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::IdentityStorage
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatlineError> {
        Ok(HealthStatus::Healthy)
    }
}

impl IdentityStorage for MemoryIdentityStorage {
    fn load(&self, key: &str) -> Result<Option<String>, ChatlineError> {
        let values = self
            .values
            .lock()
            .map_err(|_| storage_error("identity lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), ChatlineError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| storage_error("identity lock poisoned"))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_round_trips_and_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileIdentityStorage::new(dir.path().join("nested/identity.json"));
        assert_eq!(storage.load("visitor").unwrap(), None);

        storage.store("visitor", "abc").unwrap();
        storage.store("other", "xyz").unwrap();

        let reopened = FileIdentityStorage::new(dir.path().join("nested/identity.json"));
        assert_eq!(reopened.load("visitor").unwrap().as_deref(), Some("abc"));
        assert_eq!(reopened.load("other").unwrap().as_deref(), Some("xyz"));
        assert!(!dir.path().join("nested/identity.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");
        std::fs::write(&path, "{not json").unwrap();
        let storage = FileIdentityStorage::new(&path);
        let err = storage.load("visitor").unwrap_err();
        assert!(matches!(err, ChatlineError::IdentityStorage { .. }));
    }

    #[tokio::test]
    async fn corrupt_file_reports_unhealthy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");
        std::fs::write(&path, "[]").unwrap();
        let storage = FileIdentityStorage::new(&path);
        assert!(matches!(
            storage.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[test]
    fn memory_storage_overwrites() {
        let storage = MemoryIdentityStorage::new();
        storage.store("k", "1").unwrap();
        storage.store("k", "2").unwrap();
        assert_eq!(storage.load("k").unwrap().as_deref(), Some("2"));
    }
}

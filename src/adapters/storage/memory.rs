//! In-memory blob storage for tests

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::adapters::storage::Blobstore;
use crate::domain::errors::{BeaconError, StorageError};
use crate::domain::result::Result;

/// Blob storage backed by a process-local map
#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Blobstore for MemoryStorage {
    async fn create_object(
        &self,
        container: &str,
        name: &str,
        contents: &[u8],
        _cacheable: bool,
        _content_type: &str,
    ) -> Result<()> {
        self.objects
            .write()
            .await
            .insert((container.to_string(), name.to_string()), contents.to_vec());
        Ok(())
    }

    async fn delete_object(&self, container: &str, name: &str) -> Result<()> {
        self.objects
            .write()
            .await
            .remove(&(container.to_string(), name.to_string()));
        Ok(())
    }

    async fn get_object(&self, container: &str, name: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(&(container.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| {
                BeaconError::Storage(StorageError::NotFound(format!("{container}/{name}")))
            })
    }
}

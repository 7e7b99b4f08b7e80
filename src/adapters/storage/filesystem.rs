//! Filesystem blob storage
//!
//! Stores objects as files under `root/container/name`. Useful for
//! single-node deployments and local development; the serving hints of
//! the contract have no meaning on local disk and are ignored.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::adapters::storage::Blobstore;
use crate::domain::errors::{BeaconError, StorageError};
use crate::domain::result::Result;

/// Blob storage rooted at a local directory
pub struct FilesystemStorage {
    root: PathBuf,
}

impl FilesystemStorage {
    /// Creates a store rooted at `root`. The directory is created lazily
    /// on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, container: &str, name: &str) -> PathBuf {
        self.root.join(container).join(name)
    }
}

#[async_trait]
impl Blobstore for FilesystemStorage {
    async fn create_object(
        &self,
        container: &str,
        name: &str,
        contents: &[u8],
        _cacheable: bool,
        _content_type: &str,
    ) -> Result<()> {
        let path = self.object_path(container, name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_io(&path, e))?;
        }
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| storage_io(&path, e))?;
        tracing::debug!(path = %path.display(), bytes = contents.len(), "wrote object");
        Ok(())
    }

    async fn delete_object(&self, container: &str, name: &str) -> Result<()> {
        let path = self.object_path(container, name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_io(&path, e)),
        }
    }

    async fn get_object(&self, container: &str, name: &str) -> Result<Vec<u8>> {
        let path = self.object_path(container, name);
        match tokio::fs::read(&path).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BeaconError::Storage(
                StorageError::NotFound(format!("{container}/{name}")),
            )),
            Err(e) => Err(storage_io(&path, e)),
        }
    }
}

fn storage_io(path: &Path, err: std::io::Error) -> BeaconError {
    BeaconError::Storage(StorageError::Io(format!("{}: {err}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_get_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStorage::new(dir.path());

        store
            .create_object("exports", "batch-1.bin", b"payload", false, "application/zip")
            .await
            .unwrap();

        let got = store.get_object("exports", "batch-1.bin").await.unwrap();
        assert_eq!(got, b"payload");

        store.delete_object("exports", "batch-1.bin").await.unwrap();
        let err = store.get_object("exports", "batch-1.bin").await.unwrap_err();
        assert!(matches!(
            err,
            BeaconError::Storage(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_absent_object_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStorage::new(dir.path());
        assert!(store.delete_object("exports", "missing").await.is_ok());
    }

    #[tokio::test]
    async fn test_create_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStorage::new(dir.path());

        store
            .create_object("c", "o", b"one", true, "text/plain")
            .await
            .unwrap();
        store
            .create_object("c", "o", b"two", true, "text/plain")
            .await
            .unwrap();

        assert_eq!(store.get_object("c", "o").await.unwrap(), b"two");
    }
}

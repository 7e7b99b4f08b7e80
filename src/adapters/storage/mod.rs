//! Blob storage abstraction
//!
//! The export publishing pipeline writes signed batch files through this
//! interface; the import command reads peer payloads back through it. The
//! contract is deliberately small: put, get, delete, with delete of an
//! absent object treated as success.

pub mod filesystem;
pub mod memory;

use async_trait::async_trait;

use crate::domain::result::Result;

pub use filesystem::FilesystemStorage;
pub use memory::MemoryStorage;

/// Byte-blob storage contract
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait Blobstore: Send + Sync {
    /// Creates an object, overwriting any existing one.
    ///
    /// `cacheable` and `content_type` are serving hints; implementations
    /// without a serving layer may ignore them.
    async fn create_object(
        &self,
        container: &str,
        name: &str,
        contents: &[u8],
        cacheable: bool,
        content_type: &str,
    ) -> Result<()>;

    /// Deletes an object. Deleting an absent object is a success.
    async fn delete_object(&self, container: &str, name: &str) -> Result<()>;

    /// Returns the contents of an object.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`](crate::domain::errors::StorageError)
    /// when the object does not exist.
    async fn get_object(&self, container: &str, name: &str) -> Result<Vec<u8>>;
}

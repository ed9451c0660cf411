//! ObjectStore - envelope storage keyed by locator.
//!
//! Thin public face over [`Storage`]. Adds the convenience constructors,
//! logging and not-found semantics the vault relies on.

use std::path::Path;

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::{BlobStoreError, Result};
use crate::storage::{ObjectStoreConfig, Storage};

/// Stores opaque envelope bytes under caller-chosen locators.
///
/// Cloning is cheap; clones share the same backend.
///
/// # Example
///
/// ```rust,no_run
/// use lockbox_object_store::ObjectStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = ObjectStore::new_ephemeral().await?;
/// store.put("owner/file.txt", b"envelope".to_vec()).await?;
/// let bytes = store.fetch("owner/file.txt").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ObjectStore {
    storage: Storage,
}

impl ObjectStore {
    /// Create a new ObjectStore with the given configuration.
    pub async fn new(config: &ObjectStoreConfig) -> Result<Self> {
        let storage = Storage::new(config).await?;
        Ok(Self { storage })
    }

    /// Create a new ObjectStore backed by the local filesystem.
    ///
    /// # Arguments
    /// * `data_dir` - Directory for all storage (objects at data_dir/objects/)
    pub async fn new_local(data_dir: &Path) -> Result<Self> {
        let config = ObjectStoreConfig::Local {
            path: data_dir.join("objects"),
        };
        Self::new(&config).await
    }

    /// Create a fully ephemeral in-memory ObjectStore.
    ///
    /// Data will be lost when the last clone is dropped. Useful for testing.
    pub async fn new_ephemeral() -> Result<Self> {
        Ok(Self {
            storage: Storage::memory(),
        })
    }

    /// Store `data` under `locator`, overwriting any previous envelope.
    pub async fn put(&self, locator: &str, data: impl Into<Bytes>) -> Result<()> {
        let data = data.into();
        let size = data.len();
        debug!(locator, size, "storing envelope");
        self.storage.put(locator, data).await?;
        info!(locator, size, "envelope stored");
        Ok(())
    }

    /// Retrieve the envelope under `locator`, if any.
    pub async fn get(&self, locator: &str) -> Result<Option<Bytes>> {
        self.storage.get(locator).await
    }

    /// Retrieve the envelope under `locator`, failing if it is missing.
    pub async fn fetch(&self, locator: &str) -> Result<Bytes> {
        self.storage
            .get(locator)
            .await?
            .ok_or_else(|| BlobStoreError::NotFound(locator.to_string()))
    }

    pub async fn has(&self, locator: &str) -> Result<bool> {
        self.storage.has(locator).await
    }

    /// Delete an envelope. Returns whether anything was removed.
    pub async fn delete(&self, locator: &str) -> Result<bool> {
        if !self.storage.has(locator).await? {
            return Ok(false);
        }
        self.storage.delete(locator).await?;
        info!(locator, "envelope deleted");
        Ok(true)
    }

    /// List every stored locator in sorted order.
    pub async fn list(&self) -> Result<Vec<String>> {
        self.storage.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ephemeral_store() {
        let store = ObjectStore::new_ephemeral().await.unwrap();

        let data = b"hello world".to_vec();
        store.put("a/b", data.clone()).await.unwrap();

        let retrieved = store.fetch("a/b").await.unwrap();
        assert_eq!(retrieved.as_ref(), data.as_slice());
        assert!(store.has("a/b").await.unwrap());
    }

    #[tokio::test]
    async fn test_local_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new_local(temp_dir.path()).await.unwrap();

        let data = b"test local storage".to_vec();
        store.put("owner/file.bin", data.clone()).await.unwrap();

        assert!(temp_dir
            .path()
            .join("objects")
            .join("envelopes")
            .join("owner")
            .join("file.bin")
            .exists());

        let retrieved = store.fetch("owner/file.bin").await.unwrap();
        assert_eq!(retrieved.as_ref(), data.as_slice());
    }

    #[tokio::test]
    async fn test_local_store_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        {
            let store = ObjectStore::new_local(temp_dir.path()).await.unwrap();
            store.put("one", b"blob one".to_vec()).await.unwrap();
            store.put("two", b"blob two".to_vec()).await.unwrap();
        }

        let store = ObjectStore::new_local(temp_dir.path()).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["one", "two"]);
        assert_eq!(store.fetch("two").await.unwrap().as_ref(), b"blob two");
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let store = ObjectStore::new_ephemeral().await.unwrap();

        assert!(!store.has("missing").await.unwrap());
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(matches!(
            store.fetch("missing").await,
            Err(BlobStoreError::NotFound(_))
        ));
        assert!(!store.delete("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_overwrite_and_delete() {
        let store = ObjectStore::new_ephemeral().await.unwrap();

        store.put("x", b"first".to_vec()).await.unwrap();
        store.put("x", b"second".to_vec()).await.unwrap();
        assert_eq!(store.fetch("x").await.unwrap().as_ref(), b"second");
        assert_eq!(store.list().await.unwrap().len(), 1);

        assert!(store.delete("x").await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_locator_is_rejected() {
        let store = ObjectStore::new_ephemeral().await.unwrap();
        let result = store.put("../outside", b"nope".to_vec()).await;
        assert!(matches!(result, Err(BlobStoreError::InvalidLocator(_))));
    }

    #[tokio::test]
    async fn test_clones_share_backend() {
        let store = ObjectStore::new_ephemeral().await.unwrap();
        let other = store.clone();
        store.put("shared", b"bytes".to_vec()).await.unwrap();
        assert!(other.has("shared").await.unwrap());
    }
}

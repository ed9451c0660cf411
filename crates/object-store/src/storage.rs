//! Object storage backend abstraction (S3/MinIO/local filesystem/memory).

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};

use crate::error::{BlobStoreError, Result};

/// Prefix every envelope is stored under
const ENVELOPE_PREFIX: &str = "envelopes";

/// Configuration for the object storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectStoreConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage
    Local {
        /// Path to the storage directory
        path: PathBuf,
    },

    /// S3-compatible storage (AWS S3, MinIO, etc.)
    S3 {
        /// S3 endpoint URL (e.g., "http://localhost:9000" for MinIO)
        endpoint: String,
        /// Access key ID
        access_key: String,
        /// Secret access key
        secret_key: String,
        /// Bucket name
        bucket: String,
        /// Optional region (defaults to "us-east-1")
        region: Option<String>,
    },
}

/// List under the envelope prefix once, mapping a missing bucket to
/// [`BlobStoreError::BucketNotFound`].
async fn check_bucket(store: &dyn ObjectStore, bucket: &str) -> Result<()> {
    let prefix = ObjectPath::from(ENVELOPE_PREFIX);
    let first = store.list(Some(&prefix)).try_next().await;
    match first {
        Ok(_) => Ok(()),
        Err(object_store::Error::NotFound { .. }) => {
            Err(BlobStoreError::BucketNotFound(bucket.to_string()))
        }
        Err(e) if e.to_string().contains("NoSuchBucket") => {
            Err(BlobStoreError::BucketNotFound(bucket.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Wrapper around different object storage backends.
#[derive(Debug, Clone)]
pub(crate) struct Storage {
    inner: Arc<dyn ObjectStore>,
}

impl Storage {
    /// Create a new storage backend from configuration.
    pub async fn new(config: &ObjectStoreConfig) -> Result<Self> {
        let inner: Arc<dyn ObjectStore> = match config {
            ObjectStoreConfig::Memory => Arc::new(InMemory::new()),

            ObjectStoreConfig::Local { path } => {
                tokio::fs::create_dir_all(path).await?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(path)
                        .map_err(|e| BlobStoreError::InvalidConfig(e.to_string()))?,
                )
            }

            ObjectStoreConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                let builder = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(endpoint.starts_with("http://"));

                let store: Arc<dyn ObjectStore> = Arc::new(
                    builder
                        .build()
                        .map_err(|e| BlobStoreError::InvalidConfig(e.to_string()))?,
                );

                // Fail fast if the bucket is missing
                check_bucket(store.as_ref(), bucket).await?;

                store
            }
        };

        Ok(Self { inner })
    }

    /// Create an in-memory storage backend.
    pub fn memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
        }
    }

    /// Map a locator onto its object path.
    ///
    /// Locators are `/` separated relative paths. Empty segments, `.` and
    /// `..` are rejected.
    pub(crate) fn envelope_path(locator: &str) -> Result<ObjectPath> {
        let invalid = || BlobStoreError::InvalidLocator(locator.to_string());
        if locator.is_empty() || locator.starts_with('/') || locator.contains('\\') {
            return Err(invalid());
        }
        if locator
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(invalid());
        }
        ObjectPath::parse(format!("{}/{}", ENVELOPE_PREFIX, locator)).map_err(|_| invalid())
    }

    /// Put envelope bytes into storage, replacing anything at `locator`.
    pub async fn put(&self, locator: &str, data: Bytes) -> Result<()> {
        let path = Self::envelope_path(locator)?;
        self.inner.put(&path, data.into()).await?;
        Ok(())
    }

    /// Get envelope bytes from storage.
    pub async fn get(&self, locator: &str) -> Result<Option<Bytes>> {
        let path = Self::envelope_path(locator)?;
        match self.inner.get(&path).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                Ok(Some(bytes))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if an envelope exists in storage.
    pub async fn has(&self, locator: &str) -> Result<bool> {
        let path = Self::envelope_path(locator)?;
        match self.inner.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an envelope from storage.
    pub async fn delete(&self, locator: &str) -> Result<()> {
        let path = Self::envelope_path(locator)?;
        // Already gone is fine
        match self.inner.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// List all locators, sorted.
    pub async fn list(&self) -> Result<Vec<String>> {
        let prefix = ObjectPath::from(ENVELOPE_PREFIX);
        let items: Vec<_> = self.inner.list(Some(&prefix)).try_collect().await?;

        let strip = format!("{}/", ENVELOPE_PREFIX);
        let mut locators: Vec<String> = items
            .into_iter()
            .filter_map(|meta| {
                let path = meta.location.as_ref();
                path.strip_prefix(strip.as_str()).map(|s| s.to_string())
            })
            .collect();
        locators.sort();

        Ok(locators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = Storage::memory();

        let locator = "owner-1/report.pdf";
        let data = Bytes::from("hello world");

        storage.put(locator, data.clone()).await.unwrap();
        let retrieved = storage.get(locator).await.unwrap().unwrap();
        assert_eq!(retrieved, data);

        assert!(storage.has(locator).await.unwrap());

        let locators = storage.list().await.unwrap();
        assert_eq!(locators, vec![locator.to_string()]);

        storage.delete(locator).await.unwrap();
        assert!(!storage.has(locator).await.unwrap());
        assert!(storage.get(locator).await.unwrap().is_none());

        // deleting twice is not an error
        storage.delete(locator).await.unwrap();
    }

    #[tokio::test]
    async fn test_local_storage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = ObjectStoreConfig::Local {
            path: temp_dir.path().to_path_buf(),
        };

        let storage = Storage::new(&config).await.unwrap();

        let locator = "owner-2/notes.txt";
        let data = Bytes::from("test data");

        storage.put(locator, data.clone()).await.unwrap();
        let retrieved = storage.get(locator).await.unwrap().unwrap();
        assert_eq!(retrieved, data);

        let file_path = temp_dir
            .path()
            .join(ENVELOPE_PREFIX)
            .join("owner-2")
            .join("notes.txt");
        assert!(file_path.exists());
    }

    #[tokio::test]
    async fn test_check_bucket_accepts_reachable_store() {
        let empty = InMemory::new();
        check_bucket(&empty, "envelopes-bucket").await.unwrap();

        let storage = Storage::memory();
        storage.put("owner/a", Bytes::from("x")).await.unwrap();
        check_bucket(storage.inner.as_ref(), "envelopes-bucket")
            .await
            .unwrap();
    }

    #[test]
    fn test_invalid_locators() {
        for locator in ["", "/abs", "a//b", "../escape", "a/./b", "a\\b", "a/"] {
            assert!(
                matches!(
                    Storage::envelope_path(locator),
                    Err(BlobStoreError::InvalidLocator(_))
                ),
                "{:?} should be rejected",
                locator
            );
        }
        assert!(Storage::envelope_path("user/file-name.bin").is_ok());
    }

    #[test]
    fn test_config_serde() {
        let config = ObjectStoreConfig::Local {
            path: PathBuf::from("/var/lib/lockbox"),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"type":"local","path":"/var/lib/lockbox"}"#);

        let parsed: ObjectStoreConfig = toml::from_str("type = \"memory\"").unwrap();
        assert_eq!(parsed, ObjectStoreConfig::Memory);
    }
}

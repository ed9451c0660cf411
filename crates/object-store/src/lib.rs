//! Object Storage Backend
//!
//! Byte-level storage for encrypted file envelopes. Envelopes are opaque to
//! this crate: it only maps a locator string to a blob of bytes.
//!
//! # Features
//!
//! - Multiple storage backends: S3, MinIO, local filesystem, in-memory
//! - Locators are validated so they cannot escape the store's prefix
//!
//! # Example
//!
//! ```rust,no_run
//! use lockbox_object_store::ObjectStore;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), lockbox_object_store::BlobStoreError> {
//! // Create a local file-based store
//! let store = ObjectStore::new_local(Path::new("/tmp/envelopes")).await?;
//! store.put("alice/report.pdf", b"...".to_vec()).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod object_store;
mod storage;

pub use error::{BlobStoreError, Result};
pub use object_store::ObjectStore;
pub use storage::ObjectStoreConfig;

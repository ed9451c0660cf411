//! Bounded-concurrency batch decryption
//!
//! Listing a user's files means one RSA unwrap and one envelope decrypt per
//! file. The private key is unwrapped once by the caller and shared by `Arc`
//! across every item. Each item:
//!
//! 1. waits for a permit from a [`Semaphore`] sized to the concurrency limit
//! 2. (for [`fetch_and_decrypt_batch`]) fetches its envelope from the blob store
//! 3. runs the RSA and AES work on the blocking thread pool
//!
//! The result always has one entry per input item, in input order. A failing
//! item never affects the others, and an item whose task dies is reported as
//! [`BatchItemError::Aborted`] rather than as partial plaintext.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::crypto::{decrypt_download, KeyWrapError, RsaPrivateKey, WrappedContentKey};
use crate::store::{BlobStore, StoreError};

/// Concurrency limit used when none is configured
pub const DEFAULT_CONCURRENCY: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum BatchItemError {
    #[error("decryption failed: {0}")]
    Decrypt(#[from] KeyWrapError),
    #[error("fetch failed: {0}")]
    Fetch(#[from] StoreError),
    #[error("no wrapped content key for file {0}")]
    KeyNotFound(uuid::Uuid),
    #[error("task aborted before completion")]
    Aborted,
}

impl BatchItemError {
    /// True for a tag mismatch: wrong key or tampered data
    pub fn is_authentication(&self) -> bool {
        matches!(self, BatchItemError::Decrypt(KeyWrapError::Authentication))
    }
}

pub type BatchResult = Result<Vec<u8>, BatchItemError>;

async fn decrypt_blocking(
    private_key: Arc<RsaPrivateKey>,
    wrapped: WrappedContentKey,
    envelope: Vec<u8>,
) -> BatchResult {
    let result = tokio::task::spawn_blocking(move || {
        decrypt_download(&private_key, &wrapped, &envelope)
    })
    .await
    .map_err(|_| BatchItemError::Aborted)?;
    Ok(result?)
}

/// Await every spawned item in input order. A task that panicked or was
/// cancelled becomes [`BatchItemError::Aborted`].
async fn join_in_order(handles: Vec<JoinHandle<BatchResult>>) -> Vec<BatchResult> {
    join_all(handles)
        .await
        .into_iter()
        .enumerate()
        .map(|(index, joined)| {
            let result = joined.unwrap_or(Err(BatchItemError::Aborted));
            match &result {
                Ok(bytes) => tracing::debug!(index, size = bytes.len(), "batch item decrypted"),
                Err(e) => tracing::warn!(index, error = %e, "batch item failed"),
            }
            result
        })
        .collect()
}

/// Decrypt already-fetched envelopes
///
/// `limit` is clamped to at least one.
pub async fn decrypt_batch(
    private_key: Arc<RsaPrivateKey>,
    items: Vec<(WrappedContentKey, Vec<u8>)>,
    limit: usize,
) -> Vec<BatchResult> {
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));

    let handles = items
        .into_iter()
        .map(|(wrapped, envelope)| {
            let semaphore = semaphore.clone();
            let private_key = private_key.clone();
            tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| BatchItemError::Aborted)?;
                decrypt_blocking(private_key, wrapped, envelope).await
            })
        })
        .collect();

    join_in_order(handles).await
}

/// Fetch each envelope by locator, then decrypt it
///
/// The fetch happens inside the permit, so at most `limit` items are either
/// downloading or decrypting at any moment. Each item runs in its own task,
/// so a blob store that panics fails only that item.
pub async fn fetch_and_decrypt_batch(
    private_key: Arc<RsaPrivateKey>,
    blobs: Arc<dyn BlobStore>,
    items: Vec<(WrappedContentKey, String)>,
    limit: usize,
) -> Vec<BatchResult> {
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));

    let handles = items
        .into_iter()
        .map(|(wrapped, locator)| {
            let semaphore = semaphore.clone();
            let private_key = private_key.clone();
            let blobs = blobs.clone();
            tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| BatchItemError::Aborted)?;
                let envelope = blobs.fetch(&locator).await?;
                decrypt_blocking(private_key, wrapped, envelope).await
            })
        })
        .collect();

    join_in_order(handles).await
}

use std::path::PathBuf;
use std::sync::Arc;

use common::store::{UserDirectory, UserRecord};
use common::vault::{Vault, VaultError};
use object_store::{BlobStoreError, ObjectStore};

use crate::registry::{Registry, RegistryError};
use crate::state::{AppState, StateError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("failed to open blob store: {0}")]
    BlobStore(#[from] BlobStoreError),
}

/// Everything an op needs to talk to the vault for one invocation
pub struct Session {
    pub registry: Registry,
    pub vault: Vault,
}

impl Session {
    pub async fn open(config_path: Option<PathBuf>) -> Result<Self, SessionError> {
        let state = AppState::load(config_path)?;
        let registry = Registry::load(&state)?;
        let blobs = ObjectStore::new(&state.blob_store_config()).await?;

        let vault = Vault::new(
            registry.users.clone(),
            registry.files.clone(),
            registry.secrets.clone(),
            Arc::new(blobs),
            state.config.vault_config(),
        );

        Ok(Self { registry, vault })
    }

    /// Look a user up by email
    pub async fn user(&self, email: &str) -> Result<UserRecord, VaultError> {
        self.registry
            .users
            .by_email(email)
            .await?
            .ok_or_else(|| VaultError::UserNotFound(email.to_string()))
    }

    /// Write the registry back to disk
    pub fn commit(&self) -> Result<(), RegistryError> {
        self.registry.save()
    }
}

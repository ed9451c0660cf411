//! Collaborator interfaces consumed by the vault
//!
//! The cryptographic core never talks to a database or an object store
//! directly. Everything it needs from the outside world goes through these
//! traits, which are handed to [`crate::vault::Vault`] explicitly:
//!
//! - [`UserDirectory`]: user identities and their public keys
//! - [`FileIndex`]: file metadata and per-holder share edges
//! - [`SecretProvider`]: each user's wrapped private key and wrapping secret
//! - [`BlobStore`]: opaque envelope bytes by locator
//!
//! In-memory implementations are provided for tests and embedding, and
//! [`object_store::ObjectStore`] implements [`BlobStore`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{RsaPublicKey, Secret, WrappedContentKey, WrappedPrivateKey};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("already exists: {0}")]
    Conflict(String),
    #[error("blob not found: {0}")]
    BlobNotFound(String),
    #[error("blob store error: {0}")]
    Blob(#[from] object_store::BlobStoreError),
    #[error("store error: {0}")]
    Default(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = StoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(anyhow::anyhow!("unknown role: {}", other).into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub public_key: RsaPublicKey,
    #[serde(default)]
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: Uuid,
    pub owner_id: Uuid,
    pub file_name: String,
    /// MIME type
    pub file_type: String,
    pub storage_locator: String,
}

/// Grants `holder_id` access to `file_id` through its own wrapped key copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareEdge {
    pub file_id: Uuid,
    pub holder_id: Uuid,
    pub wrapped_content_key: WrappedContentKey,
}

/// What a secret provider keeps for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserKeyMaterial {
    pub wrapped_private_key: WrappedPrivateKey,
    pub secret: Secret,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert a new user. Fails with [`StoreError::Conflict`] on a taken email.
    async fn insert(&self, user: UserRecord) -> Result<(), StoreError>;
    async fn by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, StoreError>;
    async fn by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
    /// Lock or unlock an account. Returns false if the user does not exist.
    async fn set_locked(&self, user_id: Uuid, locked: bool) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait FileIndex: Send + Sync {
    /// Insert a file. File names are unique per owner.
    async fn insert_file(&self, file: FileRecord) -> Result<(), StoreError>;
    async fn file_by_id(&self, file_id: Uuid) -> Result<Option<FileRecord>, StoreError>;
    async fn file_by_name(
        &self,
        owner_id: Uuid,
        file_name: &str,
    ) -> Result<Option<FileRecord>, StoreError>;
    /// Add a share edge. At most one edge exists per (file, holder).
    async fn add_edge(&self, edge: ShareEdge) -> Result<(), StoreError>;
    async fn edge(&self, file_id: Uuid, holder_id: Uuid) -> Result<Option<ShareEdge>, StoreError>;
    /// Files owned by `owner_id`, ordered by name
    async fn owned_files(&self, owner_id: Uuid) -> Result<Vec<FileRecord>, StoreError>;
    /// Files shared with `holder_id` by someone else, ordered by name
    async fn shared_with(&self, holder_id: Uuid) -> Result<Vec<FileRecord>, StoreError>;
}

#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn store(&self, user_id: Uuid, material: UserKeyMaterial) -> Result<(), StoreError>;
    async fn load(&self, user_id: Uuid) -> Result<Option<UserKeyMaterial>, StoreError>;
    /// Drop a user's material. Returns whether anything was stored.
    async fn remove(&self, user_id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the bytes stored under `locator`
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, StoreError>;
    async fn store(&self, locator: &str, bytes: Vec<u8>) -> Result<(), StoreError>;
}

#[async_trait]
impl BlobStore for object_store::ObjectStore {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, StoreError> {
        match object_store::ObjectStore::fetch(self, locator).await {
            Ok(bytes) => Ok(bytes.to_vec()),
            Err(object_store::BlobStoreError::NotFound(locator)) => {
                Err(StoreError::BlobNotFound(locator))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, locator: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.put(locator, bytes).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the directory from previously persisted records
    pub fn from_records(records: impl IntoIterator<Item = UserRecord>) -> Self {
        let users = records.into_iter().map(|u| (u.user_id, u)).collect();
        Self {
            users: RwLock::new(users),
        }
    }

    /// All records, ordered by email
    pub fn records(&self) -> Vec<UserRecord> {
        let mut records: Vec<_> = self.users.read().values().cloned().collect();
        records.sort_by(|a, b| a.email.cmp(&b.email));
        records
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn insert(&self, user: UserRecord) -> Result<(), StoreError> {
        let mut users = self.users.write();
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("user {}", user.email)));
        }
        users.insert(user.user_id, user);
        Ok(())
    }

    async fn by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().get(&user_id).cloned())
    }

    async fn by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().values().find(|u| u.email == email).cloned())
    }

    async fn set_locked(&self, user_id: Uuid, locked: bool) -> Result<bool, StoreError> {
        match self.users.write().get_mut(&user_id) {
            Some(user) => {
                user.locked = locked;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Debug, Default)]
struct FileTables {
    files: HashMap<Uuid, FileRecord>,
    edges: HashMap<(Uuid, Uuid), ShareEdge>,
}

#[derive(Debug, Default)]
pub struct MemoryFileIndex {
    inner: RwLock<FileTables>,
}

impl MemoryFileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(
        files: impl IntoIterator<Item = FileRecord>,
        edges: impl IntoIterator<Item = ShareEdge>,
    ) -> Self {
        let tables = FileTables {
            files: files.into_iter().map(|f| (f.file_id, f)).collect(),
            edges: edges
                .into_iter()
                .map(|e| ((e.file_id, e.holder_id), e))
                .collect(),
        };
        Self {
            inner: RwLock::new(tables),
        }
    }

    /// Snapshot of every file and edge, in a stable order
    pub fn records(&self) -> (Vec<FileRecord>, Vec<ShareEdge>) {
        let tables = self.inner.read();
        let mut files: Vec<_> = tables.files.values().cloned().collect();
        files.sort_by_key(|f| f.file_id);
        let mut edges: Vec<_> = tables.edges.values().cloned().collect();
        edges.sort_by_key(|e| (e.file_id, e.holder_id));
        (files, edges)
    }
}

fn sorted_by_name(mut files: Vec<FileRecord>) -> Vec<FileRecord> {
    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    files
}

#[async_trait]
impl FileIndex for MemoryFileIndex {
    async fn insert_file(&self, file: FileRecord) -> Result<(), StoreError> {
        let mut tables = self.inner.write();
        if tables
            .files
            .values()
            .any(|f| f.owner_id == file.owner_id && f.file_name == file.file_name)
        {
            return Err(StoreError::Conflict(format!("file {}", file.file_name)));
        }
        tables.files.insert(file.file_id, file);
        Ok(())
    }

    async fn file_by_id(&self, file_id: Uuid) -> Result<Option<FileRecord>, StoreError> {
        Ok(self.inner.read().files.get(&file_id).cloned())
    }

    async fn file_by_name(
        &self,
        owner_id: Uuid,
        file_name: &str,
    ) -> Result<Option<FileRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .files
            .values()
            .find(|f| f.owner_id == owner_id && f.file_name == file_name)
            .cloned())
    }

    async fn add_edge(&self, edge: ShareEdge) -> Result<(), StoreError> {
        let mut tables = self.inner.write();
        let key = (edge.file_id, edge.holder_id);
        if tables.edges.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "share of {} with {}",
                edge.file_id, edge.holder_id
            )));
        }
        tables.edges.insert(key, edge);
        Ok(())
    }

    async fn edge(&self, file_id: Uuid, holder_id: Uuid) -> Result<Option<ShareEdge>, StoreError> {
        Ok(self.inner.read().edges.get(&(file_id, holder_id)).cloned())
    }

    async fn owned_files(&self, owner_id: Uuid) -> Result<Vec<FileRecord>, StoreError> {
        let files = self
            .inner
            .read()
            .files
            .values()
            .filter(|f| f.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(sorted_by_name(files))
    }

    async fn shared_with(&self, holder_id: Uuid) -> Result<Vec<FileRecord>, StoreError> {
        let tables = self.inner.read();
        let files = tables
            .edges
            .keys()
            .filter(|(_, holder)| *holder == holder_id)
            .filter_map(|(file_id, _)| tables.files.get(file_id))
            .filter(|f| f.owner_id != holder_id)
            .cloned()
            .collect();
        Ok(sorted_by_name(files))
    }
}

#[derive(Debug, Default)]
pub struct MemorySecretProvider {
    secrets: RwLock<HashMap<Uuid, UserKeyMaterial>>,
}

impl MemorySecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = (Uuid, UserKeyMaterial)>) -> Self {
        Self {
            secrets: RwLock::new(records.into_iter().collect()),
        }
    }

    pub fn records(&self) -> Vec<(Uuid, UserKeyMaterial)> {
        let mut records: Vec<_> = self
            .secrets
            .read()
            .iter()
            .map(|(id, m)| (*id, m.clone()))
            .collect();
        records.sort_by_key(|(id, _)| *id);
        records
    }
}

#[async_trait]
impl SecretProvider for MemorySecretProvider {
    async fn store(&self, user_id: Uuid, material: UserKeyMaterial) -> Result<(), StoreError> {
        self.secrets.write().insert(user_id, material);
        Ok(())
    }

    async fn load(&self, user_id: Uuid) -> Result<Option<UserKeyMaterial>, StoreError> {
        Ok(self.secrets.read().get(&user_id).cloned())
    }

    async fn remove(&self, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.secrets.write().remove(&user_id).is_some())
    }
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite stored bytes in place. Intended for corrupting envelopes in tests.
    pub fn update<F: FnOnce(&mut Vec<u8>)>(&self, locator: &str, f: F) -> bool {
        match self.blobs.write().get_mut(locator) {
            Some(bytes) => {
                f(bytes);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, StoreError> {
        self.blobs
            .read()
            .get(locator)
            .cloned()
            .ok_or_else(|| StoreError::BlobNotFound(locator.to_string()))
    }

    async fn store(&self, locator: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.blobs.write().insert(locator.to_string(), bytes);
        Ok(())
    }
}

//! The vault: registration, upload, download, listing and sharing
//!
//! [`Vault`] drives the cryptographic core through the collaborator traits
//! in [`crate::store`]. It holds no state of its own beyond those handles
//! and its [`VaultConfig`]. Unwrapped private keys and content keys live
//! only for the duration of a single call.
//!
//! Key generation, RSA and AES work run on the blocking thread pool.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{
    decrypt_download, encrypt_upload, generate_user_keys, reshare, KeyWrapError, RsaPrivateKey,
    DEFAULT_MODULUS_BITS,
};
use crate::pipeline::{fetch_and_decrypt_batch, BatchItemError, BatchResult, DEFAULT_CONCURRENCY};
use crate::store::{
    BlobStore, FileIndex, FileRecord, Role, SecretProvider, ShareEdge, StoreError,
    UserDirectory, UserKeyMaterial, UserRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// RSA modulus size for newly registered users
    pub key_bits: u64,
    /// Files decrypted at once when listing
    pub concurrency: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            key_bits: DEFAULT_MODULUS_BITS,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("owner not found: {0}")]
    OwnerNotFound(Uuid),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("recipient not found: {0}")]
    RecipientNotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("no key material for user {0}")]
    KeyNotFound(Uuid),
    #[error("failed to unwrap private key: {0}")]
    KeyUnwrap(KeyWrapError),
    #[error("{file_name} is already shared with {recipient}")]
    AlreadyShared { file_name: String, recipient: String },
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("crypto error: {0}")]
    Crypto(#[from] KeyWrapError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A decrypted file
#[derive(Debug, Clone)]
pub struct Download {
    pub file: FileRecord,
    pub bytes: Vec<u8>,
}

/// One row of a listing. Decryption failures are per row.
#[derive(Debug)]
pub struct Listing {
    pub file: FileRecord,
    /// Email of the file's owner, when still known
    pub owner_email: Option<String>,
    pub content: BatchResult,
}

#[derive(Clone)]
pub struct Vault {
    users: Arc<dyn UserDirectory>,
    files: Arc<dyn FileIndex>,
    secrets: Arc<dyn SecretProvider>,
    blobs: Arc<dyn BlobStore>,
    config: VaultConfig,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Vault {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        files: Arc<dyn FileIndex>,
        secrets: Arc<dyn SecretProvider>,
        blobs: Arc<dyn BlobStore>,
        config: VaultConfig,
    ) -> Self {
        Self {
            users,
            files,
            secrets,
            blobs,
            config,
        }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Register a user: generate their key pair, wrap the private key under
    /// a fresh secret and hand the material to the secret provider.
    pub async fn register(&self, email: &str, role: Role) -> Result<UserRecord, VaultError> {
        if self.users.by_email(email).await?.is_some() {
            return Err(VaultError::AlreadyExists(format!("user {}", email)));
        }

        let bits = self.config.key_bits;
        let keys = tokio::task::spawn_blocking(move || generate_user_keys(bits)).await??;

        let user = UserRecord {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            role,
            public_key: keys.public_key,
            locked: false,
        };
        // material first, so a stored user always has keys
        self.secrets
            .store(
                user.user_id,
                UserKeyMaterial {
                    wrapped_private_key: keys.wrapped_private_key,
                    secret: keys.secret,
                },
            )
            .await?;
        if let Err(e) = self.users.insert(user.clone()).await {
            // lost an email race; leave no orphaned key material behind
            if let Err(cleanup) = self.secrets.remove(user.user_id).await {
                tracing::warn!(user_id = %user.user_id, error = %cleanup, "failed to discard key material");
            }
            return Err(e.into());
        }

        tracing::info!(user_id = %user.user_id, %role, bits, "registered user");
        Ok(user)
    }

    async fn user(&self, user_id: Uuid) -> Result<UserRecord, VaultError> {
        self.users
            .by_id(user_id)
            .await?
            .ok_or_else(|| VaultError::UserNotFound(user_id.to_string()))
    }

    async fn active_user(&self, user_id: Uuid) -> Result<UserRecord, VaultError> {
        let user = self.user(user_id).await?;
        if user.locked {
            return Err(VaultError::Unauthorized(format!(
                "account {} is locked",
                user.email
            )));
        }
        Ok(user)
    }

    /// Unwrap a user's private key with their stored secret
    async fn unlock_private_key(&self, user_id: Uuid) -> Result<RsaPrivateKey, VaultError> {
        let material = self
            .secrets
            .load(user_id)
            .await?
            .ok_or(VaultError::KeyNotFound(user_id))?;
        tokio::task::spawn_blocking(move || {
            material.wrapped_private_key.unwrap(&material.secret)
        })
        .await?
        .map_err(VaultError::KeyUnwrap)
    }

    /// Encrypt and store a file for `owner_id`
    pub async fn upload(
        &self,
        owner_id: Uuid,
        file_name: &str,
        file_type: &str,
        bytes: Vec<u8>,
    ) -> Result<FileRecord, VaultError> {
        let owner = self.active_user(owner_id).await?;
        if self.files.file_by_name(owner_id, file_name).await?.is_some() {
            return Err(VaultError::AlreadyExists(format!("file {}", file_name)));
        }

        let public_key = owner.public_key.clone();
        let size = bytes.len();
        let upload =
            tokio::task::spawn_blocking(move || encrypt_upload(&public_key, &bytes)).await??;

        let file_id = Uuid::new_v4();
        let file = FileRecord {
            file_id,
            owner_id,
            file_name: file_name.to_string(),
            file_type: file_type.to_string(),
            storage_locator: format!("{}/{}", owner_id, file_id),
        };
        self.blobs
            .store(&file.storage_locator, upload.envelope)
            .await?;
        self.files.insert_file(file.clone()).await?;
        self.files
            .add_edge(ShareEdge {
                file_id,
                holder_id: owner_id,
                wrapped_content_key: upload.wrapped_key,
            })
            .await?;

        tracing::info!(%file_id, owner_id = %owner_id, size, "uploaded file");
        Ok(file)
    }

    /// Decrypt one file for any of its holders
    pub async fn download(&self, user_id: Uuid, file_id: Uuid) -> Result<Download, VaultError> {
        self.active_user(user_id).await?;
        let file = self
            .files
            .file_by_id(file_id)
            .await?
            .ok_or_else(|| VaultError::FileNotFound(file_id.to_string()))?;
        let edge = self.files.edge(file_id, user_id).await?.ok_or_else(|| {
            VaultError::Unauthorized(format!("no access to {}", file.file_name))
        })?;

        let private_key = self.unlock_private_key(user_id).await?;
        let envelope = self.blobs.fetch(&file.storage_locator).await?;
        let bytes = tokio::task::spawn_blocking(move || {
            decrypt_download(&private_key, &edge.wrapped_content_key, &envelope)
        })
        .await??;

        tracing::debug!(%file_id, user_id = %user_id, "downloaded file");
        Ok(Download { file, bytes })
    }

    /// Find an owned file by name and decrypt it
    pub async fn download_by_name(
        &self,
        owner_id: Uuid,
        file_name: &str,
    ) -> Result<Download, VaultError> {
        let file = self
            .files
            .file_by_name(owner_id, file_name)
            .await?
            .ok_or_else(|| VaultError::FileNotFound(file_name.to_string()))?;
        self.download(owner_id, file.file_id).await
    }

    async fn decrypt_listing(
        &self,
        user_id: Uuid,
        files: Vec<FileRecord>,
    ) -> Result<Vec<Listing>, VaultError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        // rows without an edge fail on their own; the rest go through the batch
        let mut items = Vec::with_capacity(files.len());
        let mut rows = Vec::with_capacity(files.len());
        for file in files {
            let edge = self.files.edge(file.file_id, user_id).await?;
            let owner_email = self.users.by_id(file.owner_id).await?.map(|u| u.email);
            let slot = match edge {
                Some(edge) => {
                    items.push((edge.wrapped_content_key, file.storage_locator.clone()));
                    Some(items.len() - 1)
                }
                None => {
                    tracing::warn!(file_id = %file.file_id, %user_id, "no share edge for listed file");
                    None
                }
            };
            rows.push((file, owner_email, slot));
        }

        let mut results: Vec<Option<BatchResult>> = if items.is_empty() {
            Vec::new()
        } else {
            // one unwrap for the whole batch; dropped when this call returns
            let private_key = Arc::new(self.unlock_private_key(user_id).await?);
            fetch_and_decrypt_batch(
                private_key,
                self.blobs.clone(),
                items,
                self.config.concurrency,
            )
            .await
            .into_iter()
            .map(Some)
            .collect()
        };

        Ok(rows
            .into_iter()
            .map(|(file, owner_email, slot)| {
                let content = slot
                    .and_then(|i| results[i].take())
                    .unwrap_or(Err(BatchItemError::KeyNotFound(file.file_id)));
                Listing {
                    file,
                    owner_email,
                    content,
                }
            })
            .collect())
    }

    /// Decrypt every file `user_id` owns
    pub async fn list_owned(&self, user_id: Uuid) -> Result<Vec<Listing>, VaultError> {
        self.active_user(user_id).await?;
        let files = self.files.owned_files(user_id).await?;
        self.decrypt_listing(user_id, files).await
    }

    /// Decrypt every file shared with `user_id`
    pub async fn list_shared(&self, user_id: Uuid) -> Result<Vec<Listing>, VaultError> {
        let user = self.active_user(user_id).await?;
        if user.role != Role::User {
            return Err(VaultError::Unauthorized(format!(
                "{} accounts cannot receive shared files",
                user.role
            )));
        }
        let files = self.files.shared_with(user_id).await?;
        self.decrypt_listing(user_id, files).await
    }

    /// Lock or unlock the account at `email`. Only an active admin may do
    /// this, and never to their own account.
    pub async fn set_locked(
        &self,
        admin_id: Uuid,
        email: &str,
        locked: bool,
    ) -> Result<UserRecord, VaultError> {
        let admin = self.active_user(admin_id).await?;
        if admin.role != Role::Admin {
            return Err(VaultError::Unauthorized("admins only".into()));
        }

        let mut target = self
            .users
            .by_email(email)
            .await?
            .ok_or_else(|| VaultError::UserNotFound(email.to_string()))?;
        if target.user_id == admin.user_id {
            return Err(VaultError::Unauthorized(
                "cannot change the lock on your own account".into(),
            ));
        }

        if !self.users.set_locked(target.user_id, locked).await? {
            return Err(VaultError::UserNotFound(email.to_string()));
        }
        target.locked = locked;

        tracing::info!(user_id = %target.user_id, admin_id = %admin_id, locked, "changed account lock");
        Ok(target)
    }

    /// Share `file_name` owned by `owner_id` with the user at `recipient_email`
    ///
    /// The owner's content key is re-wrapped for the recipient and stored as
    /// a new share edge. The file envelope is untouched.
    pub async fn share(
        &self,
        owner_id: Uuid,
        file_name: &str,
        recipient_email: &str,
    ) -> Result<ShareEdge, VaultError> {
        let owner = self
            .users
            .by_id(owner_id)
            .await?
            .ok_or(VaultError::OwnerNotFound(owner_id))?;
        if owner.locked {
            return Err(VaultError::Unauthorized(format!(
                "account {} is locked",
                owner.email
            )));
        }
        if owner.role != Role::User {
            return Err(VaultError::Unauthorized(format!(
                "{} accounts cannot share files",
                owner.role
            )));
        }

        let file = self
            .files
            .file_by_name(owner_id, file_name)
            .await?
            .ok_or_else(|| VaultError::FileNotFound(file_name.to_string()))?;

        let recipient = self
            .users
            .by_email(recipient_email)
            .await?
            .ok_or_else(|| VaultError::RecipientNotFound(recipient_email.to_string()))?;
        if recipient.role == Role::Admin {
            return Err(VaultError::Unauthorized(
                "cannot share files with an admin account".into(),
            ));
        }
        if recipient.user_id == owner_id {
            return Err(VaultError::Unauthorized(
                "cannot share a file with its owner".into(),
            ));
        }
        if self
            .files
            .edge(file.file_id, recipient.user_id)
            .await?
            .is_some()
        {
            return Err(VaultError::AlreadyShared {
                file_name: file.file_name,
                recipient: recipient.email,
            });
        }

        let owner_edge = self
            .files
            .edge(file.file_id, owner_id)
            .await?
            .ok_or(VaultError::KeyNotFound(owner_id))?;
        let private_key = self.unlock_private_key(owner_id).await?;

        let recipient_key = recipient.public_key.clone();
        let wrapped_content_key = tokio::task::spawn_blocking(move || {
            reshare(&private_key, &owner_edge.wrapped_content_key, &recipient_key)
        })
        .await??;

        let edge = ShareEdge {
            file_id: file.file_id,
            holder_id: recipient.user_id,
            wrapped_content_key,
        };
        self.files.add_edge(edge.clone()).await?;

        tracing::info!(
            file_id = %file.file_id,
            owner_id = %owner_id,
            recipient_id = %recipient.user_id,
            "shared file"
        );
        Ok(edge)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::{MemoryBlobStore, MemoryFileIndex, MemorySecretProvider, MemoryUserDirectory};

    struct Fixture {
        vault: Vault,
        users: Arc<MemoryUserDirectory>,
        files: Arc<MemoryFileIndex>,
        secrets: Arc<MemorySecretProvider>,
        blobs: Arc<MemoryBlobStore>,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(MemoryUserDirectory::new());
        let files = Arc::new(MemoryFileIndex::new());
        let secrets = Arc::new(MemorySecretProvider::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let config = VaultConfig {
            key_bits: 512,
            concurrency: 4,
        };
        let vault = Vault::new(
            users.clone(),
            files.clone(),
            secrets.clone(),
            blobs.clone(),
            config,
        );
        Fixture {
            vault,
            users,
            files,
            secrets,
            blobs,
        }
    }

    #[tokio::test]
    async fn test_register_upload_download() {
        let fx = fixture();
        let alice = fx.vault.register("alice@example.com", Role::User).await.unwrap();
        assert_eq!(alice.public_key.modulus_bits(), 512);

        let file = fx
            .vault
            .upload(alice.user_id, "notes.txt", "text/plain", b"hello world".to_vec())
            .await
            .unwrap();
        let download = fx.vault.download(alice.user_id, file.file_id).await.unwrap();
        assert_eq!(download.bytes, b"hello world");
        assert_eq!(download.file, file);

        let by_name = fx
            .vault
            .download_by_name(alice.user_id, "notes.txt")
            .await
            .unwrap();
        assert_eq!(by_name.bytes, b"hello world");
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let fx = fixture();
        fx.vault.register("dup@example.com", Role::User).await.unwrap();
        assert!(matches!(
            fx.vault.register("dup@example.com", Role::User).await,
            Err(VaultError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_duplicate_name() {
        let fx = fixture();
        let alice = fx.vault.register("alice@example.com", Role::User).await.unwrap();
        fx.vault
            .upload(alice.user_id, "a", "text/plain", b"1".to_vec())
            .await
            .unwrap();
        assert!(matches!(
            fx.vault
                .upload(alice.user_id, "a", "text/plain", b"2".to_vec())
                .await,
            Err(VaultError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_share_and_list() {
        let fx = fixture();
        let alice = fx.vault.register("alice@example.com", Role::User).await.unwrap();
        let bob = fx.vault.register("bob@example.com", Role::User).await.unwrap();

        let file = fx
            .vault
            .upload(alice.user_id, "plan.txt", "text/plain", b"the plan".to_vec())
            .await
            .unwrap();

        // bob has no edge yet
        assert!(matches!(
            fx.vault.download(bob.user_id, file.file_id).await,
            Err(VaultError::Unauthorized(_))
        ));

        let edge = fx
            .vault
            .share(alice.user_id, "plan.txt", "bob@example.com")
            .await
            .unwrap();
        assert_eq!(edge.holder_id, bob.user_id);

        let shared = fx.vault.list_shared(bob.user_id).await.unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].file.file_name, "plan.txt");
        assert_eq!(shared[0].owner_email.as_deref(), Some("alice@example.com"));
        assert_eq!(shared[0].content.as_ref().unwrap(), b"the plan");

        assert!(fx.vault.list_owned(bob.user_id).await.unwrap().is_empty());
        let owned = fx.vault.list_owned(alice.user_id).await.unwrap();
        assert_eq!(owned.len(), 1);
        assert!(fx.vault.list_shared(alice.user_id).await.unwrap().is_empty());

        assert!(matches!(
            fx.vault
                .share(alice.user_id, "plan.txt", "bob@example.com")
                .await,
            Err(VaultError::AlreadyShared { .. })
        ));
    }

    #[tokio::test]
    async fn test_share_failure_modes() {
        let fx = fixture();
        let alice = fx.vault.register("alice@example.com", Role::User).await.unwrap();
        fx.vault.register("bob@example.com", Role::User).await.unwrap();
        fx.vault.register("root@example.com", Role::Admin).await.unwrap();
        fx.vault
            .upload(alice.user_id, "f", "text/plain", b"x".to_vec())
            .await
            .unwrap();

        assert!(matches!(
            fx.vault.share(Uuid::new_v4(), "f", "bob@example.com").await,
            Err(VaultError::OwnerNotFound(_))
        ));
        assert!(matches!(
            fx.vault.share(alice.user_id, "nope", "bob@example.com").await,
            Err(VaultError::FileNotFound(_))
        ));
        assert!(matches!(
            fx.vault.share(alice.user_id, "f", "carol@example.com").await,
            Err(VaultError::RecipientNotFound(_))
        ));
        assert!(matches!(
            fx.vault.share(alice.user_id, "f", "root@example.com").await,
            Err(VaultError::Unauthorized(_))
        ));
        assert!(matches!(
            fx.vault.share(alice.user_id, "f", "alice@example.com").await,
            Err(VaultError::Unauthorized(_))
        ));

        fx.users.set_locked(alice.user_id, true).await.unwrap();
        assert!(matches!(
            fx.vault.share(alice.user_id, "f", "bob@example.com").await,
            Err(VaultError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_share_key_material_failures() {
        let fx = fixture();
        let alice = fx.vault.register("alice@example.com", Role::User).await.unwrap();
        fx.vault.register("bob@example.com", Role::User).await.unwrap();
        fx.vault
            .upload(alice.user_id, "f", "text/plain", b"x".to_vec())
            .await
            .unwrap();

        // material wrapped under a different secret
        let material = fx.secrets.load(alice.user_id).await.unwrap().unwrap();
        fx.secrets
            .store(
                alice.user_id,
                UserKeyMaterial {
                    wrapped_private_key: material.wrapped_private_key.clone(),
                    secret: crate::crypto::Secret::generate(),
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            fx.vault.share(alice.user_id, "f", "bob@example.com").await,
            Err(VaultError::KeyUnwrap(KeyWrapError::Authentication))
        ));

        assert!(fx.secrets.remove(alice.user_id).await.unwrap());
        assert!(matches!(
            fx.vault.share(alice.user_id, "f", "bob@example.com").await,
            Err(VaultError::KeyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_isolates_corrupt_file() {
        let fx = fixture();
        let alice = fx.vault.register("alice@example.com", Role::User).await.unwrap();
        let mut locators = Vec::new();
        for name in ["a", "b", "c", "d"] {
            let file = fx
                .vault
                .upload(alice.user_id, name, "text/plain", name.as_bytes().to_vec())
                .await
                .unwrap();
            locators.push(file.storage_locator);
        }
        assert!(fx.blobs.update(&locators[2], |bytes| bytes[20] ^= 0x01));

        let listing = fx.vault.list_owned(alice.user_id).await.unwrap();
        assert_eq!(listing.len(), 4);
        for (i, row) in listing.iter().enumerate() {
            if i == 2 {
                assert!(row.content.as_ref().unwrap_err().is_authentication());
            } else {
                assert_eq!(row.content.as_ref().unwrap(), row.file.file_name.as_bytes());
            }
        }
    }

    #[tokio::test]
    async fn test_locked_user_cannot_upload_or_list() {
        let fx = fixture();
        let alice = fx.vault.register("alice@example.com", Role::User).await.unwrap();
        fx.users.set_locked(alice.user_id, true).await.unwrap();

        assert!(matches!(
            fx.vault
                .upload(alice.user_id, "f", "text/plain", b"x".to_vec())
                .await,
            Err(VaultError::Unauthorized(_))
        ));
        assert!(matches!(
            fx.vault.list_owned(alice.user_id).await,
            Err(VaultError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_cannot_share_or_list_shared() {
        let fx = fixture();
        let root = fx.vault.register("root@example.com", Role::Admin).await.unwrap();
        fx.vault.register("bob@example.com", Role::User).await.unwrap();
        fx.vault
            .upload(root.user_id, "f", "text/plain", b"x".to_vec())
            .await
            .unwrap();

        assert!(matches!(
            fx.vault.share(root.user_id, "f", "bob@example.com").await,
            Err(VaultError::Unauthorized(_))
        ));
        assert!(matches!(
            fx.vault.list_shared(root.user_id).await,
            Err(VaultError::Unauthorized(_))
        ));
        let bob = fx.users.by_email("bob@example.com").await.unwrap().unwrap();
        assert!(fx.vault.list_shared(bob.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_isolates_file_without_edge() {
        let fx = fixture();
        let alice = fx.vault.register("alice@example.com", Role::User).await.unwrap();
        for name in ["a", "b", "c"] {
            fx.vault
                .upload(alice.user_id, name, "text/plain", name.as_bytes().to_vec())
                .await
                .unwrap();
        }
        let orphan = FileRecord {
            file_id: Uuid::new_v4(),
            owner_id: alice.user_id,
            file_name: "bb".to_string(),
            file_type: "text/plain".to_string(),
            storage_locator: format!("{}/orphan", alice.user_id),
        };
        fx.files.insert_file(orphan.clone()).await.unwrap();

        let listing = fx.vault.list_owned(alice.user_id).await.unwrap();
        assert_eq!(listing.len(), 4);
        for row in &listing {
            if row.file.file_id == orphan.file_id {
                assert!(matches!(
                    row.content,
                    Err(BatchItemError::KeyNotFound(id)) if id == orphan.file_id
                ));
            } else {
                assert_eq!(row.content.as_ref().unwrap(), row.file.file_name.as_bytes());
            }
        }
    }

    #[tokio::test]
    async fn test_admin_locks_and_unlocks_user() {
        let fx = fixture();
        let root = fx.vault.register("root@example.com", Role::Admin).await.unwrap();
        let alice = fx.vault.register("alice@example.com", Role::User).await.unwrap();

        let locked = fx
            .vault
            .set_locked(root.user_id, "alice@example.com", true)
            .await
            .unwrap();
        assert!(locked.locked);
        assert!(matches!(
            fx.vault.list_owned(alice.user_id).await,
            Err(VaultError::Unauthorized(_))
        ));

        fx.vault
            .set_locked(root.user_id, "alice@example.com", false)
            .await
            .unwrap();
        assert!(fx.vault.list_owned(alice.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_locked_refusals() {
        let fx = fixture();
        let root = fx.vault.register("root@example.com", Role::Admin).await.unwrap();
        let alice = fx.vault.register("alice@example.com", Role::User).await.unwrap();

        assert!(matches!(
            fx.vault.set_locked(alice.user_id, "root@example.com", true).await,
            Err(VaultError::Unauthorized(_))
        ));
        assert!(matches!(
            fx.vault.set_locked(root.user_id, "root@example.com", true).await,
            Err(VaultError::Unauthorized(_))
        ));
        assert!(matches!(
            fx.vault.set_locked(root.user_id, "nobody@example.com", true).await,
            Err(VaultError::UserNotFound(_))
        ));
    }

    /// Directory that reports every email as free but refuses the insert,
    /// as when a concurrent registration wins the race
    struct RacingDirectory;

    #[async_trait::async_trait]
    impl UserDirectory for RacingDirectory {
        async fn insert(&self, user: UserRecord) -> Result<(), StoreError> {
            Err(StoreError::Conflict(user.email))
        }
        async fn by_id(&self, _user_id: Uuid) -> Result<Option<UserRecord>, StoreError> {
            Ok(None)
        }
        async fn by_email(&self, _email: &str) -> Result<Option<UserRecord>, StoreError> {
            Ok(None)
        }
        async fn set_locked(&self, _user_id: Uuid, _locked: bool) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_register_conflict_leaves_no_key_material() {
        let secrets = Arc::new(MemorySecretProvider::new());
        let vault = Vault::new(
            Arc::new(RacingDirectory),
            Arc::new(MemoryFileIndex::new()),
            secrets.clone(),
            Arc::new(MemoryBlobStore::new()),
            VaultConfig {
                key_bits: 512,
                concurrency: 1,
            },
        );

        assert!(matches!(
            vault.register("alice@example.com", Role::User).await,
            Err(VaultError::Store(StoreError::Conflict(_)))
        ));
        assert!(secrets.records().is_empty());
    }
}

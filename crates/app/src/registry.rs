//! JSON-file persistence for the vault's collaborators
//!
//! The in-memory stores from `common::store` are loaded from the state
//! directory when an op starts and written back when it finishes. Secrets go
//! to their own `secrets.json` so the file can be moved or locked down
//! independently of the rest of the registry.
//!
//! A [`Registry`] holds `registry.lock` in the state directory from load
//! until drop, so a second invocation fails fast instead of overwriting the
//! first one's changes. Files are replaced atomically through a temp file in
//! the same directory.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::store::{
    FileRecord, MemoryFileIndex, MemorySecretProvider, MemoryUserDirectory, ShareEdge,
    UserKeyMaterial, UserRecord,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

pub const LOCK_FILE_NAME: &str = "registry.lock";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("registry is in use by another lockbox process (remove {0} if none is running)")]
    Locked(PathBuf),
}

/// Exclusive hold on the registry, released on drop
#[derive(Debug)]
struct RegistryLock {
    path: PathBuf,
}

impl RegistryLock {
    fn acquire(path: PathBuf) -> Result<Self, RegistryError> {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                // best effort; the file's existence is the lock
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(RegistryError::Locked(path)),
            Err(source) => Err(RegistryError::Io { path, source }),
        }
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release registry lock");
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileTables {
    files: Vec<FileRecord>,
    edges: Vec<ShareEdge>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SecretEntry {
    user_id: Uuid,
    #[serde(flatten)]
    material: UserKeyMaterial,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, RegistryError> {
    let text = fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| RegistryError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RegistryError> {
    let io_err = |source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    };
    let text = serde_json::to_string_pretty(value).map_err(|source| RegistryError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    temp.write_all(text.as_bytes()).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    temp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

pub struct Registry {
    pub users: Arc<MemoryUserDirectory>,
    pub files: Arc<MemoryFileIndex>,
    pub secrets: Arc<MemorySecretProvider>,
    users_path: PathBuf,
    files_path: PathBuf,
    secrets_path: PathBuf,
    _lock: RegistryLock,
}

impl Registry {
    /// Lock the registry and read it into memory
    pub fn load(state: &AppState) -> Result<Self, RegistryError> {
        let lock = RegistryLock::acquire(state.lockbox_dir.join(LOCK_FILE_NAME))?;

        let users: Vec<UserRecord> = read_json(&state.users_path)?;
        let tables: FileTables = read_json(&state.files_path)?;
        let secrets: Vec<SecretEntry> = read_json(&state.secrets_path)?;

        tracing::debug!(
            users = users.len(),
            files = tables.files.len(),
            edges = tables.edges.len(),
            "loaded registry"
        );

        Ok(Self {
            users: Arc::new(MemoryUserDirectory::from_records(users)),
            files: Arc::new(MemoryFileIndex::from_records(tables.files, tables.edges)),
            secrets: Arc::new(MemorySecretProvider::from_records(
                secrets.into_iter().map(|e| (e.user_id, e.material)),
            )),
            users_path: state.users_path.clone(),
            files_path: state.files_path.clone(),
            secrets_path: state.secrets_path.clone(),
            _lock: lock,
        })
    }

    /// Write everything back. Secrets go first so a user record is never
    /// persisted without its key material.
    pub fn save(&self) -> Result<(), RegistryError> {
        let secrets: Vec<SecretEntry> = self
            .secrets
            .records()
            .into_iter()
            .map(|(user_id, material)| SecretEntry { user_id, material })
            .collect();
        write_json(&self.secrets_path, &secrets)?;

        let (files, edges) = self.files.records();
        write_json(&self.files_path, &FileTables { files, edges })?;

        write_json(&self.users_path, &self.users.records())?;
        Ok(())
    }
}

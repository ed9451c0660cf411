use std::{fs, path::PathBuf};

use common::vault::VaultConfig;
use object_store::ObjectStoreConfig;
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "lockbox";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const USERS_FILE_NAME: &str = "users.json";
pub const FILES_FILE_NAME: &str = "files.json";
pub const SECRETS_FILE_NAME: &str = "secrets.json";
pub const OBJECTS_DIR_NAME: &str = "objects";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// RSA modulus size for newly registered users
    #[serde(default = "default_key_bits")]
    pub key_bits: u64,
    /// Files decrypted concurrently when listing
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Default log directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for daily rolling log files (optional)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Where envelopes live. Defaults to `objects/` under the state directory.
    #[serde(default)]
    pub blob_store: Option<ObjectStoreConfig>,
}

fn default_key_bits() -> u64 {
    VaultConfig::default().key_bits
}

fn default_concurrency() -> usize {
    VaultConfig::default().concurrency
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            key_bits: default_key_bits(),
            concurrency: default_concurrency(),
            log_level: default_log_level(),
            log_dir: None,
            blob_store: None,
        }
    }
}

impl AppConfig {
    pub fn vault_config(&self) -> VaultConfig {
        VaultConfig {
            key_bits: self.key_bits,
            concurrency: self.concurrency,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the lockbox directory (~/.lockbox)
    pub lockbox_dir: PathBuf,
    /// Path to the user directory file
    pub users_path: PathBuf,
    /// Path to the file index file
    pub files_path: PathBuf,
    /// Path to the secret provider file
    pub secrets_path: PathBuf,
    /// Path to the default local object store
    pub objects_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the lockbox directory path (custom or default ~/.lockbox)
    pub fn lockbox_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    fn paths(lockbox_dir: PathBuf, config: AppConfig) -> Self {
        Self {
            users_path: lockbox_dir.join(USERS_FILE_NAME),
            files_path: lockbox_dir.join(FILES_FILE_NAME),
            secrets_path: lockbox_dir.join(SECRETS_FILE_NAME),
            objects_path: lockbox_dir.join(OBJECTS_DIR_NAME),
            config_path: lockbox_dir.join(CONFIG_FILE_NAME),
            lockbox_dir,
            config,
        }
    }

    /// Initialize a new lockbox state directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let lockbox_dir = Self::lockbox_dir(custom_path)?;

        if lockbox_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&lockbox_dir)?;

        let state = Self::paths(lockbox_dir, config.unwrap_or_default());
        fs::create_dir_all(&state.objects_path)?;

        let config_toml = toml::to_string_pretty(&state.config)?;
        fs::write(&state.config_path, config_toml)?;

        // empty registries; populated by register/upload/share
        fs::write(&state.users_path, "[]")?;
        fs::write(&state.files_path, "{\"files\":[],\"edges\":[]}")?;
        fs::write(&state.secrets_path, "[]")?;

        Ok(state)
    }

    /// Load existing state from the lockbox directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let lockbox_dir = Self::lockbox_dir(custom_path)?;

        if !lockbox_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = lockbox_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        let state = Self::paths(lockbox_dir, config);
        for (path, name) in [
            (&state.users_path, USERS_FILE_NAME),
            (&state.files_path, FILES_FILE_NAME),
            (&state.secrets_path, SECRETS_FILE_NAME),
        ] {
            if !path.exists() {
                return Err(StateError::MissingFile(name.to_string()));
            }
        }

        Ok(state)
    }

    /// The configured object store, or a local one under the state directory
    pub fn blob_store_config(&self) -> ObjectStoreConfig {
        self.config
            .blob_store
            .clone()
            .unwrap_or_else(|| ObjectStoreConfig::Local {
                path: self.objects_path.clone(),
            })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("lockbox directory not initialized. Run 'lockbox init' first")]
    NotInitialized,

    #[error("lockbox directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

use std::path::PathBuf;

use clap::Args;

use crate::state::{AppConfig, AppState};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// RSA modulus size for newly registered users
    #[arg(long, default_value_t = 2048)]
    pub key_bits: u64,

    /// Files decrypted concurrently when listing
    #[arg(long, default_value_t = 10)]
    pub concurrency: usize,

    /// Default log level (RUST_LOG still takes precedence)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Directory for daily rolling log files
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] crate::state::StateError),
    #[error("key size must be at least 512 bits, got {0}")]
    KeyTooSmall(u64),
}

#[async_trait::async_trait]
impl crate::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        // content keys are wrapped as 64 hex chars, which need a 512-bit modulus
        if self.key_bits < 512 {
            return Err(InitError::KeyTooSmall(self.key_bits));
        }

        let config = AppConfig {
            key_bits: self.key_bits,
            concurrency: self.concurrency,
            log_level: self.log_level.clone(),
            log_dir: self.log_dir.clone(),
            blob_store: None,
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let output = format!(
            "Initialized lockbox directory at: {}\n\
             - Users: {}\n\
             - Files: {}\n\
             - Secrets: {}\n\
             - Objects: {}\n\
             - Config: {}\n\
             - Key size: {} bits\n\
             - Concurrency: {}",
            state.lockbox_dir.display(),
            state.users_path.display(),
            state.files_path.display(),
            state.secrets_path.display(),
            state.objects_path.display(),
            state.config_path.display(),
            state.config.key_bits,
            state.config.concurrency,
        );

        Ok(output)
    }
}

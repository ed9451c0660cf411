use std::path::PathBuf;

use clap::Args;

use common::store::FileIndex;
use common::vault::VaultError;

use crate::session::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Download {
    /// Email of the downloading user
    #[arg(long = "as")]
    pub user: String,

    /// Name of the file
    pub name: String,

    /// Email of the file's owner, for files shared with you
    #[arg(long)]
    pub owner: Option<String>,

    /// Where to write the plaintext (defaults to the file name)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait::async_trait]
impl crate::op::Op for Download {
    type Error = DownloadError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let user = session.user(&self.user).await?;

        let download = match &self.owner {
            Some(owner_email) => {
                let owner = session.user(owner_email).await?;
                let file = session
                    .registry
                    .files
                    .file_by_name(owner.user_id, &self.name)
                    .await
                    .map_err(VaultError::from)?
                    .ok_or_else(|| VaultError::FileNotFound(self.name.clone()))?;
                session.vault.download(user.user_id, file.file_id).await?
            }
            None => {
                session
                    .vault
                    .download_by_name(user.user_id, &self.name)
                    .await?
            }
        };

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(&download.file.file_name));
        tokio::fs::write(&output, &download.bytes).await?;

        Ok(format!(
            "Wrote {} ({} bytes) to {}",
            download.file.file_name,
            download.bytes.len(),
            output.display()
        ))
    }
}

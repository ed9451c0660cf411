use std::env;
use std::path::PathBuf;

use clap::Args;

use common::vault::VaultError;

use crate::registry::RegistryError;
use crate::session::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Upload {
    /// Email of the uploading user
    #[arg(long = "as")]
    pub user: String,

    /// Path to the file on disk
    pub path: PathBuf,

    /// Name to store the file under (defaults to the file name)
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error("failed to save registry: {0}")]
    Save(#[from] RegistryError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot derive a file name from {0:?}; pass --name")]
    NoFileName(PathBuf),
}

#[async_trait::async_trait]
impl crate::op::Op for Upload {
    type Error = UploadError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let owner = session.user(&self.user).await?;

        // Normalize path to absolute
        let absolute_path = if self.path.is_absolute() {
            self.path.clone()
        } else {
            env::current_dir()?.join(&self.path)
        };

        let file_name = match &self.name {
            Some(name) => name.clone(),
            None => absolute_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| UploadError::NoFileName(absolute_path.clone()))?,
        };
        let file_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .to_string();

        let bytes = tokio::fs::read(&absolute_path).await?;
        let size = bytes.len();
        let file = session
            .vault
            .upload(owner.user_id, &file_name, &file_type, bytes)
            .await?;
        session.commit()?;

        Ok(format!(
            "Uploaded {} ({}, {} bytes) as {}",
            file.file_name, file.file_type, size, file.file_id
        ))
    }
}

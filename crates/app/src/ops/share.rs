use clap::Args;

use common::vault::VaultError;

use crate::registry::RegistryError;
use crate::session::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Share {
    /// Email of the file's owner
    #[arg(long = "as")]
    pub owner: String,

    /// Name of the file to share
    pub file: String,

    /// Email of the recipient
    pub recipient: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error("failed to save registry: {0}")]
    Save(#[from] RegistryError),
}

#[async_trait::async_trait]
impl crate::op::Op for Share {
    type Error = ShareError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let owner = session.user(&self.owner).await?;

        session
            .vault
            .share(owner.user_id, &self.file, &self.recipient)
            .await?;
        session.commit()?;

        Ok(format!("Shared {} with {}", self.file, self.recipient))
    }
}

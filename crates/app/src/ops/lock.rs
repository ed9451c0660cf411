use clap::Args;

use common::vault::VaultError;

use crate::registry::RegistryError;
use crate::session::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Lock {
    /// Email of the admin performing the change
    #[arg(long = "as")]
    pub admin: String,

    /// Email of the account to lock
    pub email: String,
}

#[derive(Args, Debug, Clone)]
pub struct Unlock {
    /// Email of the admin performing the change
    #[arg(long = "as")]
    pub admin: String,

    /// Email of the account to unlock
    pub email: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error("failed to save registry: {0}")]
    Save(#[from] RegistryError),
}

async fn set_locked(
    ctx: &crate::op::OpContext,
    admin: &str,
    email: &str,
    locked: bool,
) -> Result<String, LockError> {
    let session = ctx.session().await?;
    let admin = session.user(admin).await?;

    let user = session.vault.set_locked(admin.user_id, email, locked).await?;
    session.commit()?;

    let verb = if user.locked { "Locked" } else { "Unlocked" };
    Ok(format!("{} {}", verb, user.email))
}

#[async_trait::async_trait]
impl crate::op::Op for Lock {
    type Error = LockError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        set_locked(ctx, &self.admin, &self.email, true).await
    }
}

#[async_trait::async_trait]
impl crate::op::Op for Unlock {
    type Error = LockError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        set_locked(ctx, &self.admin, &self.email, false).await
    }
}

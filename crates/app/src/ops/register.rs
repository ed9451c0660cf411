use clap::Args;

use common::store::Role;
use common::vault::VaultError;

use crate::registry::RegistryError;
use crate::session::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Register {
    /// Email address of the new user
    pub email: String,

    /// Register an administrator (administrators cannot receive shares)
    #[arg(long)]
    pub admin: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error("failed to save registry: {0}")]
    Save(#[from] RegistryError),
}

#[async_trait::async_trait]
impl crate::op::Op for Register {
    type Error = RegisterError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let role = if self.admin { Role::Admin } else { Role::User };

        let user = session.vault.register(&self.email, role).await?;
        session.commit()?;

        Ok(format!(
            "Registered {} ({}) with id {}\n- Key size: {} bits",
            user.email,
            user.role,
            user.user_id,
            user.public_key.modulus_bits()
        ))
    }
}

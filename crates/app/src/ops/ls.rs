use clap::Args;

use common::vault::{Listing, VaultError};

use crate::session::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Email of the listing user
    #[arg(long = "as")]
    pub user: String,

    /// List files shared with the user instead of their own
    #[arg(long)]
    pub shared: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Vault(#[from] VaultError),
}

fn format_row(listing: &Listing) -> String {
    let owner = listing.owner_email.as_deref().unwrap_or("<unknown>");
    match &listing.content {
        Ok(bytes) => format!(
            "{}\t{}\t{}\t{} bytes",
            listing.file.file_name,
            listing.file.file_type,
            owner,
            bytes.len()
        ),
        Err(e) => format!(
            "{}\t{}\t{}\tunreadable: {}",
            listing.file.file_name, listing.file.file_type, owner, e
        ),
    }
}

#[async_trait::async_trait]
impl crate::op::Op for Ls {
    type Error = LsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let user = session.user(&self.user).await?;

        let listings = if self.shared {
            session.vault.list_shared(user.user_id).await?
        } else {
            session.vault.list_owned(user.user_id).await?
        };

        if listings.is_empty() {
            let what = if self.shared { "shared with" } else { "owned by" };
            return Ok(format!("No files {} {}", what, user.email));
        }

        let failed = listings.iter().filter(|l| l.content.is_err()).count();
        let mut lines: Vec<String> = listings.iter().map(format_row).collect();
        if failed > 0 {
            lines.push(format!("{} of {} file(s) could not be decrypted", failed, listings.len()));
        }
        Ok(lines.join("\n"))
    }
}

use clap::Args;

use common::crypto::{RsaError, RsaKeyPair};

/// Generate a standalone RSA key pair and print both halves
#[derive(Args, Debug, Clone)]
pub struct Keygen {
    /// Modulus size in bits
    #[arg(long, default_value_t = 2048)]
    pub bits: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum KeygenError {
    #[error("key generation failed: {0}")]
    Rsa(#[from] RsaError),
    #[error("key generation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[async_trait::async_trait]
impl crate::op::Op for Keygen {
    type Error = KeygenError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let bits = self.bits;
        let pair = tokio::task::spawn_blocking(move || RsaKeyPair::generate(bits)).await??;

        Ok(format!(
            "public:  {}\nprivate: {}",
            pair.public,
            pair.private.to_text()
        ))
    }
}

pub mod download;
pub mod init;
pub mod keygen;
pub mod lock;
pub mod ls;
pub mod register;
pub mod share;
pub mod upload;
pub mod version;

pub use download::Download;
pub use init::Init;
pub use keygen::Keygen;
pub use lock::{Lock, Unlock};
pub use ls::Ls;
pub use register::Register;
pub use share::Share;
pub use upload::Upload;
pub use version::Version;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::{Op, OpContext};
    use common::vault::VaultError;

    struct Env {
        ctx: OpContext,
        temp: tempfile::TempDir,
    }

    async fn setup() -> Env {
        let temp = tempfile::tempdir().unwrap();
        let ctx = OpContext::new(Some(temp.path().join("state")));
        Init {
            key_bits: 512,
            concurrency: 2,
            log_level: "info".to_string(),
            log_dir: None,
        }
        .execute(&ctx)
        .await
        .unwrap();

        for (email, admin) in [
            ("alice@example.com", false),
            ("bob@example.com", false),
            ("root@example.com", true),
        ] {
            Register {
                email: email.to_string(),
                admin,
            }
            .execute(&ctx)
            .await
            .unwrap();
        }
        Env { ctx, temp }
    }

    fn share(owner: &str, file: &str, recipient: &str) -> Share {
        Share {
            owner: owner.to_string(),
            file: file.to_string(),
            recipient: recipient.to_string(),
        }
    }

    #[tokio::test]
    async fn test_upload_share_download_across_invocations() {
        let env = setup().await;
        let source = env.temp.path().join("notes.txt");
        std::fs::write(&source, b"meet at noon").unwrap();

        let out = Upload {
            user: "alice@example.com".to_string(),
            path: source,
            name: None,
        }
        .execute(&env.ctx)
        .await
        .unwrap();
        assert!(out.contains("text/plain"), "{}", out);

        share("alice@example.com", "notes.txt", "bob@example.com")
            .execute(&env.ctx)
            .await
            .unwrap();

        let listing = Ls {
            user: "bob@example.com".to_string(),
            shared: true,
        }
        .execute(&env.ctx)
        .await
        .unwrap();
        assert!(listing.contains("notes.txt"));
        assert!(listing.contains("alice@example.com"));
        assert!(listing.contains("12 bytes"));

        let target = env.temp.path().join("from-alice.txt");
        Download {
            user: "bob@example.com".to_string(),
            name: "notes.txt".to_string(),
            owner: Some("alice@example.com".to_string()),
            output: Some(target.clone()),
        }
        .execute(&env.ctx)
        .await
        .unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"meet at noon");
    }

    #[tokio::test]
    async fn test_share_refusals() {
        let env = setup().await;
        let source = env.temp.path().join("plan.md");
        std::fs::write(&source, b"# plan").unwrap();
        Upload {
            user: "alice@example.com".to_string(),
            path: source,
            name: None,
        }
        .execute(&env.ctx)
        .await
        .unwrap();

        let err = share("alice@example.com", "plan.md", "root@example.com")
            .execute(&env.ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            share::ShareError::Vault(VaultError::Unauthorized(_))
        ));

        let err = share("alice@example.com", "missing.md", "bob@example.com")
            .execute(&env.ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            share::ShareError::Vault(VaultError::FileNotFound(_))
        ));

        share("alice@example.com", "plan.md", "bob@example.com")
            .execute(&env.ctx)
            .await
            .unwrap();
        let err = share("alice@example.com", "plan.md", "bob@example.com")
            .execute(&env.ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            share::ShareError::Vault(VaultError::AlreadyShared { .. })
        ));
    }

    #[tokio::test]
    async fn test_admin_lock_blocks_user_until_unlocked() {
        let env = setup().await;
        let ls = Ls {
            user: "alice@example.com".to_string(),
            shared: false,
        };

        let out = Lock {
            admin: "root@example.com".to_string(),
            email: "alice@example.com".to_string(),
        }
        .execute(&env.ctx)
        .await
        .unwrap();
        assert_eq!(out, "Locked alice@example.com");

        let err = ls.execute(&env.ctx).await.unwrap_err();
        assert!(matches!(err, ls::LsError::Vault(VaultError::Unauthorized(_))));

        // only admins may flip the flag
        let err = Unlock {
            admin: "bob@example.com".to_string(),
            email: "alice@example.com".to_string(),
        }
        .execute(&env.ctx)
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            lock::LockError::Vault(VaultError::Unauthorized(_))
        ));

        Unlock {
            admin: "root@example.com".to_string(),
            email: "alice@example.com".to_string(),
        }
        .execute(&env.ctx)
        .await
        .unwrap();
        ls.execute(&env.ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_ops_require_init() {
        let temp = tempfile::tempdir().unwrap();
        let ctx = OpContext::new(Some(temp.path().join("nowhere")));
        let err = Ls {
            user: "alice@example.com".to_string(),
            shared: false,
        }
        .execute(&ctx)
        .await
        .unwrap_err();
        assert!(matches!(err, ls::LsError::Session(_)));
    }

    #[tokio::test]
    async fn test_init_rejects_small_keys() {
        let temp = tempfile::tempdir().unwrap();
        let ctx = OpContext::new(Some(temp.path().join("state")));
        let err = Init {
            key_bits: 256,
            concurrency: 1,
            log_level: "info".to_string(),
            log_dir: None,
        }
        .execute(&ctx)
        .await
        .unwrap_err();
        assert!(matches!(err, init::InitError::KeyTooSmall(256)));
    }

    #[tokio::test]
    async fn test_keygen_prints_both_halves() {
        let ctx = OpContext::new(None);
        let out = Keygen { bits: 128 }.execute(&ctx).await.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("public:"));
        assert!(lines[1].contains(','));
    }
}

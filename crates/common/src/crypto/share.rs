//! Re-wrapping a content key for another holder
//!
//! Sharing a file never touches its envelope. The owner's copy of the
//! content key is RSA-decrypted with the owner's private key and immediately
//! RSA-encrypted for the recipient. The plaintext key only exists inside
//! [`reshare`] and is zeroized when it returns.
//!
//! Precondition checks (who may share with whom, duplicate edges) belong to
//! the vault; this is the raw cryptographic step.

use super::key_wrap::{ContentKey, KeyWrapError, WrappedContentKey};
use super::rsa::{RsaPrivateKey, RsaPublicKey};

/// Re-encrypt `wrapped` for `recipient_public_key`
///
/// Both wrapped copies decrypt to the same content key value.
pub fn reshare(
    owner_private_key: &RsaPrivateKey,
    wrapped: &WrappedContentKey,
    recipient_public_key: &RsaPublicKey,
) -> Result<WrappedContentKey, KeyWrapError> {
    let content_key = ContentKey::unwrap(owner_private_key, wrapped)?;
    content_key.wrap(recipient_public_key)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::key_wrap::{decrypt_download, encrypt_upload};
    use crate::crypto::rsa::RsaKeyPair;

    #[test]
    fn test_reshare_preserves_content_key() {
        let owner = RsaKeyPair::generate(512).unwrap();
        let recipient = RsaKeyPair::generate(512).unwrap();

        let upload = encrypt_upload(&owner.public, b"shared file").unwrap();
        let rewrapped = reshare(&owner.private, &upload.wrapped_key, &recipient.public).unwrap();
        assert_ne!(rewrapped, upload.wrapped_key);

        let before = ContentKey::unwrap(&owner.private, &upload.wrapped_key).unwrap();
        let after = ContentKey::unwrap(&recipient.private, &rewrapped).unwrap();
        assert_eq!(before, after);

        let plaintext = decrypt_download(&recipient.private, &rewrapped, &upload.envelope).unwrap();
        assert_eq!(plaintext, b"shared file");
    }

    #[test]
    fn test_reshare_with_wrong_owner_key_fails() {
        let owner = RsaKeyPair::generate(512).unwrap();
        let impostor = RsaKeyPair::generate(512).unwrap();
        let recipient = RsaKeyPair::generate(512).unwrap();

        let upload = encrypt_upload(&owner.public, b"shared file").unwrap();
        let result = reshare(&impostor.private, &upload.wrapped_key, &recipient.public);
        assert!(matches!(result, Err(KeyWrapError::Key(_))));
    }

    #[test]
    fn test_reshare_chain() {
        let a = RsaKeyPair::generate(512).unwrap();
        let b = RsaKeyPair::generate(512).unwrap();
        let c = RsaKeyPair::generate(512).unwrap();

        let upload = encrypt_upload(&a.public, b"passed along").unwrap();
        let for_b = reshare(&a.private, &upload.wrapped_key, &b.public).unwrap();
        let for_c = reshare(&b.private, &for_b, &c.public).unwrap();

        let plaintext = decrypt_download(&c.private, &for_c, &upload.envelope).unwrap();
        assert_eq!(plaintext, b"passed along");
    }
}

//! Symmetric envelope encryption using AES-256-GCM
//!
//! One primitive serves two purposes: wrapping a user's RSA private key
//! under their per-user secret, and encrypting file payloads under a random
//! per-file content key. Both produce the same envelope layout:
//!
//! ```text
//! [ nonce: 16 bytes ][ tag: 16 bytes ][ ciphertext: n bytes ]
//! ```
//!
//! Lengths are implicit from the fixed-size prefix; there is no delimiter.
//! A fresh random nonce is drawn for every call to [`Secret::encrypt`].

use std::fmt;
use std::ops::Deref;

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Key, Nonce, Tag};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256-GCM with a 128-bit nonce
type EnvelopeCipher = AesGcm<Aes256, U16>;

/// Size of the envelope nonce in bytes
pub const NONCE_SIZE: usize = 16;
/// Size of the authentication tag in bytes
pub const TAG_SIZE: usize = 16;
/// Size of the fixed envelope header (nonce + tag)
pub const HEADER_SIZE: usize = NONCE_SIZE + TAG_SIZE;
/// Size of an AES-256 key in bytes
pub const SECRET_SIZE: usize = 32;

/// Errors that can occur during encryption/decryption
///
/// A wrong key and tampered data are deliberately indistinguishable: both
/// surface as [`SecretError::Authentication`].
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("authentication failed: wrong key or tampered data")]
    Authentication,
    #[error("malformed envelope: {0}")]
    Malformed(String),
    #[error("invalid secret size, expected {SECRET_SIZE}, got {0}")]
    InvalidSize(usize),
    #[error("failed to generate nonce: {0}")]
    Rng(String),
    #[error("encrypt error")]
    Encrypt,
}

/// Borrowed view of the three parts of an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeParts<'a> {
    pub nonce: &'a [u8],
    pub tag: &'a [u8],
    pub ciphertext: &'a [u8],
}

/// Split an envelope into nonce, tag and ciphertext
pub fn split_envelope(data: &[u8]) -> Result<EnvelopeParts<'_>, SecretError> {
    if data.len() < HEADER_SIZE {
        return Err(SecretError::Malformed(format!(
            "expected at least {} bytes, got {}",
            HEADER_SIZE,
            data.len()
        )));
    }
    let (nonce, rest) = data.split_at(NONCE_SIZE);
    let (tag, ciphertext) = rest.split_at(TAG_SIZE);
    Ok(EnvelopeParts {
        nonce,
        tag,
        ciphertext,
    })
}

/// A 256-bit symmetric key
///
/// Used both as the per-user secret that wraps an RSA private key and as the
/// per-file content key. The bytes are zeroized on drop and never printed by
/// `Debug`.
///
/// # Examples
///
/// ```ignore
/// let secret = Secret::generate();
/// let envelope = secret.encrypt(b"sensitive data")?;
/// assert_eq!(secret.decrypt(&envelope)?, b"sensitive data");
/// ```
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret([u8; SECRET_SIZE]);

impl Deref for Secret {
    type Target = [u8; SECRET_SIZE];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; SECRET_SIZE]> for Secret {
    fn from(bytes: [u8; SECRET_SIZE]) -> Self {
        Secret(bytes)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl Secret {
    /// Generate a new random secret using the OS RNG
    pub fn generate() -> Self {
        let mut buff = [0; SECRET_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut buff);
        Self(buff)
    }

    /// Create a secret from a byte slice
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length is not exactly `SECRET_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, SecretError> {
        if data.len() != SECRET_SIZE {
            return Err(SecretError::InvalidSize(data.len()));
        }
        let mut buff = [0; SECRET_SIZE];
        buff.copy_from_slice(data);
        Ok(buff.into())
    }

    /// Parse a secret from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, SecretError> {
        let hex = hex.trim();
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; SECRET_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| SecretError::InvalidSize(hex.len() / 2))?;
        Ok(buff.into())
    }

    /// Lowercase hex encoding of the key bytes
    #[allow(clippy::wrong_self_convention)]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get a reference to the secret key bytes
    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    fn cipher(&self) -> EnvelopeCipher {
        EnvelopeCipher::new(Key::<EnvelopeCipher>::from_slice(self.bytes()))
    }

    /// Encrypt `data`, producing `nonce || tag || ciphertext`
    ///
    /// # Errors
    ///
    /// Returns an error if the system RNG fails to produce a nonce.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes).map_err(|e| SecretError::Rng(e.to_string()))?;
        let nonce = Nonce::<U16>::from_slice(&nonce_bytes);

        let mut buffer = data.to_vec();
        let tag = self
            .cipher()
            .encrypt_in_place_detached(nonce, b"", &mut buffer)
            .map_err(|_| SecretError::Encrypt)?;

        let mut out = Vec::with_capacity(HEADER_SIZE + buffer.len());
        out.extend_from_slice(nonce.as_ref());
        out.extend_from_slice(tag.as_ref());
        out.extend_from_slice(&buffer);
        Ok(out)
    }

    /// Decrypt an envelope produced by [`Secret::encrypt`]
    ///
    /// # Errors
    ///
    /// - [`SecretError::Malformed`] if the envelope is shorter than its header
    /// - [`SecretError::Authentication`] if the tag does not verify
    ///
    /// No plaintext is returned on any failure.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        let parts = split_envelope(data)?;
        let nonce = Nonce::<U16>::from_slice(parts.nonce);
        let tag = Tag::from_slice(parts.tag);

        let mut buffer = parts.ciphertext.to_vec();
        if self
            .cipher()
            .decrypt_in_place_detached(nonce, b"", &mut buffer, tag)
            .is_err()
        {
            buffer.zeroize();
            return Err(SecretError::Authentication);
        }
        Ok(buffer)
    }
}

impl Serialize for Secret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        Secret::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_secret_encrypt_decrypt() {
        let secret = Secret::generate();
        let data = b"hello world, this is a test message for encryption";

        let encrypted = secret.encrypt(data).unwrap();
        assert_eq!(encrypted.len(), HEADER_SIZE + data.len());
        let decrypted = secret.decrypt(&encrypted).unwrap();

        assert_eq!(data.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn test_empty_data_encryption() {
        let secret = Secret::generate();
        let encrypted = secret.encrypt(b"").unwrap();
        assert_eq!(encrypted.len(), HEADER_SIZE);
        assert!(secret.decrypt(&encrypted).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let secret = Secret::generate();
        let other = Secret::generate();
        let encrypted = secret.encrypt(b"top secret").unwrap();
        assert!(matches!(
            other.decrypt(&encrypted),
            Err(SecretError::Authentication)
        ));
    }

    #[test]
    fn test_flipped_byte_fails_authentication() {
        let secret = Secret::generate();
        let encrypted = secret.encrypt(b"integrity matters").unwrap();

        // every region of the envelope is covered: nonce, tag and ciphertext
        for index in [0, NONCE_SIZE + 3, HEADER_SIZE + 5] {
            let mut tampered = encrypted.clone();
            tampered[index] ^= 0x01;
            assert!(matches!(
                secret.decrypt(&tampered),
                Err(SecretError::Authentication)
            ));
        }
    }

    #[test]
    fn test_truncated_envelope_is_malformed() {
        let secret = Secret::generate();
        assert!(matches!(
            secret.decrypt(&[0u8; HEADER_SIZE - 1]),
            Err(SecretError::Malformed(_))
        ));
    }

    #[test]
    fn test_nonces_are_unique() {
        let secret = Secret::generate();
        let a = secret.encrypt(b"same").unwrap();
        let b = secret.encrypt(b"same").unwrap();
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_split_envelope_layout() {
        let secret = Secret::generate();
        let encrypted = secret.encrypt(b"layout").unwrap();
        let parts = split_envelope(&encrypted).unwrap();
        assert_eq!(parts.nonce.len(), NONCE_SIZE);
        assert_eq!(parts.tag.len(), TAG_SIZE);
        assert_eq!(parts.ciphertext.len(), 6);
        assert_eq!(parts.nonce, &encrypted[..NONCE_SIZE]);
    }

    #[test]
    fn test_secret_size_validation() {
        assert!(Secret::from_slice(&[1u8; 16]).is_err());
        assert!(Secret::from_slice(&[1u8; 64]).is_err());
        assert!(Secret::from_slice(&[1u8; SECRET_SIZE]).is_ok());
    }

    #[test]
    fn test_hex_and_serde_roundtrip() {
        let secret = Secret::generate();
        let hex = secret.to_hex();
        assert_eq!(hex.len(), SECRET_SIZE * 2);
        assert_eq!(Secret::from_hex(&hex).unwrap(), secret);
        assert_eq!(Secret::from_hex(&format!("0x{}", hex)).unwrap(), secret);

        let json = serde_json::to_string(&secret).unwrap();
        let back: Secret = serde_json::from_str(&json).unwrap();
        assert_eq!(back, secret);
    }

    #[test]
    fn test_debug_is_redacted() {
        let secret = Secret::from([0xab; SECRET_SIZE]);
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("ab"));
        assert!(!debug.contains("171"));
    }
}

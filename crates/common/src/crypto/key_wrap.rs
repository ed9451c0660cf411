//! Key wrapping for users and files
//!
//! Ties the RSA engine and the envelope cipher together:
//!
//! - A user's RSA private key is wrapped under their per-user [`Secret`]
//!   and stored as a [`WrappedPrivateKey`].
//! - Each file gets a fresh [`ContentKey`]. The file body is encrypted under
//!   it and the key itself is RSA-encrypted for every holder as a
//!   [`WrappedContentKey`].
//!
//! # Content key encoding
//!
//! A content key is RSA-encrypted as its 64 character lowercase hex text,
//! not as raw bytes. Unwrapping decrypts to text, trims surrounding
//! whitespace and hex-decodes. The hex text of a 32-byte key is always below
//! `2^511`, so any modulus of 512 bits or more can hold it.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::rsa::{RsaError, RsaKeyPair, RsaPrivateKey, RsaPublicKey};
use super::secret::{Secret, SecretError};

#[derive(Debug, thiserror::Error)]
pub enum KeyWrapError {
    #[error("authentication failed: wrong key or tampered data")]
    Authentication,
    #[error("key error: {0}")]
    Key(String),
    #[error("rsa error: {0}")]
    Rsa(#[from] RsaError),
    #[error("envelope error: {0}")]
    Envelope(SecretError),
}

impl From<SecretError> for KeyWrapError {
    fn from(err: SecretError) -> Self {
        match err {
            SecretError::Authentication => KeyWrapError::Authentication,
            other => KeyWrapError::Envelope(other),
        }
    }
}

/// A user's RSA private key, encrypted under their per-user secret
///
/// Holds a `nonce || tag || ciphertext` envelope of the private key's
/// `"d,n"` text. Serializes as lowercase hex.
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedPrivateKey(Vec<u8>);

impl WrappedPrivateKey {
    /// Encrypt `private_key` under `secret`
    pub fn wrap(private_key: &RsaPrivateKey, secret: &Secret) -> Result<Self, KeyWrapError> {
        let text = Zeroizing::new(private_key.to_text());
        let envelope = secret.encrypt(text.as_bytes())?;
        Ok(Self(envelope))
    }

    /// Recover the private key
    ///
    /// A wrong secret or a corrupted envelope is reported as
    /// [`KeyWrapError::Authentication`].
    pub fn unwrap(&self, secret: &Secret) -> Result<RsaPrivateKey, KeyWrapError> {
        let bytes = Zeroizing::new(secret.decrypt(&self.0)?);
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| KeyWrapError::Key("wrapped private key is not utf-8".into()))?;
        RsaPrivateKey::from_text(text).map_err(|e| KeyWrapError::Key(e.to_string()))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn from_hex(hex: &str) -> Result<Self, KeyWrapError> {
        let bytes = hex::decode(hex.trim())
            .map_err(|_| KeyWrapError::Key("wrapped private key is not hex".into()))?;
        Ok(Self(bytes))
    }

    #[allow(clippy::wrong_self_convention)]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for WrappedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WrappedPrivateKey")
            .field(&format_args!("{} bytes", self.0.len()))
            .finish()
    }
}

impl Serialize for WrappedPrivateKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for WrappedPrivateKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// RSA ciphertext of a content key's hex text
///
/// One of these exists per holder of a file. Its textual form is a decimal
/// integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WrappedContentKey(BigUint);

impl WrappedContentKey {
    pub fn new(value: BigUint) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &BigUint {
        &self.0
    }
}

impl fmt::Display for WrappedContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WrappedContentKey {
    type Err = KeyWrapError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = BigUint::from_str(s.trim())
            .map_err(|e| KeyWrapError::Key(format!("invalid wrapped content key: {}", e)))?;
        Ok(Self(value))
    }
}

impl Serialize for WrappedContentKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for WrappedContentKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A per-file symmetric key
///
/// Only ever lives in memory. Dropping it zeroizes the key bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct ContentKey(Secret);

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContentKey([REDACTED])")
    }
}

impl ContentKey {
    pub fn generate() -> Self {
        Self(Secret::generate())
    }

    /// RSA-encrypt the key's hex text under `public_key`
    pub fn wrap(&self, public_key: &RsaPublicKey) -> Result<WrappedContentKey, KeyWrapError> {
        let hex = Zeroizing::new(self.0.to_hex());
        let value = public_key.encrypt_text(&hex)?;
        Ok(WrappedContentKey(value))
    }

    /// Recover a content key wrapped for `private_key`
    ///
    /// Anything that does not decrypt to 32 bytes of hex text, including a
    /// ciphertext meant for a different key pair, is a [`KeyWrapError::Key`].
    pub fn unwrap(
        private_key: &RsaPrivateKey,
        wrapped: &WrappedContentKey,
    ) -> Result<Self, KeyWrapError> {
        let bytes = Zeroizing::new(
            private_key
                .decrypt(&wrapped.0)
                .map_err(|e| KeyWrapError::Key(e.to_string()))?,
        );
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| KeyWrapError::Key("content key did not unwrap to text".into()))?;
        let secret = Secret::from_hex(text)
            .map_err(|_| KeyWrapError::Key("content key did not unwrap to hex".into()))?;
        Ok(Self(secret))
    }

    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, KeyWrapError> {
        Ok(self.0.encrypt(data)?)
    }

    pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>, KeyWrapError> {
        Ok(self.0.decrypt(envelope)?)
    }
}

/// Everything produced for a user at registration
#[derive(Debug, Clone)]
pub struct UserKeys {
    pub public_key: RsaPublicKey,
    pub wrapped_private_key: WrappedPrivateKey,
    pub secret: Secret,
}

/// Generate a key pair and wrap its private half under a fresh random secret
///
/// The secret is never derived from a password, so a password change does
/// not require re-wrapping.
pub fn generate_user_keys(bits: u64) -> Result<UserKeys, KeyWrapError> {
    let pair = RsaKeyPair::generate(bits)?;
    let secret = Secret::generate();
    let wrapped_private_key = WrappedPrivateKey::wrap(&pair.private, &secret)?;
    Ok(UserKeys {
        public_key: pair.public,
        wrapped_private_key,
        secret,
    })
}

/// Result of encrypting a file for upload
#[derive(Debug, Clone)]
pub struct Upload {
    pub envelope: Vec<u8>,
    pub wrapped_key: WrappedContentKey,
}

/// Encrypt `data` under a new content key wrapped for `public_key`
pub fn encrypt_upload(public_key: &RsaPublicKey, data: &[u8]) -> Result<Upload, KeyWrapError> {
    let key = ContentKey::generate();
    let envelope = key.encrypt(data)?;
    let wrapped_key = key.wrap(public_key)?;
    Ok(Upload {
        envelope,
        wrapped_key,
    })
}

/// Unwrap the content key and decrypt a file envelope
pub fn decrypt_download(
    private_key: &RsaPrivateKey,
    wrapped_key: &WrappedContentKey,
    envelope: &[u8],
) -> Result<Vec<u8>, KeyWrapError> {
    let key = ContentKey::unwrap(private_key, wrapped_key)?;
    key.decrypt(envelope)
}

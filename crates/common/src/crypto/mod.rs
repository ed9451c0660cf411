//! Cryptographic primitives for Lockbox
//!
//! This module provides the cryptographic foundation for Lockbox's sharing model:
//!
//! - **Arithmetic**: exact modular arithmetic over `num-bigint`
//! - **Primes**: sieved Miller–Rabin prime generation
//! - **RSA**: textbook RSA key pairs with integer encrypt/decrypt
//! - **Envelopes**: AES-256-GCM with a 16-byte nonce, `nonce || tag || ciphertext`
//! - **Key wrapping**: private keys under per-user secrets, content keys under RSA
//!
//! # Security Model
//!
//! ## User keys
//! Every user owns one RSA key pair. The private half is stored only as a
//! [`WrappedPrivateKey`], encrypted under a random per-user [`Secret`] that
//! lives with a separate secret provider.
//!
//! ## Content keys
//! Every file is encrypted under its own random [`ContentKey`]. Each holder
//! of the file (the owner and every recipient) keeps an independent
//! [`WrappedContentKey`], all wrapping the same key value.
//!
//! ## Sharing
//! To share a file, the owner:
//! 1. Unwraps their private key with their secret
//! 2. RSA-decrypts their copy of the content key
//! 3. RSA-encrypts the same content key for the recipient
//!
//! The file envelope is never re-encrypted.
//!
//! ## Known weaknesses
//! RSA is applied without padding. It is deterministic and malleable, and
//! the content key's hex text must fit under the modulus. None of the
//! arithmetic is constant time.

pub mod bigint;
pub mod prime;
mod key_wrap;
mod rsa;
mod secret;
mod share;

pub use key_wrap::{
    decrypt_download, encrypt_upload, generate_user_keys, ContentKey, KeyWrapError, Upload,
    UserKeys, WrappedContentKey, WrappedPrivateKey,
};
pub use prime::{PrimeConfig, PrimeError};
pub use rsa::{RsaError, RsaKeyPair, RsaPrivateKey, RsaPublicKey, DEFAULT_MODULUS_BITS};
pub use secret::{
    split_envelope, EnvelopeParts, Secret, SecretError, HEADER_SIZE, NONCE_SIZE, SECRET_SIZE,
    TAG_SIZE,
};
pub use share::reshare;

//! Textbook RSA over arbitrary-precision integers
//!
//! Keys are generated from two distinct probable primes of half the modulus
//! size. The public exponent is drawn at random from `(1, φ(n))` rather than
//! fixed at 65537.
//!
//! # Security Note
//!
//! This is raw RSA: no OAEP or PKCS#1 padding is applied. It is deterministic
//! and malleable, and a message must be numerically smaller than the modulus.
//! The wire format of wrapped content keys depends on this exact behaviour,
//! so padding cannot be added without breaking existing ciphertexts.
//!
//! Decryption returns the minimal big-endian encoding of the recovered
//! integer, so any leading zero bytes of the original message are lost.

use std::fmt;
use std::str::FromStr;

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::bigint::{gcd, mod_inverse, mod_pow};
use super::prime::{generate_prime_with, PrimeConfig, PrimeError};

/// Modulus size used when none is configured
pub const DEFAULT_MODULUS_BITS: u64 = 2048;
/// Smallest modulus accepted by the key generator
pub const MIN_MODULUS_BITS: u64 = 64;
/// Prime pairs tried before the modulus length is considered unreachable
const MAX_MODULUS_ATTEMPTS: u32 = 64;
/// Random exponents tried before giving up on finding one coprime with φ(n)
const MAX_EXPONENT_ATTEMPTS: u32 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum RsaError {
    #[error("key generation failed: {0}")]
    Prime(#[from] PrimeError),
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("invalid modulus size {0}: must be even and at least {MIN_MODULUS_BITS} bits")]
    InvalidBitLength(u64),
    #[error("message of {message_bits} bits is too large for a {modulus_bits}-bit modulus")]
    MessageTooLargeForModulus { message_bits: u64, modulus_bits: u64 },
    #[error("ciphertext is not smaller than the modulus")]
    InvalidCiphertext,
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl RsaError {
    /// Whether retrying key generation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RsaError::Prime(PrimeError::Exhausted { .. }) | RsaError::KeyGeneration(_)
        )
    }
}

/// Public half of an RSA key pair, `(e, n)`
///
/// The textual form is two decimal integers joined by a comma: `"e,n"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RsaPublicKey {
    e: BigUint,
    n: BigUint,
}

/// Private half of an RSA key pair, `(d, n)`
///
/// The textual form is `"d,n"`. It is only produced by [`RsaPrivateKey::to_text`]
/// so the exponent never ends up in a log line by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct RsaPrivateKey {
    d: BigUint,
    n: BigUint,
}

/// A freshly generated key pair
#[derive(Debug, Clone)]
pub struct RsaKeyPair {
    pub public: RsaPublicKey,
    pub private: RsaPrivateKey,
}

fn parse_pair(text: &str) -> Result<(BigUint, BigUint), RsaError> {
    let (a, b) = text
        .trim()
        .split_once(',')
        .ok_or_else(|| RsaError::InvalidKey("expected two comma separated integers".into()))?;
    let a = BigUint::from_str(a.trim())
        .map_err(|e| RsaError::InvalidKey(format!("bad exponent: {}", e)))?;
    let b = BigUint::from_str(b.trim())
        .map_err(|e| RsaError::InvalidKey(format!("bad modulus: {}", e)))?;
    if b <= BigUint::one() {
        return Err(RsaError::InvalidKey("modulus must be greater than one".into()));
    }
    Ok((a, b))
}

impl RsaPublicKey {
    pub fn new(e: BigUint, n: BigUint) -> Self {
        Self { e, n }
    }

    pub fn exponent(&self) -> &BigUint {
        &self.e
    }

    pub fn modulus(&self) -> &BigUint {
        &self.n
    }

    pub fn modulus_bits(&self) -> u64 {
        self.n.bits()
    }

    /// Encrypt `plaintext` read as a big-endian unsigned integer
    ///
    /// # Errors
    ///
    /// Returns [`RsaError::MessageTooLargeForModulus`] if the integer is not
    /// smaller than `n`. The message is never reduced modulo `n`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<BigUint, RsaError> {
        let m = BigUint::from_bytes_be(plaintext);
        if m >= self.n {
            return Err(RsaError::MessageTooLargeForModulus {
                message_bits: m.bits(),
                modulus_bits: self.n.bits(),
            });
        }
        Ok(mod_pow(&m, &self.e, &self.n))
    }

    /// Encrypt the UTF-8 bytes of `text`
    pub fn encrypt_text(&self, text: &str) -> Result<BigUint, RsaError> {
        self.encrypt(text.as_bytes())
    }
}

impl fmt::Display for RsaPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.e, self.n)
    }
}

impl FromStr for RsaPublicKey {
    type Err = RsaError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (e, n) = parse_pair(s)?;
        Ok(Self { e, n })
    }
}

impl Serialize for RsaPublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RsaPublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

impl RsaPrivateKey {
    pub fn new(d: BigUint, n: BigUint) -> Self {
        Self { d, n }
    }

    pub fn modulus(&self) -> &BigUint {
        &self.n
    }

    pub fn modulus_bits(&self) -> u64 {
        self.n.bits()
    }

    /// Serialize to the `"d,n"` text form
    pub fn to_text(&self) -> String {
        format!("{},{}", self.d, self.n)
    }

    /// Parse the `"d,n"` text form
    pub fn from_text(text: &str) -> Result<Self, RsaError> {
        let (d, n) = parse_pair(text)?;
        Ok(Self { d, n })
    }

    /// Recover the plaintext bytes of `ciphertext`
    ///
    /// The result is the shortest big-endian encoding of the recovered
    /// integer; a zero plaintext decrypts to an empty vector.
    pub fn decrypt(&self, ciphertext: &BigUint) -> Result<Vec<u8>, RsaError> {
        if *ciphertext >= self.n {
            return Err(RsaError::InvalidCiphertext);
        }
        let m = mod_pow(ciphertext, &self.d, &self.n);
        if m.is_zero() {
            return Ok(Vec::new());
        }
        Ok(m.to_bytes_be())
    }

    /// Decrypt and decode as UTF-8, replacing invalid sequences
    pub fn decrypt_text(&self, ciphertext: &BigUint) -> Result<String, RsaError> {
        let bytes = self.decrypt(ciphertext)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl fmt::Debug for RsaPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaPrivateKey")
            .field("modulus_bits", &self.n.bits())
            .finish_non_exhaustive()
    }
}

/// Generate two distinct probable primes of `bits` bits each
pub(crate) fn generate_distinct_primes<R: Rng + ?Sized>(
    rng: &mut R,
    bits: u64,
    config: &PrimeConfig,
) -> Result<(BigUint, BigUint), RsaError> {
    let p = generate_prime_with(rng, bits, config)?;
    let mut q = generate_prime_with(rng, bits, config)?;
    while q == p {
        q = generate_prime_with(rng, bits, config)?;
    }
    Ok((p, q))
}

/// Derive a key pair from two distinct primes
///
/// Draws `e` uniformly from `(1, φ)` until `gcd(e, φ) = 1`, then sets
/// `d = e⁻¹ mod φ`.
pub(crate) fn derive_key_pair<R: Rng + ?Sized>(
    rng: &mut R,
    p: &BigUint,
    q: &BigUint,
) -> Result<RsaKeyPair, RsaError> {
    if p == q {
        return Err(RsaError::KeyGeneration("primes must be distinct".into()));
    }

    let one = BigUint::one();
    let n = p * q;
    let phi = (p - &one) * (q - &one);
    let two = BigUint::from(2u32);
    if phi <= two {
        return Err(RsaError::KeyGeneration("φ(n) too small".into()));
    }

    let e = (0..MAX_EXPONENT_ATTEMPTS)
        .map(|_| rng.gen_biguint_range(&two, &phi))
        .find(|e| gcd(e, &phi).is_one())
        .ok_or_else(|| RsaError::KeyGeneration("no exponent coprime with φ(n)".into()))?;

    let d = mod_inverse(&e, &phi)
        .ok_or_else(|| RsaError::KeyGeneration("public exponent has no inverse".into()))?;

    Ok(RsaKeyPair {
        public: RsaPublicKey { e, n: n.clone() },
        private: RsaPrivateKey { d, n },
    })
}

impl RsaKeyPair {
    /// Generate a key pair whose modulus has exactly `bits` bits
    pub fn generate(bits: u64) -> Result<Self, RsaError> {
        Self::generate_with(&mut rand::thread_rng(), bits, &PrimeConfig::default())
    }

    /// Generate with an explicit RNG and prime search tuning
    ///
    /// Prime pairs whose product falls one bit short of `bits` are discarded
    /// and drawn again.
    pub fn generate_with<R: Rng + ?Sized>(
        rng: &mut R,
        bits: u64,
        config: &PrimeConfig,
    ) -> Result<Self, RsaError> {
        if bits < MIN_MODULUS_BITS || bits % 2 != 0 {
            return Err(RsaError::InvalidBitLength(bits));
        }

        for _ in 0..MAX_MODULUS_ATTEMPTS {
            let (p, q) = generate_distinct_primes(rng, bits / 2, config)?;
            if (&p * &q).bits() != bits {
                continue;
            }
            let pair = derive_key_pair(rng, &p, &q)?;
            tracing::debug!(bits, "generated RSA key pair");
            return Ok(pair);
        }

        Err(RsaError::KeyGeneration(format!(
            "could not reach a {}-bit modulus",
            bits
        )))
    }
}

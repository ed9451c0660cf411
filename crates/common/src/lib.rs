/**
 * Cryptographic types and operations.
 *  - Modular arithmetic, primes and textbook RSA
 *  - AES-GCM envelopes for private keys and file bodies
 *  - Content key wrapping and re-wrapping for shares
 */
pub mod crypto;
/**
 * Bounded-concurrency batch decryption
 *  used when listing many files at once.
 */
pub mod pipeline;
/**
 * Interfaces to the outside world: users,
 *  file metadata, key material and envelope bytes.
 * Ships in-memory implementations.
 */
pub mod store;
/**
 * The service that ties keys, files and shares
 *  together on top of the store interfaces.
 */
pub mod vault;

pub mod prelude {
    pub use crate::crypto::{
        ContentKey, KeyWrapError, RsaKeyPair, RsaPrivateKey, RsaPublicKey, Secret,
        WrappedContentKey, WrappedPrivateKey,
    };
    pub use crate::pipeline::{BatchItemError, BatchResult};
    pub use crate::store::{
        BlobStore, FileIndex, FileRecord, Role, SecretProvider, ShareEdge, StoreError,
        UserDirectory, UserKeyMaterial, UserRecord,
    };
    pub use crate::vault::{Download, Listing, Vault, VaultConfig, VaultError};
}

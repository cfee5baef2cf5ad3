//! Cryptographic primitives for the deidentification pipeline.
//!
//! Content hashing (SHA-256), RFC 8785 canonical JSON for signature input,
//! ECDSA-P256 / RSA-PSS signing identities, and the process-scoped keystore.

pub mod canonical;
pub mod hash;
pub mod identity;
pub mod keystore;

pub use canonical::{canonical_json, to_canonical_json};
pub use hash::{sha256, sha256_hex, StreamingHasher};
pub use identity::{
    derive_key_id, EcdsaIdentity, RsaIdentity, SignatureAlgorithm, SigningIdentity,
    VerifyingIdentity,
};
pub use keystore::{KeyHandle, KeyStore};

/// Errors from hashing, signing, and key management.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("rsa modulus below 2048 bits")]
    WeakKey,

    #[error("malformed key material: {0}")]
    MalformedKey(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("signature verification failed")]
    VerificationFailed,

    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    #[error("keystore io: {0}")]
    Io(#[from] std::io::Error),
}

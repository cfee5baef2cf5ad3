//! SHA-256 content hashing.

use sha2::{Digest, Sha256};

/// Hash a byte slice.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash a byte slice and return lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Incremental hasher for document streams.
///
/// Inputs can be large; callers feed chunks as they read them instead of
/// buffering whole documents for fingerprinting.
#[derive(Default)]
pub struct StreamingHasher {
    inner: Sha256,
}

impl StreamingHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    pub fn finalize(self) -> [u8; 32] {
        self.inner.finalize().into()
    }

    pub fn finalize_hex(self) -> String {
        hex::encode(self.finalize())
    }
}

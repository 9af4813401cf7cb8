//! SHA-256 content hashing, used to key file deduplication by declared
//! content hash (see the file service's dedup-on-upload path).

use crate::{CryptoError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Size of a SHA-256 digest in bytes.
pub const HASH_BYTE_SIZE: usize = 32;

/// Raw hash output bytes.
pub type HashOutput = [u8; HASH_BYTE_SIZE];

/// A SHA-256 content hash, stored and compared as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(HashOutput);

impl ContentHash {
    /// Wrap raw hash bytes.
    pub fn new(bytes: HashOutput) -> Self {
        Self(bytes)
    }

    /// Parse a lowercase hex digest, rejecting anything that isn't exactly
    /// 64 hex characters (the wire format required by the upload API).
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != HASH_BYTE_SIZE * 2 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CryptoError::InvalidHash(format!(
                "content hash must be {} lowercase hex characters",
                HASH_BYTE_SIZE * 2
            )));
        }
        if s.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(CryptoError::InvalidHash(
                "content hash must be lowercase hex".to_string(),
            ));
        }
        let bytes = hex::decode(s)?;
        let mut arr = [0u8; HASH_BYTE_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Raw hash bytes.
    pub fn as_bytes(&self) -> &HashOutput {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for ContentHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// An incremental SHA-256 hasher for streaming uploads, so the content hash
/// can be computed in the same pass as the AEAD encryption without buffering
/// the whole body twice.
pub struct IncrementalHasher {
    hasher: Sha256,
    bytes_processed: u64,
}

impl IncrementalHasher {
    /// Create a fresh incremental hasher.
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
            bytes_processed: 0,
        }
    }

    /// Feed more data into the hash.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes_processed += data.len() as u64;
    }

    /// Consume the hasher and produce the final digest.
    pub fn finalize(self) -> ContentHash {
        let digest = self.hasher.finalize();
        let mut bytes = [0u8; HASH_BYTE_SIZE];
        bytes.copy_from_slice(&digest);
        ContentHash(bytes)
    }

    /// Bytes seen so far.
    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }
}

impl Default for IncrementalHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a single buffer.
pub fn hash(data: &[u8]) -> ContentHash {
    let mut hasher = IncrementalHasher::new();
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"test data";
        assert_eq!(hash(data), hash(data));
    }

    #[test]
    fn incremental_matches_full() {
        let full = hash(b"Hello, World!");
        let mut hasher = IncrementalHasher::new();
        hasher.update(b"Hello, ");
        hasher.update(b"World!");
        assert_eq!(full, hasher.finalize());
    }

    #[test]
    fn hex_roundtrip() {
        let h = hash(b"test");
        let parsed = ContentHash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(ContentHash::from_hex("abcd").is_err());
    }

    #[test]
    fn rejects_uppercase_hex() {
        let h = hash(b"test").to_hex().to_uppercase();
        assert!(ContentHash::from_hex(&h).is_err());
    }

    #[test]
    fn rejects_non_hex_characters() {
        let bad = "g".repeat(HASH_BYTE_SIZE * 2);
        assert!(ContentHash::from_hex(&bad).is_err());
    }
}

//! Envelope key management: a process-wide Key Encryption Key (KEK) wraps a
//! random per-file Data Encryption Key (DEK).

use crate::symmetric::{Aead, Nonce};
use crate::{CryptoError, Result};
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a symmetric key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of a nonce in bytes (96 bits for AES-256-GCM).
pub const NONCE_SIZE: usize = 12;

/// GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Size of a wrapped DEK blob: `wrap_nonce ‖ ciphertext(32) ‖ tag`.
pub const WRAPPED_DEK_SIZE: usize = NONCE_SIZE + KEY_SIZE + TAG_SIZE;

/// A Data Encryption Key used to encrypt a single file body.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DekKey {
    key: [u8; KEY_SIZE],
}

impl DekKey {
    /// Generate a new random DEK.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        rand::RngCore::fill_bytes(&mut OsRng, &mut key);
        Self { key }
    }

    /// Build a DEK from raw bytes (e.g. after unwrapping).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "DEK must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

/// The process-wide Key Encryption Key, loaded once at boot from
/// `FILE_ENCRYPTION_MASTER_KEY`. Every DEK is wrapped under this key before
/// it is persisted to the metadata store.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Kek {
    key: [u8; KEY_SIZE],
}

impl Kek {
    /// Decode a base64-encoded master key. Fails if the decoded key is not
    /// exactly 32 bytes — callers should treat this as a fatal boot error,
    /// not something to silently fall back from.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "FILE_ENCRYPTION_MASTER_KEY must decode to {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes);
        Ok(Self { key })
    }

    /// Build a KEK from raw bytes, mainly for tests.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { key: bytes }
    }

    /// Wrap a DEK: `wrap_nonce ‖ ciphertext ‖ tag`.
    pub fn wrap(&self, dek: &DekKey) -> Result<Vec<u8>> {
        let nonce = Nonce::generate();
        let aead = Aead::from_raw_key(self.key);
        let ciphertext = aead.encrypt(&nonce, dek.as_bytes())?;
        let mut out = Vec::with_capacity(WRAPPED_DEK_SIZE);
        out.extend_from_slice(nonce.as_bytes());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Unwrap a DEK produced by [`Kek::wrap`]. Any authentication failure
    /// (wrong KEK, corrupted blob) is reported as a decryption error, never
    /// silently ignored.
    pub fn unwrap_dek(&self, wrapped: &[u8]) -> Result<DekKey> {
        if wrapped.len() != WRAPPED_DEK_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "wrapped DEK must be {} bytes, got {}",
                WRAPPED_DEK_SIZE,
                wrapped.len()
            )));
        }
        let (nonce_bytes, ciphertext) = wrapped.split_at(NONCE_SIZE);
        let nonce = Nonce::from_bytes(nonce_bytes)?;
        let aead = Aead::from_raw_key(self.key);
        let plaintext = aead.decrypt(&nonce, ciphertext)?;
        DekKey::from_bytes(&plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dek_generation_is_random() {
        let dek1 = DekKey::generate();
        let dek2 = DekKey::generate();
        assert_ne!(dek1.as_bytes(), dek2.as_bytes());
    }

    #[test]
    fn kek_from_base64_rejects_wrong_length() {
        use base64::Engine;
        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        assert!(Kek::from_base64(&short).is_err());
    }

    #[test]
    fn kek_from_base64_accepts_32_bytes() {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode([7u8; KEY_SIZE]);
        assert!(Kek::from_base64(&encoded).is_ok());
    }

    #[test]
    fn wrap_unwrap_roundtrip() {
        let kek = Kek::from_bytes([1u8; KEY_SIZE]);
        let dek = DekKey::generate();
        let wrapped = kek.wrap(&dek).unwrap();
        assert_eq!(wrapped.len(), WRAPPED_DEK_SIZE);
        let unwrapped = kek.unwrap_dek(&wrapped).unwrap();
        assert_eq!(dek.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn unwrap_fails_under_wrong_kek() {
        let kek1 = Kek::from_bytes([1u8; KEY_SIZE]);
        let kek2 = Kek::from_bytes([2u8; KEY_SIZE]);
        let dek = DekKey::generate();
        let wrapped = kek1.wrap(&dek).unwrap();
        assert!(kek2.unwrap_dek(&wrapped).is_err());
    }

    #[test]
    fn unwrap_fails_on_truncated_blob() {
        let kek = Kek::from_bytes([1u8; KEY_SIZE]);
        let dek = DekKey::generate();
        let mut wrapped = kek.wrap(&dek).unwrap();
        wrapped.truncate(10);
        assert!(kek.unwrap_dek(&wrapped).is_err());
    }
}

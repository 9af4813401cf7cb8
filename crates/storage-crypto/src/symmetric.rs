//! AES-256-GCM authenticated encryption for file bodies and wrapped DEKs.

use crate::{
    keys::{DekKey, KEY_SIZE, NONCE_SIZE},
    CryptoError, Result,
};
use aes_gcm::{aead::Aead as AeadTrait, Aes256Gcm, KeyInit};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// A 96-bit nonce for AES-256-GCM.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Nonce {
    bytes: [u8; NONCE_SIZE],
}

impl Nonce {
    /// Generate a random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::RngCore::fill_bytes(&mut OsRng, &mut bytes);
        Self { bytes }
    }

    /// Build a nonce from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidNonce(format!(
                "nonce must be {} bytes, got {}",
                NONCE_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; NONCE_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// The raw nonce bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.bytes
    }
}

/// AES-256-GCM encrypt/decrypt over a fixed key.
pub struct Aead {
    key: [u8; KEY_SIZE],
}

impl Aead {
    /// Build an AEAD instance from a DEK.
    pub fn new(key: &DekKey) -> Self {
        Self {
            key: *key.as_bytes(),
        }
    }

    /// Build an AEAD instance from a raw 32-byte key (used for KEK wrap/unwrap).
    pub fn from_raw_key(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Encrypt `plaintext` under `nonce`, producing `ciphertext ‖ tag`.
    pub fn encrypt(&self, nonce: &Nonce, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce_arr = aes_gcm::Nonce::from_slice(nonce.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        cipher
            .encrypt(nonce_arr, plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))
    }

    /// Encrypt with associated data bound into the authentication tag.
    pub fn encrypt_with_aad(&self, nonce: &Nonce, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let nonce_arr = aes_gcm::Nonce::from_slice(nonce.as_bytes());
        let payload = aes_gcm::aead::Payload { msg: plaintext, aad };
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        cipher
            .encrypt(nonce_arr, payload)
            .map_err(|e| CryptoError::Encryption(e.to_string()))
    }

    /// Decrypt `ciphertext` produced by [`Aead::encrypt`]. Fails closed on any
    /// authentication tag mismatch.
    pub fn decrypt(&self, nonce: &Nonce, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let nonce_arr = aes_gcm::Nonce::from_slice(nonce.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CryptoError::Decryption(e.to_string()))?;
        cipher
            .decrypt(nonce_arr, ciphertext)
            .map_err(|e| CryptoError::Decryption(e.to_string()))
    }

    /// Decrypt data that was bound to `aad` at encryption time.
    pub fn decrypt_with_aad(&self, nonce: &Nonce, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let nonce_arr = aes_gcm::Nonce::from_slice(nonce.as_bytes());
        let payload = aes_gcm::aead::Payload { msg: ciphertext, aad };
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CryptoError::Decryption(e.to_string()))?;
        cipher
            .decrypt(nonce_arr, payload)
            .map_err(|e| CryptoError::Decryption(e.to_string()))
    }
}

/// Encrypt with a freshly generated nonce (convenience wrapper).
pub fn encrypt(key: &DekKey, plaintext: &[u8]) -> Result<(Nonce, Vec<u8>)> {
    let nonce = Nonce::generate();
    let ciphertext = Aead::new(key).encrypt(&nonce, plaintext)?;
    Ok((nonce, ciphertext))
}

/// Decrypt a ciphertext produced by [`encrypt`].
pub fn decrypt(key: &DekKey, nonce: &Nonce, ciphertext: &[u8]) -> Result<Vec<u8>> {
    Aead::new(key).decrypt(nonce, ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = DekKey::generate();
        let plaintext = b"Hello, World!";

        let (nonce, ciphertext) = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &nonce, &ciphertext).unwrap();

        assert_eq!(plaintext.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn aad_roundtrip() {
        let key = DekKey::generate();
        let plaintext = b"secret data";
        let aad = b"associated data";
        let nonce = Nonce::generate();

        let aead = Aead::new(&key);
        let ciphertext = aead.encrypt_with_aad(&nonce, plaintext, aad).unwrap();
        let decrypted = aead.decrypt_with_aad(&nonce, &ciphertext, aad).unwrap();

        assert_eq!(plaintext.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn wrong_aad_fails() {
        let key = DekKey::generate();
        let nonce = Nonce::generate();
        let aead = Aead::new(&key);
        let ciphertext = aead
            .encrypt_with_aad(&nonce, b"secret data", b"correct aad")
            .unwrap();
        assert!(aead.decrypt_with_aad(&nonce, &ciphertext, b"wrong aad").is_err());
    }

    #[test]
    fn wrong_key_fails() {
        let key1 = DekKey::generate();
        let key2 = DekKey::generate();
        let (nonce, ciphertext) = encrypt(&key1, b"Secret message").unwrap();
        assert!(decrypt(&key2, &nonce, &ciphertext).is_err());
    }

    #[test]
    fn ciphertext_tampering_detected() {
        let key = DekKey::generate();
        let (nonce, mut ciphertext) = encrypt(&key, b"Authenticated message").unwrap();
        ciphertext[0] ^= 0xFF;
        assert!(decrypt(&key, &nonce, &ciphertext).is_err());
    }

    #[test]
    fn tag_tampering_detected() {
        let key = DekKey::generate();
        let (nonce, mut ciphertext) = encrypt(&key, b"Message with tag").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x01;
        assert!(decrypt(&key, &nonce, &ciphertext).is_err());
    }

    #[test]
    fn wrong_nonce_fails() {
        let key = DekKey::generate();
        let (nonce1, ciphertext) = encrypt(&key, b"Nonce-protected message").unwrap();
        let nonce2 = Nonce::generate();
        assert_ne!(nonce1.as_bytes(), nonce2.as_bytes());
        assert!(decrypt(&key, &nonce2, &ciphertext).is_err());
    }

    #[test]
    fn truncated_ciphertext_fails() {
        let key = DekKey::generate();
        let (nonce, mut ciphertext) = encrypt(&key, b"Message to truncate").unwrap();
        ciphertext.truncate(ciphertext.len() / 2);
        assert!(decrypt(&key, &nonce, &ciphertext).is_err());
    }

    #[test]
    fn nonce_uniqueness() {
        let mut nonces = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(nonces.insert(Nonce::generate().as_bytes().to_vec()));
        }
    }

    #[test]
    fn ciphertext_randomness() {
        let key = DekKey::generate();
        let (_, ct1) = encrypt(&key, b"Same message").unwrap();
        let (_, ct2) = encrypt(&key, b"Same message").unwrap();
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn ciphertext_expansion() {
        let key = DekKey::generate();
        let (_, ciphertext) = encrypt(&key, b"Test message").unwrap();
        assert_eq!(ciphertext.len(), "Test message".len() + 16);
    }
}

//! # storage-crypto
//!
//! Cryptographic primitives for the storage service's envelope encryption
//! scheme:
//!
//! - **KEK/DEK envelope**: a process-wide Key Encryption Key wraps a random
//!   per-file Data Encryption Key; only the wrapped DEK is persisted.
//! - **AES-256-GCM**: authenticated encryption for both file bodies and
//!   wrapped DEKs.
//! - **SHA-256 content hashing**: used to key upload deduplication.
//! - **Argon2id**: password hashing for user accounts and public shares.
//!
//! ## Security model
//!
//! The KEK lives only in server memory, decoded once at boot from
//! `FILE_ENCRYPTION_MASTER_KEY`. A file body is encrypted under a random DEK;
//! the DEK is wrapped under the KEK and stored alongside the file's metadata
//! row. Losing the KEK makes every wrapped DEK — and therefore every file —
//! unrecoverable; this is intentional, not a bug to route around.
//!
//! ```rust,ignore
//! use storage_crypto::{Kek, DekKey, symmetric};
//!
//! let kek = Kek::from_base64(&std::env::var("FILE_ENCRYPTION_MASTER_KEY")?)?;
//! let dek = DekKey::generate();
//! let wrapped_dek = kek.wrap(&dek)?;
//!
//! let (nonce, ciphertext) = symmetric::encrypt(&dek, b"file contents")?;
//! let plaintext = symmetric::decrypt(&dek, &nonce, &ciphertext)?;
//! ```

pub mod error;
pub mod hashing;
pub mod keys;
pub mod password;
pub mod symmetric;

pub use error::{CryptoError, Result};
pub use hashing::{hash, ContentHash, HashOutput};
pub use keys::{DekKey, Kek, KEY_SIZE, NONCE_SIZE, WRAPPED_DEK_SIZE};
pub use password::{hash_password, verify_password};
pub use symmetric::{Aead, Nonce};

/// Envelope format version, bumped if the wrap scheme ever changes.
pub const ENVELOPE_VERSION: u8 = 1;

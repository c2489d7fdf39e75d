//! sbx-crypto: client-side encryption envelope for sharebox.
//!
//! PBKDF2-HMAC-SHA256 derives a 256-bit master key from the configured
//! password, deterministically salted so every device with the same
//! password derives the same key. AES-256-GCM then authenticates and
//! encrypts payload bytes, with an optional filename-encryption layer on
//! top of the same envelope.

pub mod envelope;
pub mod filenames;
pub mod kdf;
pub mod manager;

pub use envelope::{decrypt, encrypt};
pub use filenames::{decrypt_filename, encrypt_filename};
pub use kdf::{derive_master_key, MasterKey};
pub use manager::CryptoEnvelope;

/// Size of a master key in bytes (256-bit).
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit).
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag.
pub const TAG_SIZE: usize = 16;

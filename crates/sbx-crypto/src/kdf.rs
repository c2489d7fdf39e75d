//! Key derivation: passphrase → master key via PBKDF2-HMAC-SHA256.

use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// PBKDF2 iteration count. Fixed, not configurable — a lower count would
/// weaken every key derived from a stored device, and a higher one would
/// silently change the key for existing installs.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// A 256-bit master key derived from a password. Zeroized on drop.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for MasterKey {
    fn eq(&self, other: &Self) -> bool {
        // Constant-time-ish: both are fixed 32-byte arrays so this does not
        // short-circuit on length, only content equality timing leaks, which
        // is an accepted tradeoff for password verification at this size.
        self.bytes == other.bytes
    }
}

/// Derive the password-dependent salt: the first 16 bytes of SHA-256(password).
///
/// Deterministic on purpose — the same password always yields the same salt
/// and therefore the same master key, with no separate salt to store or lose.
pub fn derive_salt(password: &SecretString) -> [u8; 16] {
    let digest = Sha256::digest(password.expose_secret().as_bytes());
    let mut salt = [0u8; 16];
    salt.copy_from_slice(&digest[..16]);
    salt
}

/// Derive a 256-bit master key from a password using PBKDF2-HMAC-SHA256
/// (100,000 iterations) and the password-derived salt from [`derive_salt`].
pub fn derive_master_key(password: &SecretString) -> MasterKey {
    let salt = derive_salt(password);
    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(
        password.expose_secret().as_bytes(),
        &salt,
        PBKDF2_ITERATIONS,
        &mut key,
    );
    MasterKey::from_bytes(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kdf_deterministic() {
        let password = SecretString::from("correct horse battery staple");
        let key1 = derive_master_key(&password);
        let key2 = derive_master_key(&password);
        assert_eq!(key1, key2, "KDF must be deterministic for the same password");
    }

    #[test]
    fn kdf_different_passwords_differ() {
        let key1 = derive_master_key(&SecretString::from("password-a"));
        let key2 = derive_master_key(&SecretString::from("password-b"));
        assert_ne!(key1, key2);
    }

    #[test]
    fn salt_is_first_16_bytes_of_sha256_password() {
        let password = SecretString::from("hunter2");
        let expected = Sha256::digest(b"hunter2");
        assert_eq!(derive_salt(&password), expected[..16]);
    }
}

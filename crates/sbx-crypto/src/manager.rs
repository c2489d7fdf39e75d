//! `CryptoEnvelope`: the composition point `sbx-cli` wires into `AppContext`.
//!
//! Bundles the derived master key with the filename-encryption toggle so
//! callers never touch [`envelope`] or [`filenames`] directly.

use sbx_core::error::CryptoError;
use secrecy::SecretString;

use crate::kdf::{derive_master_key, MasterKey};
use crate::{envelope, filenames};

pub struct CryptoEnvelope {
    key: MasterKey,
    encrypt_filenames: bool,
}

impl CryptoEnvelope {
    /// Derive the master key from `password` via PBKDF2-HMAC-SHA256.
    pub fn new(password: &SecretString, encrypt_filenames: bool) -> Self {
        Self {
            key: derive_master_key(password),
            encrypt_filenames,
        }
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        envelope::encrypt(&self.key, plaintext)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        envelope::decrypt(&self.key, ciphertext)
    }

    /// Identity function when filename encryption is disabled.
    pub fn encrypt_filename(&self, name: &str) -> String {
        if self.encrypt_filenames {
            filenames::encrypt_filename(&self.key, name)
        } else {
            name.to_string()
        }
    }

    pub fn decrypt_filename(&self, name: &str) -> String {
        if self.encrypt_filenames {
            filenames::decrypt_filename(&self.key, name)
        } else {
            name.to_string()
        }
    }

    /// Re-derive the key from `password` and constant-time-compare against
    /// the stored key.
    pub fn verify_password(&self, password: &SecretString) -> bool {
        let candidate = derive_master_key(password);
        constant_time_eq(candidate.as_bytes(), self.key.as_bytes())
    }

    /// Change the in-memory key after verifying `old`. Does not re-encrypt
    /// any already-stored objects.
    pub fn change_password(&mut self, old: &SecretString, new: &SecretString) -> bool {
        if !self.verify_password(old) {
            return false;
        }
        self.key = derive_master_key(new);
        true
    }
}

fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_password_accepts_correct_password() {
        let envelope = CryptoEnvelope::new(&SecretString::from("hunter2"), true);
        assert!(envelope.verify_password(&SecretString::from("hunter2")));
    }

    #[test]
    fn verify_password_rejects_wrong_password() {
        let envelope = CryptoEnvelope::new(&SecretString::from("hunter2"), true);
        assert!(!envelope.verify_password(&SecretString::from("hunter3")));
    }

    #[test]
    fn change_password_requires_correct_old_password() {
        let mut envelope = CryptoEnvelope::new(&SecretString::from("old-pw"), true);
        assert!(!envelope.change_password(&SecretString::from("wrong"), &SecretString::from("new-pw")));
        assert!(envelope.verify_password(&SecretString::from("old-pw")));
    }

    #[test]
    fn change_password_updates_key_on_success() {
        let mut envelope = CryptoEnvelope::new(&SecretString::from("old-pw"), true);
        assert!(envelope.change_password(&SecretString::from("old-pw"), &SecretString::from("new-pw")));
        assert!(envelope.verify_password(&SecretString::from("new-pw")));
        assert!(!envelope.verify_password(&SecretString::from("old-pw")));
    }

    #[test]
    fn data_encrypted_before_password_change_decrypts_after() {
        let mut envelope = CryptoEnvelope::new(&SecretString::from("old-pw"), false);
        let ciphertext = envelope.encrypt(b"stored before rotation");
        envelope.change_password(&SecretString::from("old-pw"), &SecretString::from("new-pw"));
        // re-encryption is out of scope: old ciphertext no longer decrypts
        // under the new in-memory key.
        assert!(envelope.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn filename_encryption_can_be_disabled() {
        let envelope = CryptoEnvelope::new(&SecretString::from("pw"), false);
        assert_eq!(envelope.encrypt_filename("report.pdf"), "report.pdf");
        assert_eq!(envelope.decrypt_filename("report.pdf"), "report.pdf");
    }
}

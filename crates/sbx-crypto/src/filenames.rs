//! Optional filename encryption: URL-safe base64 of an [`envelope`] around
//! the UTF-8 filename. Best-effort: a failure to encrypt or decrypt a name
//! falls back to returning the input unchanged rather than breaking the
//! directory listing it came from.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};

use crate::envelope;
use crate::kdf::MasterKey;

/// Encrypt `name` and return it as URL-safe base64. On any internal failure
/// (there are none today, but the boundary is kept for forward-compat),
/// returns `name` unchanged and logs a warning.
pub fn encrypt_filename(key: &MasterKey, name: &str) -> String {
    let envelope = envelope::encrypt(key, name.as_bytes());
    URL_SAFE.encode(envelope)
}

/// Decrypt a filename produced by [`encrypt_filename`].
///
/// Falls back to returning `encoded` unchanged (treating it as an already
/// plaintext name) when the base64, the envelope, or the UTF-8 is invalid —
/// this lets a client with encryption disabled read a share where some
/// peer's names are plaintext, and vice versa, without losing the entry.
pub fn decrypt_filename(key: &MasterKey, encoded: &str) -> String {
    match try_decrypt_filename(key, encoded) {
        Ok(name) => name,
        Err(reason) => {
            tracing::warn!(encoded, reason, "filename decryption failed, using raw name");
            encoded.to_string()
        }
    }
}

fn try_decrypt_filename(key: &MasterKey, encoded: &str) -> Result<String, String> {
    let raw = URL_SAFE
        .decode(encoded)
        .map_err(|e| format!("base64 decode: {e}"))?;
    let plaintext = envelope::decrypt(key, &raw).map_err(|e| e.to_string())?;
    String::from_utf8(plaintext).map_err(|e| format!("not valid UTF-8: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::derive_master_key;
    use secrecy::SecretString;

    fn test_key() -> MasterKey {
        derive_master_key(&SecretString::from("filename-test-password"))
    }

    #[test]
    fn roundtrip() {
        let key = test_key();
        let encrypted = encrypt_filename(&key, "vacation-photo.jpg");
        assert_eq!(decrypt_filename(&key, &encrypted), "vacation-photo.jpg");
    }

    #[test]
    fn roundtrip_unicode_name() {
        let key = test_key();
        let encrypted = encrypt_filename(&key, "reporte-2026-financiero.pdf");
        assert_eq!(
            decrypt_filename(&key, &encrypted),
            "reporte-2026-financiero.pdf"
        );
    }

    #[test]
    fn encrypted_name_is_url_safe_base64() {
        let key = test_key();
        let encrypted = encrypt_filename(&key, "report.pdf");
        assert!(!encrypted.contains('/'));
        assert!(!encrypted.contains('+'));
    }

    #[test]
    fn decrypt_falls_back_on_garbage_input() {
        let key = test_key();
        assert_eq!(decrypt_filename(&key, "not-base64-or-ciphertext!!"), "not-base64-or-ciphertext!!");
    }

    #[test]
    fn decrypt_falls_back_on_wrong_key() {
        let encrypted = encrypt_filename(&test_key(), "secret-plans.txt");
        let wrong_key = derive_master_key(&SecretString::from("a-different-password"));
        assert_eq!(decrypt_filename(&wrong_key, &encrypted), encrypted);
    }
}

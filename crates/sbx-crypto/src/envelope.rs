//! AES-256-GCM encryption envelope.
//!
//! Wire format: `nonce(12) || tag(16) || ciphertext`. The nonce is random per
//! call; the tag sits between nonce and ciphertext (not appended, to match
//! the envelope every sharebox client reads and writes).

use aes_gcm::{
    aead::{generic_array::GenericArray, AeadInPlace, KeyInit},
    Aes256Gcm,
};
use rand::RngCore;
use sbx_core::error::CryptoError;

use crate::kdf::MasterKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Minimum valid envelope length: an empty plaintext still carries a full
/// nonce and tag.
const MIN_ENVELOPE_LEN: usize = NONCE_SIZE + TAG_SIZE;

fn cipher_for(key: &MasterKey) -> Aes256Gcm {
    Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()))
}

/// Encrypt `plaintext` under `key`, returning `nonce || tag || ciphertext`.
pub fn encrypt(key: &MasterKey, plaintext: &[u8]) -> Vec<u8> {
    let cipher = cipher_for(key);

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = GenericArray::from_slice(&nonce_bytes);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(nonce, b"", &mut buffer)
        .expect("AES-256-GCM encryption with a fixed-size key cannot fail");

    let mut envelope = Vec::with_capacity(NONCE_SIZE + TAG_SIZE + buffer.len());
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(&tag);
    envelope.extend_from_slice(&buffer);
    envelope
}

/// Decrypt an envelope produced by [`encrypt`].
///
/// Returns [`CryptoError::MalformedCiphertext`] if `data` is shorter than a
/// nonce+tag, and [`CryptoError::AuthenticationFailed`] if the tag does not
/// verify (wrong key or corrupted/tampered data).
pub fn decrypt(key: &MasterKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < MIN_ENVELOPE_LEN {
        return Err(CryptoError::MalformedCiphertext(format!(
            "envelope is {} bytes, minimum is {MIN_ENVELOPE_LEN}",
            data.len()
        )));
    }

    let (nonce_bytes, rest) = data.split_at(NONCE_SIZE);
    let (tag_bytes, ciphertext) = rest.split_at(TAG_SIZE);

    let cipher = cipher_for(key);
    let nonce = GenericArray::from_slice(nonce_bytes);
    let tag = GenericArray::from_slice(tag_bytes);

    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(nonce, b"", &mut buffer, tag)
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::derive_master_key;
    use secrecy::SecretString;

    fn test_key() -> MasterKey {
        derive_master_key(&SecretString::from("test-password"))
    }

    #[test]
    fn roundtrip() {
        let key = test_key();
        let plaintext = b"the quick brown fox jumps over the lazy dog";
        let envelope = encrypt(&key, plaintext);
        let recovered = decrypt(&key, &envelope).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn roundtrip_empty_plaintext() {
        let key = test_key();
        let envelope = encrypt(&key, b"");
        assert_eq!(envelope.len(), MIN_ENVELOPE_LEN);
        assert_eq!(decrypt(&key, &envelope).unwrap(), b"");
    }

    #[test]
    fn envelope_below_minimum_length_is_malformed() {
        let key = test_key();
        let err = decrypt(&key, &[0u8; 10]).unwrap_err();
        assert!(matches!(err, CryptoError::MalformedCiphertext(_)));
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let envelope = encrypt(&test_key(), b"secret data");
        let wrong_key = derive_master_key(&SecretString::from("different-password"));
        let err = decrypt(&wrong_key, &envelope).unwrap_err();
        assert_eq!(err, CryptoError::AuthenticationFailed);
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let key = test_key();
        let mut envelope = encrypt(&key, b"secret data");
        let last = envelope.len() - 1;
        envelope[last] ^= 0xFF;
        let err = decrypt(&key, &envelope).unwrap_err();
        assert_eq!(err, CryptoError::AuthenticationFailed);
    }

    #[test]
    fn nonces_are_randomized() {
        let key = test_key();
        let a = encrypt(&key, b"same plaintext");
        let b = encrypt(&key, b"same plaintext");
        assert_ne!(a, b, "two encryptions of the same data must differ");
    }
}

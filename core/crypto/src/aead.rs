//! Authenticated encryption primitives.
//!
//! AES-256-GCM with a caller-provided 12-byte nonce is the package cipher.
//! XChaCha20-Poly1305 with a random 24-byte nonce prepended to the output is
//! available where no nonce can be derived safely.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::Aes256Gcm;
use chacha20poly1305::XChaCha20Poly1305;

use crate::keys::SecretKey;
use lockbox_common::{Error, Result};

/// Nonce size for AES-256-GCM (12 bytes).
pub const GCM_NONCE_SIZE: usize = 12;

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const XCHACHA_NONCE_SIZE: usize = 24;

/// Authentication tag size for both ciphers (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Seal plaintext with AES-256-GCM under an explicit nonce, no associated data.
///
/// # Postconditions
/// - Returns ciphertext || tag, `plaintext.len() + TAG_SIZE` bytes
///
/// # Security
/// - Caller is responsible for nonce uniqueness per key
pub fn seal_with_nonce(
    key: &SecretKey,
    nonce: &[u8; GCM_NONCE_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));

    cipher
        .encrypt(GenericArray::from_slice(nonce), plaintext)
        .map_err(|e| Error::Internal(format!("Encryption failed: {}", e)))
}

/// Open AES-256-GCM ciphertext || tag under an explicit nonce.
///
/// # Errors
/// - Returns `Authentication` if the input is shorter than a tag
/// - Returns `Authentication` if the tag does not verify
pub fn open_with_nonce(
    key: &SecretKey,
    nonce: &[u8; GCM_NONCE_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    if ciphertext.len() < TAG_SIZE {
        return Err(Error::Authentication("Ciphertext too short".to_string()));
    }

    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));

    cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|e| Error::Authentication(format!("Decryption failed: {}", e)))
}

/// Seal plaintext with XChaCha20-Poly1305 under a fresh random nonce.
///
/// # Postconditions
/// - Returns nonce || ciphertext || tag
pub fn seal_random_nonce(key: &SecretKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key.as_bytes()));
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| Error::Internal(format!("Encryption failed: {}", e)))?;

    let mut result = Vec::with_capacity(XCHACHA_NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Open nonce || ciphertext || tag produced by [`seal_random_nonce`].
pub fn open_random_nonce(key: &SecretKey, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < XCHACHA_NONCE_SIZE + TAG_SIZE {
        return Err(Error::Authentication("Ciphertext too short".to_string()));
    }

    let (nonce_bytes, encrypted) = sealed.split_at(XCHACHA_NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key.as_bytes()));

    cipher
        .decrypt(GenericArray::from_slice(nonce_bytes), encrypted)
        .map_err(|e| Error::Authentication(format!("Decryption failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KEY_LENGTH;

    #[test]
    fn test_seal_open_with_nonce() {
        let key = SecretKey::from_bytes([42u8; KEY_LENGTH]);
        let nonce = [1u8; GCM_NONCE_SIZE];
        let plaintext = b"Deterministic";

        let ct1 = seal_with_nonce(&key, &nonce, plaintext).unwrap();
        let ct2 = seal_with_nonce(&key, &nonce, plaintext).unwrap();

        // Same nonce should produce same ciphertext
        assert_eq!(ct1, ct2);
        assert_eq!(ct1.len(), plaintext.len() + TAG_SIZE);

        let opened = open_with_nonce(&key, &nonce, &ct1).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_wrong_nonce_fails() {
        let key = SecretKey::from_bytes([42u8; KEY_LENGTH]);
        let ct = seal_with_nonce(&key, &[1u8; GCM_NONCE_SIZE], b"data").unwrap();

        let result = open_with_nonce(&key, &[2u8; GCM_NONCE_SIZE], &ct);
        assert!(matches!(result, Err(Error::Authentication(_))));
    }

    #[test]
    fn test_short_ciphertext_fails() {
        let key = SecretKey::from_bytes([42u8; KEY_LENGTH]);
        let result = open_with_nonce(&key, &[0u8; GCM_NONCE_SIZE], &[0u8; 5]);
        assert!(matches!(result, Err(Error::Authentication(_))));
    }

    #[test]
    fn test_random_nonce_roundtrip() {
        let key = SecretKey::from_bytes([42u8; KEY_LENGTH]);
        let plaintext = b"Hello, World!";

        let sealed = seal_random_nonce(&key, plaintext).unwrap();
        assert_eq!(sealed.len(), XCHACHA_NONCE_SIZE + plaintext.len() + TAG_SIZE);
        assert_eq!(open_random_nonce(&key, &sealed).unwrap(), plaintext);
    }

    #[test]
    fn test_random_nonce_differs_each_time() {
        let key = SecretKey::from_bytes([42u8; KEY_LENGTH]);

        let s1 = seal_random_nonce(&key, b"same").unwrap();
        let s2 = seal_random_nonce(&key, b"same").unwrap();

        assert_ne!(&s1[..XCHACHA_NONCE_SIZE], &s2[..XCHACHA_NONCE_SIZE]);
        assert_ne!(s1, s2);
    }

    #[test]
    fn test_random_nonce_wrong_key_fails() {
        let sealed = seal_random_nonce(&SecretKey::from_bytes([1u8; KEY_LENGTH]), b"x").unwrap();
        let result = open_random_nonce(&SecretKey::from_bytes([2u8; KEY_LENGTH]), &sealed);
        assert!(matches!(result, Err(Error::Authentication(_))));
    }
}

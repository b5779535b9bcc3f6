//! Sealing and opening package payloads.
//!
//! With [`Cipher::HashDerivedNonce`] the AES-GCM nonce is the last 12 bytes of
//! the encoded content hash string. This matches packages already stored by
//! existing clients byte for byte. The nonce is a function of the plaintext,
//! so two keys must never seal payloads whose hashes share a 12-character
//! suffix; [`Cipher::RandomNonce`] avoids that at the cost of compatibility.

use tracing::debug;

use crate::aead::{self, GCM_NONCE_SIZE};
use crate::keys::SecretKey;
use lockbox_common::{ContentHash, Error, Package, Result};

/// Payload cipher used by a [`PackageCodec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cipher {
    /// AES-256-GCM, nonce derived from the content hash, no associated data.
    #[default]
    HashDerivedNonce,
    /// XChaCha20-Poly1305, random nonce stored in front of the ciphertext.
    RandomNonce,
}

/// Derive the AES-GCM nonce from a content hash: its last 12 encoded bytes.
pub fn derive_nonce(hash: &ContentHash) -> Result<[u8; GCM_NONCE_SIZE]> {
    let encoded = hash.as_bytes();
    if encoded.len() < GCM_NONCE_SIZE {
        return Err(Error::Validation(format!(
            "Content hash shorter than nonce: {} bytes",
            encoded.len()
        )));
    }

    let mut nonce = [0u8; GCM_NONCE_SIZE];
    nonce.copy_from_slice(&encoded[encoded.len() - GCM_NONCE_SIZE..]);
    Ok(nonce)
}

/// Seals plaintext packages and opens sealed ones with a caller-supplied key.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageCodec {
    cipher: Cipher,
}

impl PackageCodec {
    pub fn new(cipher: Cipher) -> Self {
        Self { cipher }
    }

    pub fn cipher(&self) -> Cipher {
        self.cipher
    }

    /// Encrypt a plaintext package.
    ///
    /// # Postconditions
    /// - Metadata is unchanged
    /// - `data` is the sealed payload (ciphertext || tag, nonce-prefixed for `RandomNonce`)
    pub fn seal(&self, package: &Package, key: &SecretKey) -> Result<Package> {
        let data = match self.cipher {
            Cipher::HashDerivedNonce => {
                let nonce = derive_nonce(package.hash())?;
                aead::seal_with_nonce(key, &nonce, &package.data)?
            }
            Cipher::RandomNonce => aead::seal_random_nonce(key, &package.data)?,
        };

        debug!(hash = %package.hash(), cipher = ?self.cipher, "sealed package");
        Ok(Package::new(package.metadata.clone(), data))
    }

    /// Decrypt a sealed package.
    ///
    /// # Errors
    /// - Returns `Authentication` for a wrong key, a wrong hash, or tampered data
    pub fn open(&self, package: &Package, key: &SecretKey) -> Result<Package> {
        let data = match self.cipher {
            Cipher::HashDerivedNonce => {
                let nonce = derive_nonce(package.hash())?;
                aead::open_with_nonce(key, &nonce, &package.data)?
            }
            Cipher::RandomNonce => aead::open_random_nonce(key, &package.data)?,
        };

        Ok(Package::new(package.metadata.clone(), data))
    }
}

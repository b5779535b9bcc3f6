//! Package construction and payload encryption for Lockbox.
//!
//! This module provides:
//! - Content hashing with SHA-256 over `payload ‖ description`
//! - Package construction from raw or typed plaintext
//! - Authenticated encryption with AES-256-GCM (hash-derived nonce) or
//!   XChaCha20-Poly1305 (random nonce)
//! - A caller-supplied key type with automatic zeroization
//!
//! # Security Guarantees
//! - Key material is zeroized on drop
//! - No plaintext or key material is ever logged
//! - Any modification of a sealed payload fails authentication

pub mod aead;
pub mod codec;
pub mod hash;
pub mod keys;
pub mod package;

pub use codec::{derive_nonce, Cipher, PackageCodec};
pub use hash::content_hash;
pub use keys::{SecretKey, KEY_LENGTH};
pub use package::{pack, pack_payload, unpack_payload};

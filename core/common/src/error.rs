//! Common error types for Lockbox.

use thiserror::Error;

/// Top-level error type for Lockbox operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input (bad hash, unknown type tag, undecodable package).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A package with the same content hash is already stored for the principal.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// No matching metadata or blob.
    #[error("Not found: {0}")]
    NotFound(String),

    /// AEAD verification failed: wrong key, wrong hash, or tampered ciphertext.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Internal failure such as a timeout or a broken invariant.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// True for the variants a boundary reports as an internal failure.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Error::Authentication(_)
                | Error::Internal(_)
                | Error::Storage(_)
                | Error::Io(_)
                | Error::Serialization(_)
        )
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

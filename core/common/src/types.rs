//! Common types used throughout Lockbox.
//!
//! These are also the wire types: a [`Package`] serializes to
//! `{"metadata": {...}, "data": "<base64>"}`.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Length in bytes of the raw SHA-256 digest behind a [`ContentHash`].
pub const DIGEST_LENGTH: usize = 32;

/// Length of the unpadded base64 encoding of a SHA-256 digest.
pub const ENCODED_HASH_LENGTH: usize = 43;

/// Opaque identifier of the owner of stored data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalId(i64);

impl PrincipalId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of payload carried by a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataType {
    /// Login/password pair.
    Credentials = 0,
    /// Payment card record.
    BankCard = 1,
    /// Raw file bytes.
    File = 2,
}

impl DataType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(DataType::Credentials),
            1 => Ok(DataType::BankCard),
            2 => Ok(DataType::File),
            other => Err(Error::Validation(format!("Unknown data type tag: {}", other))),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        value.as_u8()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Credentials => "credentials",
            DataType::BankCard => "bank-card",
            DataType::File => "file",
        };
        write!(f, "{}", name)
    }
}

/// Unpadded base64 encoding of a SHA-256 digest over `payload ‖ description`.
///
/// The encoded string itself (not the raw digest) is the deduplication key and
/// the source of the hash-derived nonce, so it is kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Encode a raw digest.
    pub fn from_digest(digest: &[u8; DIGEST_LENGTH]) -> Self {
        Self(STANDARD_NO_PAD.encode(digest))
    }

    /// Parse an encoded hash.
    ///
    /// # Errors
    /// - Returns `Validation` unless the input is unpadded base64 of exactly 32 bytes
    pub fn parse(encoded: impl Into<String>) -> Result<Self> {
        let encoded = encoded.into();
        if encoded.len() != ENCODED_HASH_LENGTH {
            return Err(Error::Validation(format!(
                "Content hash must be {} characters, got {}",
                ENCODED_HASH_LENGTH,
                encoded.len()
            )));
        }
        let raw = STANDARD_NO_PAD
            .decode(&encoded)
            .map_err(|e| Error::Validation(format!("Content hash is not base64: {}", e)))?;
        if raw.len() != DIGEST_LENGTH {
            return Err(Error::Validation(format!(
                "Content hash must decode to {} bytes",
                DIGEST_LENGTH
            )));
        }
        Ok(Self(encoded))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl TryFrom<String> for ContentHash {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptive record of a package, queryable without touching the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Upload time (UTC). Not part of the content hash.
    #[serde(rename = "uploaddate")]
    pub upload_date: DateTime<Utc>,
    #[serde(rename = "uploadtype")]
    pub data_type: DataType,
    pub description: String,
    pub hash: ContentHash,
}

impl Metadata {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode metadata received from a caller.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Validation(e.to_string()))
    }
}

/// Metadata plus payload: plaintext before sealing, ciphertext at rest.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub metadata: Metadata,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl Package {
    pub fn new(metadata: Metadata, data: Vec<u8>) -> Self {
        Self { metadata, data }
    }

    pub fn hash(&self) -> &ContentHash {
        &self.metadata.hash
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode a package received from a caller.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Validation(e.to_string()))
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("metadata", &self.metadata)
            .field("data", &format_args!("[{} bytes]", self.data.len()))
            .finish()
    }
}

/// Padded standard base64 for byte payloads on the wire.
mod base64_bytes {
    use super::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

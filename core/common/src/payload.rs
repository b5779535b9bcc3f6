//! Typed plaintext payloads.
//!
//! Structured payloads are JSON encoded before packing; files are carried as
//! their raw bytes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::types::DataType;
use crate::{Error, Result};

/// A plaintext that can be packed into a package of a fixed [`DataType`].
pub trait Payload: Sized {
    /// Type tag recorded in the package metadata.
    const DATA_TYPE: DataType;

    /// Encode into the bytes that get hashed and sealed.
    fn to_bytes(&self) -> Result<Vec<u8>>;

    /// Decode from opened payload bytes.
    fn from_bytes(bytes: &[u8]) -> Result<Self>;
}

/// Login/password pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl Payload for Credentials {
    const DATA_TYPE: DataType = DataType::Credentials;

    fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Payment card record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankCard {
    #[serde(rename = "cardnumber")]
    pub card_number: String,
    #[serde(rename = "expiredate")]
    pub expire_date: String,
    #[serde(rename = "csvcode")]
    pub csv_code: u32,
    #[serde(rename = "cardholder")]
    pub card_holder: String,
}

impl fmt::Debug for BankCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail: String = self
            .card_number
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        f.debug_struct("BankCard")
            .field("card_number", &format_args!("****{}", tail))
            .field("expire_date", &self.expire_date)
            .field("card_holder", &self.card_holder)
            .finish_non_exhaustive()
    }
}

impl Payload for BankCard {
    const DATA_TYPE: DataType = DataType::BankCard;

    fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Raw file contents, held fully in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct FileContents(Vec<u8>);

impl FileContents {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Read a whole file from disk.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self(std::fs::read(path)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for FileContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileContents([{} bytes])", self.0.len())
    }
}

impl Payload for FileContents {
    const DATA_TYPE: DataType = DataType::File;

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self(bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_credentials_json_shape() {
        let creds = Credentials {
            login: "u".to_string(),
            password: "p".to_string(),
        };
        let bytes = creds.to_bytes().unwrap();
        assert_eq!(bytes, br#"{"login":"u","password":"p"}"#);
        assert_eq!(Credentials::from_bytes(&bytes).unwrap(), creds);
    }

    #[test]
    fn test_bank_card_field_names() {
        let card = BankCard {
            card_number: "4111111111111111".to_string(),
            expire_date: "01/30".to_string(),
            csv_code: 123,
            card_holder: "J DOE".to_string(),
        };
        let value: serde_json::Value = serde_json::from_slice(&card.to_bytes().unwrap()).unwrap();
        assert_eq!(value["cardnumber"], "4111111111111111");
        assert_eq!(value["csvcode"], 123);

        let debug = format!("{:?}", card);
        assert!(debug.contains("****1111"));
        assert!(!debug.contains("4111111111111111"));
    }

    #[test]
    fn test_file_contents_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"file body").unwrap();

        let contents = FileContents::read(file.path()).unwrap();
        assert_eq!(contents.to_bytes().unwrap(), b"file body");
    }

    #[test]
    fn test_file_contents_bytes() {
        let contents = FileContents::new(vec![0, 159, 146, 150]);
        assert_eq!(contents.as_bytes(), [0, 159, 146, 150]);
        assert_eq!(format!("{:?}", contents), "FileContents([4 bytes])");

        let decoded = FileContents::from_bytes(&contents.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.into_bytes(), vec![0, 159, 146, 150]);
    }

    #[test]
    fn test_file_contents_missing_file() {
        let result = FileContents::read("/definitely/not/here");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_credentials_from_garbage() {
        assert!(Credentials::from_bytes(b"not json").is_err());
    }
}

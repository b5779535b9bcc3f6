//! Common types and errors shared across Lockbox crates.
//!
//! This module provides the package data model, the wire encoding and the
//! typed plaintext payloads, ensuring every crate agrees on one error taxonomy.

pub mod error;
pub mod payload;
pub mod types;

pub use error::{Error, Result};
pub use payload::{BankCard, Credentials, FileContents, Payload};
pub use types::{ContentHash, DataType, Metadata, Package, PrincipalId};

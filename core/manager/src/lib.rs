//! Deduplicating data manager for Lockbox.
//!
//! [`DataManager`] is the service-facing API: load, fetch, list and delete
//! sealed packages for a principal. [`Status`] maps its errors to the coarse
//! outcomes a transport layer reports.

pub mod config;
pub mod manager;
pub mod status;

pub use config::{ManagerConfig, DEFAULT_OPERATION_TIMEOUT_MS};
pub use manager::DataManager;
pub use status::Status;

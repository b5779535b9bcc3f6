//! Record storage for Lockbox.
//!
//! A stored package is a pair of linked records: a metadata row that can be
//! listed and filtered cheaply, and an opaque blob holding the sealed payload.
//! Backends implement [`RecordStore`] and guarantee that the pair is created
//! and removed as one unit.
//!
//! # Backends
//! - [`SqliteRecordStore`]: durable, file or in-memory SQLite database
//! - [`MemoryRecordStore`]: process-local, for tests and development

pub mod config;
pub mod memory;
pub mod migrations;
pub mod sqlite;
pub mod store;

pub use config::StoreConfig;
pub use memory::MemoryRecordStore;
pub use sqlite::{DbPool, SqliteRecordStore};
pub use store::RecordStore;

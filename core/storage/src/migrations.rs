//! Schema migrations for the SQLite store.
//!
//! Applied migrations are tracked with the `user_version` pragma; version N
//! means the first N entries of [`MIGRATIONS`] are in place.

use rusqlite::Connection;
use tracing::info;

use crate::sqlite::storage_error;
use lockbox_common::{Error, Result};

/// One schema step with its inverse.
pub struct Migration {
    pub up: &'static str,
    pub down: &'static str,
}

/// All schema migrations, oldest first.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        up: "
CREATE TABLE metadata (
    md_id INTEGER PRIMARY KEY AUTOINCREMENT,
    principal_id INTEGER NOT NULL,
    data_type INTEGER NOT NULL,
    descript TEXT NOT NULL,
    md_hash TEXT NOT NULL,
    upload_date TEXT NOT NULL,
    UNIQUE (principal_id, md_hash)
);

CREATE TABLE package_blobs (
    md_id INTEGER PRIMARY KEY
        REFERENCES metadata(md_id) DEFERRABLE INITIALLY DEFERRED,
    user_data BLOB NOT NULL
);
",
        down: "
DROP TABLE package_blobs;
DROP TABLE metadata;
",
    },
    Migration {
        up: "CREATE INDEX idx_metadata_principal ON metadata(principal_id, md_id);",
        down: "DROP INDEX idx_metadata_principal;",
    },
];

/// Read the applied schema version.
pub fn current_version(conn: &Connection) -> Result<usize> {
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(storage_error)?;
    usize::try_from(version)
        .map_err(|_| Error::Storage(format!("Invalid schema version: {}", version)))
}

/// Apply all pending migrations, each in its own transaction.
///
/// # Returns
/// The schema version after migrating.
///
/// # Errors
/// - Returns error if the database is newer than this build
pub fn migrate_up(conn: &mut Connection) -> Result<usize> {
    let current = current_version(conn)?;
    if current > MIGRATIONS.len() {
        return Err(Error::Storage(format!(
            "Database schema version {} is newer than supported version {}",
            current,
            MIGRATIONS.len()
        )));
    }

    for (index, migration) in MIGRATIONS.iter().enumerate().skip(current) {
        let version = index + 1;
        let tx = conn.transaction().map_err(storage_error)?;
        tx.execute_batch(migration.up).map_err(storage_error)?;
        tx.pragma_update(None, "user_version", version as i64)
            .map_err(storage_error)?;
        tx.commit().map_err(storage_error)?;
        info!("Applied schema migration {}", version);
    }

    Ok(MIGRATIONS.len())
}

/// Revert every applied migration, newest first.
pub fn migrate_down(conn: &mut Connection) -> Result<()> {
    let current = current_version(conn)?.min(MIGRATIONS.len());

    for index in (0..current).rev() {
        let tx = conn.transaction().map_err(storage_error)?;
        tx.execute_batch(MIGRATIONS[index].down)
            .map_err(storage_error)?;
        tx.pragma_update(None, "user_version", index as i64)
            .map_err(storage_error)?;
        tx.commit().map_err(storage_error)?;
        info!("Reverted schema migration {}", index + 1);
    }

    Ok(())
}

//! SQLite-backed record store.
//!
//! Metadata rows and blob rows live in separate tables linked 1:1 by `md_id`.
//! Every insert and delete touches both tables inside one
//! [`rusqlite::Transaction`]; dropping the transaction without committing
//! rolls it back, so an error or panic at any step leaves the database as it
//! was.
//!
//! Dropping the future of an operation cancels it: a statement in flight is
//! interrupted and the transaction is never committed. A commit that has
//! already started runs to completion.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{
    params, Connection, ErrorCode, InterruptHandle, OptionalExtension, Row, Transaction,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::migrations;
use crate::store::RecordStore;
use lockbox_common::{
    ContentHash, DataType, Error, Metadata, Package, PrincipalId, Result,
};

/// Shared database connection.
///
/// rusqlite is synchronous, so the connection sits behind a mutex and is used
/// from `tokio::task::spawn_blocking`.
pub type DbPool = Arc<Mutex<Connection>>;

const METADATA_COLUMNS: &str = "md_id, data_type, descript, md_hash, upload_date";

/// Map a rusqlite error to a storage error.
pub(crate) fn storage_error(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            Error::Internal(format!("Database busy: {}", e))
        }
        _ => Error::Storage(e.to_string()),
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Metadata columns as stored, before validation.
struct MetadataRow {
    md_id: i64,
    data_type: i64,
    description: String,
    hash: String,
    upload_date: String,
}

impl MetadataRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            md_id: row.get(0)?,
            data_type: row.get(1)?,
            description: row.get(2)?,
            hash: row.get(3)?,
            upload_date: row.get(4)?,
        })
    }

    fn into_metadata(self) -> Result<Metadata> {
        let tag = u8::try_from(self.data_type).map_err(|_| {
            Error::Storage(format!("Corrupt type tag in row {}", self.md_id))
        })?;
        let data_type = DataType::try_from(tag)
            .map_err(|e| Error::Storage(format!("Corrupt row {}: {}", self.md_id, e)))?;
        let hash = ContentHash::parse(self.hash)
            .map_err(|e| Error::Storage(format!("Corrupt row {}: {}", self.md_id, e)))?;
        let upload_date = DateTime::parse_from_rfc3339(&self.upload_date)
            .map_err(|e| Error::Storage(format!("Corrupt date in row {}: {}", self.md_id, e)))?
            .with_timezone(&Utc);

        Ok(Metadata {
            upload_date,
            data_type,
            description: self.description,
            hash,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Queued,
    Running,
    Committing,
    Finished,
    Cancelled,
}

/// Cancellation state of one blocking operation.
///
/// Shared between the blocking closure and the future awaiting it. Only an
/// operation in `Running` is interrupted, so the interrupt never reaches a
/// statement of another operation on the same connection.
pub(crate) struct Cancellation {
    phase: Mutex<Phase>,
    interrupt: Arc<InterruptHandle>,
}

fn cancelled() -> Error {
    Error::Internal("Database operation cancelled".to_string())
}

impl Cancellation {
    fn new(interrupt: Arc<InterruptHandle>) -> Self {
        Self {
            phase: Mutex::new(Phase::Queued),
            interrupt,
        }
    }

    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the operation as running on the connection.
    fn start(&self) -> Result<()> {
        let mut phase = self.phase();
        if *phase == Phase::Cancelled {
            return Err(cancelled());
        }
        *phase = Phase::Running;
        Ok(())
    }

    /// Commit `tx` unless the operation has been cancelled.
    ///
    /// A cancelled transaction is dropped, which rolls it back.
    fn commit(&self, tx: Transaction<'_>) -> Result<()> {
        {
            let mut phase = self.phase();
            if *phase == Phase::Cancelled {
                return Err(cancelled());
            }
            *phase = Phase::Committing;
        }
        tx.commit().map_err(storage_error)
    }

    fn finish(&self) {
        let mut phase = self.phase();
        if *phase != Phase::Cancelled {
            *phase = Phase::Finished;
        }
    }

    fn cancel(&self) {
        let mut phase = self.phase();
        match *phase {
            Phase::Queued => *phase = Phase::Cancelled,
            Phase::Running => {
                *phase = Phase::Cancelled;
                self.interrupt.interrupt();
            }
            Phase::Committing | Phase::Finished | Phase::Cancelled => {}
        }
    }
}

/// Cancels the operation when the awaiting future is dropped early.
struct CancelOnDrop {
    cancellation: Arc<Cancellation>,
    armed: bool,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.cancellation.cancel();
            debug!("database operation cancelled by caller");
        }
    }
}

/// Durable record store on a SQLite database.
pub struct SqliteRecordStore {
    conn: DbPool,
    interrupt: Arc<InterruptHandle>,
    config: StoreConfig,
}

impl SqliteRecordStore {
    /// Open (or create) the database and bring its schema up to date.
    ///
    /// # Postconditions
    /// - Foreign keys are enforced
    /// - All migrations are applied
    ///
    /// # Errors
    /// - Database creation or migration failure
    pub fn open(config: StoreConfig) -> Result<Self> {
        let mut conn = match &config.path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                Connection::open(path).map_err(storage_error)?
            }
            None => Connection::open_in_memory().map_err(storage_error)?,
        };

        conn.busy_timeout(config.busy_timeout())
            .map_err(storage_error)?;
        if config.wal && config.path.is_some() {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })
            .map_err(storage_error)?;
        }
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(storage_error)?;

        let version = migrations::migrate_up(&mut conn)?;

        match &config.path {
            Some(path) => info!("Record store opened at {} (schema v{})", path.display(), version),
            None => info!("In-memory record store opened (schema v{})", version),
        }

        Ok(Self {
            interrupt: Arc::new(conn.get_interrupt_handle()),
            conn: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::open(StoreConfig::in_memory())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Revert all migrations, dropping every stored record, and close.
    pub async fn close_and_clean(self) -> Result<()> {
        self.with_conn(|conn, _| migrations::migrate_down(conn)).await?;
        info!("Record store schema removed");
        Ok(())
    }

    /// Run a blocking database operation off the async executor.
    ///
    /// Writes must commit through [`Cancellation::commit`].
    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Connection, &Cancellation) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let cancellation = Arc::new(Cancellation::new(Arc::clone(&self.interrupt)));
        let mut on_drop = CancelOnDrop {
            cancellation: Arc::clone(&cancellation),
            armed: true,
        };

        let result = tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| Error::Internal("Database connection poisoned".to_string()))?;
            cancellation.start()?;
            let result = op(&mut guard, &cancellation);
            cancellation.finish();
            result
        })
        .await;
        on_drop.armed = false;

        result.map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert(&self, principal: PrincipalId, package: Package) -> Result<()> {
        self.with_conn(move |conn, cancellation| {
            let metadata = &package.metadata;
            let tx = conn.transaction().map_err(storage_error)?;

            tx.execute(
                "INSERT INTO metadata (principal_id, data_type, descript, md_hash, upload_date)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    principal.as_i64(),
                    metadata.data_type.as_u8(),
                    metadata.description,
                    metadata.hash.as_str(),
                    format_date(&metadata.upload_date),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::AlreadyExists(format!(
                        "Package {} already stored for principal {}",
                        metadata.hash, principal
                    ))
                } else {
                    storage_error(e)
                }
            })?;
            let md_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO package_blobs (md_id, user_data) VALUES (?1, ?2)",
                params![md_id, package.data],
            )
            .map_err(storage_error)?;

            cancellation.commit(tx)?;
            debug!(principal = %principal, hash = %metadata.hash, md_id, "inserted package");
            Ok(())
        })
        .await
    }

    async fn get(&self, principal: PrincipalId, hash: &ContentHash) -> Result<Option<Package>> {
        let hash = hash.clone();
        self.with_conn(move |conn, _| {
            let tx = conn.transaction().map_err(storage_error)?;

            let row = tx
                .query_row(
                    &format!(
                        "SELECT {} FROM metadata WHERE principal_id = ?1 AND md_hash = ?2",
                        METADATA_COLUMNS
                    ),
                    params![principal.as_i64(), hash.as_str()],
                    MetadataRow::from_row,
                )
                .optional()
                .map_err(storage_error)?;

            let Some(row) = row else {
                return Ok(None);
            };

            let blob: Option<Vec<u8>> = tx
                .query_row(
                    "SELECT user_data FROM package_blobs WHERE md_id = ?1",
                    [row.md_id],
                    |r| r.get(0),
                )
                .optional()
                .map_err(storage_error)?;
            tx.commit().map_err(storage_error)?;

            match blob {
                Some(data) => Ok(Some(Package::new(row.into_metadata()?, data))),
                None => {
                    warn!(md_id = row.md_id, "metadata row has no blob");
                    Ok(None)
                }
            }
        })
        .await
    }

    async fn get_metadata(
        &self,
        principal: PrincipalId,
        hash: &ContentHash,
    ) -> Result<Option<Metadata>> {
        let hash = hash.clone();
        self.with_conn(move |conn, _| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM metadata WHERE principal_id = ?1 AND md_hash = ?2",
                    METADATA_COLUMNS
                ),
                params![principal.as_i64(), hash.as_str()],
                MetadataRow::from_row,
            )
            .optional()
            .map_err(storage_error)?
            .map(MetadataRow::into_metadata)
            .transpose()
        })
        .await
    }

    async fn list(&self, principal: PrincipalId) -> Result<Vec<Metadata>> {
        self.with_conn(move |conn, _| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM metadata WHERE principal_id = ?1 ORDER BY md_id",
                    METADATA_COLUMNS
                ))
                .map_err(storage_error)?;

            let rows = stmt
                .query_map([principal.as_i64()], MetadataRow::from_row)
                .map_err(storage_error)?;

            let mut result = Vec::new();
            for row in rows {
                result.push(row.map_err(storage_error)?.into_metadata()?);
            }
            Ok(result)
        })
        .await
    }

    async fn delete(&self, principal: PrincipalId, metadata: &Metadata) -> Result<bool> {
        let data_type = metadata.data_type;
        let hash = metadata.hash.clone();
        self.with_conn(move |conn, cancellation| {
            let tx = conn.transaction().map_err(storage_error)?;

            let md_id: Option<i64> = tx
                .query_row(
                    "SELECT md_id FROM metadata
                     WHERE principal_id = ?1 AND data_type = ?2 AND md_hash = ?3",
                    params![principal.as_i64(), data_type.as_u8(), hash.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage_error)?;

            let Some(md_id) = md_id else {
                return Ok(false);
            };

            tx.execute("DELETE FROM metadata WHERE md_id = ?1", [md_id])
                .map_err(storage_error)?;
            let blobs = tx
                .execute("DELETE FROM package_blobs WHERE md_id = ?1", [md_id])
                .map_err(storage_error)?;
            if blobs == 0 {
                warn!(md_id, "deleted metadata row had no blob");
            }

            cancellation.commit(tx)?;
            debug!(principal = %principal, hash = %hash, md_id, "deleted package");
            Ok(true)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbox_common::types::DIGEST_LENGTH;

    fn package(seed: u8, data_type: DataType, description: &str) -> Package {
        Package::new(
            Metadata {
                upload_date: Utc::now(),
                data_type,
                description: description.to_string(),
                hash: ContentHash::from_digest(&[seed; DIGEST_LENGTH]),
            },
            vec![seed; 24],
        )
    }

    fn exec(store: &SqliteRecordStore, sql: &str) {
        store.conn.lock().unwrap().execute_batch(sql).unwrap();
    }

    fn count(store: &SqliteRecordStore, table: &str) -> i64 {
        store
            .conn
            .lock()
            .unwrap()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_get_roundtrip() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let principal = PrincipalId::new(1);
        let pkg = package(1, DataType::Credentials, "acct");

        store.insert(principal, pkg.clone()).await.unwrap();

        let fetched = store.get(principal, pkg.hash()).await.unwrap().unwrap();
        assert_eq!(fetched, pkg);
        assert_eq!(
            store.get_metadata(principal, pkg.hash()).await.unwrap(),
            Some(pkg.metadata.clone())
        );
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_already_exists() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let principal = PrincipalId::new(1);
        let pkg = package(1, DataType::File, "f");

        store.insert(principal, pkg.clone()).await.unwrap();
        let result = store.insert(principal, pkg).await;

        assert!(matches!(result, Err(Error::AlreadyExists(_))));
        assert_eq!(count(&store, "metadata"), 1);
        assert_eq!(count(&store, "package_blobs"), 1);
    }

    #[tokio::test]
    async fn test_uniqueness_is_per_principal() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let pkg = package(1, DataType::File, "f");

        store.insert(PrincipalId::new(1), pkg.clone()).await.unwrap();
        store.insert(PrincipalId::new(2), pkg.clone()).await.unwrap();

        assert_eq!(store.list(PrincipalId::new(1)).await.unwrap().len(), 1);
        assert_eq!(store.list(PrincipalId::new(2)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_blob_insert_rolls_back_metadata() {
        let store = SqliteRecordStore::in_memory().unwrap();
        exec(
            &store,
            "CREATE TRIGGER fail_blob BEFORE INSERT ON package_blobs
             BEGIN SELECT RAISE(ABORT, 'forced blob failure'); END;",
        );
        let principal = PrincipalId::new(7);
        let pkg = package(3, DataType::BankCard, "card");

        let result = store.insert(principal, pkg.clone()).await;

        assert!(matches!(result, Err(Error::Storage(_))));
        assert!(store.get_metadata(principal, pkg.hash()).await.unwrap().is_none());
        assert!(store.list(principal).await.unwrap().is_empty());
        assert_eq!(count(&store, "metadata"), 0);
    }

    #[tokio::test]
    async fn test_failed_blob_delete_keeps_pair() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let principal = PrincipalId::new(7);
        let pkg = package(3, DataType::File, "f");
        store.insert(principal, pkg.clone()).await.unwrap();

        exec(
            &store,
            "CREATE TRIGGER fail_blob_delete BEFORE DELETE ON package_blobs
             BEGIN SELECT RAISE(ABORT, 'forced delete failure'); END;",
        );

        assert!(store.delete(principal, &pkg.metadata).await.is_err());
        assert_eq!(store.get(principal, pkg.hash()).await.unwrap(), Some(pkg));
    }

    #[tokio::test]
    async fn test_delete_removes_both_records() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let principal = PrincipalId::new(1);
        let pkg = package(4, DataType::File, "f");
        store.insert(principal, pkg.clone()).await.unwrap();

        assert!(store.delete(principal, &pkg.metadata).await.unwrap());

        assert_eq!(count(&store, "metadata"), 0);
        assert_eq!(count(&store, "package_blobs"), 0);
        assert!(store.get(principal, pkg.hash()).await.unwrap().is_none());
        assert!(!store.delete(principal, &pkg.metadata).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_requires_matching_type() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let principal = PrincipalId::new(1);
        let pkg = package(5, DataType::Credentials, "acct");
        store.insert(principal, pkg.clone()).await.unwrap();

        let mut other_type = pkg.metadata.clone();
        other_type.data_type = DataType::File;

        assert!(!store.delete(principal, &other_type).await.unwrap());
        assert!(!store.delete(PrincipalId::new(2), &pkg.metadata).await.unwrap());
        assert_eq!(count(&store, "metadata"), 1);
    }

    #[tokio::test]
    async fn test_get_and_list_missing() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let pkg = package(6, DataType::File, "f");

        assert!(store.get(PrincipalId::new(1), pkg.hash()).await.unwrap().is_none());
        assert!(store.list(PrincipalId::new(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_in_insertion_order_without_blobs() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let principal = PrincipalId::new(1);
        for seed in [9u8, 2, 5] {
            store
                .insert(principal, package(seed, DataType::File, &format!("d{}", seed)))
                .await
                .unwrap();
        }

        let listed = store.list(principal).await.unwrap();
        let descriptions: Vec<_> = listed.iter().map(|m| m.description.as_str()).collect();
        assert_eq!(descriptions, ["d9", "d2", "d5"]);
    }

    #[tokio::test]
    async fn test_metadata_without_blob_reads_as_missing() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let principal = PrincipalId::new(1);
        let pkg = package(8, DataType::File, "f");
        store.insert(principal, pkg.clone()).await.unwrap();

        exec(&store, "DELETE FROM package_blobs");

        assert!(store.get(principal, pkg.hash()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_duplicates_one_wins() {
        let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let principal = PrincipalId::new(3);
        let pkg = package(10, DataType::File, "race");

        let a = {
            let store = Arc::clone(&store);
            let pkg = pkg.clone();
            tokio::spawn(async move { store.insert(principal, pkg).await })
        };
        let b = {
            let store = Arc::clone(&store);
            let pkg = pkg.clone();
            tokio::spawn(async move { store.insert(principal, pkg).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(Error::AlreadyExists(_)))));
    }

    #[tokio::test]
    async fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::file(dir.path().join("nested").join("lockbox.db"));
        let principal = PrincipalId::new(1);
        let pkg = package(11, DataType::File, "f");

        {
            let store = SqliteRecordStore::open(config.clone()).unwrap();
            store.insert(principal, pkg.clone()).await.unwrap();
        }

        let reopened = SqliteRecordStore::open(config).unwrap();
        assert_eq!(reopened.get(principal, pkg.hash()).await.unwrap(), Some(pkg));
    }

    #[tokio::test]
    async fn test_close_and_clean_drops_data() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::file(dir.path().join("lockbox.db"));
        let principal = PrincipalId::new(1);
        let pkg = package(12, DataType::File, "f");

        let store = SqliteRecordStore::open(config.clone()).unwrap();
        store.insert(principal, pkg.clone()).await.unwrap();
        store.close_and_clean().await.unwrap();

        let reopened = SqliteRecordStore::open(config).unwrap();
        assert!(reopened.list(principal).await.unwrap().is_empty());
    }

    #[test]
    fn test_cancel_before_start_refuses_to_run() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let cancellation = Cancellation::new(Arc::clone(&store.interrupt));

        cancellation.cancel();

        assert!(matches!(cancellation.start(), Err(Error::Internal(_))));
    }

    #[test]
    fn test_cancelled_transaction_is_not_committed() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let cancellation = Cancellation::new(Arc::clone(&store.interrupt));

        {
            let mut conn = store.conn.lock().unwrap();
            cancellation.start().unwrap();
            let tx = conn.transaction().unwrap();
            tx.execute(
                "INSERT INTO metadata (principal_id, data_type, descript, md_hash, upload_date)
                 VALUES (1, 3, 'f', 'hash', '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();

            cancellation.cancel();
            assert!(matches!(cancellation.commit(tx), Err(Error::Internal(_))));
        }

        assert_eq!(count(&store, "metadata"), 0);
    }

    #[test]
    fn test_cancel_after_commit_is_ignored() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let cancellation = Cancellation::new(Arc::clone(&store.interrupt));

        {
            let mut conn = store.conn.lock().unwrap();
            cancellation.start().unwrap();
            let tx = conn.transaction().unwrap();
            tx.execute(
                "INSERT INTO metadata (principal_id, data_type, descript, md_hash, upload_date)
                 VALUES (1, 3, 'f', 'hash', '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
            cancellation.commit(tx).unwrap();
            cancellation.finish();
        }
        cancellation.cancel();

        assert_eq!(count(&store, "metadata"), 1);
    }

    /// Open a second connection to `path` holding the write lock.
    fn lock_writer(path: &std::path::Path) -> Connection {
        let blocker = Connection::open(path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE").unwrap();
        blocker
    }

    #[tokio::test]
    async fn test_abandoned_insert_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lockbox.db");
        let store = SqliteRecordStore::open(StoreConfig::file(&path)).unwrap();
        let principal = PrincipalId::new(1);
        let pkg = package(13, DataType::File, "late");

        let blocker = lock_writer(&path);
        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            store.insert(principal, pkg.clone()),
        )
        .await;
        assert!(!matches!(outcome, Ok(Ok(()))));
        blocker.execute_batch("ROLLBACK").unwrap();

        assert!(store.list(principal).await.unwrap().is_empty());
        assert!(store.get(principal, pkg.hash()).await.unwrap().is_none());

        store.insert(principal, pkg.clone()).await.unwrap();
        assert_eq!(store.get(principal, pkg.hash()).await.unwrap(), Some(pkg));
    }

    #[tokio::test]
    async fn test_abandoned_delete_keeps_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lockbox.db");
        let store = SqliteRecordStore::open(StoreConfig::file(&path)).unwrap();
        let principal = PrincipalId::new(1);
        let pkg = package(14, DataType::File, "kept");
        store.insert(principal, pkg.clone()).await.unwrap();

        let blocker = lock_writer(&path);
        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            store.delete(principal, &pkg.metadata),
        )
        .await;
        assert!(!matches!(outcome, Ok(Ok(true))));
        blocker.execute_batch("ROLLBACK").unwrap();

        assert_eq!(store.get(principal, pkg.hash()).await.unwrap(), Some(pkg));
        assert_eq!(count(&store, "package_blobs"), 1);
    }
}

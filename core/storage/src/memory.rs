//! In-memory record store for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use tracing::debug;

use crate::store::RecordStore;
use lockbox_common::{ContentHash, Error, Metadata, Package, PrincipalId, Result};

#[derive(Debug, Clone)]
struct MetadataRow {
    principal: PrincipalId,
    metadata: Metadata,
}

/// The two "tables" plus a uniqueness index over `(principal, hash)`.
#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    metadata: BTreeMap<i64, MetadataRow>,
    blobs: HashMap<i64, Vec<u8>>,
    index: HashMap<(PrincipalId, ContentHash), i64>,
}

impl Tables {
    fn lookup(&self, principal: PrincipalId, hash: &ContentHash) -> Option<i64> {
        self.index.get(&(principal, hash.clone())).copied()
    }
}

/// A change applied inside a [`Transaction`], kept so it can be reverted.
enum Undo {
    MetadataInserted(i64),
    BlobInserted(i64),
    MetadataDeleted(i64, MetadataRow),
    BlobDeleted(i64, Vec<u8>),
}

/// Write transaction over [`Tables`].
///
/// Changes apply immediately under the write lock. Dropping the transaction
/// without calling [`Transaction::commit`] reverts them in reverse order.
struct Transaction<'a> {
    tables: RwLockWriteGuard<'a, Tables>,
    undo: Vec<Undo>,
    committed: bool,
}

impl<'a> Transaction<'a> {
    fn new(tables: RwLockWriteGuard<'a, Tables>) -> Self {
        Self {
            tables,
            undo: Vec::new(),
            committed: false,
        }
    }

    fn insert_metadata(&mut self, row: MetadataRow) -> Result<i64> {
        let key = (row.principal, row.metadata.hash.clone());
        if self.tables.index.contains_key(&key) {
            return Err(Error::AlreadyExists(format!(
                "Package {} already stored for principal {}",
                row.metadata.hash, row.principal
            )));
        }

        self.tables.next_id += 1;
        let md_id = self.tables.next_id;
        self.tables.index.insert(key, md_id);
        self.tables.metadata.insert(md_id, row);
        self.undo.push(Undo::MetadataInserted(md_id));
        Ok(md_id)
    }

    fn insert_blob(&mut self, md_id: i64, data: Vec<u8>) {
        self.tables.blobs.insert(md_id, data);
        self.undo.push(Undo::BlobInserted(md_id));
    }

    fn delete_metadata(&mut self, md_id: i64) {
        if let Some(row) = self.tables.metadata.remove(&md_id) {
            self.tables
                .index
                .remove(&(row.principal, row.metadata.hash.clone()));
            self.undo.push(Undo::MetadataDeleted(md_id, row));
        }
    }

    fn delete_blob(&mut self, md_id: i64) -> bool {
        match self.tables.blobs.remove(&md_id) {
            Some(data) => {
                self.undo.push(Undo::BlobDeleted(md_id, data));
                true
            }
            None => false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        while let Some(undo) = self.undo.pop() {
            match undo {
                Undo::MetadataInserted(md_id) => {
                    if let Some(row) = self.tables.metadata.remove(&md_id) {
                        self.tables.index.remove(&(row.principal, row.metadata.hash));
                    }
                }
                Undo::BlobInserted(md_id) => {
                    self.tables.blobs.remove(&md_id);
                }
                Undo::MetadataDeleted(md_id, row) => {
                    self.tables
                        .index
                        .insert((row.principal, row.metadata.hash.clone()), md_id);
                    self.tables.metadata.insert(md_id, row);
                }
                Undo::BlobDeleted(md_id, data) => {
                    self.tables.blobs.insert(md_id, data);
                }
            }
        }
    }
}

/// In-memory record store.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop.
pub struct MemoryRecordStore {
    tables: Arc<RwLock<Tables>>,
    fail_blob_writes: AtomicBool,
}

impl MemoryRecordStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            fail_blob_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent blob insert or delete fail with a storage error.
    ///
    /// Used to exercise rollback of the metadata half of an operation.
    pub fn set_fail_blob_writes(&self, fail: bool) {
        self.fail_blob_writes.store(fail, Ordering::SeqCst);
    }

    fn check_blob_write(&self) -> Result<()> {
        if self.fail_blob_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage("Blob write failed".to_string()));
        }
        Ok(())
    }

    fn begin(&self) -> Result<Transaction<'_>> {
        let guard = self
            .tables
            .write()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))?;
        Ok(Transaction::new(guard))
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T> {
        let guard = self
            .tables
            .read()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))?;
        Ok(f(&guard))
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn insert(&self, principal: PrincipalId, package: Package) -> Result<()> {
        let Package { metadata, data } = package;
        let hash = metadata.hash.clone();

        let mut tx = self.begin()?;
        let md_id = tx.insert_metadata(MetadataRow { principal, metadata })?;
        self.check_blob_write()?;
        tx.insert_blob(md_id, data);
        tx.commit();

        debug!(principal = %principal, hash = %hash, md_id, "inserted package");
        Ok(())
    }

    async fn get(&self, principal: PrincipalId, hash: &ContentHash) -> Result<Option<Package>> {
        self.read(|tables| {
            let md_id = tables.lookup(principal, hash)?;
            let row = tables.metadata.get(&md_id)?;
            let data = tables.blobs.get(&md_id)?;
            Some(Package::new(row.metadata.clone(), data.clone()))
        })
    }

    async fn get_metadata(
        &self,
        principal: PrincipalId,
        hash: &ContentHash,
    ) -> Result<Option<Metadata>> {
        self.read(|tables| {
            tables
                .lookup(principal, hash)
                .and_then(|md_id| tables.metadata.get(&md_id))
                .map(|row| row.metadata.clone())
        })
    }

    async fn list(&self, principal: PrincipalId) -> Result<Vec<Metadata>> {
        self.read(|tables| {
            tables
                .metadata
                .values()
                .filter(|row| row.principal == principal)
                .map(|row| row.metadata.clone())
                .collect()
        })
    }

    async fn delete(&self, principal: PrincipalId, metadata: &Metadata) -> Result<bool> {
        let mut tx = self.begin()?;

        let md_id = match tx.tables.lookup(principal, &metadata.hash) {
            Some(md_id) => md_id,
            None => return Ok(false),
        };
        let type_matches = tx
            .tables
            .metadata
            .get(&md_id)
            .map(|row| row.metadata.data_type == metadata.data_type)
            .unwrap_or(false);
        if !type_matches {
            return Ok(false);
        }

        tx.delete_metadata(md_id);
        self.check_blob_write()?;
        tx.delete_blob(md_id);
        tx.commit();

        debug!(principal = %principal, hash = %metadata.hash, md_id, "deleted package");
        Ok(true)
    }
}

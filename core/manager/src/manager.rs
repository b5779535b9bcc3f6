//! Data manager enforcing per-principal deduplication.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ManagerConfig;
use lockbox_common::{ContentHash, Error, Metadata, Package, PrincipalId, Result};
use lockbox_storage::RecordStore;

/// Entry point for storing and retrieving sealed packages.
///
/// The manager never sees plaintext: packages arrive already sealed by the
/// caller and are returned sealed. It adds an existence pre-check in front of
/// the store; the store's uniqueness constraint stays authoritative when two
/// loads of the same package race.
pub struct DataManager {
    store: Arc<dyn RecordStore>,
    config: ManagerConfig,
}

impl DataManager {
    /// Create a manager over a record store.
    pub fn new(store: Arc<dyn RecordStore>, config: ManagerConfig) -> Self {
        Self { store, config }
    }

    /// Get the underlying store.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Store a sealed package for a principal.
    ///
    /// # Preconditions
    /// - `package.data` is the sealed payload (non-empty)
    ///
    /// # Postconditions
    /// - Metadata and blob are both stored, or neither is
    ///
    /// # Errors
    /// - `Validation` if the package carries no data
    /// - `AlreadyExists` if the principal already stores this hash, including
    ///   when a concurrent load of the same package wins the race
    /// - `Internal` on timeout
    pub async fn load_data(&self, principal: PrincipalId, package: Package) -> Result<()> {
        if package.data.is_empty() {
            return Err(Error::Validation("Package has no data".to_string()));
        }

        let hash = package.hash().clone();
        self.bounded("load", async {
            if self.store.get_metadata(principal, &hash).await?.is_some() {
                warn!(principal = %principal, hash = %hash, "rejected duplicate package");
                return Err(Error::AlreadyExists(format!(
                    "Package {} already stored",
                    hash
                )));
            }

            match self.store.insert(principal, package).await {
                Err(Error::AlreadyExists(msg)) => {
                    warn!(principal = %principal, hash = %hash, "lost race on duplicate package");
                    Err(Error::AlreadyExists(msg))
                }
                other => other,
            }
        })
        .await?;

        debug!(principal = %principal, hash = %hash, "loaded package");
        Ok(())
    }

    /// Fetch the sealed package described by `metadata`.
    ///
    /// Only the hash of `metadata` is used for the lookup; the returned
    /// package carries the metadata as stored.
    ///
    /// # Errors
    /// - `NotFound` if nothing is stored under the hash
    pub async fn get_data(&self, principal: PrincipalId, metadata: &Metadata) -> Result<Package> {
        let package = self
            .bounded("get", self.store.get(principal, &metadata.hash))
            .await?
            .ok_or_else(|| Error::NotFound(format!("Package {} not found", metadata.hash)))?;

        debug!(principal = %principal, hash = %metadata.hash, "fetched package");
        Ok(package)
    }

    /// Fetch only the metadata stored under a hash.
    ///
    /// # Errors
    /// - `NotFound` if nothing is stored under the hash
    pub async fn get_metadata(&self, principal: PrincipalId, hash: &ContentHash) -> Result<Metadata> {
        self.bounded("get metadata", self.store.get_metadata(principal, hash))
            .await?
            .ok_or_else(|| Error::NotFound(format!("Package {} not found", hash)))
    }

    /// List the metadata of everything a principal stores, oldest first.
    ///
    /// Blobs are not read. A principal with nothing stored gets an empty list.
    pub async fn get_all_metadata(&self, principal: PrincipalId) -> Result<Vec<Metadata>> {
        let list = self.bounded("list", self.store.list(principal)).await?;
        debug!(principal = %principal, count = list.len(), "listed metadata");
        Ok(list)
    }

    /// Delete a stored package.
    ///
    /// The stored row must match the principal, type tag and hash of
    /// `metadata`.
    ///
    /// # Errors
    /// - `NotFound` if no row matched
    pub async fn delete_data(&self, principal: PrincipalId, metadata: &Metadata) -> Result<()> {
        let deleted = self
            .bounded("delete", self.store.delete(principal, metadata))
            .await?;
        if !deleted {
            return Err(Error::NotFound(format!(
                "Package {} ({}) not found",
                metadata.hash, metadata.data_type
            )));
        }

        debug!(principal = %principal, hash = %metadata.hash, "deleted package");
        Ok(())
    }

    /// Run an operation under the configured timeout.
    async fn bounded<T>(&self, op: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = self.config.operation_timeout();
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(store = self.store.name(), "{} timed out after {:?}", op, timeout);
                Err(Error::Internal(format!("{} timed out after {:?}", op, timeout)))
            }
        }
    }
}

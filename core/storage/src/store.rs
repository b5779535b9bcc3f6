//! Record store trait definition.

use async_trait::async_trait;

use lockbox_common::{ContentHash, Metadata, Package, PrincipalId, Result};

/// Durable persistence of metadata + blob pairs.
///
/// Each stored package is two linked records: a small queryable metadata row
/// and an opaque blob. Implementations create and remove the pair as one
/// unit and enforce uniqueness of `(principal, hash)`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get the store name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    /// Insert a metadata row and its blob atomically.
    ///
    /// # Postconditions
    /// - On success both records exist
    /// - On any failure neither exists
    ///
    /// # Errors
    /// - `AlreadyExists` if `(principal, hash)` is already stored
    /// - `Storage`/`Internal` for backend failures
    async fn insert(&self, principal: PrincipalId, package: Package) -> Result<()>;

    /// Fetch the stored metadata and blob for a hash.
    ///
    /// # Returns
    /// `None` when nothing is stored for `(principal, hash)`.
    async fn get(&self, principal: PrincipalId, hash: &ContentHash) -> Result<Option<Package>>;

    /// Fetch only the metadata row for a hash.
    async fn get_metadata(
        &self,
        principal: PrincipalId,
        hash: &ContentHash,
    ) -> Result<Option<Metadata>>;

    /// List every metadata row of a principal in insertion order.
    ///
    /// Blobs are not read.
    async fn list(&self, principal: PrincipalId) -> Result<Vec<Metadata>>;

    /// Delete a metadata row and its blob atomically.
    ///
    /// The row must match principal, type tag and hash.
    ///
    /// # Returns
    /// `false` when no row matched; nothing is changed in that case.
    async fn delete(&self, principal: PrincipalId, metadata: &Metadata) -> Result<bool>;
}

use catfetch_types::{CatMetadata, EntityId, VersionId};

use crate::error::StoreResult;
use crate::version::CatVersion;

/// Versioned cat image store.
///
/// All implementations must satisfy these invariants:
/// - The version id is a pure function of `metadata.url`. Writing the same
///   `(id, url)` twice overwrites one version slot instead of adding a second.
/// - A version's metadata and payload become visible together or not at all.
/// - Entities and versions are never removed.
pub trait CatStore: Send + Sync {
    /// Persist one fetched image and return where it landed.
    fn write_version(
        &self,
        metadata: &CatMetadata,
        data: &[u8],
    ) -> StoreResult<(EntityId, VersionId)>;

    /// Read a version back. Returns `Ok(None)` if it was never written.
    fn read_version(&self, entity: &EntityId, version: &VersionId)
        -> StoreResult<Option<CatVersion>>;

    /// All entity ids, sorted.
    fn list_entities(&self) -> StoreResult<Vec<EntityId>>;

    /// All version ids of one entity, sorted. Empty for unknown entities.
    fn list_versions(&self, entity: &EntityId) -> StoreResult<Vec<VersionId>>;

    /// Check whether a version exists.
    ///
    /// Default implementation reads the whole version. Backends may override
    /// to skip the payload.
    fn contains_version(&self, entity: &EntityId, version: &VersionId) -> StoreResult<bool> {
        Ok(self.read_version(entity, version)?.is_some())
    }
}

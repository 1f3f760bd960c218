use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use catfetch_hash::derive_version_id;
use catfetch_types::{CatMetadata, EntityId, TypeError, VersionId};
use redb::{Builder, Database, ReadOnlyTable, WriteTransaction};
use tracing::{debug, info, warn};

use crate::config::{Durability, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::namespace::{CatsBucket, CatsView, PathKey, VersionBucket, CATS, KEY_IMG_DATA};
use crate::stats::StoreStats;
use crate::traits::CatStore;
use crate::version::{corrupt, decode_metadata, encode_metadata, fields_from_rows, CatVersion};

/// redb-backed cat store.
///
/// One file, one long-lived engine handle. Writes go through redb's single
/// write transaction, so concurrent `write_version` calls are serialized by
/// the engine while readers keep seeing the last committed snapshot. The
/// handle is `Send + Sync`; share it with `Arc`.
///
/// ```no_run
/// use catfetch_store::CatDb;
///
/// let db = CatDb::open("cats.redb")?;
/// // ... write_version / read_version ...
/// db.close()?;
/// # Ok::<(), catfetch_store::StoreError>(())
/// ```
pub struct CatDb {
    db: Database,
    path: PathBuf,
    config: StoreConfig,
}

impl CatDb {
    /// Open or create a store with the default configuration.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Open or create a store.
    ///
    /// Fails with [`StoreError::Open`] if the file cannot be created or
    /// locked, is not a store file, or the top-level namespace cannot be
    /// initialized. The file handle is released on every failure path.
    pub fn open_with_config(path: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let mut builder = Builder::new();
        if let Some(bytes) = config.cache_size_bytes {
            builder.set_cache_size(bytes);
        }
        let db = match builder.create(&path) {
            Ok(db) => db,
            Err(e) => {
                return Err(StoreError::Open {
                    path,
                    source: e.into(),
                })
            }
        };

        let store = Self { db, path, config };
        if let Err(source) = store.init() {
            return Err(StoreError::Open {
                path: store.path.clone(),
                source,
            });
        }

        info!(
            path = %store.path.display(),
            durability = ?store.config.durability,
            "opened cat store"
        );
        Ok(store)
    }

    /// Ensure the top-level `cats` namespace exists.
    fn init(&self) -> Result<(), redb::Error> {
        let txn = self.db.begin_write()?;
        txn.open_table(CATS)?;
        txn.commit()?;
        Ok(())
    }

    /// Release the store.
    ///
    /// Collects and logs operational statistics, and when the store runs with
    /// eventual durability, makes every earlier commit durable before the
    /// handle goes away. Consumes the handle, so it can only happen once.
    ///
    /// Returns the statistics, or `None` if they could not be gathered.
    pub fn close(self) -> StoreResult<Option<StoreStats>> {
        let stats = match self.stats() {
            Ok(stats) => {
                info!(path = %self.path.display(), %stats, "closing cat store");
                Some(stats)
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to collect statistics on close"
                );
                None
            }
        };

        if self.config.durability == Durability::Eventual {
            self.checkpoint().map_err(|source| StoreError::Close {
                path: self.path.clone(),
                source,
            })?;
        }

        drop(self.db);
        debug!(path = %self.path.display(), "cat store released");
        Ok(stats)
    }

    fn checkpoint(&self) -> Result<(), redb::Error> {
        let mut txn = self.db.begin_write()?;
        txn.set_durability(redb::Durability::Immediate);
        txn.commit()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ---- Writes ----

    /// Persist one fetched image.
    ///
    /// Derives the version id from `metadata.url`, locates or creates
    /// `cats/{id}/{version}/{metadata,data}`, writes every metadata field and
    /// the payload, and commits. On failure nothing from this call is visible.
    pub fn write_version(
        &self,
        metadata: &CatMetadata,
        data: &[u8],
    ) -> StoreResult<(EntityId, VersionId)> {
        self.write_version_with(metadata, data, |_| Ok(()))
    }

    /// [`write_version`](Self::write_version) with a hook that runs after the
    /// metadata namespace is written and before the payload is.
    pub(crate) fn write_version_with<F>(
        &self,
        metadata: &CatMetadata,
        data: &[u8],
        before_payload: F,
    ) -> StoreResult<(EntityId, VersionId)>
    where
        F: FnOnce(&mut VersionBucket<'_, '_>) -> Result<(), redb::Error>,
    {
        let entity = entity_id(&metadata.id)?;
        let version = derive_version_id(&metadata.url)?;
        let fields = encode_metadata(metadata);

        self.update(|cats| {
            let mut cat = cats.entity(&entity)?;
            let mut slot = cat.version(&version)?;
            {
                let mut md = slot.metadata()?;
                for (key, value) in &fields {
                    md.put(key, value.as_bytes())?;
                }
            }
            before_payload(&mut slot)?;
            slot.data()?.put(KEY_IMG_DATA, data)?;
            Ok(())
        })
        .map_err(|source| StoreError::Write {
            entity: entity.clone(),
            version,
            source,
        })?;

        debug!(%entity, %version, bytes = data.len(), "wrote cat version");
        Ok((entity, version))
    }

    /// Run `f` in one write transaction; commit on `Ok`, abort on `Err`.
    fn update<T, F>(&self, f: F) -> Result<T, redb::Error>
    where
        F: FnOnce(&mut CatsBucket<'_, '_>) -> Result<T, redb::Error>,
    {
        let mut txn = self.db.begin_write()?;
        txn.set_durability(self.config.durability.into());

        let outcome = txn
            .open_table(CATS)
            .map_err(redb::Error::from)
            .and_then(|mut table| {
                let mut cats = CatsBucket::new(&mut table);
                f(&mut cats)
            });

        match outcome {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                release(txn.abort(), "abort write transaction");
                Err(e)
            }
        }
    }

    // ---- Reads ----

    /// Run `f` against a consistent read snapshot.
    fn view<T>(
        &self,
        f: impl FnOnce(&CatsView<'_, ReadOnlyTable<PathKey, &'static [u8]>>) -> Result<T, redb::Error>,
    ) -> StoreResult<T> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::Read(e.into()))?;
        let table = txn
            .open_table(CATS)
            .map_err(|e| StoreError::Read(e.into()))?;
        f(&CatsView::new(&table)).map_err(StoreError::Read)
    }

    /// Metadata and payload of one version, from a single snapshot.
    pub fn read_version(
        &self,
        entity: &EntityId,
        version: &VersionId,
    ) -> StoreResult<Option<CatVersion>> {
        let found = self.view(|cats| {
            let Some(slot) = cats.version(entity, version)? else {
                return Ok(None);
            };
            let rows = match slot.metadata()? {
                Some(md) => md.entries()?,
                None => Vec::new(),
            };
            let data = match slot.data()? {
                Some(payload) => payload.get(KEY_IMG_DATA)?,
                None => None,
            };
            Ok(Some((rows, data)))
        })?;

        let Some((rows, data)) = found else {
            return Ok(None);
        };
        let fields = fields_from_rows(entity, version, rows)?;
        let metadata = decode_metadata(entity, version, &fields)?;
        let data = data.ok_or_else(|| corrupt(entity, version, "missing payload".into()))?;

        Ok(Some(CatVersion {
            entity: entity.clone(),
            version: *version,
            metadata,
            data,
        }))
    }

    /// Decoded metadata of one version.
    pub fn read_metadata(
        &self,
        entity: &EntityId,
        version: &VersionId,
    ) -> StoreResult<Option<CatMetadata>> {
        match self.read_raw_metadata(entity, version)? {
            Some(fields) => decode_metadata(entity, version, &fields).map(Some),
            None => Ok(None),
        }
    }

    /// Metadata fields exactly as stored (`cat_id`, `tags`, `created_at`,
    /// `url`, `mime_type`).
    pub fn read_raw_metadata(
        &self,
        entity: &EntityId,
        version: &VersionId,
    ) -> StoreResult<Option<BTreeMap<String, String>>> {
        let rows = self.view(|cats| {
            let Some(slot) = cats.version(entity, version)? else {
                return Ok(None);
            };
            match slot.metadata()? {
                Some(md) => md.entries().map(Some),
                None => Ok(None),
            }
        })?;
        rows.map(|rows| fields_from_rows(entity, version, rows))
            .transpose()
    }

    /// Raw payload of one version.
    pub fn read_data(&self, entity: &EntityId, version: &VersionId) -> StoreResult<Option<Vec<u8>>> {
        self.view(|cats| {
            let Some(slot) = cats.version(entity, version)? else {
                return Ok(None);
            };
            match slot.data()? {
                Some(payload) => payload.get(KEY_IMG_DATA),
                None => Ok(None),
            }
        })
    }

    pub fn contains_version(&self, entity: &EntityId, version: &VersionId) -> StoreResult<bool> {
        self.view(|cats| Ok(cats.version(entity, version)?.is_some()))
    }

    pub fn list_entities(&self) -> StoreResult<Vec<EntityId>> {
        self.view(|cats| cats.entities())
    }

    pub fn list_versions(&self, entity: &EntityId) -> StoreResult<Vec<VersionId>> {
        self.view(|cats| match cats.entity(entity)? {
            Some(cat) => cat.versions(),
            None => Ok(Vec::new()),
        })
    }

    /// Namespace counts and engine page statistics.
    ///
    /// The engine only reports page statistics from a write transaction, so
    /// this briefly takes the writer slot and aborts it afterwards.
    pub fn stats(&self) -> StoreResult<StoreStats> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::Read(e.into()))?;
        let collected = collect_stats(&txn);
        release(txn.abort(), "abort statistics transaction");
        collected.map_err(StoreError::Read)
    }
}

fn collect_stats(txn: &WriteTransaction) -> Result<StoreStats, redb::Error> {
    let engine = txn.stats()?;
    let table = txn.open_table(CATS)?;
    let cats = CatsView::new(&table);

    let mut stats = StoreStats::default();
    for entity in cats.entities()? {
        stats.entities += 1;
        let Some(cat) = cats.entity(&entity)? else {
            continue;
        };
        for version in cat.versions()? {
            stats.versions += 1;
            let Some(slot) = cat.version(&version)? else {
                continue;
            };
            if let Some(payload) = slot.data()? {
                stats.payload_bytes += payload.value_len(KEY_IMG_DATA)?.unwrap_or(0) as u64;
            }
        }
    }
    Ok(stats.with_engine(&engine))
}

fn entity_id(raw: &str) -> StoreResult<EntityId> {
    EntityId::new(raw).map_err(|e| match e {
        TypeError::InvalidEntityId { id, reason } => StoreError::InvalidEntityId { id, reason },
        other => StoreError::InvalidEntityId {
            id: raw.to_string(),
            reason: other.to_string(),
        },
    })
}

/// Log a failed resource release; never let it replace the caller's result.
fn release<E: fmt::Display>(result: Result<(), E>, what: &str) {
    if let Err(e) = result {
        warn!(error = %e, "failed to {what}");
    }
}

impl CatStore for CatDb {
    fn write_version(
        &self,
        metadata: &CatMetadata,
        data: &[u8],
    ) -> StoreResult<(EntityId, VersionId)> {
        CatDb::write_version(self, metadata, data)
    }

    fn read_version(
        &self,
        entity: &EntityId,
        version: &VersionId,
    ) -> StoreResult<Option<CatVersion>> {
        CatDb::read_version(self, entity, version)
    }

    fn list_entities(&self) -> StoreResult<Vec<EntityId>> {
        CatDb::list_entities(self)
    }

    fn list_versions(&self, entity: &EntityId) -> StoreResult<Vec<VersionId>> {
        CatDb::list_versions(self, entity)
    }

    fn contains_version(&self, entity: &EntityId, version: &VersionId) -> StoreResult<bool> {
        CatDb::contains_version(self, entity, version)
    }
}

impl fmt::Debug for CatDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatDb")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish()
    }
}

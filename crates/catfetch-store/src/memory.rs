use std::collections::BTreeMap;
use std::sync::RwLock;

use catfetch_hash::derive_version_id;
use catfetch_types::{CatMetadata, EntityId, VersionId};

use crate::error::{StoreError, StoreResult};
use crate::traits::CatStore;
use crate::version::{decode_metadata, encode_metadata, CatVersion};

type Fields = BTreeMap<String, String>;
type Versions = BTreeMap<VersionId, (Fields, Vec<u8>)>;

/// In-memory, BTreeMap-based cat store.
///
/// Intended for tests and embedding. Metadata is kept in its stored string
/// encoding, so what reads back matches what a [`CatDb`](crate::CatDb) would
/// return for the same writes.
pub struct InMemoryCatStore {
    cats: RwLock<BTreeMap<EntityId, Versions>>,
}

impl InMemoryCatStore {
    pub fn new() -> Self {
        Self {
            cats: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of versions across all entities.
    pub fn len(&self) -> usize {
        self.cats
            .read()
            .expect("lock poisoned")
            .values()
            .map(BTreeMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total payload bytes across all stored versions.
    pub fn total_bytes(&self) -> u64 {
        self.cats
            .read()
            .expect("lock poisoned")
            .values()
            .flat_map(BTreeMap::values)
            .map(|(_, data)| data.len() as u64)
            .sum()
    }
}

impl Default for InMemoryCatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CatStore for InMemoryCatStore {
    fn write_version(
        &self,
        metadata: &CatMetadata,
        data: &[u8],
    ) -> StoreResult<(EntityId, VersionId)> {
        let entity = EntityId::new(metadata.id.as_str()).map_err(|e| StoreError::InvalidEntityId {
            id: metadata.id.clone(),
            reason: e.to_string(),
        })?;
        let version = derive_version_id(&metadata.url)?;
        let fields: Fields = encode_metadata(metadata)
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();

        let mut map = self.cats.write().expect("lock poisoned");
        map.entry(entity.clone())
            .or_default()
            .insert(version, (fields, data.to_vec()));
        Ok((entity, version))
    }

    fn read_version(
        &self,
        entity: &EntityId,
        version: &VersionId,
    ) -> StoreResult<Option<CatVersion>> {
        let map = self.cats.read().expect("lock poisoned");
        let Some((fields, data)) = map.get(entity).and_then(|versions| versions.get(version)) else {
            return Ok(None);
        };
        Ok(Some(CatVersion {
            entity: entity.clone(),
            version: *version,
            metadata: decode_metadata(entity, version, fields)?,
            data: data.clone(),
        }))
    }

    fn list_entities(&self) -> StoreResult<Vec<EntityId>> {
        let map = self.cats.read().expect("lock poisoned");
        Ok(map.keys().cloned().collect())
    }

    fn list_versions(&self, entity: &EntityId) -> StoreResult<Vec<VersionId>> {
        let map = self.cats.read().expect("lock poisoned");
        Ok(map
            .get(entity)
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default())
    }

    fn contains_version(&self, entity: &EntityId, version: &VersionId) -> StoreResult<bool> {
        let map = self.cats.read().expect("lock poisoned");
        Ok(map
            .get(entity)
            .is_some_and(|versions| versions.contains_key(version)))
    }
}

impl std::fmt::Debug for InMemoryCatStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCatStore")
            .field("version_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn meta(id: &str, url: &str) -> CatMetadata {
        CatMetadata::new(
            id,
            url,
            "image/jpeg",
            Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap(),
        )
        .with_tags(["sleepy"])
    }

    // -----------------------------------------------------------------------
    // Core read/write
    // -----------------------------------------------------------------------

    #[test]
    fn write_and_read_back() {
        let store = InMemoryCatStore::new();
        let m = meta("c1", "https://x/1.jpg");
        let (entity, version) = store.write_version(&m, b"jpeg").unwrap();
        assert_eq!(version, derive_version_id("https://x/1.jpg").unwrap());

        let stored = store.read_version(&entity, &version).unwrap().expect("should exist");
        assert_eq!(stored.metadata, m);
        assert_eq!(stored.data, b"jpeg");
        assert_eq!(stored.size(), 4);
    }

    #[test]
    fn sub_second_precision_is_dropped() {
        let store = InMemoryCatStore::new();
        let mut m = meta("c1", "https://x/1.jpg");
        m.created_at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let (entity, version) = store.write_version(&m, b"").unwrap();
        let stored = store.read_version(&entity, &version).unwrap().unwrap();
        assert_eq!(stored.metadata.created_at.timestamp(), 1_700_000_000);
        assert_eq!(stored.metadata.created_at.timestamp_subsec_millis(), 0);
    }

    #[test]
    fn read_missing_returns_none() {
        let store = InMemoryCatStore::new();
        let entity = EntityId::new("nobody").unwrap();
        assert!(store.read_version(&entity, &VersionId::from(1u64)).unwrap().is_none());
        assert!(store.list_versions(&entity).unwrap().is_empty());
        assert!(!store.contains_version(&entity, &VersionId::from(1u64)).unwrap());
    }

    #[test]
    fn empty_id_is_rejected() {
        let store = InMemoryCatStore::new();
        let err = store.write_version(&meta("", "https://x/1.jpg"), b"").unwrap_err();
        assert!(matches!(err, StoreError::InvalidEntityId { .. }));
        assert!(store.is_empty());
    }

    // -----------------------------------------------------------------------
    // Versioning
    // -----------------------------------------------------------------------

    #[test]
    fn same_url_overwrites_one_slot() {
        let store = InMemoryCatStore::new();
        let first = meta("c1", "https://x/1.jpg");
        let mut second = first.clone();
        second.tags = vec!["awake".into()];

        let (_, v1) = store.write_version(&first, b"one").unwrap();
        let (entity, v2) = store.write_version(&second, b"two").unwrap();
        assert_eq!(v1, v2);
        assert_eq!(store.len(), 1);

        let stored = store.read_version(&entity, &v2).unwrap().unwrap();
        assert_eq!(stored.metadata.tags, vec!["awake"]);
        assert_eq!(stored.data, b"two");
    }

    #[test]
    fn different_urls_add_versions() {
        let store = InMemoryCatStore::new();
        store.write_version(&meta("c1", "https://x/1.jpg"), b"12345").unwrap();
        store.write_version(&meta("c1", "https://x/2.jpg"), b"123456789").unwrap();
        store.write_version(&meta("c2", "https://x/1.jpg"), b"").unwrap();

        let c1 = EntityId::new("c1").unwrap();
        assert_eq!(store.list_versions(&c1).unwrap().len(), 2);
        assert_eq!(store.list_entities().unwrap().len(), 2);
        assert_eq!(store.len(), 3);
        assert_eq!(store.total_bytes(), 14);
    }

    #[test]
    fn listings_are_sorted() {
        let store = InMemoryCatStore::new();
        for (id, url) in [("b", "https://x/3"), ("a", "https://x/2"), ("a", "https://x/1")] {
            store.write_version(&meta(id, url), b"x").unwrap();
        }
        let entities: Vec<_> = store
            .list_entities()
            .unwrap()
            .into_iter()
            .map(EntityId::into_string)
            .collect();
        assert_eq!(entities, vec!["a", "b"]);

        let versions = store.list_versions(&EntityId::new("a").unwrap()).unwrap();
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_writers_all_land() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryCatStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .write_version(&meta("shared", &format!("https://x/{i}.jpg")), b"x")
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(store.len(), 8);
    }

    #[test]
    fn debug_format() {
        let store = InMemoryCatStore::default();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryCatStore"));
        assert!(debug.contains("version_count"));
    }
}

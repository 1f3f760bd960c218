//! End-to-end behavior of the on-disk store, plus the contract every
//! `CatStore` backend shares.

use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;
use std::thread;

use catfetch_hash::derive_version_id;
use catfetch_store::{
    CatDb, CatStore, InMemoryCatStore, StoreError, KEY_META_MIME_TYPE, KEY_META_TAGS,
    METADATA_KEYS,
};
use catfetch_types::{CatMetadata, EntityId};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
}

fn meta(id: &str, url: &str) -> CatMetadata {
    CatMetadata::new(id, url, "image/png", t0()).with_tags(["a", "b"])
}

fn temp_store() -> (tempfile::TempDir, CatDb) {
    let dir = tempfile::tempdir().unwrap();
    let db = CatDb::open(dir.path().join("cats.redb")).unwrap();
    (dir, db)
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

#[test]
fn stores_one_fetched_image() {
    let (_dir, db) = temp_store();
    let bytes1 = b"\x89PNG\r\n\x1a\nfake".to_vec();

    let (entity, version) = db
        .write_version(&meta("c1", "https://x/1.png"), &bytes1)
        .unwrap();
    assert_eq!(entity.as_str(), "c1");
    assert_eq!(version, derive_version_id("https://x/1.png").unwrap());

    let raw = db.read_raw_metadata(&entity, &version).unwrap().unwrap();
    assert_eq!(raw[KEY_META_TAGS], "a, b");
    assert_eq!(raw[KEY_META_MIME_TYPE], "image/png");
    assert_eq!(raw["cat_id"], "c1");
    assert_eq!(raw["created_at"], "2025-01-01T12:00:00Z");
    assert_eq!(raw["url"], "https://x/1.png");
    let keys: BTreeSet<&str> = raw.keys().map(String::as_str).collect();
    assert_eq!(keys, METADATA_KEYS.into_iter().collect());

    assert_eq!(db.read_data(&entity, &version).unwrap().unwrap(), bytes1);
    assert_eq!(db.read_metadata(&entity, &version).unwrap().unwrap(), meta("c1", "https://x/1.png"));
}

#[test]
fn untagged_record_reads_back_without_tags() {
    let (_dir, db) = temp_store();
    let m = CatMetadata::new("c9", "https://x/9.gif", "image/gif", t0());
    let (entity, version) = db.write_version(&m, b"GIF89a").unwrap();

    let raw = db.read_raw_metadata(&entity, &version).unwrap().unwrap();
    assert_eq!(raw[KEY_META_TAGS], "");
    let stored = db.read_version(&entity, &version).unwrap().unwrap();
    assert!(stored.metadata.tags.is_empty());
}

// ---------------------------------------------------------------------------
// Versioning
// ---------------------------------------------------------------------------

#[test]
fn same_entity_and_url_is_one_version() {
    let (_dir, db) = temp_store();
    let (entity, v1) = db.write_version(&meta("c1", "https://x/1.png"), b"one").unwrap();
    let (_, v2) = db.write_version(&meta("c1", "https://x/1.png"), b"two").unwrap();

    assert_eq!(v1, v2);
    assert_eq!(db.list_versions(&entity).unwrap(), vec![v1]);
    assert_eq!(db.read_data(&entity, &v1).unwrap().unwrap(), b"two");
}

#[test]
fn different_urls_are_different_versions() {
    let (_dir, db) = temp_store();
    let (entity, v1) = db.write_version(&meta("c1", "https://x/1.png"), b"one").unwrap();
    let (_, v2) = db.write_version(&meta("c1", "https://x/2.png"), b"two").unwrap();

    assert_ne!(v1, v2);
    let mut expected = vec![v1, v2];
    expected.sort();
    assert_eq!(db.list_versions(&entity).unwrap(), expected);
    assert_eq!(db.read_data(&entity, &v1).unwrap().unwrap(), b"one");
    assert_eq!(db.read_data(&entity, &v2).unwrap().unwrap(), b"two");
}

#[test]
fn unknown_lookups_are_empty() {
    let (_dir, db) = temp_store();
    db.write_version(&meta("c1", "https://x/1.png"), b"x").unwrap();

    let ghost = EntityId::new("ghost").unwrap();
    let version = derive_version_id("https://x/1.png").unwrap();
    assert!(db.read_version(&ghost, &version).unwrap().is_none());
    assert!(db.read_data(&ghost, &version).unwrap().is_none());
    assert!(db.list_versions(&ghost).unwrap().is_empty());
    assert!(!db.contains_version(&ghost, &version).unwrap());

    let c1 = EntityId::new("c1").unwrap();
    let other = derive_version_id("https://x/other.png").unwrap();
    assert!(db.read_metadata(&c1, &other).unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cats.redb");

    let db = CatDb::open(&path).unwrap();
    let (entity, version) = db.write_version(&meta("c1", "https://x/1.png"), b"persisted").unwrap();
    db.close().unwrap();

    let db = CatDb::open(&path).unwrap();
    let stored = db.read_version(&entity, &version).unwrap().unwrap();
    assert_eq!(stored.data, b"persisted");
    assert_eq!(stored.metadata.url, "https://x/1.png");
    assert_eq!(db.list_entities().unwrap(), vec![entity]);
}

#[test]
fn non_store_file_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not-a-store.redb");
    fs::write(&path, vec![0x42u8; 8192]).unwrap();

    let err = CatDb::open(&path).unwrap_err();
    match err {
        StoreError::Open { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected open error, got {other:?}"),
    }
}

#[test]
fn missing_parent_directory_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let err = CatDb::open(dir.path().join("no/such/dir/cats.redb")).unwrap_err();
    assert!(matches!(err, StoreError::Open { .. }));
}

#[test]
fn second_open_of_same_file_fails() {
    let (dir, _db) = temp_store();
    let err = CatDb::open(dir.path().join("cats.redb")).unwrap_err();
    assert!(matches!(err, StoreError::Open { .. }));
}

#[test]
fn close_reports_statistics() {
    let (_dir, db) = temp_store();
    db.write_version(&meta("c1", "https://x/1.png"), &[7u8; 32]).unwrap();
    db.write_version(&meta("c2", "https://x/2.png"), &[7u8; 8]).unwrap();

    let stats = db.close().unwrap().expect("stats collected");
    assert_eq!(stats.entities, 2);
    assert_eq!(stats.versions, 2);
    assert_eq!(stats.payload_bytes, 40);
    assert!(stats.to_string().contains("2 entities"));
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_writers_are_serialized() {
    let (_dir, db) = temp_store();
    let db = Arc::new(db);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for j in 0..5 {
                    let url = format!("https://x/{i}/{j}.png");
                    db.write_version(&meta(&format!("c{}", i % 3), &url), url.as_bytes())
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("writer should not panic");
    }

    let entities = db.list_entities().unwrap();
    assert_eq!(entities.len(), 3);
    let total: usize = entities
        .iter()
        .map(|e| db.list_versions(e).unwrap().len())
        .sum();
    assert_eq!(total, 40);

    for entity in &entities {
        for version in db.list_versions(entity).unwrap() {
            let stored = db.read_version(entity, &version).unwrap().unwrap();
            assert_eq!(stored.data, stored.metadata.url.as_bytes());
        }
    }
}

// ---------------------------------------------------------------------------
// Backend contract
// ---------------------------------------------------------------------------

fn exercise_contract(store: &dyn CatStore) {
    let (entity, v1) = store.write_version(&meta("c1", "https://x/1.png"), b"one").unwrap();
    let (_, v1_again) = store.write_version(&meta("c1", "https://x/1.png"), b"uno").unwrap();
    let (_, v2) = store.write_version(&meta("c1", "https://x/2.png"), b"two").unwrap();
    store.write_version(&meta("c0", "https://x/0.png"), b"zero").unwrap();

    assert_eq!(v1, v1_again);
    assert_ne!(v1, v2);
    assert!(store.contains_version(&entity, &v1).unwrap());

    let entities: Vec<String> = store
        .list_entities()
        .unwrap()
        .into_iter()
        .map(EntityId::into_string)
        .collect();
    assert_eq!(entities, vec!["c0", "c1"]);

    let mut expected = vec![v1, v2];
    expected.sort();
    assert_eq!(store.list_versions(&entity).unwrap(), expected);

    let stored = store.read_version(&entity, &v1).unwrap().unwrap();
    assert_eq!(stored.data, b"uno");
    assert_eq!(stored.metadata, meta("c1", "https://x/1.png"));

    let err = store.write_version(&meta("", "https://x/3.png"), b"").unwrap_err();
    assert!(matches!(err, StoreError::InvalidEntityId { .. }));
}

#[test]
fn disk_store_honors_contract() {
    let (_dir, db) = temp_store();
    exercise_contract(&db);
}

#[test]
fn memory_store_honors_contract() {
    exercise_contract(&InMemoryCatStore::new());
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn round_trip_preserves_fields_and_bytes(
        id in "[a-zA-Z0-9_-]{1,24}",
        url in "https://[a-z]{1,12}\\.example/[a-z0-9/]{0,24}",
        tags in proptest::collection::vec("[a-z]{1,10}", 0..5),
        secs in 0i64..4_000_000_000,
        data in proptest::collection::vec(any::<u8>(), 0..2048),
    ) {
        let (_dir, db) = temp_store();
        let created_at = Utc.timestamp_opt(secs, 0).unwrap();
        let m = CatMetadata::new(id.as_str(), url.as_str(), "image/webp", created_at)
            .with_tags(tags.iter().map(String::as_str));

        let (entity, version) = db.write_version(&m, &data).unwrap();
        prop_assert_eq!(entity.as_str(), id.as_str());
        prop_assert_eq!(version, derive_version_id(&url).unwrap());

        let raw = db.read_raw_metadata(&entity, &version).unwrap().unwrap();
        for (key, value) in catfetch_store::encode_metadata(&m) {
            prop_assert_eq!(&raw[key], &value);
        }
        let stored = db.read_version(&entity, &version).unwrap().unwrap();
        prop_assert_eq!(stored.metadata, m);
        prop_assert_eq!(stored.data, data);
    }
}

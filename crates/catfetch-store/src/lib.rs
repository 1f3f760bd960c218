//! Versioned, content-addressable storage for fetched cat images.
//!
//! Every image is stored under the record id the upstream service gave it
//! (the *entity*) and a version id derived from the URL it was fetched from.
//! Refetching the same URL lands in the same version slot; a new URL for the
//! same entity adds a version beside the existing ones.
//!
//! ```text
//! cats/{entity}/{version}/metadata/{cat_id,tags,created_at,url,mime_type}
//! cats/{entity}/{version}/data/img_data
//! ```
//!
//! # Storage Backends
//!
//! All backends implement the [`CatStore`] trait:
//!
//! - [`CatDb`] -- single-file store on the redb engine
//! - [`InMemoryCatStore`] -- `BTreeMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. One `write_version` is one transaction: metadata and payload appear
//!    together or not at all.
//! 2. The version id depends only on the source URL.
//! 3. Nothing is ever deleted; the file only grows.
//! 4. Readers see the last committed snapshot and never block the writer.
//! 5. Write-path errors are always returned. Release failures are logged.

pub mod config;
pub mod db;
pub mod error;
pub mod memory;
pub mod namespace;
pub mod stats;
pub mod traits;
pub mod version;

pub use config::{Durability, StoreConfig};
pub use db::CatDb;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryCatStore;
pub use namespace::{
    CatsBucket, CatsView, EntityBucket, EntityView, FieldBucket, FieldView, VersionBucket,
    VersionView, BUCKET_CATS, BUCKET_DATA, BUCKET_METADATA, KEY_IMG_DATA, KEY_META_CREATED_AT,
    KEY_META_ID, KEY_META_MIME_TYPE, KEY_META_TAGS, KEY_META_URL, METADATA_KEYS,
};
pub use stats::StoreStats;
pub use traits::CatStore;
pub use version::{encode_metadata, CatVersion};

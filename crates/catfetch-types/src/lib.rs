//! Foundation types for catfetch.
//!
//! This crate provides the identifier and record types shared by the hash
//! deriver, the store, and the command-line tool.
//!
//! # Key Types
//!
//! - [`EntityId`] -- Caller-assigned identity of a cat (stable across fetches)
//! - [`VersionId`] -- 64-bit fingerprint of a source URL, one per fetched version
//! - [`CatMetadata`] -- Descriptive record delivered by the fetch pipeline

pub mod error;
pub mod ids;
pub mod metadata;

pub use error::TypeError;
pub use ids::{EntityId, VersionId};
pub use metadata::{decode_tags, encode_tags, format_created_at, parse_created_at, CatMetadata};

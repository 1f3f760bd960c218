//! Version fingerprinting for catfetch.
//!
//! A version id is a 64-bit, domain-separated BLAKE3 fingerprint of the
//! source locator an image was fetched from. The derivation has no seed and no
//! machine-dependent input, so the same URL yields the same id in every
//! process, and repeated fetches of an unchanged image collapse into one
//! stored version.

pub mod hasher;

pub use hasher::{derive_version_id, HashError, VersionHasher};

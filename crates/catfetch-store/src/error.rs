use std::path::PathBuf;

use catfetch_hash::HashError;
use catfetch_types::{EntityId, VersionId};

/// Errors from cat store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing file could not be created, locked, or recognized, or the
    /// top-level namespace could not be initialized.
    #[error("failed to open store at {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: redb::Error,
    },

    /// The final checkpoint before release failed.
    #[error("failed to close store at {}: {source}", .path.display())]
    Close {
        path: PathBuf,
        #[source]
        source: redb::Error,
    },

    /// The fingerprint primitive failed to consume the source locator.
    #[error("version id derivation failed: {0}")]
    Hash(#[from] HashError),

    /// A namespace or key write failed; the whole version was rolled back.
    #[error("failed to write version {version} of {entity}: {source}")]
    Write {
        entity: EntityId,
        version: VersionId,
        #[source]
        source: redb::Error,
    },

    /// The engine failed while reading, enumerating, or collecting stats.
    #[error("read failed: {0}")]
    Read(#[source] redb::Error),

    /// The caller supplied an entity id the store cannot address.
    #[error("invalid entity id {id:?}: {reason}")]
    InvalidEntityId { id: String, reason: String },

    /// A stored version cannot be decoded.
    #[error("corrupt version {version} of {entity}: {reason}")]
    CorruptVersion {
        entity: EntityId,
        version: VersionId,
        reason: String,
    },

    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error outside the engine (e.g. reading a config file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

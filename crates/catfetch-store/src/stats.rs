use std::fmt;

use serde::Serialize;

/// Operational statistics for a store.
///
/// Namespace counts come from walking the `cats` tree; page figures come from
/// the engine. Informational only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub entities: u64,
    pub versions: u64,
    pub payload_bytes: u64,
    pub tree_height: u32,
    pub allocated_pages: u64,
    pub leaf_pages: u64,
    pub branch_pages: u64,
    pub stored_bytes: u64,
    pub fragmented_bytes: u64,
    pub page_size: usize,
}

impl StoreStats {
    pub(crate) fn with_engine(mut self, engine: &redb::DatabaseStats) -> Self {
        self.tree_height = engine.tree_height();
        self.allocated_pages = engine.allocated_pages();
        self.leaf_pages = engine.leaf_pages();
        self.branch_pages = engine.branch_pages();
        self.stored_bytes = engine.stored_bytes();
        self.fragmented_bytes = engine.fragmented_bytes();
        self.page_size = engine.page_size();
        self
    }
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entities, {} versions, {} payload bytes; {} pages ({} leaf, {} branch) of {} bytes, height {}, {} fragmented bytes",
            self.entities,
            self.versions,
            self.payload_bytes,
            self.allocated_pages,
            self.leaf_pages,
            self.branch_pages,
            self.page_size,
            self.tree_height,
            self.fragmented_bytes,
        )
    }
}

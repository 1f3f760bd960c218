use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// When a committed write reaches stable storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    /// fsync on every commit.
    #[default]
    Immediate,
    /// Defer fsync until the next immediate commit (at the latest, `close`).
    Eventual,
}

impl From<Durability> for redb::Durability {
    fn from(value: Durability) -> Self {
        match value {
            Durability::Immediate => redb::Durability::Immediate,
            Durability::Eventual => redb::Durability::Eventual,
        }
    }
}

/// Tuning knobs for a [`CatDb`](crate::CatDb).
///
/// ```toml
/// cache_size_bytes = 67108864
/// durability = "eventual"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Page cache size; `None` keeps the engine default.
    pub cache_size_bytes: Option<usize>,
    pub durability: Durability,
}

impl StoreConfig {
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

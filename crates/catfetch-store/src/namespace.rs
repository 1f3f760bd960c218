//! Nested namespaces over a flat redb table.
//!
//! redb offers typed tables but no buckets-within-buckets, so the whole
//! `cats/{entity}/{version}/{metadata|data}` tree lives in one table named
//! [`BUCKET_CATS`] keyed by the four-part path `(entity, version, section,
//! field)`. A namespace exists once its marker row is present; a marker is the
//! namespace's own path with the trailing components left empty:
//!
//! ```text
//! (e, "", "", "")            entity e
//! (e, v, "", "")             version v of e
//! (e, v, "metadata", "")     metadata namespace
//! (e, v, "metadata", "url")  a metadata field
//! (e, v, "data", "")         data namespace
//! (e, v, "data", "img_data") the payload
//! ```
//!
//! Write handles ([`CatsBucket`] → [`EntityBucket`] → [`VersionBucket`] →
//! [`FieldBucket`]) locate-or-create each level and can only descend along
//! that fixed path. Read handles ([`CatsView`] and friends) walk the same path
//! over any [`ReadableTable`], so they work inside read and write
//! transactions alike.

use catfetch_types::{EntityId, VersionId};
use redb::{ReadableTable, Table, TableDefinition};
use tracing::warn;

/// Name of the top-level collection (the redb table).
pub const BUCKET_CATS: &str = "cats";
/// Section holding the descriptive fields of a version.
pub const BUCKET_METADATA: &str = "metadata";
/// Section holding the raw payload of a version.
pub const BUCKET_DATA: &str = "data";

pub const KEY_IMG_DATA: &str = "img_data";
pub const KEY_META_ID: &str = "cat_id";
pub const KEY_META_TAGS: &str = "tags";
pub const KEY_META_CREATED_AT: &str = "created_at";
pub const KEY_META_URL: &str = "url";
pub const KEY_META_MIME_TYPE: &str = "mime_type";

/// Every metadata key a complete version carries, in write order.
pub const METADATA_KEYS: [&str; 5] = [
    KEY_META_ID,
    KEY_META_TAGS,
    KEY_META_CREATED_AT,
    KEY_META_URL,
    KEY_META_MIME_TYPE,
];

/// `(entity, version, section, field)`
pub type PathKey = (&'static str, &'static str, &'static str, &'static str);

pub(crate) const CATS: TableDefinition<PathKey, &[u8]> = TableDefinition::new(BUCKET_CATS);

const MARKER: &[u8] = &[];

/// Smallest string ordered after `s` and after every string prefixed by `s`.
///
/// Seeking to `(next_sibling(e), "", "", "")` skips the whole subtree of `e`.
fn next_sibling(s: &str) -> String {
    let mut next = String::with_capacity(s.len() + 1);
    next.push_str(s);
    next.push('\0');
    next
}

/// Insert a marker row unless one is already there. Returns `true` if created.
fn ensure_marker(
    table: &mut Table<'_, PathKey, &'static [u8]>,
    key: (&str, &str, &str, &str),
) -> Result<bool, redb::Error> {
    let exists = table.get(key)?.is_some();
    if exists {
        return Ok(false);
    }
    table.insert(key, MARKER)?;
    Ok(true)
}

fn has_row<T>(table: &T, key: (&str, &str, &str, &str)) -> Result<bool, redb::Error>
where
    T: ReadableTable<PathKey, &'static [u8]>,
{
    Ok(table.get(key)?.is_some())
}

// ---------------------------------------------------------------------------
// Write handles
// ---------------------------------------------------------------------------

/// The top-level `cats` namespace inside a write transaction.
pub struct CatsBucket<'a, 'txn> {
    table: &'a mut Table<'txn, PathKey, &'static [u8]>,
}

impl<'a, 'txn> CatsBucket<'a, 'txn> {
    pub(crate) fn new(table: &'a mut Table<'txn, PathKey, &'static [u8]>) -> Self {
        Self { table }
    }

    /// Locate or create the namespace of one entity.
    pub fn entity<'s>(&'s mut self, entity: &'s EntityId) -> Result<EntityBucket<'s, 'txn>, redb::Error> {
        ensure_marker(self.table, (entity.as_str(), "", "", ""))?;
        Ok(EntityBucket {
            table: &mut *self.table,
            entity: entity.as_str(),
        })
    }

    /// Read-only view over the same transaction's state.
    pub fn view(&self) -> CatsView<'_, Table<'txn, PathKey, &'static [u8]>> {
        CatsView::new(&*self.table)
    }
}

/// One entity's namespace inside a write transaction.
pub struct EntityBucket<'a, 'txn> {
    table: &'a mut Table<'txn, PathKey, &'static [u8]>,
    entity: &'a str,
}

impl<'a, 'txn> EntityBucket<'a, 'txn> {
    /// Locate or create the namespace of one version.
    pub fn version(&mut self, version: &VersionId) -> Result<VersionBucket<'_, 'txn>, redb::Error> {
        let version = version.to_hex();
        ensure_marker(self.table, (self.entity, version.as_str(), "", ""))?;
        Ok(VersionBucket {
            table: &mut *self.table,
            entity: self.entity,
            version,
        })
    }

    pub fn id(&self) -> &str {
        self.entity
    }
}

/// One version's namespace inside a write transaction.
pub struct VersionBucket<'a, 'txn> {
    table: &'a mut Table<'txn, PathKey, &'static [u8]>,
    entity: &'a str,
    version: String,
}

impl<'a, 'txn> VersionBucket<'a, 'txn> {
    /// Locate or create the metadata namespace.
    pub fn metadata(&mut self) -> Result<FieldBucket<'_, 'txn>, redb::Error> {
        self.section(BUCKET_METADATA)
    }

    /// Locate or create the data namespace.
    pub fn data(&mut self) -> Result<FieldBucket<'_, 'txn>, redb::Error> {
        self.section(BUCKET_DATA)
    }

    fn section(&mut self, section: &'static str) -> Result<FieldBucket<'_, 'txn>, redb::Error> {
        ensure_marker(self.table, (self.entity, self.version.as_str(), section, ""))?;
        Ok(FieldBucket {
            table: &mut *self.table,
            entity: self.entity,
            version: &self.version,
            section,
        })
    }
}

/// A leaf namespace (metadata or data) holding key/value pairs.
pub struct FieldBucket<'a, 'txn> {
    table: &'a mut Table<'txn, PathKey, &'static [u8]>,
    entity: &'a str,
    version: &'a str,
    section: &'static str,
}

impl<'a, 'txn> FieldBucket<'a, 'txn> {
    /// Insert or overwrite one field. Keys must be non-empty.
    pub fn put(&mut self, key: &str, value: &[u8]) -> Result<(), redb::Error> {
        debug_assert!(!key.is_empty(), "empty key collides with the namespace marker");
        self.table
            .insert((self.entity, self.version, self.section, key), value)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, redb::Error> {
        let value = self
            .table
            .get((self.entity, self.version, self.section, key))?
            .map(|guard| guard.value().to_vec());
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Read handles
// ---------------------------------------------------------------------------

/// The top-level `cats` namespace over any readable table.
pub struct CatsView<'a, T> {
    table: &'a T,
}

impl<'a, T> CatsView<'a, T>
where
    T: ReadableTable<PathKey, &'static [u8]>,
{
    pub fn new(table: &'a T) -> Self {
        Self { table }
    }

    /// All entity ids, in key order.
    pub fn entities(&self) -> Result<Vec<EntityId>, redb::Error> {
        let mut entities = Vec::new();
        let mut cursor = String::new();
        loop {
            let next = {
                let mut range = self.table.range((cursor.as_str(), "", "", "")..)?;
                match range.next() {
                    Some(entry) => {
                        let (key, _) = entry?;
                        let (entity, _, _, _) = key.value();
                        Some(entity.to_owned())
                    }
                    None => None,
                }
            };
            let Some(entity) = next else { break };
            match EntityId::new(entity.as_str()) {
                Ok(id) => entities.push(id),
                Err(e) => warn!(error = %e, "skipping row with invalid entity id"),
            }
            cursor = next_sibling(&entity);
        }
        Ok(entities)
    }

    /// Locate an entity's namespace without creating it.
    pub fn entity(&self, entity: &EntityId) -> Result<Option<EntityView<'a, T>>, redb::Error> {
        if !has_row(self.table, (entity.as_str(), "", "", ""))? {
            return Ok(None);
        }
        Ok(Some(EntityView {
            table: self.table,
            entity: entity.as_str().to_owned(),
        }))
    }

    /// Shorthand for `entity(..)` then `version(..)`.
    pub fn version(
        &self,
        entity: &EntityId,
        version: &VersionId,
    ) -> Result<Option<VersionView<'a, T>>, redb::Error> {
        match self.entity(entity)? {
            Some(cat) => cat.version(version),
            None => Ok(None),
        }
    }
}

/// One entity's namespace over any readable table.
pub struct EntityView<'a, T> {
    table: &'a T,
    entity: String,
}

impl<'a, T> EntityView<'a, T>
where
    T: ReadableTable<PathKey, &'static [u8]>,
{
    pub fn id(&self) -> &str {
        &self.entity
    }

    /// All version ids under this entity, in key order.
    pub fn versions(&self) -> Result<Vec<VersionId>, redb::Error> {
        let mut versions = Vec::new();
        // "\0" sorts directly after the entity's own marker.
        let mut cursor = String::from("\0");
        loop {
            let next = {
                let mut range = self
                    .table
                    .range((self.entity.as_str(), cursor.as_str(), "", "")..)?;
                match range.next() {
                    Some(entry) => {
                        let (key, _) = entry?;
                        let (entity, version, _, _) = key.value();
                        (entity == self.entity).then(|| version.to_owned())
                    }
                    None => None,
                }
            };
            let Some(version) = next else { break };
            match VersionId::from_hex(&version) {
                Ok(id) => versions.push(id),
                Err(e) => warn!(entity = %self.entity, version, error = %e, "skipping unparseable version key"),
            }
            cursor = next_sibling(&version);
        }
        Ok(versions)
    }

    /// Locate a version's namespace without creating it.
    pub fn version(&self, version: &VersionId) -> Result<Option<VersionView<'a, T>>, redb::Error> {
        let version = version.to_hex();
        if !has_row(self.table, (self.entity.as_str(), version.as_str(), "", ""))? {
            return Ok(None);
        }
        Ok(Some(VersionView {
            table: self.table,
            entity: self.entity.clone(),
            version,
        }))
    }
}

/// One version's namespace over any readable table.
pub struct VersionView<'a, T> {
    table: &'a T,
    entity: String,
    version: String,
}

impl<'a, T> VersionView<'a, T>
where
    T: ReadableTable<PathKey, &'static [u8]>,
{
    pub fn metadata(&self) -> Result<Option<FieldView<'_, T>>, redb::Error> {
        self.section(BUCKET_METADATA)
    }

    pub fn data(&self) -> Result<Option<FieldView<'_, T>>, redb::Error> {
        self.section(BUCKET_DATA)
    }

    fn section(&self, section: &'static str) -> Result<Option<FieldView<'_, T>>, redb::Error> {
        let marker = (self.entity.as_str(), self.version.as_str(), section, "");
        if !has_row(self.table, marker)? {
            return Ok(None);
        }
        Ok(Some(FieldView {
            table: self.table,
            entity: &self.entity,
            version: &self.version,
            section,
        }))
    }
}

/// A leaf namespace over any readable table.
pub struct FieldView<'a, T> {
    table: &'a T,
    entity: &'a str,
    version: &'a str,
    section: &'static str,
}

impl<'a, T> FieldView<'a, T>
where
    T: ReadableTable<PathKey, &'static [u8]>,
{
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, redb::Error> {
        let value = self
            .table
            .get((self.entity, self.version, self.section, key))?
            .map(|guard| guard.value().to_vec());
        Ok(value)
    }

    /// Length of one value without copying it out.
    pub fn value_len(&self, key: &str) -> Result<Option<usize>, redb::Error> {
        let len = self
            .table
            .get((self.entity, self.version, self.section, key))?
            .map(|guard| guard.value().len());
        Ok(len)
    }

    /// All fields in key order, excluding the namespace marker.
    pub fn entries(&self) -> Result<Vec<(String, Vec<u8>)>, redb::Error> {
        let mut entries = Vec::new();
        for entry in self
            .table
            .range((self.entity, self.version, self.section, "")..)?
        {
            let (key, value) = entry?;
            let (entity, version, section, field) = key.value();
            if entity != self.entity || version != self.version || section != self.section {
                break;
            }
            if field.is_empty() {
                continue;
            }
            entries.push((field.to_owned(), value.value().to_vec()));
        }
        Ok(entries)
    }
}

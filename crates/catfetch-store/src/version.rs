use std::collections::BTreeMap;

use catfetch_types::{decode_tags, parse_created_at, CatMetadata, EntityId, VersionId};

use crate::error::{StoreError, StoreResult};
use crate::namespace::{
    KEY_META_CREATED_AT, KEY_META_ID, KEY_META_MIME_TYPE, KEY_META_TAGS, KEY_META_URL,
};

/// One stored version read back from the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatVersion {
    pub entity: EntityId,
    pub version: VersionId,
    pub metadata: CatMetadata,
    pub data: Vec<u8>,
}

impl CatVersion {
    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// The metadata namespace contents for a record, in write order.
pub fn encode_metadata(metadata: &CatMetadata) -> [(&'static str, String); 5] {
    [
        (KEY_META_ID, metadata.id.clone()),
        (KEY_META_TAGS, metadata.encoded_tags()),
        (KEY_META_CREATED_AT, metadata.encoded_created_at()),
        (KEY_META_URL, metadata.url.clone()),
        (KEY_META_MIME_TYPE, metadata.mime_type.clone()),
    ]
}

/// Turn raw metadata rows into strings, rejecting non-UTF-8 values.
pub(crate) fn fields_from_rows(
    entity: &EntityId,
    version: &VersionId,
    rows: Vec<(String, Vec<u8>)>,
) -> StoreResult<BTreeMap<String, String>> {
    rows.into_iter()
        .map(|(key, value)| match String::from_utf8(value) {
            Ok(value) => Ok((key, value)),
            Err(e) => Err(corrupt(entity, version, format!("field {key} is not UTF-8: {e}"))),
        })
        .collect()
}

/// Rebuild a [`CatMetadata`] from its stored fields.
pub(crate) fn decode_metadata(
    entity: &EntityId,
    version: &VersionId,
    fields: &BTreeMap<String, String>,
) -> StoreResult<CatMetadata> {
    let field = |key: &str| {
        fields
            .get(key)
            .cloned()
            .ok_or_else(|| corrupt(entity, version, format!("missing metadata field {key}")))
    };

    let created_at = parse_created_at(&field(KEY_META_CREATED_AT)?)
        .map_err(|e| corrupt(entity, version, e.to_string()))?;

    Ok(CatMetadata {
        id: field(KEY_META_ID)?,
        tags: decode_tags(&field(KEY_META_TAGS)?),
        created_at,
        url: field(KEY_META_URL)?,
        mime_type: field(KEY_META_MIME_TYPE)?,
    })
}

pub(crate) fn corrupt(entity: &EntityId, version: &VersionId, reason: String) -> StoreError {
    StoreError::CorruptVersion {
        entity: entity.clone(),
        version: *version,
        reason,
    }
}

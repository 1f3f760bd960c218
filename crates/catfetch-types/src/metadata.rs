use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Separator placed between tags in their stored form.
pub const TAG_SEPARATOR: &str = ", ";

/// Descriptive record for one fetched cat image.
///
/// Field names follow the upstream JSON record (`mimetype` is spelled the way
/// the remote service spells it), so a response body deserializes directly:
///
/// ```
/// use catfetch_types::CatMetadata;
///
/// let meta: CatMetadata = serde_json::from_str(r#"{
///     "id": "c1",
///     "tags": ["orange", "sleepy"],
///     "created_at": "2025-01-01T12:00:00Z",
///     "url": "https://cataas.com/cat/c1",
///     "mimetype": "image/jpeg"
/// }"#).unwrap();
/// assert_eq!(meta.tags.len(), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatMetadata {
    /// Backend record id; becomes the entity id in the store.
    pub id: String,
    /// Ordered tag list.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation time reported by the backend.
    pub created_at: DateTime<Utc>,
    /// Source locator of the image bytes. Determines the version id.
    pub url: String,
    /// Declared MIME type of the image bytes.
    #[serde(rename = "mimetype")]
    pub mime_type: String,
}

impl CatMetadata {
    /// Create a record with no tags.
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        mime_type: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            tags: Vec::new(),
            created_at,
            url: url.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Replace the tag list.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Stored form of the tag list.
    pub fn encoded_tags(&self) -> String {
        encode_tags(&self.tags)
    }

    /// Stored form of the creation time.
    pub fn encoded_created_at(&self) -> String {
        format_created_at(&self.created_at)
    }
}

/// Join tags with `", "`.
pub fn encode_tags<S: AsRef<str>>(tags: &[S]) -> String {
    tags.iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(TAG_SEPARATOR)
}

/// Inverse of [`encode_tags`]. The empty string decodes to no tags.
///
/// Tags that themselves contain `", "` do not survive the round trip, and
/// neither does a list holding only the empty tag: `[""]` encodes to `""`,
/// which decodes to no tags.
pub fn decode_tags(encoded: &str) -> Vec<String> {
    if encoded.is_empty() {
        return Vec::new();
    }
    encoded.split(TAG_SEPARATOR).map(str::to_owned).collect()
}

/// RFC 3339, whole seconds, `Z` suffix (e.g. `2025-01-01T12:00:00Z`).
pub fn format_created_at(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse any RFC 3339 timestamp and normalize it to UTC.
pub fn parse_created_at(value: &str) -> Result<DateTime<Utc>, TypeError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| TypeError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

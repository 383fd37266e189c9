use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DomainError;

/// Arbitrary structured mapping held by either store.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Reserved for persisted key encoding; never allowed inside a segment or key.
pub const KEY_SEPARATOR: char = '\u{1f}';

/// Ordered path of segments scoping keys inside a store, e.g. `["user_data", "e1"]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Namespace(Vec<String>);

impl Namespace {
    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Result<Self, DomainError> {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(DomainError::validation("namespace needs at least one segment"));
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err(DomainError::validation(format!(
                    "namespace {:?} contains an empty segment",
                    segments
                )));
            }
            if segment.contains(KEY_SEPARATOR) {
                return Err(DomainError::validation(format!(
                    "namespace segment {segment:?} contains a reserved character"
                )));
            }
        }
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Segment-wise prefix test: `[a, b]` is a prefix of `[a, b, c]` but not of `[a, bc]`.
    pub fn starts_with(&self, prefix: &Namespace) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Byte-stable form used as the leading part of persisted keys.
    pub fn encoded(&self) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            out.push_str(segment);
            out.push(KEY_SEPARATOR);
        }
        out
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl TryFrom<Vec<String>> for Namespace {
    type Error = DomainError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Namespace> for Vec<String> {
    fn from(value: Namespace) -> Self {
        value.0
    }
}

pub fn validate_key(key: &str) -> Result<(), DomainError> {
    if key.is_empty() {
        return Err(DomainError::validation("key cannot be empty"));
    }
    if key.contains(KEY_SEPARATOR) {
        return Err(DomainError::validation(format!(
            "key {key:?} contains a reserved character"
        )));
    }
    Ok(())
}

/// A value stored under `(namespace, key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub namespace: Namespace,
    pub key: String,
    pub value: Document,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Builds the item a `put` leaves behind. A replaced item keeps its original
    /// `created_at`.
    pub fn written(
        previous: Option<&Item>,
        namespace: Namespace,
        key: impl Into<String>,
        value: Document,
    ) -> Self {
        let now = Utc::now();
        Self {
            namespace,
            key: key.into(),
            value,
            created_at: previous.map(|item| item.created_at).unwrap_or(now),
            updated_at: now,
        }
    }
}

/// Search hit returned by a semantic store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    #[serde(flatten)]
    pub item: Item,
    /// Cosine similarity to the query; `None` when the query was blank.
    pub score: Option<f32>,
}

impl SearchItem {
    pub fn into_value(self) -> Document {
        self.item.value
    }
}

/// Conversation snapshot indexed for similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticRecord {
    pub text: String,
    pub topics: Vec<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub sentiment: String,
}

impl SemanticRecord {
    pub fn to_document(&self) -> Result<Document, DomainError> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(DomainError::serialization(format!(
                "semantic record serialized to non-object {other}"
            ))),
        }
    }
}

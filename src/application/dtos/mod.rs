use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{Document, SemanticRecord};

/// Conversation payload handed in by agent nodes. Every field is optional;
/// gaps are filled from [`ConversationDefaults`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub topics: Option<Vec<String>>,
    /// RFC 3339, or a naive ISO 8601 string read as UTC.
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sentiment: Option<String>,
}

impl ConversationInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_topics(mut self, topics: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.topics = Some(topics.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_sentiment(mut self, sentiment: impl Into<String>) -> Self {
        self.sentiment = Some(sentiment.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Splits the input into its conversation id and the record to index.
    pub fn into_semantic_record(self, defaults: &ConversationDefaults) -> (String, SemanticRecord) {
        let id = self.id.unwrap_or_else(|| defaults.id.clone());
        let record = SemanticRecord {
            text: self.text.unwrap_or_else(|| defaults.text.clone()),
            topics: self.topics.unwrap_or_else(|| defaults.topics.clone()),
            timestamp: self.timestamp,
            sentiment: self.sentiment.unwrap_or_else(|| defaults.sentiment.clone()),
        };
        (id, record)
    }
}

/// Parses an RFC 3339 timestamp, falling back to a naive ISO 8601 one
/// (`2024-05-01T10:00:00.123456`), which is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|err| format!("unrecognised timestamp {raw:?}: {err}"))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Values substituted for fields a [`ConversationInput`] leaves out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationDefaults {
    pub id: String,
    pub text: String,
    pub topics: Vec<String>,
    pub sentiment: String,
}

impl Default for ConversationDefaults {
    fn default() -> Self {
        Self {
            id: "unknown".into(),
            text: String::new(),
            topics: Vec::new(),
            sentiment: "neutral".into(),
        }
    }
}

/// Context assembled for a single agent response. Built fresh per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub user_preferences: Document,
    pub relevant_conversations: Vec<Document>,
    pub query: String,
}

/// Health/readiness report for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatusResponse {
    pub ok: bool,
    pub message: String,
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let (id, record) = ConversationInput::default()
            .into_semantic_record(&ConversationDefaults::default());
        assert_eq!(id, "unknown");
        assert_eq!(record.text, "");
        assert!(record.topics.is_empty());
        assert_eq!(record.sentiment, "neutral");
        assert!(record.timestamp.is_none());
    }

    #[test]
    fn provided_fields_win_over_defaults() {
        let (id, record) = ConversationInput::new("hi there")
            .with_id("chitchat_1")
            .with_topics(["casual", "conversation"])
            .with_sentiment("friendly")
            .into_semantic_record(&ConversationDefaults::default());
        assert_eq!(id, "chitchat_1");
        assert_eq!(record.text, "hi there");
        assert_eq!(record.topics, vec!["casual", "conversation"]);
        assert_eq!(record.sentiment, "friendly");
    }

    #[test]
    fn input_deserializes_from_sparse_json() {
        let input: ConversationInput =
            serde_json::from_str(r#"{"text":"hello","timestamp":"2024-05-01T10:00:00Z"}"#).unwrap();
        assert_eq!(input.text.as_deref(), Some("hello"));
        assert!(input.id.is_none());
        assert!(input.timestamp.is_some());
    }

    #[test]
    fn naive_iso_timestamp_is_read_as_utc() {
        let input: ConversationInput = serde_json::from_str(
            r#"{"id":"chitchat_1","text":"hi","timestamp":"2024-05-01T10:00:00.123456"}"#,
        )
        .unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
            + chrono::Duration::microseconds(123_456);
        assert_eq!(input.timestamp, Some(expected));

        let whole_seconds = parse_timestamp("2024-05-01T10:00:00").unwrap();
        assert_eq!(whole_seconds, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn offset_timestamp_is_normalized_and_garbage_rejected() {
        let parsed = parse_timestamp("2024-05-01T12:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());

        let input: ConversationInput = serde_json::from_str(r#"{"timestamp":null}"#).unwrap();
        assert!(input.timestamp.is_none());
        assert!(serde_json::from_str::<ConversationInput>(r#"{"timestamp":"yesterday"}"#).is_err());
    }
}

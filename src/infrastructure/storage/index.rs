//! Embedding and ranking shared by the semantic stores.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value;

use crate::{
    application::services::EmbeddingEngine,
    domain::{Document, DomainError, Item, SearchItem},
};

/// Index field meaning "the whole document, serialized".
pub const WHOLE_DOCUMENT_FIELD: &str = "$";

/// `text` and `topics`. [`WHOLE_DOCUMENT_FIELD`] is opt-in; with it every
/// document has index text, so records with empty text would always match.
pub fn default_index_fields() -> Vec<String> {
    vec!["text".into(), "topics".into()]
}

/// Which embedding model to use and which document fields feed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticIndexConfig {
    pub model: String,
    pub fields: Vec<String>,
}

impl SemanticIndexConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            fields: default_index_fields(),
        }
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

/// An item together with the vector it was indexed under, if any.
#[derive(Debug, Clone)]
pub(crate) struct IndexedEntry {
    pub item: Item,
    pub embedding: Option<Vec<f32>>,
}

pub(crate) struct SemanticIndex {
    embedder: Arc<dyn EmbeddingEngine>,
    config: SemanticIndexConfig,
}

impl SemanticIndex {
    pub fn new(embedder: Arc<dyn EmbeddingEngine>, config: SemanticIndexConfig) -> Self {
        Self { embedder, config }
    }

    /// Embeds the configured fields of `document`. Documents with nothing to
    /// index are kept without a vector.
    pub fn embed_document(&self, document: &Document) -> Result<Option<Vec<f32>>, DomainError> {
        let text = index_text(document, &self.config.fields)?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        self.embedder.embed(&self.config.model, &text).map(Some)
    }

    /// Orders `candidates` for `query` and keeps at most `limit` of them.
    ///
    /// A blank query lists the most recently written items, unscored.
    pub fn rank(
        &self,
        candidates: Vec<IndexedEntry>,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchItem>, DomainError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query = query.trim();
        if query.is_empty() {
            let mut items: Vec<Item> = candidates.into_iter().map(|entry| entry.item).collect();
            items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            items.truncate(limit);
            return Ok(items
                .into_iter()
                .map(|item| SearchItem { item, score: None })
                .collect());
        }

        let query_vector = self.embedder.embed(&self.config.model, query)?;
        let mut scored: Vec<(Item, f32)> = Vec::new();
        for entry in candidates {
            let Some(vector) = entry.embedding else {
                continue;
            };
            let score = cosine_similarity(&query_vector, &vector)?;
            scored.push((entry.item, score));
        }

        scored.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => b.0.updated_at.cmp(&a.0.updated_at),
            other => other,
        });
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(item, score)| SearchItem {
                item,
                score: Some(score),
            })
            .collect())
    }
}

/// Concatenates the text of the requested fields, one per line.
pub fn index_text(document: &Document, fields: &[String]) -> Result<String, DomainError> {
    let mut parts: Vec<String> = Vec::new();
    for field in fields {
        if field == WHOLE_DOCUMENT_FIELD {
            parts.push(serde_json::to_string(document)?);
            continue;
        }
        match document.get(field) {
            Some(Value::String(text)) => parts.push(text.clone()),
            Some(Value::Array(values)) => {
                let joined = values
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" ");
                parts.push(joined);
            }
            Some(Value::Number(n)) => parts.push(n.to_string()),
            Some(Value::Bool(b)) => parts.push(b.to_string()),
            _ => {}
        }
    }
    parts.retain(|part| !part.trim().is_empty());
    Ok(parts.join("\n"))
}

/// Cosine similarity clamped to [-1, 1]. A zero vector scores 0.
pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> Result<f32, DomainError> {
    if query.len() != candidate.len() {
        return Err(DomainError::embedding(format!(
            "embedding dimension mismatch: query {} vs candidate {}",
            query.len(),
            candidate.len()
        )));
    }

    let mut dot = 0.0f32;
    let mut q_norm = 0.0f32;
    let mut c_norm = 0.0f32;
    for (q, c) in query.iter().zip(candidate.iter()) {
        dot += q * c;
        q_norm += q * q;
        c_norm += c * c;
    }

    let denom = q_norm.sqrt() * c_norm.sqrt();
    if denom == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / denom).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn index_text_reads_strings_and_arrays() {
        let document = doc(json!({
            "text": "deploy failed",
            "topics": ["ops", "ci", 3],
            "sentiment": "frustrated"
        }));
        let text = index_text(&document, &default_index_fields()).unwrap();
        assert_eq!(text, "deploy failed\nops ci");
    }

    #[test]
    fn default_fields_leave_empty_records_unindexed() {
        let fields = default_index_fields();
        assert_eq!(fields, vec!["text", "topics"]);
        assert!(!fields.iter().any(|field| field == WHOLE_DOCUMENT_FIELD));

        let empty = doc(json!({"text": "", "topics": [], "sentiment": "neutral"}));
        assert_eq!(index_text(&empty, &fields).unwrap(), "");
    }

    #[test]
    fn whole_document_field_serializes_everything() {
        let document = doc(json!({"sentiment": "calm"}));
        let text = index_text(&document, &["$".to_string()]).unwrap();
        assert!(text.contains("\"sentiment\""));
        assert!(text.contains("calm"));
    }

    #[test]
    fn missing_fields_yield_empty_text() {
        let document = doc(json!({"text": "", "topics": []}));
        assert_eq!(index_text(&document, &default_index_fields()).unwrap(), "");
    }

    #[test]
    fn cosine_handles_mismatch_and_zero_vectors() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0]).is_err());
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
        let same = cosine_similarity(&[0.6, 0.8], &[0.6, 0.8]).unwrap();
        assert!((same - 1.0).abs() < 1e-6);
    }
}

use ahash::AHasher;
use std::hash::{Hash, Hasher};

use crate::{application::services::EmbeddingEngine, domain::DomainError};

pub const DEFAULT_SIMPLE_MODEL: &str = "dualstore/simple-hash";
pub const DEFAULT_SIMPLE_DIMENSIONS: usize = 256;

/// Deterministic bag-of-words embedder: each lowercased token is hashed into one
/// bucket of a fixed-size vector, which is then L2-normalized.
///
/// Good enough for lexical overlap search with no model download. Swap in
/// `FastEmbedEngine` for real semantic similarity.
pub struct SimpleEmbedEngine {
    model_name: String,
    dimensions: usize,
}

impl SimpleEmbedEngine {
    pub fn try_new(model_name: impl Into<String>, dimensions: usize) -> Result<Self, DomainError> {
        if dimensions == 0 {
            return Err(DomainError::validation(
                "embedding dimensions must be greater than zero",
            ));
        }
        Ok(Self {
            model_name: model_name.into(),
            dimensions: dimensions.clamp(8, 4096),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
            .filter(|token| !token.is_empty())
            .map(str::to_lowercase)
    }

    fn bucket(&self, token: &str) -> usize {
        // fixed keys so vectors stay comparable across processes
        let mut hasher = AHasher::default();
        token.hash(&mut hasher);
        (hasher.finish() % self.dimensions as u64) as usize
    }

    fn embed_internal(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in Self::tokenize(text) {
            vector[self.bucket(&token)] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for SimpleEmbedEngine {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_SIMPLE_MODEL.to_string(),
            dimensions: DEFAULT_SIMPLE_DIMENSIONS,
        }
    }
}

impl EmbeddingEngine for SimpleEmbedEngine {
    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, DomainError> {
        if !model.eq_ignore_ascii_case(&self.model_name) {
            return Err(DomainError::embedding(format!(
                "engine initialised for `{}` but `{}` requested",
                self.model_name, model
            )));
        }
        if text.trim().is_empty() {
            return Err(DomainError::validation("text payload cannot be empty"));
        }
        Ok(self.embed_internal(text))
    }

    fn dims(&self, _model: &str) -> Option<usize> {
        Some(self.dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors_are_normalized_and_deterministic() {
        let engine = SimpleEmbedEngine::default();
        let a = engine.embed(DEFAULT_SIMPLE_MODEL, "Hello, world").unwrap();
        let b = engine.embed(DEFAULT_SIMPLE_MODEL, "hello world").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_SIMPLE_DIMENSIONS);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn rejects_wrong_model_and_blank_text() {
        let engine = SimpleEmbedEngine::default();
        assert!(matches!(
            engine.embed("other/model", "text"),
            Err(DomainError::Embedding(_))
        ));
        assert!(matches!(
            engine.embed(DEFAULT_SIMPLE_MODEL, "   "),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn dimensions_are_clamped() {
        assert!(SimpleEmbedEngine::try_new("m", 0).is_err());
        let engine = SimpleEmbedEngine::try_new("m", 2).unwrap();
        assert_eq!(engine.dims("m"), Some(8));
        let engine = SimpleEmbedEngine::try_new("m", 100_000).unwrap();
        assert_eq!(engine.dims("m"), Some(4096));
    }

    #[test]
    fn punctuation_only_text_embeds_to_zero_vector() {
        let engine = SimpleEmbedEngine::default();
        let vector = engine.embed(DEFAULT_SIMPLE_MODEL, "?!...").unwrap();
        assert!(vector.iter().all(|v| *v == 0.0));
    }
}

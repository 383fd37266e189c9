use thiserror::Error;

/// Errors surfaced by the memory façade and every store behind it.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Caller input was unusable (blank entity id, bad namespace segment, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// The backing store failed to read or write.
    #[error("storage failure: {0}")]
    Storage(String),

    /// A document could not be converted to or from its stored form.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Embedding generation failed or vectors were incompatible.
    #[error("embedding mismatch: {0}")]
    Embedding(String),

    /// Any other unexpected failure.
    #[error("unexpected error: {0}")]
    Other(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

//! Infrastructure layer wiring concrete adapters (embeddings, storage).

pub mod embeddings;
pub mod storage;

#[cfg(feature = "fastembed-engine")]
pub use embeddings::{FastEmbedEngine, DEFAULT_FASTEMBED_MODEL};
pub use embeddings::{SimpleEmbedEngine, DEFAULT_SIMPLE_DIMENSIONS, DEFAULT_SIMPLE_MODEL};
pub use storage::{
    InMemoryKeyValueStore, InMemorySemanticStore, SemanticIndexConfig, SledKeyValueStore,
    SledSemanticStore,
};

//! Service layer: the dual-store façade and the contracts its stores satisfy.

mod memory_service;

pub use memory_service::{
    EmbeddingEngine, KeyValueStore, MemoryConfig, MemoryManager, SemanticStore,
};

//! Store adapters for the memory façade.
//!
//! In-memory variants serve tests and short-lived agents; the sled-backed
//! variants persist across restarts. Both semantic stores share the embedding
//! and ranking logic in [`index`].

pub mod index;
pub mod memory_store;
pub mod sled_store;

pub use index::{SemanticIndexConfig, WHOLE_DOCUMENT_FIELD};
pub use memory_store::{InMemoryKeyValueStore, InMemorySemanticStore};
pub use sled_store::{SledKeyValueStore, SledSemanticStore};

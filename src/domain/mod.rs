//! Domain layer: namespaces, stored items and errors shared by every store.

pub mod errors;
pub mod models;

pub use errors::DomainError;
pub use models::{validate_key, Document, Item, Namespace, SearchItem, SemanticRecord};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::index::{IndexedEntry, SemanticIndex, SemanticIndexConfig};
use crate::{
    application::services::{EmbeddingEngine, KeyValueStore, SemanticStore},
    domain::{validate_key, Document, DomainError, Item, Namespace, SearchItem},
};

type ItemKey = (Namespace, String);

/// Process-local key-value store. Contents vanish with the process.
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    items: RwLock<BTreeMap<ItemKey, Item>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn put(
        &self,
        namespace: &Namespace,
        key: &str,
        value: Document,
    ) -> Result<(), DomainError> {
        validate_key(key)?;
        let mut items = self.items.write();
        let slot = (namespace.clone(), key.to_string());
        let item = Item::written(items.get(&slot), namespace.clone(), key, value);
        items.insert(slot, item);
        Ok(())
    }

    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<Item>, DomainError> {
        Ok(self
            .items
            .read()
            .get(&(namespace.clone(), key.to_string()))
            .cloned())
    }
}

/// Process-local semantic store. Vectors are computed on `put` and searched
/// by brute-force cosine similarity.
pub struct InMemorySemanticStore {
    index: SemanticIndex,
    entries: RwLock<BTreeMap<ItemKey, IndexedEntry>>,
}

impl InMemorySemanticStore {
    pub fn new(embedder: Arc<dyn EmbeddingEngine>, model: impl Into<String>) -> Self {
        Self::with_config(embedder, SemanticIndexConfig::new(model))
    }

    pub fn with_config(embedder: Arc<dyn EmbeddingEngine>, config: SemanticIndexConfig) -> Self {
        Self {
            index: SemanticIndex::new(embedder, config),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Exact lookup, bypassing similarity search.
    pub fn get(&self, namespace: &Namespace, key: &str) -> Option<Item> {
        self.entries
            .read()
            .get(&(namespace.clone(), key.to_string()))
            .map(|entry| entry.item.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl SemanticStore for InMemorySemanticStore {
    async fn put(
        &self,
        namespace: &Namespace,
        key: &str,
        value: Document,
    ) -> Result<(), DomainError> {
        validate_key(key)?;
        let embedding = self.index.embed_document(&value)?;

        let mut entries = self.entries.write();
        let slot = (namespace.clone(), key.to_string());
        let item = Item::written(
            entries.get(&slot).map(|entry| &entry.item),
            namespace.clone(),
            key,
            value,
        );
        entries.insert(slot, IndexedEntry { item, embedding });
        Ok(())
    }

    async fn search(
        &self,
        namespace_prefix: &Namespace,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchItem>, DomainError> {
        let candidates: Vec<IndexedEntry> = self
            .entries
            .read()
            .values()
            .filter(|entry| entry.item.namespace.starts_with(namespace_prefix))
            .cloned()
            .collect();

        self.index.rank(candidates, query, limit)
    }
}

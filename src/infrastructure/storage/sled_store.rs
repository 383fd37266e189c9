use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bincode::Options;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sled::{Config, Db, Tree};
use tracing::debug;

use super::index::{IndexedEntry, SemanticIndex, SemanticIndexConfig};
use crate::{
    application::services::{EmbeddingEngine, KeyValueStore, SemanticStore},
    domain::{validate_key, Document, DomainError, Item, Namespace, SearchItem},
};

const ITEMS_TREE: &str = "items";
const SEMANTIC_TREE: &str = "semantic_items";

/// On-disk form of an [`Item`]. bincode cannot drive `serde_json::Value`, so the
/// document travels as JSON text.
#[derive(Serialize, Deserialize)]
struct StoredItem {
    namespace: Vec<String>,
    key: String,
    value_json: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredItem {
    fn from_item(item: &Item) -> Result<Self, DomainError> {
        Ok(Self {
            namespace: item.namespace.segments().to_vec(),
            key: item.key.clone(),
            value_json: serde_json::to_string(&item.value)?,
            created_at: item.created_at,
            updated_at: item.updated_at,
        })
    }

    fn into_item(self) -> Result<Item, DomainError> {
        Ok(Item {
            namespace: Namespace::new(self.namespace)?,
            key: self.key,
            value: serde_json::from_str(&self.value_json)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    item: StoredItem,
    embedding: Option<Vec<f32>>,
}

fn open_db(data_dir: &Path) -> Result<Db, DomainError> {
    std::fs::create_dir_all(data_dir).map_err(|err| {
        DomainError::storage(format!(
            "failed to create data directory {:?}: {err}",
            data_dir
        ))
    })?;

    Config::default()
        .path(data_dir)
        .cache_capacity(64 * 1024 * 1024)
        .mode(sled::Mode::HighThroughput)
        .open()
        .map_err(|err| DomainError::storage(format!("failed to open sled db: {err}")))
}

fn open_tree(db: &Db, name: &str) -> Result<Tree, DomainError> {
    db.open_tree(name)
        .map_err(|err| DomainError::storage(format!("failed to open {name} tree: {err}")))
}

fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, DomainError> {
    bincode::options()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .serialize(value)
        .map_err(|err| DomainError::serialization(format!("bincode encode failed: {err}")))
}

fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DomainError> {
    bincode::options()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .deserialize(bytes)
        .map_err(|err| DomainError::serialization(format!("bincode decode failed: {err}")))
}

/// `seg1 US seg2 US ... US key`; a namespace's own encoding is a byte prefix of
/// every key beneath it.
fn encode_key(namespace: &Namespace, key: &str) -> Vec<u8> {
    let mut encoded = namespace.encoded();
    encoded.push_str(key);
    encoded.into_bytes()
}

fn flush_db(db: &Db) -> Result<(), DomainError> {
    db.flush()
        .map_err(|err| DomainError::storage(format!("failed to flush db: {err}")))?;
    Ok(())
}

fn read_item(items: &Tree, raw_key: &[u8]) -> Result<Option<Item>, DomainError> {
    let bytes = items
        .get(raw_key)
        .map_err(|err| DomainError::storage(format!("failed to read item: {err}")))?;
    bytes
        .map(|bytes| deserialize::<StoredItem>(&bytes)?.into_item())
        .transpose()
}

/// Runs sled I/O (reads, inserts, fsyncing flushes) on tokio's blocking pool.
async fn run_blocking<T, F>(task: F) -> Result<T, DomainError>
where
    F: FnOnce() -> Result<T, DomainError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| DomainError::storage(format!("storage task failed: {err}")))?
}

/// Persistent key-value store backed by `sled`. Every write is flushed to disk
/// before `put` returns; the blocking work runs off the async worker threads.
pub struct SledKeyValueStore {
    db: Db,
    items: Tree,
    data_dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl SledKeyValueStore {
    /// Opens (or creates) a sled database rooted at `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let dir = data_dir.as_ref().to_path_buf();
        let db = open_db(&dir)?;
        let items = open_tree(&db, ITEMS_TREE)?;

        Ok(Self {
            db,
            items,
            data_dir: dir,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[async_trait]
impl KeyValueStore for SledKeyValueStore {
    async fn put(
        &self,
        namespace: &Namespace,
        key: &str,
        value: Document,
    ) -> Result<(), DomainError> {
        validate_key(key)?;
        let raw_key = encode_key(namespace, key);
        let items = self.items.clone();
        let write_lock = Arc::clone(&self.write_lock);
        let owner = namespace.clone();
        let owned_key = key.to_string();

        run_blocking(move || {
            // read-modify-write of created_at
            let _guard = write_lock.lock();
            let previous = read_item(&items, &raw_key)?;
            let item = Item::written(previous.as_ref(), owner, owned_key, value);
            let bytes = serialize(&StoredItem::from_item(&item)?)?;

            items
                .insert(raw_key, bytes)
                .map_err(|err| DomainError::storage(format!("failed to persist item: {err}")))?;
            items
                .flush()
                .map_err(|err| DomainError::storage(format!("failed to flush items: {err}")))?;
            Ok(())
        })
        .await?;

        debug!(target: "dualstore::storage", %namespace, key, "item persisted");
        Ok(())
    }

    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<Item>, DomainError> {
        let items = self.items.clone();
        let raw_key = encode_key(namespace, key);
        run_blocking(move || read_item(&items, &raw_key)).await
    }

    async fn ping(&self) -> Result<(), DomainError> {
        let db = self.db.clone();
        run_blocking(move || flush_db(&db)).await
    }
}

/// Persistent semantic store backed by `sled`.
///
/// Full entries (item plus vector) live in one tree. Search scans the
/// namespace prefix and scores in memory, which suits per-entity histories of
/// moderate size. Embedding and ranking run on the caller's task; sled reads
/// and flushes run on the blocking pool.
pub struct SledSemanticStore {
    db: Db,
    entries: Tree,
    index: SemanticIndex,
    write_lock: Arc<Mutex<()>>,
}

impl SledSemanticStore {
    pub fn open(
        data_dir: impl AsRef<Path>,
        embedder: Arc<dyn EmbeddingEngine>,
        config: SemanticIndexConfig,
    ) -> Result<Self, DomainError> {
        let db = open_db(data_dir.as_ref())?;
        let entries = open_tree(&db, SEMANTIC_TREE)?;

        Ok(Self {
            db,
            entries,
            index: SemanticIndex::new(embedder, config),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn decode_entry(bytes: &[u8]) -> Result<IndexedEntry, DomainError> {
        let stored: StoredEntry = deserialize(bytes)?;
        Ok(IndexedEntry {
            item: stored.item.into_item()?,
            embedding: stored.embedding,
        })
    }
}

#[async_trait]
impl SemanticStore for SledSemanticStore {
    async fn put(
        &self,
        namespace: &Namespace,
        key: &str,
        value: Document,
    ) -> Result<(), DomainError> {
        validate_key(key)?;
        let raw_key = encode_key(namespace, key);
        let embedding = self.index.embed_document(&value)?;
        let entries = self.entries.clone();
        let write_lock = Arc::clone(&self.write_lock);
        let owner = namespace.clone();
        let owned_key = key.to_string();

        run_blocking(move || {
            let _guard = write_lock.lock();
            let previous = entries
                .get(&raw_key)
                .map_err(|err| DomainError::storage(format!("failed to read entry: {err}")))?
                .map(|bytes| Self::decode_entry(&bytes))
                .transpose()?;

            let item = Item::written(
                previous.as_ref().map(|entry| &entry.item),
                owner,
                owned_key,
                value,
            );
            let bytes = serialize(&StoredEntry {
                item: StoredItem::from_item(&item)?,
                embedding,
            })?;

            entries
                .insert(raw_key, bytes)
                .map_err(|err| DomainError::storage(format!("failed to persist entry: {err}")))?;
            entries
                .flush()
                .map_err(|err| DomainError::storage(format!("failed to flush entries: {err}")))?;
            Ok(())
        })
        .await?;

        debug!(target: "dualstore::storage", %namespace, key, "semantic entry persisted");
        Ok(())
    }

    async fn search(
        &self,
        namespace_prefix: &Namespace,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchItem>, DomainError> {
        let entries = self.entries.clone();
        let prefix = namespace_prefix.encoded();
        let candidates = run_blocking(move || {
            let mut candidates = Vec::new();
            for entry in entries.scan_prefix(prefix.as_bytes()) {
                let (_, value) = entry
                    .map_err(|err| DomainError::storage(format!("failed to read entry: {err}")))?;
                candidates.push(Self::decode_entry(&value)?);
            }
            Ok(candidates)
        })
        .await?;

        self.index.rank(candidates, query, limit)
    }

    async fn ping(&self) -> Result<(), DomainError> {
        let db = self.db.clone();
        run_blocking(move || flush_db(&db)).await
    }
}

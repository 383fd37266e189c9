//! Dual-store memory for conversational agents.
//!
//! [`MemoryManager`] keeps structured data (user preferences) in a key-value
//! store and, when one is configured, indexes conversations in a semantic store
//! for similarity search. [`MemoryManager::get_context_for_response`] blends
//! both into a single [`ContextBundle`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod settings;

pub use application::{
    services::{EmbeddingEngine, KeyValueStore, MemoryConfig, SemanticStore},
    ContextBundle, ConversationDefaults, ConversationInput, HealthStatusResponse, MemoryManager,
};
pub use domain::{Document, DomainError, Item, Namespace, SearchItem, SemanticRecord};

#[cfg(feature = "fastembed-engine")]
use infrastructure::FastEmbedEngine;
use infrastructure::{SimpleEmbedEngine, SledKeyValueStore, SledSemanticStore};
use settings::{AppConfig, ConfigManager, EmbeddingBackend};

const ENV_DATA_DIR: &str = "DUALSTORE_DATA_DIR";
#[cfg(feature = "demo")]
const ENV_LOG: &str = "DUALSTORE_LOG";

/// Everything a host process needs after bootstrapping.
pub struct AppHandles {
    pub manager: Arc<MemoryManager>,
    pub config: Arc<ConfigManager>,
    pub data_dir: PathBuf,
}

/// Opens the persisted configuration and sled stores under `data_dir` and wires
/// them into a [`MemoryManager`]. The semantic store is skipped when disabled in
/// settings.
pub fn build_environment_at(data_dir: impl AsRef<Path>) -> Result<AppHandles> {
    let data_dir = data_dir.as_ref().to_path_buf();
    std::fs::create_dir_all(&data_dir).context("failed to create data directory")?;

    let config = Arc::new(ConfigManager::load(&data_dir).context("failed to load config file")?);
    let active = config.current();

    let regular: Arc<dyn KeyValueStore> = Arc::new(
        SledKeyValueStore::open(data_dir.join("kv"))
            .map_err(|err| anyhow!(err.to_string()))
            .context("failed to open key-value store")?,
    );

    let semantic = build_semantic_store(&active, &data_dir)?;
    info!(
        target: "dualstore::bootstrap",
        data_dir = %data_dir.display(),
        semantic = semantic.is_some(),
        backend = active.embedding.id(),
        "memory environment ready"
    );

    let manager = Arc::new(MemoryManager::new(
        regular,
        semantic,
        active.memory_config(),
    ));

    Ok(AppHandles {
        manager,
        config,
        data_dir,
    })
}

/// Same as [`build_environment_at`], rooted at the platform data directory
/// (or `DUALSTORE_DATA_DIR` when set).
pub fn build_environment() -> Result<AppHandles> {
    build_environment_at(resolve_data_dir()?)
}

fn build_semantic_store(
    active: &AppConfig,
    data_dir: &Path,
) -> Result<Option<Arc<dyn SemanticStore>>> {
    if !active.semantic.enabled {
        info!(target: "dualstore::bootstrap", "semantic store disabled in settings");
        return Ok(None);
    }

    let embedder = init_embedder(&active.embedding)
        .context("failed to initialise embedding backend")?;
    let store = SledSemanticStore::open(data_dir.join("semantic"), embedder, active.index_config())
        .map_err(|err| anyhow!(err.to_string()))
        .context("failed to open semantic store")?;

    let store: Arc<dyn SemanticStore> = Arc::new(store);
    Ok(Some(store))
}

fn init_embedder(backend: &EmbeddingBackend) -> Result<Arc<dyn EmbeddingEngine>> {
    match backend {
        EmbeddingBackend::Simple { model, dimensions } => {
            let engine = SimpleEmbedEngine::try_new(model.clone(), *dimensions)
                .map_err(|err| anyhow!(err.to_string()))?;
            let engine: Arc<dyn EmbeddingEngine> = Arc::new(engine);
            Ok(engine)
        }
        #[cfg(feature = "fastembed-engine")]
        EmbeddingBackend::FastEmbed { model } => {
            let engine = FastEmbedEngine::try_new(model).map_err(|err| anyhow!(err.to_string()))?;
            let engine: Arc<dyn EmbeddingEngine> = Arc::new(engine);
            Ok(engine)
        }
    }
}

fn resolve_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    let dirs = directories::ProjectDirs::from("dev", "dualstore", "Dualstore")
        .ok_or_else(|| anyhow!("unable to determine OS data dir"))?;
    Ok(dirs.data_dir().to_path_buf())
}

/// Installs a compact stderr subscriber filtered by `DUALSTORE_LOG` (default `info`).
/// Safe to call more than once.
#[cfg(feature = "demo")]
pub fn init_tracing() {
    static INIT: std::sync::OnceLock<()> = std::sync::OnceLock::new();

    let _ = INIT.get_or_init(|| {
        let filter = std::env::var(ENV_LOG).unwrap_or_else(|_| "info".into());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .try_init();
    });
}

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::application::{services::MemoryConfig, ConversationDefaults};
use crate::infrastructure::{
    storage::index::default_index_fields, SemanticIndexConfig, DEFAULT_SIMPLE_DIMENSIONS,
    DEFAULT_SIMPLE_MODEL,
};

/// Default filename used to persist configuration within the data directory.
const CONFIG_FILENAME: &str = "config.json";

/// Embedding backends compiled into the binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum EmbeddingBackend {
    /// Deterministic hash embedder (always available).
    Simple {
        #[serde(default = "default_simple_model")]
        model: String,
        #[serde(default = "default_simple_dim")]
        dimensions: usize,
    },
    /// Semantic embeddings powered by FastEmbed (feature gated).
    #[cfg(feature = "fastembed-engine")]
    FastEmbed { model: String },
}

impl EmbeddingBackend {
    pub fn id(&self) -> &'static str {
        match self {
            EmbeddingBackend::Simple { .. } => "simple",
            #[cfg(feature = "fastembed-engine")]
            EmbeddingBackend::FastEmbed { .. } => "fastembed",
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            EmbeddingBackend::Simple { model, .. } => model,
            #[cfg(feature = "fastembed-engine")]
            EmbeddingBackend::FastEmbed { model } => model,
        }
    }

    pub fn with_default_model(id: &str) -> Option<Self> {
        match id {
            "simple" => Some(EmbeddingBackend::Simple {
                model: default_simple_model(),
                dimensions: default_simple_dim(),
            }),
            #[cfg(feature = "fastembed-engine")]
            "fastembed" => Some(EmbeddingBackend::FastEmbed {
                model: crate::infrastructure::DEFAULT_FASTEMBED_MODEL.to_string(),
            }),
            _ => None,
        }
    }
}

impl Default for EmbeddingBackend {
    fn default() -> Self {
        EmbeddingBackend::Simple {
            model: default_simple_model(),
            dimensions: default_simple_dim(),
        }
    }
}

/// Whether conversations are indexed at all, and which fields feed the embedder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SemanticSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_index_fields")]
    pub index_fields: Vec<String>,
}

impl Default for SemanticSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            index_fields: default_index_fields(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemorySettings {
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
    #[serde(default = "default_sentiment")]
    pub default_sentiment: String,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
            context_limit: default_context_limit(),
            default_sentiment: default_sentiment(),
        }
    }
}

/// Complete persisted configuration payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub embedding: EmbeddingBackend,
    #[serde(default)]
    pub semantic: SemanticSettings,
    #[serde(default)]
    pub memory: MemorySettings,
}

impl AppConfig {
    pub fn memory_config(&self) -> MemoryConfig {
        MemoryConfig {
            search_limit: self.memory.search_limit,
            context_limit: self.memory.context_limit,
            conversation_defaults: ConversationDefaults {
                sentiment: self.memory.default_sentiment.clone(),
                ..ConversationDefaults::default()
            },
        }
    }

    pub fn index_config(&self) -> SemanticIndexConfig {
        SemanticIndexConfig::new(self.embedding.model_name())
            .with_fields(self.semantic.index_fields.iter().cloned())
    }
}

/// Thread-safe manager responsible for loading and persisting `AppConfig`.
pub struct ConfigManager {
    path: PathBuf,
    state: RwLock<AppConfig>,
}

impl ConfigManager {
    /// Loads `<data_dir>/config.json`. A missing file or one that fails to
    /// parse yields defaults; any other read error is returned.
    pub fn load(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = data_dir.as_ref().join(CONFIG_FILENAME);
        let config = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<AppConfig>(&bytes) {
                Ok(config) => config,
                Err(err) => {
                    warn!(
                        target: "dualstore::settings",
                        path = %path.display(),
                        error = %err,
                        "ignoring malformed config, using defaults"
                    );
                    AppConfig::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
            Err(err) => return Err(err),
        };

        Ok(Self {
            path,
            state: RwLock::new(config),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current configuration.
    pub fn current(&self) -> AppConfig {
        self.state.read().clone()
    }

    /// Update the active embedding backend and persist to disk.
    pub fn set_backend(&self, backend: EmbeddingBackend) -> std::io::Result<AppConfig> {
        self.update(|config| config.embedding = backend)
    }

    /// Turn conversation indexing on or off and persist to disk.
    pub fn set_semantic_enabled(&self, enabled: bool) -> std::io::Result<AppConfig> {
        self.update(|config| config.semantic.enabled = enabled)
    }

    /// Write the current configuration to disk, e.g. to seed a default file.
    pub fn persist(&self) -> std::io::Result<()> {
        let guard = self.state.read();
        self.persist_locked(&guard)
    }

    fn update(&self, apply: impl FnOnce(&mut AppConfig)) -> std::io::Result<AppConfig> {
        let mut guard = self.state.write();
        apply(&mut *guard);
        self.persist_locked(&guard)?;
        Ok(guard.clone())
    }

    /// Ensure the backing directory exists and write the JSON payload.
    fn persist_locked(&self, config: &AppConfig) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec_pretty(config)?;
        fs::write(&self.path, payload)
    }
}

const fn default_simple_dim() -> usize {
    DEFAULT_SIMPLE_DIMENSIONS
}

fn default_simple_model() -> String {
    DEFAULT_SIMPLE_MODEL.to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_search_limit() -> usize {
    3
}

const fn default_context_limit() -> usize {
    2
}

fn default_sentiment() -> String {
    "neutral".to_string()
}

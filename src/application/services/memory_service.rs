use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::{
    application::dtos::{ContextBundle, ConversationDefaults, ConversationInput, HealthStatusResponse},
    domain::{Document, DomainError, Item, Namespace, SearchItem},
};

const USER_DATA_SEGMENT: &str = "user_data";
const CONVERSATIONS_SEGMENT: &str = "conversations";
const PREFERENCES_KEY: &str = "preferences";
const CONVERSATION_KEY_PREFIX: &str = "conv_";

/// Tunables for the façade. Every field has a fixed default.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Limit used by [`MemoryManager::search_similar_conversations_default`].
    pub search_limit: usize,
    /// Number of conversations pulled into a [`ContextBundle`].
    pub context_limit: usize,
    pub conversation_defaults: ConversationDefaults,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            search_limit: 3,
            context_limit: 2,
            conversation_defaults: ConversationDefaults::default(),
        }
    }
}

/// Abstraction over any embedding engine (deterministic hashing, fastembed, ...).
pub trait EmbeddingEngine: Send + Sync {
    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, DomainError>;

    fn dims(&self, _model: &str) -> Option<usize> {
        None
    }
}

/// Exact-match key-value storage for structured data.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn put(&self, namespace: &Namespace, key: &str, value: Document)
        -> Result<(), DomainError>;

    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<Item>, DomainError>;

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

/// Similarity search storage. Results come back in relevance order.
#[async_trait]
pub trait SemanticStore: Send + Sync {
    async fn put(&self, namespace: &Namespace, key: &str, value: Document)
        -> Result<(), DomainError>;

    async fn search(
        &self,
        namespace_prefix: &Namespace,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchItem>, DomainError>;

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

/// Application-level memory for an agent: structured preferences in one store,
/// searchable conversations in an optional second one.
///
/// When no semantic store is configured, conversation writes are skipped and
/// searches return nothing. Every other failure comes back to the caller as is.
pub struct MemoryManager {
    regular: Arc<dyn KeyValueStore>,
    semantic: Option<Arc<dyn SemanticStore>>,
    config: MemoryConfig,
}

impl MemoryManager {
    pub fn new(
        regular: Arc<dyn KeyValueStore>,
        semantic: Option<Arc<dyn SemanticStore>>,
        config: MemoryConfig,
    ) -> Self {
        Self {
            regular,
            semantic,
            config,
        }
    }

    pub fn regular_only(regular: Arc<dyn KeyValueStore>) -> Self {
        Self::new(regular, None, MemoryConfig::default())
    }

    pub fn has_semantic_store(&self) -> bool {
        self.semantic.is_some()
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub async fn store_user_preferences(
        &self,
        entity_id: &str,
        preferences: Document,
    ) -> Result<(), DomainError> {
        let namespace = Namespace::new([USER_DATA_SEGMENT, entity_id])?;
        debug!(target: "dualstore::memory", %namespace, "storing preferences");
        self.regular
            .put(&namespace, PREFERENCES_KEY, preferences)
            .await
    }

    pub async fn get_user_preferences(&self, entity_id: &str) -> Result<Document, DomainError> {
        let namespace = Namespace::new([USER_DATA_SEGMENT, entity_id])?;
        let item = self.regular.get(&namespace, PREFERENCES_KEY).await?;
        Ok(item.map(|item| item.value).unwrap_or_default())
    }

    pub async fn store_conversation_for_search(
        &self,
        entity_id: &str,
        conversation: ConversationInput,
    ) -> Result<(), DomainError> {
        let Some(semantic) = &self.semantic else {
            return Ok(());
        };

        let namespace = Namespace::new([CONVERSATIONS_SEGMENT, entity_id])?;
        let (id, record) = conversation.into_semantic_record(&self.config.conversation_defaults);
        let key = format!("{CONVERSATION_KEY_PREFIX}{id}");

        debug!(target: "dualstore::memory", %namespace, %key, "indexing conversation");
        semantic.put(&namespace, &key, record.to_document()?).await
    }

    pub async fn search_similar_conversations(
        &self,
        entity_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Document>, DomainError> {
        let Some(semantic) = &self.semantic else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let namespace = Namespace::new([CONVERSATIONS_SEGMENT, entity_id])?;
        let mut results = semantic.search(&namespace, query, limit).await?;
        // stores are external; don't trust them to honour the bound
        results.truncate(limit);

        debug!(
            target: "dualstore::memory",
            %namespace,
            hits = results.len(),
            "conversation search finished"
        );
        Ok(results.into_iter().map(SearchItem::into_value).collect())
    }

    pub async fn search_similar_conversations_default(
        &self,
        entity_id: &str,
        query: &str,
    ) -> Result<Vec<Document>, DomainError> {
        self.search_similar_conversations(entity_id, query, self.config.search_limit)
            .await
    }

    pub async fn get_context_for_response(
        &self,
        entity_id: &str,
        query: &str,
    ) -> Result<ContextBundle, DomainError> {
        let user_preferences = self.get_user_preferences(entity_id).await?;
        let relevant_conversations = self
            .search_similar_conversations(entity_id, query, self.config.context_limit)
            .await?;

        Ok(ContextBundle {
            user_preferences,
            relevant_conversations,
            query: query.to_string(),
        })
    }

    pub async fn health(&self) -> Result<HealthStatusResponse, DomainError> {
        self.regular.ping().await?;
        if let Some(semantic) = &self.semantic {
            semantic.ping().await?;
        }

        let mode = if self.has_semantic_store() {
            "dual-store"
        } else {
            "regular-only"
        };

        Ok(HealthStatusResponse {
            ok: true,
            message: "ready".into(),
            details: Some(format!("mode: {mode}, checked_at: {}", Utc::now())),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::infrastructure::{InMemoryKeyValueStore, InMemorySemanticStore, SimpleEmbedEngine};

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn regular_only() -> MemoryManager {
        MemoryManager::regular_only(Arc::new(InMemoryKeyValueStore::new()))
    }

    fn dual() -> (MemoryManager, Arc<InMemorySemanticStore>) {
        let semantic = Arc::new(InMemorySemanticStore::new(
            Arc::new(SimpleEmbedEngine::default()),
            "dualstore/simple-hash",
        ));
        let manager = MemoryManager::new(
            Arc::new(InMemoryKeyValueStore::new()),
            Some(semantic.clone() as Arc<dyn SemanticStore>),
            MemoryConfig::default(),
        );
        (manager, semantic)
    }

    struct FailingStore;

    #[async_trait]
    impl KeyValueStore for FailingStore {
        async fn put(&self, _: &Namespace, _: &str, _: Document) -> Result<(), DomainError> {
            Err(DomainError::storage("disk on fire"))
        }

        async fn get(&self, _: &Namespace, _: &str) -> Result<Option<Item>, DomainError> {
            Err(DomainError::storage("disk on fire"))
        }

        async fn ping(&self) -> Result<(), DomainError> {
            Err(DomainError::storage("disk on fire"))
        }
    }

    /// Returns more hits than asked for.
    struct GreedySemanticStore;

    #[async_trait]
    impl SemanticStore for GreedySemanticStore {
        async fn put(&self, _: &Namespace, _: &str, _: Document) -> Result<(), DomainError> {
            Ok(())
        }

        async fn search(
            &self,
            namespace_prefix: &Namespace,
            _: &str,
            _: usize,
        ) -> Result<Vec<SearchItem>, DomainError> {
            Ok((0..10)
                .map(|i| SearchItem {
                    item: Item::written(
                        None,
                        namespace_prefix.clone(),
                        format!("conv_{i}"),
                        doc(json!({ "text": i })),
                    ),
                    score: Some(1.0),
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn example_scenario_without_semantic_store() {
        let manager = regular_only();
        manager
            .store_user_preferences("e1", doc(json!({"theme": "dark"})))
            .await
            .unwrap();

        let prefs = manager.get_user_preferences("e1").await.unwrap();
        assert_eq!(prefs, doc(json!({"theme": "dark"})));

        let hits = manager
            .search_similar_conversations_default("e1", "anything")
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn missing_preferences_are_empty() {
        let manager = regular_only();
        assert!(manager.get_user_preferences("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn preferences_are_scoped_per_entity() {
        let manager = regular_only();
        manager
            .store_user_preferences("e1", doc(json!({"theme": "dark"})))
            .await
            .unwrap();
        manager
            .store_user_preferences("e2", doc(json!({"theme": "light", "lang": "id"})))
            .await
            .unwrap();

        assert_eq!(
            manager.get_user_preferences("e1").await.unwrap(),
            doc(json!({"theme": "dark"}))
        );
        assert_eq!(
            manager.get_user_preferences("e2").await.unwrap(),
            doc(json!({"theme": "light", "lang": "id"}))
        );
    }

    #[tokio::test]
    async fn semantic_calls_degrade_without_store() {
        let manager = regular_only();
        manager
            .store_conversation_for_search("", ConversationInput::default())
            .await
            .unwrap();
        let hits = manager
            .search_similar_conversations("", "", 50)
            .await
            .unwrap();
        assert!(hits.is_empty());

        let bundle = manager.get_context_for_response("e1", "hello").await.unwrap();
        assert!(bundle.relevant_conversations.is_empty());
        assert_eq!(bundle.query, "hello");
    }

    #[tokio::test]
    async fn conversation_is_stored_with_defaults() {
        let (manager, semantic) = dual();
        manager
            .store_conversation_for_search("e1", ConversationInput::new("rust borrow checker"))
            .await
            .unwrap();

        let namespace = Namespace::new(["conversations", "e1"]).unwrap();
        let stored = semantic.get(&namespace, "conv_unknown").unwrap();
        assert_eq!(stored.value["text"], "rust borrow checker");
        assert_eq!(stored.value["topics"], json!([]));
        assert_eq!(stored.value["sentiment"], "neutral");
        assert!(stored.value["timestamp"].is_null());
    }

    #[tokio::test]
    async fn search_finds_related_conversation_first() {
        let (manager, _) = dual();
        let conversations = [
            ("c1", "favourite pizza toppings and cheese"),
            ("c2", "rust async runtime tokio tasks"),
            ("c3", "weekend hiking trip in the mountains"),
            ("c4", "tokio runtime spawn blocking tasks"),
        ];
        for (id, text) in conversations {
            manager
                .store_conversation_for_search("e1", ConversationInput::new(text).with_id(id))
                .await
                .unwrap();
        }

        let hits = manager
            .search_similar_conversations("e1", "tokio runtime tasks", 3)
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
        let first = hits[0]["text"].as_str().unwrap();
        assert!(first.contains("tokio"), "unexpected top hit: {first}");
    }

    #[tokio::test]
    async fn search_respects_limit_and_entity_scope() {
        let (manager, _) = dual();
        for i in 0..5 {
            manager
                .store_conversation_for_search(
                    "e1",
                    ConversationInput::new(format!("note number {i}")).with_id(i.to_string()),
                )
                .await
                .unwrap();
        }
        manager
            .store_conversation_for_search("e2", ConversationInput::new("note for someone else"))
            .await
            .unwrap();

        for limit in [0, 1, 2, 5, 10] {
            let hits = manager
                .search_similar_conversations("e1", "note", limit)
                .await
                .unwrap();
            assert!(hits.len() <= limit);
            assert!(hits.iter().all(|hit| hit["text"] != "note for someone else"));
        }
        let hits = manager
            .search_similar_conversations("e1", "note", 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 5);
    }

    #[tokio::test]
    async fn over_eager_store_is_truncated() {
        let manager = MemoryManager::new(
            Arc::new(InMemoryKeyValueStore::new()),
            Some(Arc::new(GreedySemanticStore) as Arc<dyn SemanticStore>),
            MemoryConfig::default(),
        );
        let hits = manager
            .search_similar_conversations("e1", "anything", 3)
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);

        let bundle = manager.get_context_for_response("e1", "anything").await.unwrap();
        assert_eq!(bundle.relevant_conversations.len(), 2);
    }

    #[tokio::test]
    async fn context_bundle_blends_both_stores() {
        let (manager, _) = dual();
        manager
            .store_user_preferences("e1", doc(json!({"style": "concise"})))
            .await
            .unwrap();
        for (id, text) in [
            ("a", "deploying the service to kubernetes"),
            ("b", "kubernetes pod crash loop"),
            ("c", "kubernetes ingress config"),
        ] {
            manager
                .store_conversation_for_search("e1", ConversationInput::new(text).with_id(id))
                .await
                .unwrap();
        }

        let query = "  kubernetes   troubles ";
        let bundle = manager.get_context_for_response("e1", query).await.unwrap();
        assert_eq!(bundle.query, query);
        assert_eq!(bundle.user_preferences, doc(json!({"style": "concise"})));
        assert_eq!(bundle.relevant_conversations.len(), 2);
    }

    #[tokio::test]
    async fn store_failures_propagate() {
        let manager = MemoryManager::regular_only(Arc::new(FailingStore));
        let err = manager.get_user_preferences("e1").await.unwrap_err();
        assert!(matches!(err, DomainError::Storage(_)));
        let err = manager
            .store_user_preferences("e1", Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Storage(_)));
        assert!(manager.get_context_for_response("e1", "q").await.is_err());
        assert!(manager.health().await.is_err());
    }

    #[tokio::test]
    async fn whitespace_entity_id_round_trips() {
        let manager = regular_only();
        manager
            .store_user_preferences(" ", doc(json!({"theme": "dark"})))
            .await
            .unwrap();
        assert_eq!(
            manager.get_user_preferences(" ").await.unwrap(),
            doc(json!({"theme": "dark"}))
        );
        assert!(manager.get_user_preferences("  ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_entity_id_is_rejected() {
        let manager = regular_only();
        let err = manager.get_user_preferences("").await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn health_reports_mode() {
        let (manager, _) = dual();
        let status = manager.health().await.unwrap();
        assert!(status.ok);
        assert!(status.details.unwrap().contains("dual-store"));

        let status = regular_only().health().await.unwrap();
        assert!(status.details.unwrap().contains("regular-only"));
    }
}

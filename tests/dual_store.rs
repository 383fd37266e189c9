use std::sync::Arc;

use serde_json::json;
use tempfile::tempdir;

use dualstore::{
    build_environment_at, infrastructure::InMemoryKeyValueStore, settings::ConfigManager,
    ConversationInput, Document, MemoryManager,
};

fn doc(value: serde_json::Value) -> Document {
    value.as_object().cloned().expect("object literal")
}

#[tokio::test]
async fn regular_only_example_scenario() {
    let manager = MemoryManager::regular_only(Arc::new(InMemoryKeyValueStore::new()));

    manager
        .store_user_preferences("e1", doc(json!({"theme": "dark"})))
        .await
        .unwrap();
    assert_eq!(
        manager.get_user_preferences("e1").await.unwrap(),
        doc(json!({"theme": "dark"}))
    );
    assert!(manager
        .search_similar_conversations_default("e1", "anything")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn persistent_environment_blends_both_stores() {
    let dir = tempdir().unwrap();

    {
        let handles = build_environment_at(dir.path()).unwrap();
        let manager = &handles.manager;
        assert!(manager.has_semantic_store());

        manager
            .store_user_preferences("user_123", doc(json!({"tone": "casual"})))
            .await
            .unwrap();
        for (id, text, topics) in [
            ("1", "nightly build failed on integration tests", vec!["ci"]),
            ("2", "favourite hiking trails nearby", vec!["casual"]),
            ("3", "build cache invalidation broke the release build", vec!["ci"]),
        ] {
            manager
                .store_conversation_for_search(
                    "user_123",
                    ConversationInput::new(text).with_id(id).with_topics(topics),
                )
                .await
                .unwrap();
        }
        manager.health().await.unwrap();
    }

    let handles = build_environment_at(dir.path()).unwrap();
    let bundle = handles
        .manager
        .get_context_for_response("user_123", "why did the build fail")
        .await
        .unwrap();

    assert_eq!(bundle.query, "why did the build fail");
    assert_eq!(bundle.user_preferences, doc(json!({"tone": "casual"})));
    assert_eq!(bundle.relevant_conversations.len(), 2);
    for conversation in &bundle.relevant_conversations {
        assert!(conversation["text"].as_str().unwrap().contains("build"));
        assert_eq!(conversation["sentiment"], "neutral");
    }
}

#[tokio::test]
async fn disabling_semantic_settings_degrades_gracefully() {
    let dir = tempdir().unwrap();
    ConfigManager::load(dir.path())
        .unwrap()
        .set_semantic_enabled(false)
        .unwrap();

    let handles = build_environment_at(dir.path()).unwrap();
    let manager = &handles.manager;
    assert!(!manager.has_semantic_store());

    manager
        .store_conversation_for_search("e1", ConversationInput::new("ignored"))
        .await
        .unwrap();
    let bundle = manager.get_context_for_response("e1", "ignored").await.unwrap();
    assert!(bundle.relevant_conversations.is_empty());
    assert!(bundle.user_preferences.is_empty());
}

//! Walks through the agent memory flow against the persistent stores:
//! remember a preference, learn from a few exchanges, then assemble the context
//! a supervisor would route on.
//!
//! # Environment Variables
//!
//! - `DUALSTORE_LOG`: logging level (trace, debug, info, warn, error)
//! - `DUALSTORE_DATA_DIR`: override data directory location

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use dualstore::{build_environment, init_tracing, ConversationInput, Document};

const ENTITY_ID: &str = "user_123";

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        eprintln!("[dualstore::memory-demo] failed: {err:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let handles = build_environment().context("failed to bootstrap memory environment")?;
    let manager = handles.manager;

    let mut preferences = Document::new();
    preferences.insert("theme".into(), json!("dark"));
    preferences.insert("tone".into(), json!("casual"));
    manager
        .store_user_preferences(ENTITY_ID, preferences)
        .await
        .context("failed to store preferences")?;

    let now = Utc::now();
    let exchanges = [
        (
            format!("chitchat_{}", now.timestamp()),
            "how was your weekend, any good hikes?",
            vec!["casual", "conversation"],
            "friendly",
        ),
        (
            format!("analysis_{}", now.timestamp()),
            "Analysis of: why did the nightly build fail on the integration stage",
            vec!["analysis", "deep_research"],
            "analytical",
        ),
    ];
    for (id, text, topics, sentiment) in exchanges {
        manager
            .store_conversation_for_search(
                ENTITY_ID,
                ConversationInput::new(text)
                    .with_id(id)
                    .with_topics(topics)
                    .with_sentiment(sentiment)
                    .with_timestamp(now),
            )
            .await
            .context("failed to store conversation")?;
    }

    let context = manager
        .get_context_for_response(ENTITY_ID, "the build failed again")
        .await
        .context("failed to assemble context")?;
    info!(
        target: "dualstore::demo",
        relevant = context.relevant_conversations.len(),
        "context assembled"
    );

    println!("{}", serde_json::to_string_pretty(&context)?);
    Ok(())
}

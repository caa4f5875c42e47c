// Memory Context Loader (spec §4.7): resolves user preferences and a
// persistent-context prompt block from an external memory store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::Result;

/// One recalled item from a memory store.
#[derive(Debug, Clone)]
pub struct MemoryItem {
    pub text: String,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, String>,
}

impl MemoryItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tags: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    fn has_any_tag(&self, wanted: &[&str]) -> bool {
        self.tags.iter().any(|t| wanted.contains(&t.as_str()))
    }
}

/// Options for a `recall` query.
#[derive(Debug, Clone, Default)]
pub struct RecallOptions {
    pub top_k: usize,
}

/// The minimal surface an external semantic memory service must expose
/// (spec §4.7). The core bundles an in-process default so the crate is
/// self-contained; a production caller is expected to supply its own
/// vector-backed implementation (out of scope per §1).
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn recall(&self, query: &str, options: RecallOptions) -> Result<Vec<MemoryItem>>;
    async fn remember(&self, text: &str, metadata: HashMap<String, String>) -> Result<()>;
}

/// In-process `MemoryStore`: stores every remembered item in an
/// append-only `Vec` and recalls by naive substring match, most-recent first.
/// Not a production semantic memory engine.
#[derive(Debug, Default)]
pub struct InMemoryMemoryStore {
    items: Arc<RwLock<Vec<MemoryItem>>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, item: MemoryItem) {
        self.items.write().await.push(item);
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn recall(&self, query: &str, options: RecallOptions) -> Result<Vec<MemoryItem>> {
        let query_lower = query.to_lowercase();
        let items = self.items.read().await;
        let mut matches: Vec<MemoryItem> = items
            .iter()
            .rev()
            .filter(|item| query.is_empty() || item.text.to_lowercase().contains(&query_lower))
            .cloned()
            .collect();
        if options.top_k > 0 {
            matches.truncate(options.top_k);
        }
        Ok(matches)
    }

    async fn remember(&self, text: &str, metadata: HashMap<String, String>) -> Result<()> {
        self.items
            .write()
            .await
            .push(MemoryItem::new(text).with_metadata(metadata));
        Ok(())
    }
}

/// Communication style preference, extracted from memory or supplied
/// explicitly by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStyle {
    Concise,
    Detailed,
    Technical,
    Casual,
}

/// Resolved user preferences (spec §3 `SystemContext`). Explicit
/// caller-supplied fields always win over memory-derived ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPreferences {
    pub name: Option<String>,
    pub language: Option<String>,
    pub communication_style: Option<CommunicationStyle>,
    pub code_style: Option<String>,
}

impl UserPreferences {
    /// Merges `memory_derived` into `self`, keeping any field already set on
    /// `self` (the explicit, caller-supplied preferences).
    fn merged_over(self, memory_derived: UserPreferences) -> Self {
        Self {
            name: self.name.or(memory_derived.name),
            language: self.language.or(memory_derived.language),
            communication_style: self
                .communication_style
                .or(memory_derived.communication_style),
            code_style: self.code_style.or(memory_derived.code_style),
        }
    }
}

const PREFERENCE_TAGS: [&str; 2] = ["preference", "user-preference"];

fn style_from_text(text: &str) -> Option<CommunicationStyle> {
    let lower = text.to_lowercase();
    if lower.contains("concise") || lower.contains("brief") {
        Some(CommunicationStyle::Concise)
    } else if lower.contains("detailed") || lower.contains("thorough") {
        Some(CommunicationStyle::Detailed)
    } else if lower.contains("technical") {
        Some(CommunicationStyle::Technical)
    } else if lower.contains("casual") || lower.contains("informal") {
        Some(CommunicationStyle::Casual)
    } else {
        None
    }
}

/// Extracts a `UserPreferences` from a preference-tagged memory item.
/// Structured metadata wins over text heuristics.
fn extract_preferences(item: &MemoryItem) -> UserPreferences {
    UserPreferences {
        name: item.metadata.get("name").cloned(),
        language: item.metadata.get("language").cloned(),
        communication_style: item
            .metadata
            .get("communication_style")
            .and_then(|s| match s.as_str() {
                "concise" => Some(CommunicationStyle::Concise),
                "detailed" => Some(CommunicationStyle::Detailed),
                "technical" => Some(CommunicationStyle::Technical),
                "casual" => Some(CommunicationStyle::Casual),
                _ => None,
            })
            .or_else(|| style_from_text(&item.text)),
        code_style: item.metadata.get("code_style").cloned(),
    }
}

/// Result of loading memory context for one agent initialisation.
#[derive(Debug, Clone, Default)]
pub struct MemoryContext {
    pub preferences: UserPreferences,
    /// The persistent-context block to prepend to the system prompt; empty
    /// string if nothing was recalled or the store failed.
    pub context_block: String,
}

/// Loads preferences and a persistent-context block from `store`. Failures
/// are non-fatal: an empty context is returned and a warning is logged.
pub async fn load_memory_context(
    store: &dyn MemoryStore,
    query: &str,
    explicit_preferences: UserPreferences,
) -> MemoryContext {
    let preference_items = match store
        .recall("user preferences communication style", RecallOptions { top_k: 5 })
        .await
    {
        Ok(items) => items,
        Err(err) => {
            warn!(error = %err, "memory store recall failed while loading preferences");
            return MemoryContext {
                preferences: explicit_preferences,
                context_block: String::new(),
            };
        }
    };

    let memory_derived = preference_items
        .iter()
        .filter(|item| item.has_any_tag(&PREFERENCE_TAGS))
        .map(extract_preferences)
        .fold(UserPreferences::default(), |acc, next| acc.merged_over(next));

    let preferences = explicit_preferences.merged_over(memory_derived);

    let context_items = match store.recall(query, RecallOptions { top_k: 10 }).await {
        Ok(items) => items,
        Err(err) => {
            warn!(error = %err, "memory store recall failed while loading context");
            return MemoryContext {
                preferences,
                context_block: String::new(),
            };
        }
    };

    let notes: Vec<&str> = context_items
        .iter()
        .filter(|item| !item.has_any_tag(&PREFERENCE_TAGS))
        .map(|item| item.text.as_str())
        .collect();

    let context_block = if notes.is_empty() {
        String::new()
    } else {
        format!(
            "<persistent-context>\n{}\n</persistent-context>",
            notes.join("\n")
        )
    };

    MemoryContext {
        preferences,
        context_block,
    }
}

/// A `MemoryStore` whose `recall`/`remember` always fail; used to exercise
/// the loader's non-fatal failure path.
pub struct FailingMemoryStore;

#[async_trait]
impl MemoryStore for FailingMemoryStore {
    async fn recall(&self, _query: &str, _options: RecallOptions) -> Result<Vec<MemoryItem>> {
        Err(crate::error::AgentLoopError::llm("memory store unreachable"))
    }

    async fn remember(&self, _text: &str, _metadata: HashMap<String, String>) -> Result<()> {
        Err(crate::error::AgentLoopError::llm("memory store unreachable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recall_returns_most_recently_remembered_first() {
        let store = InMemoryMemoryStore::new();
        store.remember("first note", HashMap::new()).await.unwrap();
        store.remember("second note", HashMap::new()).await.unwrap();
        let results = store.recall("note", RecallOptions { top_k: 10 }).await.unwrap();
        assert_eq!(results[0].text, "second note");
        assert_eq!(results[1].text, "first note");
    }

    #[tokio::test]
    async fn preferences_extracted_from_tagged_text_heuristic() {
        let store = InMemoryMemoryStore::new();
        store
            .seed(MemoryItem::new("user prefers concise answers").with_tags(vec!["preference".into()]))
            .await;
        let context = load_memory_context(&store, "", UserPreferences::default()).await;
        assert_eq!(
            context.preferences.communication_style,
            Some(CommunicationStyle::Concise)
        );
    }

    #[tokio::test]
    async fn structured_metadata_wins_over_text_heuristic() {
        let store = InMemoryMemoryStore::new();
        let mut metadata = HashMap::new();
        metadata.insert("communication_style".to_string(), "technical".to_string());
        store
            .seed(
                MemoryItem::new("user likes concise chats")
                    .with_tags(vec!["preference".into()])
                    .with_metadata(metadata),
            )
            .await;
        let context = load_memory_context(&store, "", UserPreferences::default()).await;
        assert_eq!(
            context.preferences.communication_style,
            Some(CommunicationStyle::Technical)
        );
    }

    #[tokio::test]
    async fn explicit_preferences_win_over_memory_derived() {
        let store = InMemoryMemoryStore::new();
        store
            .seed(MemoryItem::new("prefers casual tone").with_tags(vec!["preference".into()]))
            .await;
        let explicit = UserPreferences {
            communication_style: Some(CommunicationStyle::Detailed),
            ..Default::default()
        };
        let context = load_memory_context(&store, "", explicit).await;
        assert_eq!(
            context.preferences.communication_style,
            Some(CommunicationStyle::Detailed)
        );
    }

    #[tokio::test]
    async fn context_block_excludes_preference_tagged_items() {
        let store = InMemoryMemoryStore::new();
        store
            .seed(MemoryItem::new("prefers concise tone").with_tags(vec!["preference".into()]))
            .await;
        store.seed(MemoryItem::new("project deadline is Friday")).await;
        let context = load_memory_context(&store, "project", UserPreferences::default()).await;
        assert!(context.context_block.contains("project deadline is Friday"));
        assert!(!context.context_block.contains("prefers concise tone"));
    }

    #[tokio::test]
    async fn loader_failure_is_non_fatal() {
        let store = FailingMemoryStore;
        let context = load_memory_context(&store, "anything", UserPreferences::default()).await;
        assert_eq!(context.context_block, "");
        assert!(context.preferences.communication_style.is_none());
    }
}

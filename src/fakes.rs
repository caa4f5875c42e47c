// In-memory test doubles: `InMemoryEventEmitter`, `ChannelEventEmitter`,
// `NoOpEventEmitter`, `InMemoryMessageStore`, and `ScriptedLlmDriver`/
// `NoopLlmDriver` helpers shared by this crate's own test suites.

use async_trait::async_trait;
use futures::stream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::events::LoopEvent;
use crate::llm::{
    LlmCallConfig, LlmCompletionMetadata, LlmDriver, LlmMessage, LlmResponseStream, LlmStreamEvent,
};
use crate::message::Message;
use crate::tool::ToolCall;
use crate::traits::{EventEmitter, MessageStore};

/// Collects every emitted event in memory. Used by tests that assert on
/// exact event ordering (spec §5's ordering guarantees).
#[derive(Debug, Default)]
pub struct InMemoryEventEmitter {
    events: Arc<RwLock<Vec<LoopEvent>>>,
}

impl InMemoryEventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<LoopEvent> {
        self.events.read().await.clone()
    }

    pub async fn clear(&self) {
        self.events.write().await.clear();
    }

    pub async fn count(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl EventEmitter for InMemoryEventEmitter {
    async fn emit(&self, event: LoopEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}

/// Broadcasts events to any number of subscribers. Useful for relaying a
/// sub-agent's events to a parent stream alongside the parent's own.
pub struct ChannelEventEmitter {
    sender: tokio::sync::broadcast::Sender<LoopEvent>,
}

impl ChannelEventEmitter {
    pub fn new(capacity: usize) -> (Self, tokio::sync::broadcast::Receiver<LoopEvent>) {
        let (sender, receiver) = tokio::sync::broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<LoopEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventEmitter for ChannelEventEmitter {
    async fn emit(&self, event: LoopEvent) -> Result<()> {
        let _ = self.sender.send(event);
        Ok(())
    }
}

/// Discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpEventEmitter;

#[async_trait]
impl EventEmitter for NoOpEventEmitter {
    async fn emit(&self, _event: LoopEvent) -> Result<()> {
        Ok(())
    }
}

/// Keeps conversation history in a `HashMap` keyed by session id.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMessageStore {
    messages: Arc<RwLock<HashMap<Uuid, Vec<Message>>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sessions(&self) -> Vec<Uuid> {
        self.messages.read().await.keys().copied().collect()
    }

    pub async fn clear(&self) {
        self.messages.write().await.clear();
    }

    pub async fn clear_session(&self, session_id: Uuid) {
        self.messages.write().await.remove(&session_id);
    }

    pub async fn seed(&self, session_id: Uuid, messages: Vec<Message>) {
        self.messages.write().await.insert(session_id, messages);
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn store(&self, session_id: Uuid, message: Message) -> Result<()> {
        self.messages
            .write()
            .await
            .entry(session_id)
            .or_default()
            .push(message);
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<Vec<Message>> {
        Ok(self
            .messages
            .read()
            .await
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// A queued response for `ScriptedLlmDriver`.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub text: String,
    pub reasoning: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ScriptedResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reasoning: None,
            tool_calls: None,
        }
    }

    pub fn with_tools(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            text: text.into(),
            reasoning: None,
            tool_calls: Some(tool_calls),
        }
    }
}

/// An `LlmDriver` test double that replays a queue of scripted responses in
/// order, falling back to a fixed string once the queue is exhausted.
#[derive(Debug, Default)]
pub struct ScriptedLlmDriver {
    responses: Arc<RwLock<Vec<ScriptedResponse>>>,
    call_index: Arc<RwLock<usize>>,
    call_log: Arc<RwLock<Vec<Vec<LlmMessage>>>>,
}

impl ScriptedLlmDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_response(&self, response: ScriptedResponse) {
        self.responses.write().await.push(response);
    }

    pub async fn set_responses(&self, responses: Vec<ScriptedResponse>) {
        *self.responses.write().await = responses;
        *self.call_index.write().await = 0;
    }

    pub async fn call_count(&self) -> usize {
        self.call_log.read().await.len()
    }

    pub async fn reset(&self) {
        self.responses.write().await.clear();
        *self.call_index.write().await = 0;
        self.call_log.write().await.clear();
    }
}

#[async_trait]
impl LlmDriver for ScriptedLlmDriver {
    async fn chat_completion_stream(
        &self,
        messages: Vec<LlmMessage>,
        _config: &LlmCallConfig,
    ) -> Result<LlmResponseStream> {
        self.call_log.write().await.push(messages);

        let mut index = self.call_index.write().await;
        let responses = self.responses.read().await;
        let response = responses.get(*index).cloned().unwrap_or_else(|| {
            ScriptedResponse::text("scripted response (queue exhausted)")
        });
        *index += 1;
        drop(index);
        drop(responses);

        let mut events = vec![Ok(LlmStreamEvent::TextDelta(response.text))];
        if let Some(reasoning) = response.reasoning {
            events.push(Ok(LlmStreamEvent::ReasoningDelta(reasoning)));
        }
        if let Some(tool_calls) = response.tool_calls {
            events.push(Ok(LlmStreamEvent::ToolCalls(tool_calls)));
        }
        events.push(Ok(LlmStreamEvent::Done(LlmCompletionMetadata::default())));

        Ok(Box::pin(stream::iter(events)))
    }
}

/// An `LlmDriver` that always returns empty text and no tool calls. Useful as
/// a safe default when no driver is configured in a test harness.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLlmDriver;

#[async_trait]
impl LlmDriver for NoopLlmDriver {
    async fn chat_completion_stream(
        &self,
        _messages: Vec<LlmMessage>,
        _config: &LlmCallConfig,
    ) -> Result<LlmResponseStream> {
        let events = vec![
            Ok(LlmStreamEvent::TextDelta(String::new())),
            Ok(LlmStreamEvent::Done(LlmCompletionMetadata::default())),
        ];
        Ok(Box::pin(stream::iter(events)))
    }
}

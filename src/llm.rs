// LLM provider abstraction (external collaborator interface; spec §1, §6).
// The provider catalog itself (model routing, multi-provider selection) is
// out of scope per Non-goal (c); this trait is the minimal seam the
// tool-loop depends on, plus a bundled reference implementation in
// `llm_openai.rs`.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::error::Result;
use crate::message::{Message, MessageRole};
use crate::tool::{ToolCall, ToolSpec};

pub type LlmResponseStream = Pin<Box<dyn Stream<Item = Result<LlmStreamEvent>> + Send>>;

/// Events emitted while a single model call streams in.
#[derive(Debug, Clone)]
pub enum LlmStreamEvent {
    TextDelta(String),
    ReasoningDelta(String),
    ToolCalls(Vec<ToolCall>),
    Done(LlmCompletionMetadata),
}

#[derive(Debug, Clone, Default)]
pub struct LlmCompletionMetadata {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub model: Option<String>,
    pub finish_reason: Option<String>,
}

/// Message format for a model call.
#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: LlmMessageRole,
    pub content: LlmMessageContent,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tool_call_id: Option<String>,
}

impl LlmMessage {
    pub fn text(role: LlmMessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: LlmMessageContent::Text(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn content_as_text(&self) -> String {
        self.content.to_text()
    }
}

/// Message content: plain text, or multipart (text/image/audio) for
/// multimodal providers.
#[derive(Debug, Clone)]
pub enum LlmMessageContent {
    Text(String),
    Parts(Vec<LlmContentPart>),
}

impl LlmMessageContent {
    pub fn to_text(&self) -> String {
        match self {
            LlmMessageContent::Text(s) => s.clone(),
            LlmMessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    LlmContentPart::Text { text } => Some(text.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

#[derive(Debug, Clone)]
pub enum LlmContentPart {
    Text { text: String },
    Image { url: String },
    Audio { url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmMessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Configuration for a single model call.
#[derive(Debug, Clone)]
pub struct LlmCallConfig {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tools: Vec<ToolSpec>,
}

/// Non-streaming view of a model call's result.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub reasoning: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub metadata: LlmCompletionMetadata,
}

#[async_trait]
pub trait LlmDriver: Send + Sync {
    async fn chat_completion_stream(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponseStream>;

    /// Convenience wrapper draining the stream into one response.
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponse> {
        use futures::StreamExt;

        let mut stream = self.chat_completion_stream(messages, config).await?;
        let mut text = String::new();
        let mut reasoning: Option<String> = None;
        let mut tool_calls = Vec::new();
        let mut metadata = LlmCompletionMetadata::default();

        while let Some(event) = stream.next().await {
            match event? {
                LlmStreamEvent::TextDelta(delta) => text.push_str(&delta),
                LlmStreamEvent::ReasoningDelta(delta) => {
                    reasoning.get_or_insert_with(String::new).push_str(&delta);
                }
                LlmStreamEvent::ToolCalls(calls) => tool_calls = calls,
                LlmStreamEvent::Done(meta) => metadata = meta,
            }
        }

        Ok(LlmResponse {
            text,
            reasoning,
            tool_calls,
            metadata,
        })
    }
}

impl From<&Message> for LlmMessage {
    fn from(msg: &Message) -> Self {
        let role = match &msg.role {
            MessageRole::System => LlmMessageRole::System,
            MessageRole::User => LlmMessageRole::User,
            MessageRole::Assistant => LlmMessageRole::Assistant,
            MessageRole::ToolCall => LlmMessageRole::Assistant,
            MessageRole::ToolResult => LlmMessageRole::Tool,
        };

        LlmMessage {
            role,
            content: LlmMessageContent::Text(msg.content.to_llm_string()),
            tool_calls: msg.tool_calls.clone(),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

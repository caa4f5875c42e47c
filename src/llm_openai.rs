// OpenAI-protocol LLM driver: the bundled reference implementation of
// `LlmDriver` (spec §3a). Not the product surface — any OpenAI-compatible
// endpoint (self-hosted, Azure, etc.) works via `with_base_url`. Plain-text
// only on the wire; no multipart image/audio parts.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use crate::error::{AgentLoopError, Result};
use crate::llm::{
    LlmCallConfig, LlmCompletionMetadata, LlmDriver, LlmMessage, LlmMessageRole,
    LlmResponseStream, LlmStreamEvent,
};
use crate::tool::{ToolCall, ToolSpec};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Bundled reference `LlmDriver` for OpenAI-protocol chat completion
/// endpoints, with streaming text and tool-call support.
#[derive(Clone)]
pub struct OpenAiProtocolDriver {
    client: Client,
    api_key: String,
    api_url: String,
}

impl OpenAiProtocolDriver {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AgentLoopError::llm("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into(),
        }
    }

    fn convert_role(role: LlmMessageRole) -> &'static str {
        match role {
            LlmMessageRole::System => "system",
            LlmMessageRole::User => "user",
            LlmMessageRole::Assistant => "assistant",
            LlmMessageRole::Tool => "tool",
        }
    }

    fn convert_message(msg: &LlmMessage) -> OpenAiMessage {
        OpenAiMessage {
            role: Self::convert_role(msg.role).to_string(),
            content: Some(msg.content_as_text()),
            tool_calls: msg.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|tc| OpenAiToolCall {
                        id: tc.id.clone(),
                        r#type: "function".to_string(),
                        function: OpenAiFunctionCall {
                            name: tc.name.clone(),
                            arguments: serde_json::to_string(&tc.arguments).unwrap_or_default(),
                        },
                    })
                    .collect()
            }),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }

    fn convert_tools(tools: &[ToolSpec]) -> Vec<OpenAiTool> {
        tools
            .iter()
            .map(|tool| OpenAiTool {
                r#type: "function".to_string(),
                function: OpenAiFunction {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.input_schema.clone(),
                },
            })
            .collect()
    }
}

impl std::fmt::Debug for OpenAiProtocolDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProtocolDriver")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl LlmDriver for OpenAiProtocolDriver {
    async fn chat_completion_stream(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponseStream> {
        let openai_messages: Vec<OpenAiMessage> =
            messages.iter().map(Self::convert_message).collect();

        let tools = if config.tools.is_empty() {
            None
        } else {
            Some(Self::convert_tools(&config.tools))
        };

        let request = OpenAiRequest {
            model: config.model.clone(),
            messages: openai_messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stream: true,
            tools,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentLoopError::llm(format!("failed to send request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AgentLoopError::llm(format!(
                "OpenAI API error ({status}): {error_text}"
            )));
        }

        let event_stream = response.bytes_stream().eventsource();

        let model = config.model.clone();
        let completion_tokens = Arc::new(Mutex::new(0u64));
        let accumulated_tool_calls = Arc::new(Mutex::new(Vec::<ToolCall>::new()));

        let converted_stream: LlmResponseStream = Box::pin(event_stream.filter_map(move |result| {
            let model = model.clone();
            let completion_tokens = Arc::clone(&completion_tokens);
            let accumulated_tool_calls = Arc::clone(&accumulated_tool_calls);

            async move {
                match result {
                    Ok(event) => {
                        if event.data == "[DONE]" {
                            let tokens = *completion_tokens.lock().unwrap();
                            return Some(Ok(LlmStreamEvent::Done(LlmCompletionMetadata {
                                prompt_tokens: None,
                                completion_tokens: Some(tokens),
                                model: Some(model),
                                finish_reason: Some("stop".to_string()),
                            })));
                        }

                        match serde_json::from_str::<OpenAiStreamChunk>(&event.data) {
                            Ok(chunk) => {
                                let choice = chunk.choices.first()?;

                                if let Some(tool_calls) = &choice.delta.tool_calls {
                                    let mut acc = accumulated_tool_calls.lock().unwrap();
                                    for tc in tool_calls {
                                        let idx = tc.index as usize;
                                        while acc.len() <= idx {
                                            acc.push(ToolCall {
                                                id: String::new(),
                                                name: String::new(),
                                                arguments: json!(""),
                                            });
                                        }
                                        if let Some(id) = &tc.id {
                                            acc[idx].id = id.clone();
                                        }
                                        if let Some(function) = &tc.function {
                                            if let Some(name) = &function.name {
                                                acc[idx].name = name.clone();
                                            }
                                            if let Some(args) = &function.arguments {
                                                let current =
                                                    acc[idx].arguments.as_str().unwrap_or("");
                                                acc[idx].arguments =
                                                    json!(format!("{current}{args}"));
                                            }
                                        }
                                    }
                                    return None;
                                }

                                if let Some(content) = &choice.delta.content {
                                    *completion_tokens.lock().unwrap() += 1;
                                    return Some(Ok(LlmStreamEvent::TextDelta(content.clone())));
                                }

                                if let Some(reasoning) = &choice.delta.reasoning_content {
                                    return Some(Ok(LlmStreamEvent::ReasoningDelta(
                                        reasoning.clone(),
                                    )));
                                }

                                if let Some(finish_reason) = &choice.finish_reason {
                                    let tokens = *completion_tokens.lock().unwrap();

                                    if finish_reason == "tool_calls" {
                                        let raw = accumulated_tool_calls.lock().unwrap().clone();
                                        if !raw.is_empty() {
                                            let parsed: Vec<ToolCall> = raw
                                                .into_iter()
                                                .map(|mut tc| {
                                                    if let Some(s) = tc.arguments.as_str() {
                                                        tc.arguments = serde_json::from_str(s)
                                                            .unwrap_or(json!({}));
                                                    }
                                                    tc
                                                })
                                                .collect();
                                            return Some(Ok(LlmStreamEvent::ToolCalls(parsed)));
                                        }
                                    }

                                    return Some(Ok(LlmStreamEvent::Done(LlmCompletionMetadata {
                                        prompt_tokens: None,
                                        completion_tokens: Some(tokens),
                                        model: Some(model),
                                        finish_reason: Some(finish_reason.clone()),
                                    })));
                                }

                                None
                            }
                            Err(e) => Some(Err(AgentLoopError::llm(format!(
                                "failed to parse stream chunk: {e}"
                            )))),
                        }
                    }
                    Err(e) => Some(Err(AgentLoopError::llm(format!("stream error: {e}")))),
                }
            }
        }));

        Ok(converted_stream)
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiTool {
    r#type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    r#type: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamToolCall {
    index: u32,
    id: Option<String>,
    function: Option<OpenAiStreamFunction>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

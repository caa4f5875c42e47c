// Tool-Loop Engine: the heart of the agent — iterates model call → tool
// calls → tool results → model call until a stop condition holds, streaming
// events as it goes.
//
// The loop runs as a spawned task feeding a channel rather than returning an
// owned future, so a caller gets a streaming result bearing an async
// iterable of events plus awaitable handles for final text and usage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::durable::{run_step, RuntimeDetector, StepConfig};
use crate::error::{AgentLoopError, Result};
use crate::events::LoopEvent;
use crate::guardrail::{GuardrailContext, GuardrailPhase, GuardrailRunner};
use crate::llm::{
    LlmCallConfig, LlmDriver, LlmMessage, LlmMessageContent, LlmMessageRole, LlmStreamEvent,
};
use crate::reflection::ReflectionStrategy;
use crate::step::TokenUsage;
use crate::tool::{ToolCall, ToolContext, ToolRegistry, ToolResult};

/// Per-run caps on input, output, total tokens, or request count (spec §3a).
/// `None` in any field means that dimension is unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageLimits {
    pub max_input_tokens: Option<u64>,
    pub max_output_tokens: Option<u64>,
    pub max_total_tokens: Option<u64>,
    pub max_requests: Option<u64>,
}

impl UsageLimits {
    /// Whether `usage`, accumulated over `requests` model calls, has crossed
    /// any configured limit. Returns the violated limit's name for the error
    /// message, or `None` if still within budget.
    fn exceeded(&self, usage: &TokenUsage, requests: u64) -> Option<&'static str> {
        if let Some(max) = self.max_input_tokens {
            if usage.prompt_tokens > max {
                return Some("max_input_tokens");
            }
        }
        if let Some(max) = self.max_output_tokens {
            if usage.completion_tokens > max {
                return Some("max_output_tokens");
            }
        }
        if let Some(max) = self.max_total_tokens {
            if usage.total() > max {
                return Some("max_total_tokens");
            }
        }
        if let Some(max) = self.max_requests {
            if requests > max {
                return Some("max_requests");
            }
        }
        None
    }
}

/// Cooperative cancellation flag handed to the caller alongside a
/// `StreamHandle`. Checked between steps and between tool invocations; does
/// not interrupt a tool already executing.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// The streamed result of one tool-loop run (spec §6 "Stream result").
pub struct StreamHandle {
    pub events: ReceiverStream<LoopEvent>,
    pub text: oneshot::Receiver<String>,
    pub usage: oneshot::Receiver<TokenUsage>,
    pub cancel: CancelHandle,
}

/// Iterates an LLM-driven tool loop to completion, emitting streaming events.
///
/// Construct with [`ToolLoopEngine::new`], configure with the `with_*`
/// builders, wrap in an `Arc`, then call [`ToolLoopEngine::stream`].
pub struct ToolLoopEngine {
    pub agent_id: String,
    pub tools: Arc<ToolRegistry>,
    pub llm: Arc<dyn LlmDriver>,
    pub system_prompt: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub max_steps: usize,
    pub usage_limits: Option<UsageLimits>,
    pub reflection_strategy: ReflectionStrategy,
    pub guardrails: Arc<GuardrailRunner>,
    pub runtime_detector: Arc<RuntimeDetector>,
}

impl ToolLoopEngine {
    pub fn new(
        agent_id: impl Into<String>,
        tools: Arc<ToolRegistry>,
        llm: Arc<dyn LlmDriver>,
        system_prompt: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            tools,
            llm,
            system_prompt: system_prompt.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
            max_steps: 25,
            usage_limits: None,
            reflection_strategy: ReflectionStrategy::default(),
            guardrails: Arc::new(GuardrailRunner::with_default_output_guardrails()),
            runtime_detector: Arc::new(RuntimeDetector::new()),
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_usage_limits(mut self, limits: UsageLimits) -> Self {
        self.usage_limits = Some(limits);
        self
    }

    pub fn with_reflection_strategy(mut self, strategy: ReflectionStrategy) -> Self {
        self.reflection_strategy = strategy;
        self
    }

    pub fn with_guardrails(mut self, guardrails: Arc<GuardrailRunner>) -> Self {
        self.guardrails = guardrails;
        self
    }

    pub fn with_runtime_detector(mut self, detector: Arc<RuntimeDetector>) -> Self {
        self.runtime_detector = detector;
        self
    }

    /// Starts a tool-loop run for `prompt`, returning a handle bearing the
    /// event stream and awaitable final text/usage (spec §6). The loop runs
    /// on a spawned task; dropping the handle's `events` stream does not stop
    /// the loop early (only cancelling it does).
    pub fn stream(self: &Arc<Self>, prompt: impl Into<String>) -> StreamHandle {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (text_tx, text_rx) = oneshot::channel();
        let (usage_tx, usage_rx) = oneshot::channel();
        let cancel_flag = Arc::new(AtomicBool::new(false));

        let engine = Arc::clone(self);
        let prompt = prompt.into();
        let run_cancel_flag = Arc::clone(&cancel_flag);

        tokio::spawn(async move {
            engine
                .run(prompt, event_tx, text_tx, usage_tx, run_cancel_flag)
                .await;
        });

        StreamHandle {
            events: ReceiverStream::new(event_rx),
            text: text_rx,
            usage: usage_rx,
            cancel: CancelHandle { flag: cancel_flag },
        }
    }

    async fn run(
        &self,
        prompt: String,
        events: mpsc::Sender<LoopEvent>,
        text_tx: oneshot::Sender<String>,
        usage_tx: oneshot::Sender<TokenUsage>,
        cancel: Arc<AtomicBool>,
    ) {
        let session_id = Uuid::now_v7().to_string();
        info!(agent_id = %self.agent_id, session_id = %session_id, "tool loop starting");
        let _ = events.send(LoopEvent::session_start(&session_id)).await;

        let mut conversation: Vec<LlmMessage> =
            vec![LlmMessage::text(LlmMessageRole::User, prompt)];
        let mut step_index = 0usize;
        let mut requests = 0u64;
        let mut total_usage = TokenUsage::default();
        let mut last_text = String::new();
        let mut tools_used = 0usize;
        let mut completed = false;

        loop {
            if cancel.load(Ordering::SeqCst) {
                let _ = events.send(LoopEvent::error("cancelled", "run was cancelled")).await;
                break;
            }

            let _ = events.send(LoopEvent::step_start(step_index)).await;
            let step_started_at = Instant::now();

            let system_prompt = crate::reflection::compose_system_prompt(
                self.reflection_strategy,
                step_index,
                &self.system_prompt,
                None,
            );

            let mut messages = Vec::with_capacity(conversation.len() + 1);
            messages.push(LlmMessage::text(LlmMessageRole::System, system_prompt));
            messages.extend(conversation.iter().cloned());

            let config = LlmCallConfig {
                model: self.model.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: self.tools.specs(),
            };

            let mut stream = match self.llm.chat_completion_stream(messages, &config).await {
                Ok(s) => s,
                Err(err) => {
                    warn!(error = %err, "llm call failed");
                    let _ = events.send(LoopEvent::error(err.code(), err.to_string())).await;
                    break;
                }
            };
            requests += 1;

            let mut step_text = String::new();
            let mut step_tool_calls: Vec<ToolCall> = Vec::new();
            let mut step_usage = TokenUsage::default();
            let mut call_failed = false;

            while let Some(event) = stream.next().await {
                match event {
                    Ok(LlmStreamEvent::TextDelta(delta)) => {
                        step_text.push_str(&delta);
                        let _ = events.send(LoopEvent::text_delta(delta, step_index)).await;
                    }
                    Ok(LlmStreamEvent::ReasoningDelta(delta)) => {
                        let _ = events
                            .send(LoopEvent::reasoning_delta(delta, step_index))
                            .await;
                    }
                    Ok(LlmStreamEvent::ToolCalls(calls)) => step_tool_calls = calls,
                    Ok(LlmStreamEvent::Done(meta)) => {
                        step_usage = TokenUsage {
                            prompt_tokens: meta.prompt_tokens.unwrap_or(0),
                            completion_tokens: meta.completion_tokens.unwrap_or(0),
                        };
                    }
                    Err(err) => {
                        warn!(error = %err, "llm stream failed mid-step");
                        let _ = events.send(LoopEvent::error(err.code(), err.to_string())).await;
                        call_failed = true;
                        break;
                    }
                }
            }

            if call_failed {
                break;
            }

            total_usage.add(step_usage);
            if !step_text.is_empty() {
                last_text = step_text.clone();
            }

            conversation.push(LlmMessage {
                role: LlmMessageRole::Assistant,
                content: LlmMessageContent::Text(step_text.clone()),
                tool_calls: if step_tool_calls.is_empty() {
                    None
                } else {
                    Some(step_tool_calls.clone())
                },
                tool_call_id: None,
            });

            // Stop condition (b): usage limits are evaluated after each model
            // call, ahead of any tool execution for this step.
            if let Some(limits) = &self.usage_limits {
                if let Some(violated) = limits.exceeded(&total_usage, requests) {
                    let message = format!("usage limit '{violated}' exceeded");
                    let _ = events
                        .send(LoopEvent::error("usage-limit-exceeded", message))
                        .await;
                    let _ = events
                        .send(LoopEvent::step_finish(
                            step_index,
                            step_started_at.elapsed().as_millis() as u64,
                        ))
                        .await;
                    break;
                }
            }

            // Stop condition (c): a terminal text with no tool calls.
            if step_tool_calls.is_empty() {
                let _ = events
                    .send(LoopEvent::step_finish(
                        step_index,
                        step_started_at.elapsed().as_millis() as u64,
                    ))
                    .await;
                completed = true;
                break;
            }

            let tool_ctx =
                ToolContext::new(self.agent_id.clone(), step_index).with_events(events.clone());
            let tool_results = self
                .execute_tool_calls(&step_tool_calls, &tool_ctx, &events, step_index, &cancel)
                .await;
            tools_used += tool_results.len();

            for result in &tool_results {
                conversation.push(LlmMessage {
                    role: LlmMessageRole::Tool,
                    content: LlmMessageContent::Text(tool_result_to_text(result)),
                    tool_calls: None,
                    tool_call_id: Some(result.tool_call_id.clone()),
                });
            }

            let _ = events
                .send(LoopEvent::step_finish(
                    step_index,
                    step_started_at.elapsed().as_millis() as u64,
                ))
                .await;

            // Stop condition (a): step count reached max_steps.
            if step_index + 1 >= self.max_steps {
                warn!(agent_id = %self.agent_id, max_steps = self.max_steps, "tool loop hit max steps with pending tool calls");
                break;
            }

            step_index += 1;
        }

        let steps_used = step_index + 1;
        let guardrail_ctx = GuardrailContext {
            prompt: None,
            phase: GuardrailPhase::Output,
        };
        let guarded = self.guardrails.run(&last_text, &guardrail_ctx).await;
        if guarded.blocked && !guarded.fired.is_empty() {
            warn!(fired = ?guarded.fired, "output guardrail flagged final text");
        }

        let _ = events
            .send(LoopEvent::complete(
                guarded.text.clone(),
                completed,
                !completed,
                steps_used,
                tools_used,
            ))
            .await;

        info!(agent_id = %self.agent_id, session_id = %session_id, completed, steps_used, "tool loop finished");

        let _ = text_tx.send(guarded.text);
        let _ = usage_tx.send(total_usage);
    }

    /// Executes one step's tool calls in issue-order, running consecutive
    /// runs of `is_independent()` tools concurrently via `join_all` (spec
    /// §4.9 point 3, §5's ordering guarantee — `join_all` preserves input
    /// order regardless of completion order).
    async fn execute_tool_calls(
        &self,
        calls: &[ToolCall],
        ctx: &ToolContext,
        events: &mpsc::Sender<LoopEvent>,
        step_index: usize,
        cancel: &Arc<AtomicBool>,
    ) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        let mut i = 0;

        while i < calls.len() {
            if cancel.load(Ordering::SeqCst) {
                for call in &calls[i..] {
                    results.push(ToolResult {
                        tool_call_id: call.id.clone(),
                        result: None,
                        error: Some("cancelled".to_string()),
                    });
                }
                break;
            }

            if self.is_independent(&calls[i].name) {
                let mut end = i + 1;
                while end < calls.len() && self.is_independent(&calls[end].name) {
                    end += 1;
                }
                let batch = &calls[i..end];
                let futures = batch
                    .iter()
                    .map(|call| self.execute_one(call, ctx, events, step_index));
                let batch_results = futures::future::join_all(futures).await;
                results.extend(batch_results);
                i = end;
            } else {
                let result = self.execute_one(&calls[i], ctx, events, step_index).await;
                results.push(result);
                i += 1;
            }
        }

        results
    }

    fn is_independent(&self, tool_name: &str) -> bool {
        self.tools
            .get(tool_name)
            .map(|t| t.is_independent())
            .unwrap_or(false)
    }

    /// Runs one tool call end to end: emits `tool:call`, invokes the
    /// (durable-wrapped) registry executor, emits `tool:result`. Unknown-tool
    /// and validation failures are converted into tool-result errors here
    /// rather than propagated — the engine never exits silently on them.
    async fn execute_one(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        events: &mpsc::Sender<LoopEvent>,
        step_index: usize,
    ) -> ToolResult {
        let _ = events
            .send(LoopEvent::tool_call(
                call.id.clone(),
                call.name.clone(),
                call.arguments.clone(),
                step_index,
            ))
            .await;

        let started_at = Instant::now();
        let independent = self.is_independent(&call.name);
        let mut step_config = StepConfig::tool_exec(&call.name);
        if independent {
            step_config = step_config.independent();
        }

        let tools = Arc::clone(&self.tools);
        let outcome: Result<ToolResult> = run_step(&self.runtime_detector, &step_config, || {
            let tools = Arc::clone(&tools);
            let call = call.clone();
            let ctx = ctx.clone();
            async move { tools.execute(&call, &ctx).await }
        })
        .await;

        let result = match outcome {
            Ok(result) => result,
            Err(err @ AgentLoopError::UnknownTool(_)) | Err(err @ AgentLoopError::Validation(_)) => {
                ToolResult {
                    tool_call_id: call.id.clone(),
                    result: None,
                    error: Some(err.to_string()),
                }
            }
            Err(err) => {
                warn!(tool = %call.name, error = %err, "tool execution failed after retries");
                ToolResult {
                    tool_call_id: call.id.clone(),
                    result: None,
                    error: Some(err.to_string()),
                }
            }
        };

        let duration_ms = started_at.elapsed().as_millis() as u64;
        let result_value = result
            .result
            .clone()
            .unwrap_or_else(|| serde_json::json!({"error": result.error}));
        let _ = events
            .send(LoopEvent::tool_result(
                call.id.clone(),
                call.name.clone(),
                result_value,
                duration_ms,
                step_index,
            ))
            .await;

        result
    }
}

fn tool_result_to_text(result: &ToolResult) -> String {
    if let Some(error) = &result.error {
        format!("Error: {error}")
    } else if let Some(value) = &result.result {
        serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
    } else {
        "null".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedLlmDriver;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::fakes::ScriptedResponse;
    use crate::tool::{EchoTool, Tool, ToolExecutionResult};

    fn registry_with_echo() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        Arc::new(registry)
    }

    #[tokio::test]
    async fn greeting_completes_in_one_step_with_no_tool_calls() {
        let driver = Arc::new(ScriptedLlmDriver::new());
        driver.add_response(ScriptedResponse::text("hello there")).await;

        let engine = Arc::new(ToolLoopEngine::new(
            "agent-1",
            Arc::new(ToolRegistry::new()),
            driver as Arc<dyn LlmDriver>,
            "You are a helpful agent.",
            "test-model",
        ));

        let mut handle = engine.stream("hello");
        let mut saw_complete = false;
        while let Some(event) = handle.events.next().await {
            if let LoopEvent::Complete {
                completed,
                steps_used,
                ..
            } = event
            {
                assert!(completed);
                assert!(steps_used <= 2);
                saw_complete = true;
            }
        }
        assert!(saw_complete);
        let text = handle.text.await.unwrap();
        assert_eq!(text, "hello there");
    }

    #[tokio::test]
    async fn single_tool_call_round_trips_through_echo() {
        let driver = Arc::new(ScriptedLlmDriver::new());
        let call = ToolCall {
            id: "call-1".into(),
            name: "echo".into(),
            arguments: json!({"text": "ok"}),
        };
        driver
            .add_response(ScriptedResponse::with_tools(String::new(), vec![call]))
            .await;
        driver.add_response(ScriptedResponse::text("done: ok")).await;

        let engine = Arc::new(ToolLoopEngine::new(
            "agent-1",
            registry_with_echo(),
            driver as Arc<dyn LlmDriver>,
            "You are a helpful agent.",
            "test-model",
        ));

        let mut handle = engine.stream("Use the echo tool to repeat 'ok'");
        let mut saw_tool_call = false;
        let mut saw_tool_result = false;
        while let Some(event) = handle.events.next().await {
            match event {
                LoopEvent::ToolCall { tool_name, args, .. } => {
                    assert_eq!(tool_name, "echo");
                    assert_eq!(args, json!({"text": "ok"}));
                    saw_tool_call = true;
                }
                LoopEvent::ToolResult { result, .. } => {
                    assert_eq!(result, json!("ok"));
                    saw_tool_result = true;
                }
                _ => {}
            }
        }
        assert!(saw_tool_call);
        assert!(saw_tool_result);
        let text = handle.text.await.unwrap();
        assert!(text.contains("ok"));
    }

    #[tokio::test]
    async fn unknown_tool_self_corrects_instead_of_failing_the_loop() {
        let driver = Arc::new(ScriptedLlmDriver::new());
        let bogus_call = ToolCall {
            id: "call-1".into(),
            name: "does_not_exist".into(),
            arguments: json!({}),
        };
        driver
            .add_response(ScriptedResponse::with_tools(String::new(), vec![bogus_call]))
            .await;
        driver.add_response(ScriptedResponse::text("recovered")).await;

        let engine = Arc::new(ToolLoopEngine::new(
            "agent-1",
            Arc::new(ToolRegistry::new()),
            driver as Arc<dyn LlmDriver>,
            "You are a helpful agent.",
            "test-model",
        ));

        let mut handle = engine.stream("call a tool that doesn't exist");
        let mut saw_error_result = false;
        while let Some(event) = handle.events.next().await {
            if let LoopEvent::ToolResult { result, .. } = event {
                if result.get("error").is_some() {
                    saw_error_result = true;
                }
            }
        }
        assert!(saw_error_result);
        let text = handle.text.await.unwrap();
        assert_eq!(text, "recovered");
    }

    struct AlwaysCallsToolDriver;

    #[async_trait]
    impl LlmDriver for AlwaysCallsToolDriver {
        async fn chat_completion_stream(
            &self,
            _messages: Vec<LlmMessage>,
            _config: &LlmCallConfig,
        ) -> Result<crate::llm::LlmResponseStream> {
            let call = ToolCall {
                id: Uuid::now_v7().to_string(),
                name: "echo".into(),
                arguments: json!({"text": "again"}),
            };
            let events = vec![
                Ok(LlmStreamEvent::ToolCalls(vec![call])),
                Ok(LlmStreamEvent::Done(Default::default())),
            ];
            Ok(Box::pin(futures::stream::iter(events)))
        }
    }

    #[tokio::test]
    async fn step_cap_stops_the_loop_as_incomplete() {
        let engine = Arc::new(
            ToolLoopEngine::new(
                "agent-1",
                registry_with_echo(),
                Arc::new(AlwaysCallsToolDriver) as Arc<dyn LlmDriver>,
                "You are a helpful agent.",
                "test-model",
            )
            .with_max_steps(2),
        );

        let mut handle = engine.stream("keep calling tools forever");
        let mut final_event = None;
        while let Some(event) = handle.events.next().await {
            if let LoopEvent::Complete { .. } = &event {
                final_event = Some(event);
            }
        }
        match final_event {
            Some(LoopEvent::Complete {
                completed,
                steps_used,
                ..
            }) => {
                assert!(!completed);
                assert_eq!(steps_used, 2);
            }
            _ => panic!("expected a complete event"),
        }
    }

    #[tokio::test]
    async fn cancellation_produces_incomplete_terminal_event() {
        let engine = Arc::new(ToolLoopEngine::new(
            "agent-1",
            registry_with_echo(),
            Arc::new(AlwaysCallsToolDriver) as Arc<dyn LlmDriver>,
            "You are a helpful agent.",
            "test-model",
        ));

        let mut handle = engine.stream("keep calling tools forever");
        handle.cancel.cancel();

        let mut final_event = None;
        while let Some(event) = handle.events.next().await {
            if let LoopEvent::Complete { .. } = &event {
                final_event = Some(event);
            }
        }
        match final_event {
            Some(LoopEvent::Complete { completed, .. }) => assert!(!completed),
            _ => panic!("expected a complete event"),
        }
    }

    struct IndependentEchoTool;

    #[async_trait]
    impl Tool for IndependentEchoTool {
        fn name(&self) -> &str {
            "independent_echo"
        }
        fn description(&self) -> &str {
            "Echoes back input; may run concurrently with siblings."
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]})
        }
        async fn execute(&self, arguments: Value, _ctx: &ToolContext) -> ToolExecutionResult {
            let text = arguments.get("text").and_then(|v| v.as_str()).unwrap_or("");
            ToolExecutionResult::success(json!(text))
        }
        fn is_independent(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn independent_tool_results_preserve_issue_order() {
        let mut registry = ToolRegistry::new();
        registry.register(IndependentEchoTool);
        let registry = Arc::new(registry);

        let calls = vec![
            ToolCall {
                id: "c1".into(),
                name: "independent_echo".into(),
                arguments: json!({"text": "one"}),
            },
            ToolCall {
                id: "c2".into(),
                name: "independent_echo".into(),
                arguments: json!({"text": "two"}),
            },
            ToolCall {
                id: "c3".into(),
                name: "independent_echo".into(),
                arguments: json!({"text": "three"}),
            },
        ];

        let engine = ToolLoopEngine::new(
            "agent-1",
            registry,
            Arc::new(ScriptedLlmDriver::new()) as Arc<dyn LlmDriver>,
            "base",
            "test-model",
        );

        let (tx, _rx) = mpsc::channel(16);
        let ctx = ToolContext::new("agent-1", 0);
        let cancel = Arc::new(AtomicBool::new(false));
        let results = engine.execute_tool_calls(&calls, &ctx, &tx, 0, &cancel).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].tool_call_id, "c1");
        assert_eq!(results[1].tool_call_id, "c2");
        assert_eq!(results[2].tool_call_id, "c3");
        assert_eq!(results[0].result, Some(json!("one")));
        assert_eq!(results[1].result, Some(json!("two")));
        assert_eq!(results[2].result, Some(json!("three")));
    }

    #[test]
    fn usage_limits_detect_each_dimension() {
        let limits = UsageLimits {
            max_total_tokens: Some(100),
            ..Default::default()
        };
        let under = TokenUsage {
            prompt_tokens: 50,
            completion_tokens: 40,
        };
        let over = TokenUsage {
            prompt_tokens: 60,
            completion_tokens: 60,
        };
        assert!(limits.exceeded(&under, 1).is_none());
        assert_eq!(limits.exceeded(&over, 1), Some("max_total_tokens"));
    }
}

// Tool abstraction: ToolSpec, ToolContext, the Tool trait, and ToolRegistry.
// `ToolExecutionResult`'s Success/ToolError/InternalError split keeps internal
// error detail out of the LLM's view; `ToolContext` carries per-call state
// (agent id, step index, parent, workspace root, event sink) through to
// every tool execution.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::error;

use crate::error::{AgentLoopError, Result};
use crate::events::LoopEvent;

/// A named capability offered to the LLM (spec §3 ToolSpec).
///
/// Tool names are unique per agent. A durability/retry/approval wrapper around a
/// tool must preserve the wrapped tool's name, description, and schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's input shape.
    pub input_schema: Value,
    #[serde(default)]
    pub policy: ToolPolicy,
}

/// Whether a tool call executes immediately or requires human approval first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPolicy {
    #[default]
    Auto,
    RequiresApproval,
}

/// A tool call issued by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// The result of executing a tool call, as it is appended back to the
/// conversation. `result` and `error` are mutually exclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// Passed to every tool executor (spec §3 ToolContext). Owned by the tool-loop
/// for the duration of one execution; never shared across concurrent calls.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub agent_id: String,
    pub step_index: usize,
    pub parent_agent_id: Option<String>,
    pub workflow_run_id: Option<String>,
    pub workspace_root: Option<String>,
    pub metadata: HashMap<String, Value>,
    /// The tool loop's event sink, so a tool that itself streams sub-work
    /// (the sub-agent spawner) can relay events onto the parent's stream
    /// while its own tool call is still open.
    pub events: Option<mpsc::Sender<LoopEvent>>,
}

impl ToolContext {
    pub fn new(agent_id: impl Into<String>, step_index: usize) -> Self {
        Self {
            agent_id: agent_id.into(),
            step_index,
            parent_agent_id: None,
            workflow_run_id: None,
            workspace_root: None,
            metadata: HashMap::new(),
            events: None,
        }
    }

    pub fn with_parent(mut self, parent_agent_id: impl Into<String>) -> Self {
        self.parent_agent_id = Some(parent_agent_id.into());
        self
    }

    pub fn with_workspace_root(mut self, root: impl Into<String>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<LoopEvent>) -> Self {
        self.events = Some(events);
        self
    }
}

/// Outcome of a single tool execution, with an explicit split between errors
/// that are safe to show the model and internal errors that are not.
#[derive(Debug)]
pub enum ToolExecutionResult {
    /// Successful execution with a JSON result delivered to the model.
    Success(Value),
    /// Tool-level error, safe to show to the LLM (spec `validation-error`-style
    /// self-correction path — e.g. "city not found").
    ToolError(String),
    /// System-level error that must not reach the LLM (e.g. credential failure,
    /// downstream outage). Logged in full; replaced with a generic message.
    InternalError(ToolInternalError),
}

impl ToolExecutionResult {
    pub fn success(value: impl Into<Value>) -> Self {
        ToolExecutionResult::Success(value.into())
    }

    pub fn tool_error(message: impl Into<String>) -> Self {
        ToolExecutionResult::ToolError(message.into())
    }

    pub fn internal_error(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        ToolExecutionResult::InternalError(ToolInternalError::new(error))
    }

    pub fn internal_error_msg(message: impl Into<String>) -> Self {
        ToolExecutionResult::InternalError(ToolInternalError::from_message(message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolExecutionResult::Success(_))
    }

    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    /// Converts to the `ToolResult` appended to the conversation. Internal
    /// errors are logged with full detail and replaced with a generic message.
    pub fn into_tool_result(self, tool_call_id: &str, tool_name: &str) -> ToolResult {
        match self {
            ToolExecutionResult::Success(value) => ToolResult {
                tool_call_id: tool_call_id.to_string(),
                result: Some(value),
                error: None,
            },
            ToolExecutionResult::ToolError(message) => ToolResult {
                tool_call_id: tool_call_id.to_string(),
                result: None,
                error: Some(message),
            },
            ToolExecutionResult::InternalError(err) => {
                error!(
                    tool_name = %tool_name,
                    tool_call_id = %tool_call_id,
                    error = %err.message,
                    "tool internal error (hidden from LLM)"
                );
                ToolResult {
                    tool_call_id: tool_call_id.to_string(),
                    result: None,
                    error: Some("An internal error occurred while executing the tool".to_string()),
                }
            }
        }
    }
}

/// Internal error detail: logged, never surfaced to the model.
#[derive(Debug)]
pub struct ToolInternalError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ToolInternalError {
    pub fn new(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }
}

impl std::fmt::Display for ToolInternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ToolInternalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// A tool the LLM may invoke. Implementors supply the schema the loop presents
/// to the model and an async executor that receives validated arguments plus
/// the per-call `ToolContext`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;

    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> ToolExecutionResult;

    /// Whether a tool call MAY run concurrently with sibling tool calls in the
    /// same step (spec §4.9 point 3 — `independent` durability).
    fn is_independent(&self) -> bool {
        false
    }

    fn policy(&self) -> ToolPolicy {
        ToolPolicy::Auto
    }

    fn to_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
            policy: self.policy(),
        }
    }
}

/// Validates a tool call's arguments against the minimal structural contract a
/// `ToolSpec`'s schema can express: required top-level properties must be
/// present. This is intentionally conservative (no full JSON-Schema engine);
/// it is sufficient to produce the `validation-error` self-correction path.
pub fn validate_arguments(spec: &ToolSpec, arguments: &Value) -> Result<()> {
    let Some(required) = spec.input_schema.get("required").and_then(|v| v.as_array()) else {
        return Ok(());
    };

    let missing: Vec<String> = required
        .iter()
        .filter_map(|r| r.as_str())
        .filter(|name| arguments.get(name).is_none())
        .map(|s| s.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AgentLoopError::validation(format!(
            "missing required argument(s) for tool '{}': {}",
            spec.name,
            missing.join(", ")
        )))
    }
}

/// A collection of tools, looked up by name, that also doubles as the
/// `ToolExecutor` backend the tool-loop calls into.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn register_boxed(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), Arc::from(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.to_spec()).collect()
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.remove(name)
    }

    /// Executes a tool call end to end: lookup, schema validation, execution,
    /// conversion to a `ToolResult`. Unknown-tool and validation failures are
    /// returned as the typed errors the loop translates into self-correction
    /// tool-results (spec §4.9 edge cases), not propagated as engine failures.
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<ToolResult> {
        let Some(tool) = self.tools.get(&call.name) else {
            return Err(AgentLoopError::unknown_tool(call.name.clone()));
        };

        validate_arguments(&tool.to_spec(), &call.arguments)?;

        let outcome = tool.execute(call.arguments.clone(), ctx).await;
        Ok(outcome.into_tool_result(&call.id, &call.name))
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_names())
            .finish()
    }
}

/// A tool that echoes its input back; used in examples and in the self-test
/// suite's S2 single-tool-call scenario.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo back the provided text."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to echo back" }
            },
            "required": ["text"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: Value, _ctx: &ToolContext) -> ToolExecutionResult {
        let text = arguments.get("text").and_then(|v| v.as_str()).unwrap_or("");
        ToolExecutionResult::success(serde_json::json!(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_tool_round_trips() {
        let tool = EchoTool;
        let ctx = ToolContext::new("agent-1", 0);
        let result = tool.execute(serde_json::json!({"text": "ok"}), &ctx).await;
        match result {
            ToolExecutionResult::Success(v) => assert_eq!(v, serde_json::json!("ok")),
            _ => panic!("expected success"),
        }
    }

    #[test]
    fn validate_arguments_flags_missing_required() {
        let spec = ToolSpec {
            name: "echo".into(),
            description: "".into(),
            input_schema: serde_json::json!({"required": ["text"]}),
            policy: ToolPolicy::Auto,
        };
        assert!(validate_arguments(&spec, &serde_json::json!({})).is_err());
        assert!(validate_arguments(&spec, &serde_json::json!({"text": "x"})).is_ok());
    }

    #[tokio::test]
    async fn registry_execute_unknown_tool_is_typed_error() {
        let registry = ToolRegistry::new();
        let call = ToolCall {
            id: "c1".into(),
            name: "does_not_exist".into(),
            arguments: serde_json::json!({}),
        };
        let ctx = ToolContext::new("agent-1", 0);
        let err = registry.execute(&call, &ctx).await.unwrap_err();
        assert_eq!(err.code(), "unknown-tool");
    }

    #[tokio::test]
    async fn registry_execute_success() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let call = ToolCall {
            id: "c1".into(),
            name: "echo".into(),
            arguments: serde_json::json!({"text": "hi"}),
        };
        let ctx = ToolContext::new("agent-1", 0);
        let result = registry.execute(&call, &ctx).await.unwrap();
        assert_eq!(result.result.unwrap(), serde_json::json!("hi"));
        assert!(result.error.is_none());
    }

    #[test]
    fn internal_error_is_hidden_on_conversion() {
        let outcome = ToolExecutionResult::internal_error_msg("db down");
        let result = outcome.into_tool_result("c1", "t");
        assert!(result.result.is_none());
        assert_ne!(result.error.as_deref(), Some("db down"));
    }
}

// Sub-Agent Spawner (spec §4.10): a tool, `spawn_agent`, that lets a running
// agent delegate a task to a freshly created child agent, relaying the
// child's output onto the parent's own event stream as it streams in.
//
// The child is created through a caller-supplied factory closure rather than
// a literal self-reference, so this module never needs to know how a full
// Agent is assembled (config resolution, workspace setup, telemetry) — it
// only needs something that can `stream()` a prompt and yield events, text,
// and usage, which `loop_engine::ToolLoopEngine` already provides.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::warn;

use crate::events::{LoopEvent, SubAgentChunkStatus};
use crate::llm::{LlmCallConfig, LlmDriver, LlmMessage, LlmMessageRole};
use crate::loop_engine::ToolLoopEngine;
use crate::tool::{Tool, ToolContext, ToolExecutionResult};

/// Instructions and a human-readable label for one sub-agent role.
#[derive(Debug, Clone)]
pub struct RoleConfig {
    pub label: String,
    pub instructions: String,
}

/// The fixed role set plus any caller-registered custom roles (spec
/// `SubAgentSpawnRequest`: "one of a fixed small set ... or a user-defined
/// role name").
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    roles: HashMap<String, RoleConfig>,
}

impl RoleRegistry {
    pub fn with_defaults() -> Self {
        let mut roles = HashMap::new();
        roles.insert(
            "generic".to_string(),
            RoleConfig {
                label: "generic".to_string(),
                instructions: "You are a general-purpose sub-agent. Complete the delegated task \
                    directly and report your findings back to the parent agent."
                    .to_string(),
            },
        );
        roles.insert(
            "coder".to_string(),
            RoleConfig {
                label: "coder".to_string(),
                instructions: "You are a coding-specialised sub-agent. Focus on producing \
                    correct, minimal code changes and explain what you changed and why."
                    .to_string(),
            },
        );
        roles.insert(
            "researcher".to_string(),
            RoleConfig {
                label: "researcher".to_string(),
                instructions: "You are a research-specialised sub-agent. Gather and synthesise \
                    information relevant to the task, citing sources where available."
                    .to_string(),
            },
        );
        roles.insert(
            "analyst".to_string(),
            RoleConfig {
                label: "analyst".to_string(),
                instructions: "You are an analysis-specialised sub-agent. Examine the given \
                    material carefully and report structured findings, trade-offs, and risks."
                    .to_string(),
            },
        );
        Self { roles }
    }

    pub fn register(&mut self, name: impl Into<String>, instructions: impl Into<String>) {
        let name = name.into();
        self.roles.insert(
            name.clone(),
            RoleConfig {
                label: name,
                instructions: instructions.into(),
            },
        );
    }

    /// Instructions for `role`. Unknown role names are accepted as
    /// user-defined roles with generic instructions parameterised by the
    /// role name, rather than rejected.
    fn instructions_for(&self, role: &str) -> String {
        match self.roles.get(role) {
            Some(cfg) => cfg.instructions.clone(),
            None => format!(
                "You are a sub-agent specialised in the role '{role}'. Complete the delegated \
                 task and report your findings back to the parent agent."
            ),
        }
    }
}

impl Default for RoleRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Everything the caller-supplied factory needs to construct one child agent.
#[derive(Debug, Clone)]
pub struct ChildAgentSpec {
    pub agent_id: String,
    pub role: String,
    pub instructions: String,
    pub workspace_root: Option<String>,
    pub max_steps: usize,
    pub spawn_depth: usize,
    pub parent_agent_id: String,
    /// Whether the child is allowed to register its own `spawn_agent` tool
    /// (false once `spawn_depth` reaches the configured maximum).
    pub allow_spawn: bool,
}

/// Breaks the cyclic "spawn_agent needs to create Agents, Agents need to be
/// able to register spawn_agent" reference (spec §9 redesign note): supplied
/// once at spawner-configuration time instead of the tool holding a literal
/// reference to its own factory.
pub type CreateAgentFn = dyn Fn(ChildAgentSpec) -> Arc<ToolLoopEngine> + Send + Sync;

/// Tunables for the spawner, all with spec-mandated defaults.
#[derive(Clone)]
pub struct SpawnerConfig {
    pub max_spawn_depth: usize,
    pub child_max_steps: usize,
    pub summary_threshold_chars: usize,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            max_spawn_depth: 2,
            child_max_steps: 15,
            summary_threshold_chars: 500,
        }
    }
}

/// The `spawn_agent` tool. One instance is scoped to a single parent agent at
/// a fixed spawn depth; a child created at the next depth gets its own
/// instance (or none, once `allow_spawn` is false).
pub struct SpawnAgentTool {
    agent_name: String,
    spawn_depth: usize,
    config: SpawnerConfig,
    roles: RoleRegistry,
    create_agent: Arc<CreateAgentFn>,
    summarizer: Arc<dyn LlmDriver>,
    summarizer_model: String,
    workspace_root: Option<String>,
}

impl SpawnAgentTool {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_name: impl Into<String>,
        spawn_depth: usize,
        config: SpawnerConfig,
        roles: RoleRegistry,
        create_agent: Arc<CreateAgentFn>,
        summarizer: Arc<dyn LlmDriver>,
        summarizer_model: impl Into<String>,
        workspace_root: Option<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            spawn_depth,
            config,
            roles,
            create_agent,
            summarizer,
            summarizer_model: summarizer_model.into(),
            workspace_root,
        }
    }

    async fn summarize(&self, role: &str, task: &str, output: &str) -> String {
        if output.len() <= self.config.summary_threshold_chars {
            return output.to_string();
        }

        let system = format!(
            "Summarise the following sub-agent output for the parent agent. The sub-agent's \
             role was '{role}' and its task was: {task}"
        );
        let messages = vec![
            LlmMessage::text(LlmMessageRole::System, system),
            LlmMessage::text(LlmMessageRole::User, output.to_string()),
        ];
        let call_config = LlmCallConfig {
            model: self.summarizer_model.clone(),
            temperature: None,
            max_tokens: Some(300),
            tools: vec![],
        };

        match self.summarizer.chat_completion(messages, &call_config).await {
            Ok(response) if !response.text.trim().is_empty() => response.text,
            Ok(_) => self.truncated_fallback(output),
            Err(err) => {
                warn!(error = %err, "sub-agent output summarisation failed, truncating instead");
                self.truncated_fallback(output)
            }
        }
    }

    fn truncated_fallback(&self, output: &str) -> String {
        let limit = self.config.summary_threshold_chars;
        let truncated: String = output.chars().take(limit).collect();
        format!("{truncated}... [truncated, {} more chars]", output.chars().count() - limit)
    }
}

#[async_trait]
impl Tool for SpawnAgentTool {
    fn name(&self) -> &str {
        "spawn_agent"
    }

    fn description(&self) -> &str {
        "Delegate a task to a newly spawned sub-agent with a specialised role. Use this to \
         parallelise or isolate a task that benefits from focused context. The sub-agent only \
         receives the task and optional context you provide; it cannot see this conversation."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "The task for the sub-agent to complete. Must be self-contained."
                },
                "role": {
                    "type": "string",
                    "description": "Sub-agent role: coder, researcher, analyst, generic, or a custom role name. Defaults to generic.",
                    "default": "generic"
                },
                "context": {
                    "type": "string",
                    "description": "Optional additional context the sub-agent needs."
                }
            },
            "required": ["task"],
            "additionalProperties": false
        })
    }

    fn is_independent(&self) -> bool {
        false
    }

    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> ToolExecutionResult {
        let task = arguments.get("task").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let role = arguments
            .get("role")
            .and_then(|v| v.as_str())
            .unwrap_or("generic")
            .to_string();
        let context = arguments.get("context").and_then(|v| v.as_str()).map(str::to_string);

        if self.spawn_depth >= self.config.max_spawn_depth {
            return ToolExecutionResult::success(json!({
                "refused": true,
                "reason": "maximum sub-agent spawn depth reached",
                "suggestion": "complete this task directly instead of delegating further",
            }));
        }

        let agent_id = format!("{}/{}", self.agent_name, role);
        let child_spawn_depth = self.spawn_depth + 1;
        let spec = ChildAgentSpec {
            agent_id: agent_id.clone(),
            role: role.clone(),
            instructions: self.roles.instructions_for(&role),
            workspace_root: self.workspace_root.clone(),
            max_steps: self.config.child_max_steps,
            spawn_depth: child_spawn_depth,
            parent_agent_id: ctx.agent_id.clone(),
            allow_spawn: child_spawn_depth < self.config.max_spawn_depth,
        };

        let child = (self.create_agent)(spec);

        let prompt = match &context {
            Some(context) => format!("{task}\n\nContext:\n{context}"),
            None => task.clone(),
        };

        let mut handle = child.stream(prompt);
        let mut error_message: Option<String> = None;

        while let Some(event) = handle.events.next().await {
            match event {
                LoopEvent::TextDelta { delta, .. } => {
                    if let Some(sender) = &ctx.events {
                        let _ = sender
                            .send(LoopEvent::sub_agent_chunk(
                                &agent_id,
                                &role,
                                delta,
                                SubAgentChunkStatus::Streaming,
                                ctx.step_index,
                            ))
                            .await;
                    }
                }
                LoopEvent::Error { message, .. } => {
                    error_message = Some(message);
                }
                _ => {}
            }
        }

        let final_text = handle.text.await.unwrap_or_default();

        if let Some(sender) = &ctx.events {
            let _ = sender
                .send(LoopEvent::sub_agent_chunk(
                    &agent_id,
                    &role,
                    final_text.clone(),
                    SubAgentChunkStatus::Complete,
                    ctx.step_index,
                ))
                .await;
        }

        if let Some(message) = error_message {
            return ToolExecutionResult::tool_error(format!(
                "sub-agent '{agent_id}' failed: {message}"
            ));
        }

        let summary = self.summarize(&role, &task, &final_text).await;

        ToolExecutionResult::success(json!({
            "agent_id": agent_id,
            "role": role,
            "summary": summary,
        }))
    }
}

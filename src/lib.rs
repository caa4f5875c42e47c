// Agent orchestration core: a durable tool-loop engine, a hook registry for
// human-in-the-loop suspension, a sub-agent spawning protocol, and the
// prompt-composition pipeline (system prompt builder, memory context loader,
// reflection composer, guardrail runner) that feeds it.
//
// Key design decisions:
// - Pluggable backends via traits (`LlmDriver`, `Tool`, `MemoryStore`,
//   `EventEmitter`, `MessageStore`, `durable::Runtime`), never a concrete
//   provider baked into the engine.
// - Durability (steps, retries, timeouts, hooks) is modeled as explicit
//   wrapper types composed around the loop, not global state.
// - `Agent`/`AgentConfig` are the external factory surface; `ToolLoopEngine`
//   underneath is usable directly by callers that don't need the lazy
//   memory/telemetry initialisation `Agent` adds.
// - Error handling distinguishes tool-visible errors (`ToolExecutionResult`)
//   from engine-level failures (`AgentLoopError`).

pub mod agent;
pub mod config;
pub mod durable;
pub mod duration;
pub mod error;
pub mod events;
pub mod guardrail;
pub mod hooks;
pub mod llm;
pub mod llm_openai;
pub mod loop_engine;
pub mod memory;
pub mod message;
pub mod reflection;
pub mod spawner;
pub mod step;
pub mod system_prompt;
pub mod templates;
pub mod tool;
pub mod traits;

// Test doubles shared by this crate's own test suites; also usable by a
// caller wiring up an integration test against the public API.
pub mod fakes;

// Re-exports for convenience
pub use agent::{create_agent, Agent, AgentConfig, AgentDeps};
pub use config::BootConfig;
pub use durable::{run_step, NoopRuntime, RetryPolicy, Runtime, RuntimeDetector, StepConfig, TimeoutConfig};
pub use error::{AgentLoopError, Result};
pub use events::{LoopEvent, SubAgentChunkStatus};
pub use guardrail::{
    Guardrail, GuardrailContext, GuardrailMode, GuardrailPhase, GuardrailRunner, GuardrailVerdict,
    PiiMaskGuardrail,
};
pub use hooks::{HookInstance, HookOptions, HookOutcome, HookRegistry, HookStatus};
pub use loop_engine::{CancelHandle, StreamHandle, ToolLoopEngine, UsageLimits};
pub use memory::{InMemoryMemoryStore, MemoryContext, MemoryStore, UserPreferences};
pub use message::{Message, MessageRole};
pub use reflection::ReflectionStrategy;
pub use spawner::{ChildAgentSpec, CreateAgentFn, RoleRegistry, SpawnAgentTool, SpawnerConfig};
pub use step::{Step, TokenUsage};
pub use templates::{with_approval, with_schedule, ApprovalOptions, WorkflowResult, WorkflowStep};
pub use traits::{EventEmitter, MessageStore};

// LLM types re-exports
pub use llm::{
    LlmCallConfig, LlmCompletionMetadata, LlmDriver, LlmMessage, LlmMessageContent, LlmMessageRole,
    LlmResponseStream, LlmStreamEvent,
};
pub use llm_openai::OpenAiProtocolDriver;

// Tool abstraction re-exports
pub use tool::{
    Tool, ToolCall, ToolContext, ToolExecutionResult, ToolInternalError, ToolPolicy, ToolRegistry,
    ToolResult, ToolSpec,
};

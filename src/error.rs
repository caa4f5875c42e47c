// Error taxonomy for the agent orchestration core.
//
// Errors inside a tool call become tool results (data, not exceptions) and never
// appear here; this enum covers failures the engine itself raises: hook registry
// failures, durable-step failures, guardrail blocks, cancellation, and the
// catch-all for plumbing errors (JSON, URL parsing, HTTP) via `anyhow`.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AgentLoopError>;

/// The single structured error enum for the orchestration core.
#[derive(Debug, Error)]
pub enum AgentLoopError {
    /// Tool input failed schema validation. Recoverable: synthesize a tool-result
    /// and let the model retry with corrected input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The model referred to a tool not present in the assembled tool set.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The tool executor raised a transient error. `retryable` mirrors whether the
    /// durable wrapper's retry budget still applies when this surfaces.
    #[error("tool execution error: {message}")]
    ToolExecution { message: String, retryable: bool },

    /// A non-recoverable condition signalled by a tool or LLM call. Stops the loop.
    #[error("fatal error: {0}")]
    Fatal(String),

    /// A step (tool call or LLM call) exceeded its configured timeout.
    #[error("step timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Cumulative usage exceeded a configured limit.
    #[error("usage limit exceeded: {0}")]
    UsageLimitExceeded(String),

    /// No hook with the given id is registered.
    #[error("hook not found: {0}")]
    HookNotFound(String),

    /// The hook was not in `pending` status when Resume/Reject was attempted.
    #[error("hook {id} is not pending (observed status: {observed})")]
    HookNotPending { id: String, observed: String },

    /// The hook was rejected with the given reason.
    #[error("hook rejected: {0}")]
    HookRejected(String),

    /// A duplicate hook id was registered.
    #[error("hook id already registered: {0}")]
    HookIdCollision(String),

    /// Cooperative cancellation was observed.
    #[error("cancelled")]
    Cancelled,

    /// Output failed a guardrail configured in `block` mode.
    #[error("guardrail blocked: {0}")]
    GuardrailBlocked(String),

    /// Malformed duration string.
    #[error("invalid duration string: {0}")]
    InvalidDuration(String),

    /// LLM provider error.
    #[error("llm error: {0}")]
    Llm(String),

    /// Message store error.
    #[error("message store error: {0}")]
    MessageStore(String),

    /// Event emission error.
    #[error("event emission error: {0}")]
    EventEmission(String),

    /// Configuration error (e.g. missing required field, invalid depth).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal / plumbing error not part of the domain taxonomy.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AgentLoopError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AgentLoopError::Validation(msg.into())
    }

    pub fn unknown_tool(name: impl Into<String>) -> Self {
        AgentLoopError::UnknownTool(name.into())
    }

    pub fn tool_execution(msg: impl Into<String>, retryable: bool) -> Self {
        AgentLoopError::ToolExecution {
            message: msg.into(),
            retryable,
        }
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        AgentLoopError::Fatal(msg.into())
    }

    pub fn usage_limit_exceeded(msg: impl Into<String>) -> Self {
        AgentLoopError::UsageLimitExceeded(msg.into())
    }

    pub fn hook_not_found(id: impl Into<String>) -> Self {
        AgentLoopError::HookNotFound(id.into())
    }

    pub fn hook_not_pending(id: impl Into<String>, observed: impl Into<String>) -> Self {
        AgentLoopError::HookNotPending {
            id: id.into(),
            observed: observed.into(),
        }
    }

    pub fn hook_rejected(reason: impl Into<String>) -> Self {
        AgentLoopError::HookRejected(reason.into())
    }

    pub fn guardrail_blocked(reason: impl Into<String>) -> Self {
        AgentLoopError::GuardrailBlocked(reason.into())
    }

    pub fn llm(msg: impl Into<String>) -> Self {
        AgentLoopError::Llm(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        AgentLoopError::MessageStore(msg.into())
    }

    pub fn event(msg: impl Into<String>) -> Self {
        AgentLoopError::EventEmission(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        AgentLoopError::Configuration(msg.into())
    }

    /// The error `code` carried by the `error` stream event (spec §4.9 / §7).
    pub fn code(&self) -> &'static str {
        match self {
            AgentLoopError::Validation(_) => "validation-error",
            AgentLoopError::UnknownTool(_) => "unknown-tool",
            AgentLoopError::ToolExecution { .. } => "tool-execution-error",
            AgentLoopError::Fatal(_) => "fatal",
            AgentLoopError::Timeout(_) => "timeout",
            AgentLoopError::UsageLimitExceeded(_) => "usage-limit-exceeded",
            AgentLoopError::HookNotFound(_) => "hook-not-found",
            AgentLoopError::HookNotPending { .. } => "hook-not-pending",
            AgentLoopError::HookRejected(_) => "hook-rejected",
            AgentLoopError::HookIdCollision(_) => "hook-id-collision",
            AgentLoopError::Cancelled => "cancelled",
            AgentLoopError::GuardrailBlocked(_) => "guardrail-blocked",
            AgentLoopError::InvalidDuration(_) => "invalid-duration",
            AgentLoopError::Llm(_) => "llm-error",
            AgentLoopError::MessageStore(_) => "message-store-error",
            AgentLoopError::EventEmission(_) => "event-emission-error",
            AgentLoopError::Configuration(_) => "configuration-error",
            AgentLoopError::Internal(_) => "internal-error",
        }
    }

    /// Whether a durable-step retry loop should keep retrying this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentLoopError::ToolExecution { retryable, .. } => *retryable,
            AgentLoopError::Timeout(_) => true,
            AgentLoopError::Fatal(_) => false,
            AgentLoopError::Cancelled => false,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_match_taxonomy() {
        assert_eq!(AgentLoopError::validation("x").code(), "validation-error");
        assert_eq!(AgentLoopError::unknown_tool("x").code(), "unknown-tool");
        assert_eq!(
            AgentLoopError::tool_execution("x", true).code(),
            "tool-execution-error"
        );
        assert_eq!(AgentLoopError::fatal("x").code(), "fatal");
        assert_eq!(AgentLoopError::Cancelled.code(), "cancelled");
    }

    #[test]
    fn retryability_matches_taxonomy() {
        assert!(AgentLoopError::tool_execution("x", true).is_retryable());
        assert!(!AgentLoopError::tool_execution("x", false).is_retryable());
        assert!(!AgentLoopError::fatal("x").is_retryable());
        assert!(AgentLoopError::Timeout(std::time::Duration::from_secs(1)).is_retryable());
    }
}

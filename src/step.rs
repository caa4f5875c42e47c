// A single step of the tool-loop (spec §3 Step): the plain record the engine
// accumulates per iteration — one model call plus the tool calls it issued.

use serde::{Deserialize, Serialize};

use crate::tool::{ToolCall, ToolResult};

/// Cumulative token usage for a model call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// One iteration of the tool-loop: the model's output for this step, the tool
/// calls it issued, and their results once available.
///
/// Invariant: once a step is finished, `tool_results.len() == tool_calls.len()`
/// and indices align — `tool_results[i]` answers `tool_calls[i]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Step {
    pub step_index: usize,
    pub text: String,
    pub reasoning: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResult>,
    pub usage: TokenUsage,
}

impl Step {
    pub fn new(step_index: usize) -> Self {
        Self {
            step_index,
            ..Default::default()
        }
    }

    pub fn is_finished(&self) -> bool {
        self.tool_results.len() == self.tool_calls.len()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

// Stream events emitted by the tool-loop engine: session:start, step:start,
// text:delta, reasoning:delta, tool:call, tool:result, step:finish, error,
// complete, and sub_agent:chunk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events emitted during a tool-loop run, in the order described by spec §4.9's
/// ordering guarantees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    #[serde(rename = "session:start")]
    SessionStart {
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "step:start")]
    StepStart {
        step_index: usize,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "text:delta")]
    TextDelta {
        delta: String,
        step_index: usize,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "reasoning:delta")]
    ReasoningDelta {
        delta: String,
        step_index: usize,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "tool:call")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: Value,
        step_index: usize,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "tool:result")]
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        result: Value,
        duration_ms: u64,
        step_index: usize,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "step:finish")]
    StepFinish {
        step_index: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "error")]
    Error {
        code: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "complete")]
    Complete {
        text: String,
        completed: bool,
        needs_input: bool,
        steps_used: usize,
        tools_used: usize,
        timestamp: DateTime<Utc>,
    },

    /// A fragment of a spawned sub-agent's output, relayed on the parent's
    /// stream while the owning `spawn_agent` tool call is still open
    /// (spec §4.10 point 3).
    #[serde(rename = "sub_agent:chunk")]
    SubAgentChunk {
        agent_id: String,
        role: String,
        text: String,
        status: SubAgentChunkStatus,
        step_index: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Status of a relayed sub-agent chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubAgentChunkStatus {
    Streaming,
    Complete,
}

impl LoopEvent {
    pub fn session_start(session_id: impl Into<String>) -> Self {
        LoopEvent::SessionStart {
            session_id: session_id.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn step_start(step_index: usize) -> Self {
        LoopEvent::StepStart {
            step_index,
            timestamp: Utc::now(),
        }
    }

    pub fn text_delta(delta: impl Into<String>, step_index: usize) -> Self {
        LoopEvent::TextDelta {
            delta: delta.into(),
            step_index,
            timestamp: Utc::now(),
        }
    }

    pub fn reasoning_delta(delta: impl Into<String>, step_index: usize) -> Self {
        LoopEvent::ReasoningDelta {
            delta: delta.into(),
            step_index,
            timestamp: Utc::now(),
        }
    }

    pub fn tool_call(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: Value,
        step_index: usize,
    ) -> Self {
        LoopEvent::ToolCall {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            args,
            step_index,
            timestamp: Utc::now(),
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        result: Value,
        duration_ms: u64,
        step_index: usize,
    ) -> Self {
        LoopEvent::ToolResult {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            result,
            duration_ms,
            step_index,
            timestamp: Utc::now(),
        }
    }

    pub fn step_finish(step_index: usize, duration_ms: u64) -> Self {
        LoopEvent::StepFinish {
            step_index,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        LoopEvent::Error {
            code: code.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn complete(
        text: impl Into<String>,
        completed: bool,
        needs_input: bool,
        steps_used: usize,
        tools_used: usize,
    ) -> Self {
        LoopEvent::Complete {
            text: text.into(),
            completed,
            needs_input,
            steps_used,
            tools_used,
            timestamp: Utc::now(),
        }
    }

    pub fn sub_agent_chunk(
        agent_id: impl Into<String>,
        role: impl Into<String>,
        text: impl Into<String>,
        status: SubAgentChunkStatus,
        step_index: usize,
    ) -> Self {
        LoopEvent::SubAgentChunk {
            agent_id: agent_id.into(),
            role: role.into(),
            text: text.into(),
            status,
            step_index,
            timestamp: Utc::now(),
        }
    }

    /// The step this event belongs to, if any (session:start/error/complete
    /// are not scoped to a single step).
    pub fn step_index(&self) -> Option<usize> {
        match self {
            LoopEvent::StepStart { step_index, .. }
            | LoopEvent::TextDelta { step_index, .. }
            | LoopEvent::ReasoningDelta { step_index, .. }
            | LoopEvent::ToolCall { step_index, .. }
            | LoopEvent::ToolResult { step_index, .. }
            | LoopEvent::StepFinish { step_index, .. }
            | LoopEvent::SubAgentChunk { step_index, .. } => Some(*step_index),
            LoopEvent::SessionStart { .. } | LoopEvent::Error { .. } | LoopEvent::Complete { .. } => {
                None
            }
        }
    }

    /// Whether this is the terminal event of a run (spec §4.9 ordering rule c).
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopEvent::Complete { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_index_is_none_for_frame_events() {
        assert_eq!(LoopEvent::session_start("s1").step_index(), None);
        assert_eq!(LoopEvent::error("fatal", "boom").step_index(), None);
        assert_eq!(
            LoopEvent::complete("done", true, false, 1, 0).step_index(),
            None
        );
    }

    #[test]
    fn step_index_present_for_step_scoped_events() {
        assert_eq!(LoopEvent::step_start(2).step_index(), Some(2));
        assert_eq!(LoopEvent::text_delta("hi", 2).step_index(), Some(2));
    }

    #[test]
    fn only_complete_is_terminal() {
        assert!(LoopEvent::complete("x", true, false, 0, 0).is_terminal());
        assert!(!LoopEvent::step_start(0).is_terminal());
        assert!(!LoopEvent::error("e", "m").is_terminal());
    }

    #[test]
    fn serializes_with_tagged_type_field() {
        let event = LoopEvent::step_start(0);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "step:start");
        assert_eq!(json["step_index"], 0);
    }

    #[test]
    fn sub_agent_chunk_carries_step_index_and_status() {
        let event = LoopEvent::sub_agent_chunk(
            "child-1",
            "coder",
            "partial output",
            SubAgentChunkStatus::Streaming,
            3,
        );
        assert_eq!(event.step_index(), Some(3));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "sub_agent:chunk");
        assert_eq!(json["status"], "streaming");
    }
}

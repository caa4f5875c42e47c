// Per-step timeout configuration backing the Durable Step Wrapper (spec §4.3
// point 3). Grounded on `durable/src/reliability/timeout.rs`'s TimeoutConfig,
// trimmed to the fields this in-process wrapper needs (no task store, no
// schedule-to-start scanning loop — those are properties of a persisted
// workflow engine, out of scope per spec §1).

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub schedule_to_start: Duration,
    pub start_to_close: Duration,
    pub heartbeat: Option<Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            schedule_to_start: Duration::from_secs(60),
            start_to_close: Duration::from_secs(300), // spec's "5m" default
            heartbeat: None,
        }
    }
}

impl TimeoutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_to_close(mut self, timeout: Duration) -> Self {
        self.start_to_close = timeout;
        self
    }

    pub fn with_heartbeat(mut self, timeout: Duration) -> Self {
        self.heartbeat = Some(timeout);
        self
    }
}

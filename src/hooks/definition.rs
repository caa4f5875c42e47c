// Hook data types (spec §3 HookDefinition/HookInstance, §4.2 status machine).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Terminal or in-flight state of a suspended hook. Transitions only ever
/// move away from `Pending`, and only once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStatus {
    Pending,
    Resolved,
    Rejected,
    TimedOut,
}

impl std::fmt::Display for HookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HookStatus::Pending => "pending",
            HookStatus::Resolved => "resolved",
            HookStatus::Rejected => "rejected",
            HookStatus::TimedOut => "timed_out",
        };
        write!(f, "{s}")
    }
}

/// Options accepted by `Register`.
#[derive(Clone, Default)]
pub struct HookOptions {
    pub description: Option<String>,
    pub timeout: Option<std::time::Duration>,
    pub default_value: Option<Value>,
    pub validate: Option<Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>>,
}

impl std::fmt::Debug for HookOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookOptions")
            .field("description", &self.description)
            .field("timeout", &self.timeout)
            .field("default_value", &self.default_value)
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

/// A snapshot of a registered hook, as returned by `List`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookInstance {
    pub id: String,
    pub name: String,
    pub payload: Value,
    pub description: Option<String>,
    pub status: HookStatus,
    pub created_at: DateTime<Utc>,
}

/// The terminal value delivered to whatever awaited `Register`'s future.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HookOutcome {
    Resolved(Value),
    Rejected(String),
    TimedOut(Value),
}

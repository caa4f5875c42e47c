// Boot configuration (spec §2a ambient stack, §6 environment variable table):
// a small set of process-wide knobs read once from the environment rather
// than threaded through every call site. Library code never calls
// `dotenvy::dotenv()` itself — that belongs to whichever binary embeds this
// crate; `BootConfig::from_env` only reads `std::env::var`.

use std::time::Duration;

use tracing::debug;

use crate::durable::RetryPolicy;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_STEP_TIMEOUT_SECS: u64 = 300;
const DEFAULT_RETRY_COUNT: u32 = 3;
const DEFAULT_MAX_SPAWN_DEPTH: usize = 2;

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Telemetry target. Telemetry export itself is out of scope (spec
/// Non-goals) but the knob is still resolved at boot: a complete boot
/// sequence reads it once even though nothing in this crate exports spans
/// anywhere yet.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub public_key: Option<String>,
    pub secret_key: Option<String>,
    pub base_url: Option<String>,
}

impl TelemetryConfig {
    /// Telemetry is only considered enabled when both keys are present.
    pub fn is_enabled(&self) -> bool {
        self.public_key.is_some() && self.secret_key.is_some()
    }
}

/// Process-wide configuration resolved once at boot (spec §6). All fields
/// are optional or carry a sensible default; nothing here is required for
/// the crate to function.
#[derive(Debug, Clone)]
pub struct BootConfig {
    pub telemetry: TelemetryConfig,
    pub geolocation_enabled: bool,
    pub log_level: String,
    pub model_fast: Option<String>,
    pub model_standard: Option<String>,
    pub openai_enabled: bool,
    pub default_step_timeout: Duration,
    pub default_retry_policy: RetryPolicy,
    pub default_max_spawn_depth: usize,
}

impl BootConfig {
    /// Reads every knob from the process environment. Safe to call more than
    /// once; each call re-reads the environment rather than caching, so
    /// tests can set and unset variables freely.
    pub fn from_env() -> Self {
        let config = Self {
            telemetry: TelemetryConfig {
                public_key: env_string("TELEMETRY_PUBLIC_KEY"),
                secret_key: env_string("TELEMETRY_SECRET_KEY"),
                base_url: env_string("TELEMETRY_BASE_URL"),
            },
            geolocation_enabled: env_bool("GEOLOCATION_ENABLED", false),
            log_level: env_string("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            model_fast: env_string("MODEL_FAST"),
            model_standard: env_string("MODEL_STANDARD"),
            openai_enabled: env_string("OPENAI_API_KEY").is_some(),
            default_step_timeout: Duration::from_secs(env_u64(
                "DEFAULT_STEP_TIMEOUT_SECS",
                DEFAULT_STEP_TIMEOUT_SECS,
            )),
            default_retry_policy: RetryPolicy::exponential()
                .with_max_attempts(env_u32("DEFAULT_RETRY_COUNT", DEFAULT_RETRY_COUNT)),
            default_max_spawn_depth: env_usize("DEFAULT_MAX_SPAWN_DEPTH", DEFAULT_MAX_SPAWN_DEPTH),
        };

        if !config.telemetry.is_enabled()
            && (config.telemetry.public_key.is_some() || config.telemetry.secret_key.is_some())
        {
            debug!("telemetry partially configured (one key missing); treating telemetry as disabled");
        }

        config
    }
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            telemetry: TelemetryConfig::default(),
            geolocation_enabled: false,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            model_fast: None,
            model_standard: None,
            openai_enabled: false,
            default_step_timeout: Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS),
            default_retry_policy: RetryPolicy::exponential().with_max_attempts(DEFAULT_RETRY_COUNT),
            default_max_spawn_depth: DEFAULT_MAX_SPAWN_DEPTH,
        }
    }
}

/// Replaces any character outside `[a-z0-9_-]` with `_` and lowercases
/// (spec §6 persistent state layout). Used to turn an agent's display name
/// into a filesystem-safe path segment.
pub fn sanitize_state_segment(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

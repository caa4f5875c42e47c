// Guardrail Runner (spec §4.6): an ordered, left-to-right pipeline of text
// checks applied to the tool-loop's final output (and optionally its input).

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

/// Which phase of the tool-loop a guardrail applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardrailPhase {
    Input,
    Output,
}

/// How the runner reacts to a `blocked` verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardrailMode {
    /// A blocked verdict replaces the text with a policy-violation marker.
    Block,
    /// A blocked verdict is recorded but the (possibly already-filtered) text
    /// still passes through. Default for the output phase.
    Filter,
}

/// The verdict a single guardrail reaches for one piece of text.
#[derive(Debug, Clone)]
pub enum GuardrailVerdict {
    Passed,
    Filtered(String),
    Blocked(String),
}

/// Context passed to a guardrail's check.
#[derive(Debug, Clone)]
pub struct GuardrailContext {
    pub prompt: Option<String>,
    pub phase: GuardrailPhase,
}

#[async_trait]
pub trait Guardrail: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self, text: &str, ctx: &GuardrailContext) -> GuardrailVerdict;
}

/// Outcome of running the full pipeline over one piece of text.
#[derive(Debug, Clone)]
pub struct GuardrailRunResult {
    pub text: String,
    pub blocked: bool,
    pub fired: Vec<String>,
}

/// An ordered pipeline of guardrails, run left to right.
pub struct GuardrailRunner {
    guardrails: Vec<Box<dyn Guardrail>>,
    mode: GuardrailMode,
}

impl GuardrailRunner {
    pub fn new(mode: GuardrailMode) -> Self {
        Self {
            guardrails: Vec::new(),
            mode,
        }
    }

    pub fn with_default_output_guardrails() -> Self {
        let mut runner = Self::new(GuardrailMode::Filter);
        runner.register(Box::new(PiiMaskGuardrail));
        runner
    }

    pub fn register(&mut self, guardrail: Box<dyn Guardrail>) {
        self.guardrails.push(guardrail);
    }

    /// Runs every guardrail in registration order. Each guardrail sees the
    /// output of the previous one (left-to-right composition).
    pub async fn run(&self, text: &str, ctx: &GuardrailContext) -> GuardrailRunResult {
        let mut current = text.to_string();
        let mut fired = Vec::new();
        let mut blocked = false;

        for guardrail in &self.guardrails {
            match guardrail.check(&current, ctx).await {
                GuardrailVerdict::Passed => {}
                GuardrailVerdict::Filtered(filtered) => {
                    fired.push(guardrail.name().to_string());
                    current = filtered;
                }
                GuardrailVerdict::Blocked(reason) => {
                    fired.push(guardrail.name().to_string());
                    if self.mode == GuardrailMode::Block {
                        return GuardrailRunResult {
                            text: format!("[content blocked: {reason}]"),
                            blocked: true,
                            fired,
                        };
                    }
                    blocked = true;
                }
            }
        }

        GuardrailRunResult {
            text: current,
            blocked,
            fired,
        }
    }
}

/// Default output guardrail: masks common PII patterns (email addresses,
/// phone numbers). Policy details beyond the interface are out of scope.
pub struct PiiMaskGuardrail;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\w.+-]+@[\w-]+\.[\w.-]+").unwrap())
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\+?\d[\d -]{7,}\d)\b").unwrap())
}

#[async_trait]
impl Guardrail for PiiMaskGuardrail {
    fn name(&self) -> &str {
        "pii-mask"
    }

    async fn check(&self, text: &str, _ctx: &GuardrailContext) -> GuardrailVerdict {
        let masked_email = email_regex().replace_all(text, "[redacted-email]");
        let masked = phone_regex().replace_all(&masked_email, "[redacted-phone]");
        if masked == text {
            GuardrailVerdict::Passed
        } else {
            GuardrailVerdict::Filtered(masked.into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> GuardrailContext {
        GuardrailContext {
            prompt: None,
            phase: GuardrailPhase::Output,
        }
    }

    #[tokio::test]
    async fn passthrough_when_no_guardrails_registered() {
        let runner = GuardrailRunner::new(GuardrailMode::Filter);
        let result = runner.run("hello world", &ctx()).await;
        assert_eq!(result.text, "hello world");
        assert!(!result.blocked);
    }

    #[tokio::test]
    async fn pii_mask_redacts_email() {
        let runner = GuardrailRunner::with_default_output_guardrails();
        let result = runner.run("contact me at jane@example.com", &ctx()).await;
        assert!(result.text.contains("[redacted-email]"));
        assert!(!result.text.contains("jane@example.com"));
        assert_eq!(result.fired, vec!["pii-mask"]);
    }

    struct AlwaysBlock;
    #[async_trait]
    impl Guardrail for AlwaysBlock {
        fn name(&self) -> &str {
            "always-block"
        }
        async fn check(&self, _text: &str, _ctx: &GuardrailContext) -> GuardrailVerdict {
            GuardrailVerdict::Blocked("policy violation".to_string())
        }
    }

    #[tokio::test]
    async fn block_mode_replaces_text_with_marker() {
        let mut runner = GuardrailRunner::new(GuardrailMode::Block);
        runner.register(Box::new(AlwaysBlock));
        let result = runner.run("sensitive", &ctx()).await;
        assert!(result.blocked);
        assert!(result.text.contains("content blocked"));
    }

    #[tokio::test]
    async fn filter_mode_passes_text_through_but_records_block() {
        let mut runner = GuardrailRunner::new(GuardrailMode::Filter);
        runner.register(Box::new(AlwaysBlock));
        let result = runner.run("sensitive", &ctx()).await;
        assert!(result.blocked);
        assert_eq!(result.text, "sensitive");
        assert_eq!(result.fired, vec!["always-block"]);
    }

    struct AppendTag;
    #[async_trait]
    impl Guardrail for AppendTag {
        fn name(&self) -> &str {
            "append-tag"
        }
        async fn check(&self, text: &str, _ctx: &GuardrailContext) -> GuardrailVerdict {
            GuardrailVerdict::Filtered(format!("{text}[tagged]"))
        }
    }

    #[tokio::test]
    async fn pipeline_is_left_to_right_composable() {
        let mut runner = GuardrailRunner::new(GuardrailMode::Filter);
        runner.register(Box::new(AppendTag));
        runner.register(Box::new(AppendTag));
        let result = runner.run("base", &ctx()).await;
        assert_eq!(result.text, "base[tagged][tagged]");
    }
}

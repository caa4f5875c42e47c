// Workflow templates built on top of the core primitives (spec §4.11
// `withApproval`, §4.12 `withSchedule`). Each one composes the Durable Step
// Wrapper, the Hook Registry, and a `ToolLoopEngine` run rather than adding
// any new suspension or retry machinery of its own.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::duration::parse_duration;
use crate::durable::{run_step, RuntimeDetector, StepConfig, TimeoutConfig};
use crate::error::{AgentLoopError, Result};
use crate::hooks::{HookOptions, HookOutcome, HookRegistry};
use crate::loop_engine::ToolLoopEngine;
use crate::step::TokenUsage;

async fn run_to_text(agent: &Arc<ToolLoopEngine>, prompt: String) -> Result<(String, TokenUsage)> {
    let handle = agent.stream(prompt);
    let text = handle
        .text
        .await
        .map_err(|_| AgentLoopError::fatal("agent stream closed before producing a final result"))?;
    let usage = handle.usage.await.unwrap_or_default();
    Ok((text, usage))
}

/// One named durable step a template ran, as reported in its `WorkflowResult`
/// (spec §4.11/§4.12, §6 "Templates" `{text, steps[], usage?}").
#[derive(Debug, Clone)]
pub struct WorkflowStep {
    pub name: String,
    pub completed: bool,
}

impl WorkflowStep {
    fn completed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            completed: true,
        }
    }
}

/// The result of a workflow template: the final text, the named durable
/// steps it ran in order, and token usage summed across every LLM call.
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub text: String,
    pub steps: Vec<WorkflowStep>,
    pub usage: Option<TokenUsage>,
}

/// Options for `with_approval`.
#[derive(Clone)]
pub struct ApprovalOptions {
    /// Prompt used to ask the agent to finalise after approval. The reviewer's
    /// modifications, if any, are appended.
    pub finalize_prompt: String,
    pub webhook_timeout: Duration,
}

impl Default for ApprovalOptions {
    fn default() -> Self {
        Self {
            finalize_prompt: "Finalise your previous draft for delivery.".to_string(),
            webhook_timeout: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Human-in-the-loop approval workflow (spec §4.11): draft, suspend for
/// webhook approval, finalise.
pub async fn with_approval(
    agent: &Arc<ToolLoopEngine>,
    prompt: impl Into<String>,
    hooks: &HookRegistry,
    detector: &RuntimeDetector,
    webhook_name: impl Into<String>,
    options: ApprovalOptions,
) -> Result<WorkflowResult> {
    let prompt = prompt.into();
    let webhook_name = webhook_name.into();
    let mut steps = Vec::with_capacity(3);
    let mut usage = TokenUsage::default();

    let (draft, draft_usage) = {
        let agent = Arc::clone(agent);
        run_step(detector, &StepConfig::new("llm-draft"), || {
            let agent = Arc::clone(&agent);
            let prompt = prompt.clone();
            async move { run_to_text(&agent, prompt).await }
        })
        .await?
    };
    usage.add(draft_usage);
    steps.push(WorkflowStep::completed("llm-draft"));

    let modifications = if detector.is_present() {
        let hook_options = HookOptions {
            description: Some("approve draft".to_string()),
            timeout: Some(options.webhook_timeout),
            default_value: Some(json!({"approved": false})),
            validate: None,
        };

        let (_hook_id, rx) = {
            let hooks = hooks.clone();
            let name = webhook_name.clone();
            let draft = draft.clone();
            run_step(detector, &StepConfig::new("webhook-approval"), move || {
                let hooks = hooks.clone();
                let name = name.clone();
                let draft = draft.clone();
                let hook_options = hook_options.clone();
                async move { hooks.register(name, json!({ "draft": draft }), hook_options) }
            })
            .await?
        };

        let outcome = rx
            .await
            .unwrap_or_else(|_| HookOutcome::Rejected("hook channel closed unexpectedly".to_string()));

        match outcome {
            HookOutcome::Resolved(value) => extract_approval(value)?,
            HookOutcome::TimedOut(value) => extract_approval(value)?,
            HookOutcome::Rejected(reason) => return Err(AgentLoopError::hook_rejected(reason)),
        }
    } else {
        // Developer-mode convenience: without a durable runtime, auto-approve.
        None
    };
    steps.push(WorkflowStep::completed("webhook-approval"));

    let finalize_prompt = match modifications {
        Some(feedback) => format!(
            "{}\n\nIncorporate this reviewer feedback:\n{feedback}",
            options.finalize_prompt
        ),
        None => options.finalize_prompt.clone(),
    };

    let (final_text, finalize_usage) = {
        let agent = Arc::clone(agent);
        run_step(detector, &StepConfig::new("llm-finalize"), || {
            let agent = Arc::clone(&agent);
            let prompt = finalize_prompt.clone();
            async move { run_to_text(&agent, prompt).await }
        })
        .await?
    };
    usage.add(finalize_usage);
    steps.push(WorkflowStep::completed("llm-finalize"));

    Ok(WorkflowResult {
        text: final_text,
        steps,
        usage: Some(usage),
    })
}

/// Reads the `approved`/`modifications` fields out of a hook outcome value.
/// `approved: false` (or missing) is a rejection; `approved: true` returns
/// any reviewer-supplied modifications text.
fn extract_approval(value: Value) -> Result<Option<String>> {
    let approved = value.get("approved").and_then(Value::as_bool).unwrap_or(false);
    if !approved {
        let reason = value
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("approval declined")
            .to_string();
        return Err(AgentLoopError::hook_rejected(reason));
    }
    Ok(value
        .get("modifications")
        .and_then(Value::as_str)
        .map(str::to_string))
}

/// Delayed execution (spec §4.12): sleep, then run the agent.
pub async fn with_schedule(
    agent: &Arc<ToolLoopEngine>,
    prompt: impl Into<String>,
    delay: &str,
    detector: &RuntimeDetector,
) -> Result<WorkflowResult> {
    let delay_duration = parse_duration(delay)?;
    let step_timeout = TimeoutConfig::new().with_start_to_close(delay_duration + Duration::from_secs(30));
    let step_config = StepConfig::new("sleep").with_timeout(step_timeout);

    run_step(detector, &step_config, || async {
        tokio::time::sleep(delay_duration).await;
        Ok(())
    })
    .await?;

    let prompt = prompt.into();
    let agent = Arc::clone(agent);
    let (text, usage) = run_step(detector, &StepConfig::new("llm-generate"), || {
        let agent = Arc::clone(&agent);
        let prompt = prompt.clone();
        async move { run_to_text(&agent, prompt).await }
    })
    .await?;

    Ok(WorkflowResult {
        text,
        steps: vec![
            WorkflowStep::completed("sleep"),
            WorkflowStep::completed("llm-generate"),
        ],
        usage: Some(usage),
    })
}

//! Approval Workflow Example - Human-in-the-loop draft/approve/finalise
//!
//! Demonstrates `with_approval` (spec §4.11): the agent drafts a response,
//! suspends for an external approval decision delivered through the Hook
//! Registry, then finalises incorporating any reviewer feedback.
//!
//! This demo simulates the external reviewer with a background task that
//! approves the draft after a short delay instead of waiting on a real
//! webhook, but the suspend/resume mechanics are the same ones a webhook
//! handler would drive via `HookRegistry::resume`.
//!
//! Prerequisites:
//! - Set OPENAI_API_KEY environment variable
//!
//! Run with: cargo run --example approval_workflow

use std::sync::Arc;
use std::time::Duration;

use agentloom_core::{
    with_approval, ApprovalOptions, HookRegistry, HookStatus, LlmDriver, NoopRuntime,
    OpenAiProtocolDriver, RuntimeDetector, ToolLoopEngine, ToolRegistry,
};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("OPENAI_API_KEY").is_err() {
        eprintln!("Error: OPENAI_API_KEY environment variable is not set");
        eprintln!("  export OPENAI_API_KEY=your-api-key");
        std::process::exit(1);
    }

    println!("=== Approval Workflow Demo ===\n");

    let llm: Arc<dyn LlmDriver> = Arc::new(OpenAiProtocolDriver::from_env()?);
    let engine = Arc::new(ToolLoopEngine::new(
        "writer",
        Arc::new(ToolRegistry::new()),
        llm,
        "You draft short, professional replies to customer emails.",
        "gpt-4o-mini",
    ));

    let hooks = HookRegistry::new();
    let detector = RuntimeDetector::new();
    // A real deployment initialises this with a durable runtime handle so the
    // suspension actually survives a process restart; here a no-op runtime is
    // enough to exercise the suspend/resume path within one process.
    detector.init(Some(Arc::new(NoopRuntime)));

    let hooks_for_reviewer = hooks.clone();
    tokio::spawn(async move {
        for _ in 0..200 {
            let pending = hooks_for_reviewer.list(Some(HookStatus::Pending));
            if let Some(instance) = pending.first() {
                println!("\n[reviewer] approving draft for hook {}\n", instance.id);
                let _ = hooks_for_reviewer.resume(
                    &instance.id,
                    json!({ "approved": true, "modifications": "Please add a one-line apology for the delay." }),
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    });

    let prompt = "Reply to a customer whose order shipped three days late, asking for patience.";
    println!("User: {prompt}\n");

    let result = with_approval(
        &engine,
        prompt,
        &hooks,
        &detector,
        "draft-approval",
        ApprovalOptions::default(),
    )
    .await?;

    println!("Final (approved) reply:\n{}", result.text);
    println!(
        "\nSteps: {}",
        result
            .steps
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    );
    if let Some(usage) = result.usage {
        println!("Tokens used: {}", usage.total());
    }

    Ok(())
}

//! Sub-Agent Spawn Example - Delegating work to a child agent
//!
//! Demonstrates the `spawn_agent` tool a root agent is given automatically
//! (up to `SpawnerConfig::max_spawn_depth`): the lead agent can delegate a
//! sub-task to a freshly created child and have its output relayed back onto
//! its own event stream.
//!
//! Prerequisites:
//! - Set OPENAI_API_KEY environment variable
//!
//! Run with: cargo run --example sub_agent_spawn

use std::sync::Arc;

use agentloom_core::{
    create_agent, AgentConfig, AgentDeps, LlmDriver, LoopEvent, OpenAiProtocolDriver, RoleRegistry,
    SpawnerConfig, SubAgentChunkStatus,
};
use futures::StreamExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("OPENAI_API_KEY").is_err() {
        eprintln!("Error: OPENAI_API_KEY environment variable is not set");
        eprintln!("  export OPENAI_API_KEY=your-api-key");
        std::process::exit(1);
    }

    println!("=== Sub-Agent Spawn Demo ===\n");

    let llm: Arc<dyn LlmDriver> = Arc::new(OpenAiProtocolDriver::from_env()?);

    let mut roles = RoleRegistry::with_defaults();
    roles.register(
        "summariser",
        "You are a summarisation-specialised sub-agent. Condense the given material into \
         three crisp bullet points and report them back to the parent agent.",
    );

    let deps = AgentDeps::new(Arc::clone(&llm), llm, "gpt-4o-mini", "gpt-4o-mini")
        .with_role_registry(roles)
        .with_spawner_config(SpawnerConfig {
            max_spawn_depth: 1,
            child_max_steps: 8,
            summary_threshold_chars: 500,
        });

    let config = AgentConfig::new(
        "lead",
        "You coordinate a small team. When a task benefits from focused, independent work, \
         delegate it via spawn_agent rather than doing it yourself, then incorporate the \
         sub-agent's findings into your final answer.",
    )
    .with_max_steps(10);

    let agent = create_agent(config, deps);

    println!("Registered tools: {:?}\n", agent.get_tool_names().await?);

    let prompt = "Delegate to a 'summariser' sub-agent: summarise why Rust's ownership model \
                  prevents data races, then present its summary to me.";
    println!("User: {prompt}\n");

    let mut handle = agent.stream(prompt).await?;
    while let Some(event) = handle.events.next().await {
        match event {
            LoopEvent::TextDelta { delta, .. } => print!("{delta}"),
            LoopEvent::ToolCall { tool_name, args, .. } => {
                println!("\n  -> calling {tool_name}({args})");
            }
            LoopEvent::SubAgentChunk { agent_id, role, text, status, .. } => {
                let marker = match status {
                    SubAgentChunkStatus::Streaming => "…",
                    SubAgentChunkStatus::Complete => "done",
                };
                println!("  [sub-agent {agent_id} ({role}), {marker}] {text}");
            }
            LoopEvent::ToolResult { tool_name, .. } => {
                println!("  <- {tool_name} returned");
            }
            _ => {}
        }
    }

    let final_text = handle.text.await?;
    println!("\n\nFinal: {final_text}");

    Ok(())
}

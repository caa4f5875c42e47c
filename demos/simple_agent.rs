//! Simple Agent Example - Minimal agent loop without tools
//!
//! This is the simplest possible use of agentloom-core: an agent with no
//! tools, just a streamed conversation against OpenAI.
//!
//! Prerequisites:
//! - Set OPENAI_API_KEY environment variable
//!
//! Run with: cargo run --example simple_agent

use std::sync::Arc;

use agentloom_core::{create_agent, Agent, AgentConfig, AgentDeps, LlmDriver, LoopEvent, OpenAiProtocolDriver};
use futures::StreamExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("OPENAI_API_KEY").is_err() {
        eprintln!("Error: OPENAI_API_KEY not set");
        eprintln!("  export OPENAI_API_KEY=your-key");
        std::process::exit(1);
    }

    println!("=== Simple Agent ===\n");

    let llm: Arc<dyn LlmDriver> = Arc::new(OpenAiProtocolDriver::from_env()?);
    let deps = AgentDeps::new(Arc::clone(&llm), llm, "gpt-4o-mini", "gpt-4o-mini");
    let config = AgentConfig::new("assistant", "You are a helpful assistant. Be concise.");
    let agent: Arc<Agent> = create_agent(config, deps);

    let user_input = "What is the Rust programming language in one sentence?";
    println!("User: {}\n", user_input);

    let mut handle = agent.stream(user_input).await?;
    while let Some(event) = handle.events.next().await {
        if let LoopEvent::TextDelta { delta, .. } = event {
            print!("{delta}");
        }
    }
    println!();

    let final_text = handle.text.await?;
    println!("\nAssistant: {final_text}");

    Ok(())
}

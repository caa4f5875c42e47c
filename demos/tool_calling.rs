//! Tool Calling Example - Agent Loop with the Tool trait
//!
//! Demonstrates tool calling via the `Tool` trait and `AgentConfig::with_tool`.
//! Uses OpenAI as the LLM provider.
//!
//! Prerequisites:
//! - Set OPENAI_API_KEY environment variable
//!
//! Run with: cargo run --example tool_calling

use std::sync::Arc;

use agentloom_core::{
    create_agent, Agent, AgentConfig, AgentDeps, LlmDriver, LoopEvent, OpenAiProtocolDriver, Tool,
    ToolContext, ToolExecutionResult,
};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

/// Tool that returns the current date and time.
struct GetCurrentTime;

#[async_trait]
impl Tool for GetCurrentTime {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time. Use this when asked about the current time or date."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "format": {
                    "type": "string",
                    "description": "Output format: 'iso8601', 'unix', or 'human'",
                    "enum": ["iso8601", "unix", "human"]
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: Value, _ctx: &ToolContext) -> ToolExecutionResult {
        let format = arguments.get("format").and_then(Value::as_str).unwrap_or("human");
        let now = chrono::Utc::now();
        let result = match format {
            "unix" => json!({ "timestamp": now.timestamp(), "format": "unix" }),
            "iso8601" => json!({ "datetime": now.to_rfc3339(), "format": "iso8601" }),
            _ => json!({
                "datetime": now.format("%A, %B %d, %Y at %H:%M:%S UTC").to_string(),
                "format": "human"
            }),
        };
        ToolExecutionResult::success(result)
    }
}

/// Tool that performs basic arithmetic.
struct Calculator;

#[async_trait]
impl Tool for Calculator {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Perform basic arithmetic: add, subtract, multiply, divide."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": { "type": "string", "enum": ["add", "subtract", "multiply", "divide"] },
                "a": { "type": "number" },
                "b": { "type": "number" }
            },
            "required": ["operation", "a", "b"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: Value, _ctx: &ToolContext) -> ToolExecutionResult {
        let operation = arguments.get("operation").and_then(Value::as_str);
        let a = arguments.get("a").and_then(Value::as_f64);
        let b = arguments.get("b").and_then(Value::as_f64);

        match (operation, a, b) {
            (Some(op), Some(a), Some(b)) => {
                let result = match op {
                    "add" => a + b,
                    "subtract" => a - b,
                    "multiply" => a * b,
                    "divide" => {
                        if b == 0.0 {
                            return ToolExecutionResult::tool_error("division by zero is not allowed");
                        }
                        a / b
                    }
                    _ => return ToolExecutionResult::tool_error(format!("unknown operation: {op}")),
                };
                ToolExecutionResult::success(json!({ "expression": format!("{a} {op} {b}"), "result": result }))
            }
            _ => ToolExecutionResult::tool_error("operation, a, and b are all required"),
        }
    }
}

async fn run_example(agent: &Arc<Agent>, prompt: &str) -> anyhow::Result<()> {
    println!("User: {prompt}\n");
    let mut handle = agent.stream(prompt).await?;
    while let Some(event) = handle.events.next().await {
        match event {
            LoopEvent::TextDelta { delta, .. } => print!("{delta}"),
            LoopEvent::ToolCall { tool_name, args, .. } => {
                println!("\n  -> calling {tool_name}({args})");
            }
            LoopEvent::ToolResult { tool_name, result, .. } => {
                println!("  <- {tool_name} returned {result}");
            }
            _ => {}
        }
    }
    let final_text = handle.text.await?;
    println!("\n\nFinal: {final_text}\n");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::WARN).init();

    if std::env::var("OPENAI_API_KEY").is_err() {
        eprintln!("Error: OPENAI_API_KEY environment variable is not set");
        eprintln!("  export OPENAI_API_KEY=your-api-key");
        std::process::exit(1);
    }

    println!("=== Tool Calling Demo ===\n");

    let llm: Arc<dyn LlmDriver> = Arc::new(OpenAiProtocolDriver::from_env()?);
    let deps = AgentDeps::new(Arc::clone(&llm), llm, "gpt-4o-mini", "gpt-4o-mini");

    println!("--- Example 1: Time Query ---\n");
    let config = AgentConfig::new(
        "clock",
        "You are a helpful assistant with access to a time tool. Use get_current_time when asked about the time.",
    )
    .with_tool(GetCurrentTime)
    .with_max_steps(5);
    let agent = create_agent(config, deps.clone());
    run_example(&agent, "What time is it right now?").await?;

    println!("--- Example 2: Calculation ---\n");
    let config = AgentConfig::new(
        "calculator",
        "You are a helpful calculator assistant. Use the calculate tool for math operations.",
    )
    .with_tool(Calculator)
    .with_max_steps(5);
    let agent = create_agent(config, deps.clone());
    run_example(&agent, "What is 42 multiplied by 17?").await?;

    println!("--- Example 3: Multiple Tools ---\n");
    let config = AgentConfig::new(
        "helper",
        "You are a helpful assistant with access to multiple tools: get_current_time for time queries, calculate for math. Use the appropriate tool based on the user's request.",
    )
    .with_tool(GetCurrentTime)
    .with_tool(Calculator)
    .with_max_steps(5);
    let agent = create_agent(config, deps);
    run_example(&agent, "What is 100 divided by 4, and what time is it?").await?;

    println!("=== Demo completed! ===");
    Ok(())
}

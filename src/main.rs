use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use ciu_agent::llm::HttpLlmTransport;
use ciu_agent::platform::create_platform;
use ciu_agent::{build_agent, Settings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Dev diagnostics via RUST_LOG, stderr only.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let task: String = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if task.is_empty() {
        eprintln!("usage: ciu-agent <task description>");
        eprintln!("example: ciu-agent Open Notepad and type hello world");
        std::process::exit(2);
    }

    let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
    if api_key.is_empty() {
        eprintln!("ANTHROPIC_API_KEY is not set");
        std::process::exit(1);
    }

    // Optional JSON settings overlay.
    let settings = match std::env::var("CIU_AGENT_CONFIG") {
        Ok(path) => {
            let text = std::fs::read_to_string(&path)?;
            Settings::from_value(serde_json::from_str(&text)?)
        }
        Err(_) => Settings::default(),
    };

    let platform = create_platform();
    let transport = Arc::new(HttpLlmTransport::new(api_key));
    let agent = build_agent(platform, transport, settings);

    let zones = agent.startup().await;
    tracing::info!(zones, "agent ready");

    let result = agent.run_task(&task).await;
    agent.shutdown();

    let separator = "-".repeat(60);
    println!("{separator}");
    println!("Task:       {}", result.task_description);
    println!(
        "Status:     {}",
        if result.success { "SUCCESS" } else { "FAILED" }
    );
    println!(
        "Steps:      {}/{} completed",
        result.steps_completed, result.steps_total
    );
    println!("Plans used: {}", result.plans_used);
    println!("API calls:  {}", result.api_calls_used);
    println!("Duration:   {} ms", result.duration_ms);
    if !result.error.is_empty() {
        println!("Error:      {}", result.error);
    }
    println!("{separator}");

    std::process::exit(if result.success { 0 } else { 1 });
}

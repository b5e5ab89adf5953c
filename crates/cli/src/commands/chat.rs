//! `postclaw chat`: Interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;
use postclaw_agent::AgentLoop;
use postclaw_config::AppConfig;
use postclaw_core::event::{DomainEvent, EventBus};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

pub async fn run(message: Option<String>, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Fail early with setup instructions when no key is set
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GEMINI_API_KEY=...      (default provider)");
        eprintln!("    OPENAI_API_KEY=sk-...   (with POSTCLAW_PROVIDER=openai)");
        eprintln!("    POSTCLAW_API_KEY=...    (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    if config.social.bearer_token.is_none() {
        eprintln!("  WARNING: No posting token set (TWITTER_BEARER_TOKEN); posts will fail.");
    }

    let router = postclaw_providers::router::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;

    let tools = Arc::new(postclaw_tools::default_registry(&config.social));
    let tool_names = tools.names().join(", ");

    let event_bus = Arc::new(EventBus::default());
    if verbose {
        spawn_event_logger(&event_bus);
    }

    let mut agent = AgentLoop::from_config(&config, provider, tools, event_bus);

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let response = agent.process(&msg).await;
        eprint!("\r              \r");
        println!("{response}");
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  PostClaw — Interactive Mode");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Tools:     {tool_names}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let (input_tx, input_rx) = mpsc::channel(32);
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(32);

    tokio::spawn(read_stdin_lines(input_tx));

    let printer = tokio::spawn(async move {
        prompt();
        while let Some(reply) = reply_rx.recv().await {
            println!();
            for line in reply.lines() {
                println!("  Assistant > {line}");
            }
            println!();
            prompt();
        }
    });

    agent.run(input_rx, reply_tx).await;
    printer.await?;

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

/// Forward stdin lines until EOF or an exit command.
async fn read_stdin_lines(tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    prompt();
                    continue;
                }
                if matches!(line.as_str(), "exit" | "quit" | "/exit" | "/quit" | ":q") {
                    break;
                }
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                eprintln!("  [Input Error] {e}");
                break;
            }
        }
    }
}

fn prompt() {
    print!("  You > ");
    let _ = std::io::stdout().flush();
}

fn spawn_event_logger(event_bus: &EventBus) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event.as_ref() {
                DomainEvent::ResponseGenerated { model, tokens_used, .. } => {
                    debug!(model = %model, tokens = ?tokens_used, "event: response generated");
                }
                DomainEvent::ToolExecuted { tool_name, success, duration_ms, .. } => {
                    debug!(tool = %tool_name, success, duration_ms, "event: tool executed");
                }
                DomainEvent::ImplicitCallSynthesized { tool_name, payload_preview, .. } => {
                    debug!(tool = %tool_name, preview = %payload_preview, "event: implicit call");
                }
                DomainEvent::RateLimitDenied { tool_name, wait_secs, .. } => {
                    debug!(tool = %tool_name, wait_secs, "event: rate limit denied");
                }
                DomainEvent::ErrorOccurred { context, error_message, .. } => {
                    debug!(context = %context, error = %error_message, "event: error");
                }
            }
        }
    });
}

//! Stream a single completion from an OpenAI-compatible endpoint.
//!
//! Run with: cargo run -p openai-brain --example test_stream
//! Or with a custom message: cargo run -p openai-brain --example test_stream -- "Your message here"
//!
//! Make sure to set environment variables in .env:
//!   OPENAI_API_KEY - API key for authentication
//!   OPENAI_BASE_URL - API base URL (default: https://api.openai.com/v1)
//!   OPENAI_MODEL - Model name (default: gpt-4o-mini)

use futures::StreamExt;
use openai_brain::{CapabilityClass, ChatTurn, ModelBackend, ModelEndpoint, OpenAiBrain};
use std::env;
use std::io::Write;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let message_text = if args.len() > 1 {
        args[1..].join(" ")
    } else {
        "Hello! Please respond with a short greeting.".to_string()
    };

    let endpoint = ModelEndpoint::new(
        "example",
        CapabilityClass::Dialogue,
        env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
        env::var("OPENAI_API_KEY")?,
        env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
    );

    let brain = OpenAiBrain::from_env()?;
    println!("Brain initialized: {}", brain.name());
    println!("Model: {}", endpoint.model);
    println!("Sending: \"{}\"\n", message_text);

    let mut stream = brain
        .complete_streaming(
            &endpoint,
            "You are a concise assistant.",
            &[ChatTurn::user(message_text)],
        )
        .await?;

    let mut stdout = std::io::stdout();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        print!("{}", chunk.text);
        stdout.flush()?;
        if chunk.finished {
            break;
        }
    }
    println!();

    Ok(())
}

//! Example running one requirements turn against a local Ollama instance
//!
//! The PM, SA and PG agents take turns on a single request and any files
//! the programmer announces are written under a temporary directory.
//!
//! Prerequisites:
//! - Ollama must be installed and running (https://ollama.ai)
//! - A model must be pulled (e.g., `ollama pull llama3.1:8b`)
//!
//! Run with: cargo run --example group_chat_example

use futures::StreamExt;
use std::io::Write;
use std::sync::Arc;

use reqlab_engine::agent::{default_roster, Agent};
use reqlab_engine::artifacts::ArtifactExtractor;
use reqlab_engine::group_chat::{has_role_tag, GroupChat};
use reqlab_engine::llm::{ollama::OllamaProvider, ChatBackend};
use reqlab_engine::telemetry::init_telemetry;

const MAX_STEPS: usize = 6;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_telemetry();
    println!("=== Group Chat Example ===\n");

    let backend = Arc::new(OllamaProvider::new("http://localhost:11434", "llama3.1:8b"));
    if !backend.check_health().await {
        eprintln!("✗ Ollama is not reachable at http://localhost:11434");
        eprintln!("  1. Install Ollama from https://ollama.ai");
        eprintln!("  2. Pull a model: ollama pull llama3.1:8b");
        return Ok(());
    }

    let output = std::env::temp_dir().join("reqlab-example");
    let extractor = ArtifactExtractor::new(&output);

    let mut chat = GroupChat::with_agents(default_roster(backend, false));
    chat.add_user_message(
        "I need a small command-line todo app. Requirements are final, please hand off to design.",
    );

    for _ in 0..MAX_STEPS {
        let Some(speaker) = chat.next_speaker() else {
            break;
        };
        println!("\n[{}] {}", speaker.name(), speaker.role());

        {
            let stream = chat.step_streaming();
            tokio::pin!(stream);
            while let Some(chunk) = stream.next().await {
                print!("{}", chunk);
                std::io::stdout().flush().ok();
            }
        }
        println!();

        if let Some(last) = chat.history().last() {
            if last.author().is_some_and(|author| has_role_tag(author, "PG")) {
                for path in extractor.extract_and_save(&last.text, "example")? {
                    println!("✓ Saved {}", path.display());
                }
            }
        }
    }

    println!("\n{} messages in history", chat.history().len());
    Ok(())
}

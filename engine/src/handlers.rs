//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - chat: interactive group chat with artifact extraction
//! - extract: run the artifact extractor over a saved transcript
//! - agents: list the roster
//! - config show: print the effective configuration
//! - key set / key status: manage API keys in the keychain

use anyhow::{Context, Result};
use futures::StreamExt;
use sdk::{ChatRole, Message};
use serde_json::json;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::agent::{default_roster, Agent, AgentKind, Persona};
use crate::artifacts::ArtifactExtractor;
use crate::config::Config;
use crate::group_chat::{has_role_tag, CancellationFlag, GroupChat};
use crate::llm::backend_from_config;
use crate::secrets::{SecretManager, KNOWN_KEYS, SERVICE_NAME};

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// How one turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnOutcome {
    /// No agent wants to speak; waiting for the user
    Finished,
    /// `max_steps_per_turn` was reached
    StepLimit,
    /// User pressed Ctrl+C mid-reply
    Cancelled,
    /// Backend fault in non-streaming mode
    Failed,
}

/// Run the interactive group chat
///
/// Reads one user message per line from stdin, then lets the agents talk
/// until the turn ends. Files announced by the programmer are written to the
/// session directory after each of its replies.
pub async fn handle_chat(session: Option<String>, no_stream: bool, config: &Config) -> Result<()> {
    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let extractor = ArtifactExtractor::new(&config.core.output_dir);
    // Fail on a bad session id before the user types anything
    let session_dir = extractor.session_dir(&session_id)?;

    let secrets = SecretManager::new(SERVICE_NAME);
    let backend = backend_from_config(&config.llm, &secrets)
        .context("Failed to initialize chat backend")?;
    if !backend.check_health().await {
        tracing::warn!("Chat backend '{}' reports unhealthy", backend.name());
    }

    let mut chat = GroupChat::with_agents(default_roster(backend, config.chat.include_manager));
    let streaming = config.chat.streaming && !no_stream;

    println!("ReqLab group chat (session {})", session_id);
    println!("Files are saved to {}", session_dir.display());
    println!("Commands: /history, /files, /exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nYou> ");
        std::io::stdout().flush().ok();

        let Some(line) = next_input(&mut lines, interrupted()).await? else {
            println!();
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            "/exit" | "/quit" => break,
            "/history" => {
                print_history(chat.history());
                continue;
            }
            "/files" => {
                print_files(&extractor.list_session_files(&session_id)?);
                continue;
            }
            _ => {}
        }

        chat.add_user_message(input);
        let outcome = run_turn(
            &mut chat,
            &extractor,
            &session_id,
            streaming,
            config.chat.max_steps_per_turn,
        )
        .await?;

        match outcome {
            TurnOutcome::Finished => {}
            TurnOutcome::StepLimit => println!(
                "\n(Stopped after {} agent replies; send a message to continue)",
                config.chat.max_steps_per_turn
            ),
            TurnOutcome::Cancelled => println!("\n(Reply cancelled; it was not kept)"),
            TurnOutcome::Failed => println!("\n(The turn ended with an error; try again)"),
        }
    }

    println!("Bye. Session {} files are in {}", session_id, session_dir.display());
    Ok(())
}

/// Next stdin line, or `None` on end of input or once `interrupt` fires
async fn next_input<R>(
    lines: &mut Lines<R>,
    interrupt: impl Future<Output = ()>,
) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        line = lines.next_line() => line.context("Failed to read stdin"),
        _ = interrupt => Ok(None),
    }
}

/// Resolves on Ctrl+C; never resolves if the signal cannot be watched
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn run_turn(
    chat: &mut GroupChat,
    extractor: &ArtifactExtractor,
    session_id: &str,
    streaming: bool,
    max_steps: usize,
) -> Result<TurnOutcome> {
    for _ in 0..max_steps {
        let Some(speaker) = chat.next_speaker() else {
            return Ok(TurnOutcome::Finished);
        };
        println!("\n[{}] {}", speaker.name(), speaker.role());

        if streaming {
            let cancel = CancellationFlag::new();
            let ctrl_c = cancel.cancel_on_ctrl_c();
            {
                let stream = chat.step_streaming_with(cancel.clone());
                tokio::pin!(stream);
                while let Some(chunk) = stream.next().await {
                    print!("{}", chunk);
                    std::io::stdout().flush().ok();
                }
            }
            ctrl_c.abort();
            println!();

            if cancel.is_cancelled() {
                return Ok(TurnOutcome::Cancelled);
            }
        } else {
            let result = tokio::select! {
                result = chat.step() => result,
                _ = interrupted() => return Ok(TurnOutcome::Cancelled),
            };
            match result {
                Ok(Some(reply)) => println!("{}", reply),
                Ok(None) => return Ok(TurnOutcome::Finished),
                Err(e) => {
                    tracing::warn!("{} failed: {}", speaker.name(), e);
                    println!("Error: {}", crate::secrets::scrub(&e.to_string()));
                    return Ok(TurnOutcome::Failed);
                }
            }
        }

        if let Some(last) = chat.history().last() {
            if last.author().is_some_and(|author| has_role_tag(author, "PG")) {
                if let Err(e) = save_artifacts(extractor, &last.text, session_id) {
                    tracing::warn!("{:#}", e);
                    println!("\n({:#}; the turn goes on)", e);
                }
            }
        }
    }

    Ok(if chat.next_speaker().is_some() {
        TurnOutcome::StepLimit
    } else {
        TurnOutcome::Finished
    })
}

fn save_artifacts(extractor: &ArtifactExtractor, reply: &str, session_id: &str) -> Result<()> {
    let saved = extractor
        .extract_and_save(reply, session_id)
        .context("Failed to save generated files")?;
    if !saved.is_empty() {
        println!("\nSaved {} file(s):", saved.len());
        for path in &saved {
            println!("  {}", path.display());
        }
    }
    Ok(())
}

fn print_history(history: &[Message]) {
    if history.is_empty() {
        println!("No messages yet");
        return;
    }
    for message in history {
        let who = match (message.role, message.author()) {
            (ChatRole::User, _) => "You".to_string(),
            (_, Some(author)) => author.to_string(),
            (role, None) => role.to_string(),
        };
        println!("--- {} ---", who);
        println!("{}", message.text);
    }
}

fn print_files(files: &[PathBuf]) {
    if files.is_empty() {
        println!("No files generated yet");
        return;
    }
    for file in files {
        println!("  {}", file.display());
    }
}

/// Extract annotated code blocks from a saved transcript
pub async fn handle_extract(
    file: &Path,
    session: &str,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let extractor = ArtifactExtractor::new(&config.core.output_dir);
    let artifacts = extractor
        .extract_artifacts(&content, session)
        .context("Failed to extract artifacts")?;

    match format {
        OutputFormat::Text => {
            if artifacts.is_empty() {
                println!("No annotated code blocks found in {}", file.display());
                return Ok(());
            }
            println!("Extracted {} file(s):", artifacts.len());
            for artifact in &artifacts {
                println!(
                    "  {} ({} bytes) -> {}",
                    artifact.filename,
                    artifact.content.len(),
                    artifact.absolute_path.display()
                );
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "session": session,
                "files": artifacts.iter().map(|a| {
                    json!({
                        "filename": a.filename,
                        "path": a.absolute_path,
                        "bytes": a.content.len()
                    })
                }).collect::<Vec<_>>(),
                "count": artifacts.len()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Personas in roster order, as configured
fn roster_personas(config: &Config) -> Vec<Persona> {
    let mut kinds = AgentKind::TEAM.to_vec();
    if config.chat.include_manager {
        kinds.push(AgentKind::Manager);
    }
    kinds.into_iter().map(Persona::for_kind).collect()
}

/// List the agents in the roster
pub async fn handle_agents(config: &Config, format: OutputFormat) -> Result<()> {
    let personas = roster_personas(config);

    match format {
        OutputFormat::Text => {
            println!("Agents ({}):", personas.len());
            println!();
            for persona in &personas {
                println!("  {:<8} {}", persona.name, persona.role);
                println!("           {}", persona.description);
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "agents": personas.iter().map(|p| {
                    json!({
                        "name": p.name,
                        "role": p.role,
                        "description": p.description
                    })
                }).collect::<Vec<_>>()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Print the effective configuration
pub async fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let rendered =
                toml::to_string_pretty(config).context("Failed to render configuration")?;
            println!("{}", rendered);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
    }
    Ok(())
}

/// Prompt for an API key and store it in the keychain
pub async fn handle_key_set(name: &str) -> Result<()> {
    if !KNOWN_KEYS.contains(&name) {
        tracing::warn!("'{}' is not a key any backend reads", name);
    }

    let value = rpassword::prompt_password_stdout(&format!("Enter value for {}: ", name))
        .context("Failed to read key")?;

    SecretManager::new(SERVICE_NAME).set_secret(name, &value)?;
    println!("Stored {} in the system keychain.", name);
    Ok(())
}

/// Show which API keys are available
pub async fn handle_key_status(format: OutputFormat) -> Result<()> {
    let secrets = SecretManager::new(SERVICE_NAME);
    let status: Vec<(&str, bool)> = KNOWN_KEYS
        .iter()
        .map(|key| (*key, secrets.has_secret(key)))
        .collect();

    match format {
        OutputFormat::Text => {
            println!("API keys:");
            for (key, present) in &status {
                println!(
                    "  {:<22} {}",
                    key,
                    if *present { "available" } else { "missing" }
                );
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "keys": status.iter().map(|(key, present)| {
                    json!({ "name": key, "available": present })
                }).collect::<Vec<_>>()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

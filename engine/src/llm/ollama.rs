//! Ollama Chat Backend
//!
//! This module implements the ChatBackend trait for Ollama, a local LLM
//! server, typically at http://localhost:11434.
//!
//! Key features:
//! - Local execution (no API keys required)
//! - NDJSON streaming (`"stream": true` returns one JSON object per line)
//! - Error mapping to LLMError

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ChatBackend, LLMError, Result, TokenStream};
use sdk::Message;

/// Maximum wait for the next NDJSON line before the stream is failed
const STREAM_IDLE_TIMEOUT_SECS: u64 = 120;

/// Ollama backend configuration
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    /// Base URL for Ollama API (typically http://localhost:11434)
    base_url: String,

    /// Model name to use (e.g., "llama3.1:8b")
    model: String,

    /// HTTP client for API requests
    client: Client,
}

impl OllamaProvider {
    /// Create a new Ollama backend
    ///
    /// # Arguments
    /// * `base_url` - Base URL for Ollama API (e.g., "http://localhost:11434")
    /// * `model` - Model name to use (e.g., "llama3.1:8b")
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Convert our Message format to Ollama's format
    fn convert_messages(&self, messages: &[Message]) -> Vec<OllamaMessage> {
        messages
            .iter()
            .map(|msg| OllamaMessage {
                role: msg.role.to_string(),
                content: msg.text.clone(),
            })
            .collect()
    }

    async fn send(&self, messages: &[Message], stream: bool) -> Result<Response> {
        let request = OllamaRequest {
            model: self.model.clone(),
            messages: self.convert_messages(messages),
            stream,
        };

        tracing::debug!(
            "Ollama request: model={}, messages={}, stream={}",
            self.model,
            request.messages.len(),
            stream
        );

        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else if e.is_connect() {
                    LLMError::ProviderUnavailable(format!(
                        "Cannot connect to Ollama at {}. Is Ollama running?",
                        self.base_url
                    ))
                } else {
                    LLMError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::ProviderUnavailable(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

/// Decode one NDJSON line into its content fragment
fn parse_stream_line(line: &str) -> Result<Option<OllamaResponse>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let chunk: OllamaResponse = serde_json::from_str(line)
        .map_err(|e| LLMError::ParseError(format!("Failed to parse Ollama chunk: {}", e)))?;
    if let Some(error) = &chunk.error {
        return Err(LLMError::InvalidRequest(error.clone()));
    }
    Ok(Some(chunk))
}

#[async_trait]
impl ChatBackend for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url.trim_end_matches('/'));
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Ollama health check failed: {}", e);
                false
            }
        }
    }

    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let start = std::time::Instant::now();
        let response = self.send(messages, false).await?;

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(format!("Failed to parse Ollama response: {}", e)))?;

        tracing::info!(
            "Ollama response received in {:.1}s",
            start.elapsed().as_secs_f64()
        );

        if let Some(error) = ollama_response.error {
            return Err(LLMError::InvalidRequest(error));
        }

        Ok(ollama_response
            .message
            .map(|m| m.content)
            .unwrap_or_default())
    }

    async fn stream(&self, messages: &[Message]) -> Result<TokenStream> {
        let response = self.send(messages, true).await?;

        let stream = try_stream! {
            let mut body = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            'read: loop {
                let next = tokio::time::timeout(
                    Duration::from_secs(STREAM_IDLE_TIMEOUT_SECS),
                    body.next(),
                )
                .await
                .map_err(|_| LLMError::Timeout)?;

                let Some(chunk) = next else {
                    break;
                };
                let chunk = chunk.map_err(|e| LLMError::NetworkError(format!("Streaming error: {}", e)))?;
                buffer.extend_from_slice(&chunk);

                while let Some(idx) = buffer.iter().position(|b| *b == b'\n') {
                    let line_bytes: Vec<u8> = buffer.drain(..=idx).collect();
                    let line = String::from_utf8_lossy(&line_bytes).to_string();
                    if let Some(parsed) = parse_stream_line(&line)? {
                        if let Some(text) = parsed.message.map(|m| m.content).filter(|t| !t.is_empty()) {
                            yield text;
                        }
                        if parsed.done {
                            buffer.clear();
                            break 'read;
                        }
                    }
                }
            }

            if !buffer.is_empty() {
                let line = String::from_utf8_lossy(&buffer).to_string();
                if let Some(parsed) = parse_stream_line(&line)? {
                    if let Some(text) = parsed.message.map(|m| m.content).filter(|t| !t.is_empty()) {
                        yield text;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Ollama API request format
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

/// Ollama message format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

/// Ollama API response format (whole reply or one streamed line)
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

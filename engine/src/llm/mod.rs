//! Chat Backend Abstraction Layer
//!
//! This module provides a common interface for the hosted chat-completion
//! services the agents talk to (OpenAI-compatible, Azure OpenAI, Ollama).
//! A backend accepts the full outbound message list (system instruction plus
//! history) and either returns one completion or a lazy stream of text
//! fragments.

use async_trait::async_trait;
use futures::Stream;
use sdk::Message;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::LLMConfig;
use crate::secrets::SecretManager;

pub mod ollama;
pub mod openai;

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Lazy sequence of completion fragments
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Errors that can occur while talking to a chat backend
#[derive(Debug, Clone, thiserror::Error)]
pub enum LLMError {
    #[error("Response blocked by content filter: {0}")]
    ContentFiltered(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl LLMError {
    /// Whether this is a content-safety rejection rather than a transport fault
    pub fn is_content_filter(&self) -> bool {
        matches!(self, LLMError::ContentFiltered(_))
    }
}

/// Chat backend trait that all providers implement
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Returns the name of the backend (e.g., "openai", "azure", "ollama")
    fn name(&self) -> &str;

    /// Issue one non-streaming completion request.
    ///
    /// Returns an empty string when the backend produced no text.
    async fn complete(&self, messages: &[Message]) -> Result<String>;

    /// Issue a streaming completion request.
    ///
    /// Errors opening the stream are returned directly; errors after that
    /// arrive as `Err` items inside the stream.
    async fn stream(&self, messages: &[Message]) -> Result<TokenStream>;

    /// Check if the backend is currently healthy and available
    async fn check_health(&self) -> bool {
        true
    }
}

/// Build the backend named by `config.default_provider`.
///
/// API keys are resolved through `secrets` at construction time so a missing
/// key fails fast instead of on the first agent turn.
pub fn backend_from_config(
    config: &LLMConfig,
    secrets: &SecretManager,
) -> anyhow::Result<Arc<dyn ChatBackend>> {
    let backend: Arc<dyn ChatBackend> = match config.default_provider.as_str() {
        "openai" => {
            let key = secrets.get_secret("openai_api_key")?;
            Arc::new(openai::OpenAIProvider::openai(
                &config.openai.base_url,
                &config.openai.model,
                key,
            ))
        }
        "azure" => {
            let key = secrets.get_secret("azure_openai_api_key")?;
            Arc::new(openai::OpenAIProvider::azure(
                &config.azure.endpoint,
                &config.azure.deployment,
                &config.azure.api_version,
                key,
            ))
        }
        "ollama" => Arc::new(ollama::OllamaProvider::new(
            &config.ollama.base_url,
            &config.ollama.model,
        )),
        other => anyhow::bail!("Unknown chat backend '{}'", other),
    };

    tracing::info!("Using chat backend '{}'", backend.name());
    Ok(backend)
}

/// Parse one server-sent-events payload line.
///
/// Returns `None` for non-data lines, `Some(None)` for the `[DONE]`
/// terminator and `Some(Some(data))` otherwise.
pub(crate) fn parse_sse_line(line: &str) -> Option<Option<&str>> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(None);
    }
    Some(Some(data))
}

//! OpenAI-compatible Chat Backend
//!
//! Talks to the `/chat/completions` API either on api.openai.com (or any
//! compatible server) or on an Azure OpenAI deployment. Both speak the same
//! request/response and SSE streaming format; they differ only in URL layout
//! and auth header.
//!
//! Content-safety rejections are reported as [`LLMError::ContentFiltered`]:
//! - HTTP 400, or any error body mentioning `content_filter`
//! - a streamed or final `finish_reason` of `content_filter`

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::time::Duration;

use super::{parse_sse_line, ChatBackend, LLMError, Result, TokenStream};
use sdk::Message;

/// Maximum wait for the next streamed chunk before the stream is failed
const STREAM_IDLE_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
enum Endpoint {
    OpenAI {
        base_url: String,
        model: String,
    },
    Azure {
        endpoint: String,
        deployment: String,
        api_version: String,
    },
}

/// OpenAI / Azure OpenAI chat backend
#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    endpoint: Endpoint,
    api_key: String,
    client: Client,
}

impl OpenAIProvider {
    /// Backend for api.openai.com or a compatible server
    pub fn openai(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::with_endpoint(
            Endpoint::OpenAI {
                base_url: base_url.into(),
                model: model.into(),
            },
            api_key.into(),
        )
    }

    /// Backend for an Azure OpenAI deployment
    pub fn azure(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::with_endpoint(
            Endpoint::Azure {
                endpoint: endpoint.into(),
                deployment: deployment.into(),
                api_version: api_version.into(),
            },
            api_key.into(),
        )
    }

    fn with_endpoint(endpoint: Endpoint, api_key: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            endpoint,
            api_key,
            client,
        }
    }

    fn url(&self) -> String {
        match &self.endpoint {
            Endpoint::OpenAI { base_url, .. } => {
                format!("{}/chat/completions", base_url.trim_end_matches('/'))
            }
            Endpoint::Azure {
                endpoint,
                deployment,
                api_version,
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                deployment,
                api_version
            ),
        }
    }

    fn payload(&self, messages: &[Message], stream: bool) -> Value {
        let api_messages: Vec<Value> = messages.iter().map(convert_message).collect();

        let mut payload = json!({
            "messages": api_messages,
            "stream": stream,
        });
        if let Endpoint::OpenAI { model, .. } = &self.endpoint {
            payload["model"] = json!(model);
        }
        payload
    }

    async fn send(&self, messages: &[Message], stream: bool) -> Result<Response> {
        let request = self.client.post(self.url()).json(&self.payload(messages, stream));
        let request = match &self.endpoint {
            Endpoint::OpenAI { .. } => request.bearer_auth(&self.api_key),
            Endpoint::Azure { .. } => request.header("api-key", &self.api_key),
        };

        tracing::debug!(
            "{} request: messages={}, stream={}",
            self.name(),
            messages.len(),
            stream
        );

        let response = request.send().await.map_err(map_send_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        Ok(response)
    }
}

/// Convert a history message to the API shape.
///
/// The author becomes the `name` field so the model can tell the agents
/// apart; the API only accepts `[a-zA-Z0-9_-]` there.
fn convert_message(msg: &Message) -> Value {
    let mut value = json!({
        "role": msg.role.to_string(),
        "content": msg.text,
    });
    if let Some(author) = msg.author() {
        let name: String = author
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .take(64)
            .collect();
        if !name.is_empty() {
            value["name"] = json!(name);
        }
    }
    value
}

fn map_send_error(e: reqwest::Error) -> LLMError {
    if e.is_timeout() {
        LLMError::Timeout
    } else if e.is_connect() {
        LLMError::ProviderUnavailable(format!("Cannot connect to chat backend: {}", e))
    } else {
        LLMError::NetworkError(e.to_string())
    }
}

fn classify_status(status: u16, body: String) -> LLMError {
    if status == 400 || body.contains("content_filter") {
        LLMError::ContentFiltered(body)
    } else if status == 401 || status == 403 {
        LLMError::AuthenticationFailed(body)
    } else if status == 429 {
        LLMError::RateLimitExceeded
    } else if status == 404 || status >= 500 {
        LLMError::ProviderUnavailable(format!("HTTP {}: {}", status, body))
    } else {
        LLMError::InvalidRequest(format!("HTTP {}: {}", status, body))
    }
}

/// One decoded streaming payload
#[derive(Debug, Default, PartialEq)]
struct StreamDelta {
    text: Option<String>,
    filtered: bool,
}

fn parse_stream_payload(data: &str) -> Result<StreamDelta> {
    let payload: Value = serde_json::from_str(data)
        .map_err(|e| LLMError::ParseError(format!("Failed to parse stream payload: {}", e)))?;

    if let Some(error) = payload.get("error") {
        let text = error.to_string();
        return Err(if text.contains("content_filter") {
            LLMError::ContentFiltered(text)
        } else {
            LLMError::InvalidRequest(text)
        });
    }

    // Azure sends a leading chunk with empty choices carrying prompt filter results
    let Some(choice) = payload
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
    else {
        return Ok(StreamDelta::default());
    };

    let text = choice
        .get("delta")
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    let filtered = choice.get("finish_reason").and_then(|r| r.as_str()) == Some("content_filter");

    Ok(StreamDelta { text, filtered })
}

#[async_trait]
impl ChatBackend for OpenAIProvider {
    fn name(&self) -> &str {
        match self.endpoint {
            Endpoint::OpenAI { .. } => "openai",
            Endpoint::Azure { .. } => "azure",
        }
    }

    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let start = std::time::Instant::now();
        let response = self.send(messages, false).await?;

        let data: Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let Some(choice) = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
        else {
            tracing::debug!("{} returned no choices", self.name());
            return Ok(String::new());
        };

        let content = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or_default();

        if content.is_empty()
            && choice.get("finish_reason").and_then(|r| r.as_str()) == Some("content_filter")
        {
            return Err(LLMError::ContentFiltered(
                "finish_reason=content_filter".to_string(),
            ));
        }

        tracing::info!(
            "{} response received in {:.1}s",
            self.name(),
            start.elapsed().as_secs_f64()
        );

        Ok(content.to_string())
    }

    async fn stream(&self, messages: &[Message]) -> Result<TokenStream> {
        let response = self.send(messages, true).await?;

        let stream = try_stream! {
            let mut body = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            let mut done = false;

            while !done {
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
                    let line = String::from_utf8_lossy(&line_bytes);
                    match parse_sse_line(line.trim_end()) {
                        None => continue,
                        Some(None) => {
                            done = true;
                            break;
                        }
                        Some(Some(data)) => {
                            let delta = parse_stream_payload(data)?;
                            if let Some(text) = delta.text {
                                yield text;
                            }
                            if delta.filtered {
                                Err::<(), _>(LLMError::ContentFiltered("finish_reason=content_filter".to_string()))?;
                            }
                        }
                    }
                }
            }

            // A final event without a trailing newline
            if !done && !buffer.is_empty() {
                let line = String::from_utf8_lossy(&buffer).to_string();
                if let Some(Some(data)) = parse_sse_line(line.trim_end()) {
                    let delta = parse_stream_payload(data)?;
                    if let Some(text) = delta.text {
                        yield text;
                    }
                    if delta.filtered {
                        Err::<(), _>(LLMError::ContentFiltered("finish_reason=content_filter".to_string()))?;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names_and_urls() {
        let openai = OpenAIProvider::openai("https://api.openai.com/v1/", "gpt-4o", "sk-test");
        assert_eq!(openai.name(), "openai");
        assert_eq!(openai.url(), "https://api.openai.com/v1/chat/completions");

        let azure = OpenAIProvider::azure(
            "https://lab.openai.azure.com",
            "gpt-4o",
            "2024-06-01",
            "key",
        );
        assert_eq!(azure.name(), "azure");
        assert_eq!(
            azure.url(),
            "https://lab.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn test_payload_model_only_for_openai() {
        let messages = vec![Message::user("hi")];
        let openai = OpenAIProvider::openai("http://x", "gpt-4o", "k");
        assert_eq!(openai.payload(&messages, true)["model"], "gpt-4o");
        assert_eq!(openai.payload(&messages, true)["stream"], true);

        let azure = OpenAIProvider::azure("http://x", "dep", "v", "k");
        assert!(azure.payload(&messages, false).get("model").is_none());
    }

    #[test]
    fn test_convert_message_sanitizes_author() {
        let value = convert_message(&Message::from_agent("PM Alex!", "hello"));
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["name"], "PMAlex");

        let value = convert_message(&Message::user("hello"));
        assert!(value.get("name").is_none());
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(400, "bad".into()).is_content_filter());
        assert!(classify_status(422, "{\"code\":\"content_filter\"}".into()).is_content_filter());
        assert!(matches!(
            classify_status(401, String::new()),
            LLMError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            classify_status(429, String::new()),
            LLMError::RateLimitExceeded
        ));
        assert!(matches!(
            classify_status(503, String::new()),
            LLMError::ProviderUnavailable(_)
        ));
        assert!(matches!(
            classify_status(418, String::new()),
            LLMError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_parse_stream_payload() {
        let delta =
            parse_stream_payload(r#"{"choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#)
                .unwrap();
        assert_eq!(delta.text.as_deref(), Some("Hi"));
        assert!(!delta.filtered);

        let delta = parse_stream_payload(r#"{"choices":[],"prompt_filter_results":[]}"#).unwrap();
        assert_eq!(delta, StreamDelta::default());

        let delta =
            parse_stream_payload(r#"{"choices":[{"delta":{},"finish_reason":"content_filter"}]}"#)
                .unwrap();
        assert!(delta.filtered);
        assert!(delta.text.is_none());
    }

    #[test]
    fn test_parse_stream_payload_errors() {
        assert!(matches!(
            parse_stream_payload("not json"),
            Err(LLMError::ParseError(_))
        ));
        assert!(parse_stream_payload(r#"{"error":{"code":"content_filter"}}"#)
            .unwrap_err()
            .is_content_filter());
        assert!(matches!(
            parse_stream_payload(r#"{"error":{"message":"overloaded"}}"#),
            Err(LLMError::InvalidRequest(_))
        ));
    }
}

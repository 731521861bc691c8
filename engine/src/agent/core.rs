//! Chat Agent
//!
//! `ChatAgent` is the one concrete [`Agent`]: a [`Persona`] bound to a
//! [`ChatBackend`]. Every request is `[system instruction] ++ history`.
//!
//! The streaming path owns its failure handling. A content-safety rejection
//! becomes [`CONTENT_FILTERED_NOTICE`], any other fault becomes an
//! [`error_notice`]; either is yielded as the final chunk and the stream
//! ends cleanly.

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use sdk::Message;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Agent, AgentKind, AgentStream, Persona};
use crate::llm::{ChatBackend, LLMError};
use crate::secrets::scrub;

/// Final chunk of a stream the backend refused on content-safety grounds
pub const CONTENT_FILTERED_NOTICE: &str = "\n\n⚠️ **(Content Filtered)**: The response was blocked by Azure OpenAI's content safety policy. Please adjust your prompt.\n";

/// Final chunk of a stream that failed for any other reason.
///
/// The message is scrubbed of API keys before it reaches the caller.
pub fn error_notice(message: &str) -> String {
    format!("\n\n🛑 **(Error)**: {}\n", scrub(message))
}

fn notice_for(error: &LLMError) -> String {
    if error.is_content_filter() {
        CONTENT_FILTERED_NOTICE.to_string()
    } else {
        error_notice(&error.to_string())
    }
}

/// A persona bound to a chat backend
pub struct ChatAgent {
    persona: Persona,
    backend: Arc<dyn ChatBackend>,
}

impl ChatAgent {
    /// Create a built-in agent
    pub fn new(kind: AgentKind, backend: Arc<dyn ChatBackend>) -> Self {
        Self::with_persona(Persona::for_kind(kind), backend)
    }

    /// Create an agent from a custom persona
    pub fn with_persona(persona: Persona, backend: Arc<dyn ChatBackend>) -> Self {
        Self { persona, backend }
    }

    /// The persona this agent speaks as
    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    fn outbound(&self, history: &[Message]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(self.persona.system_instruction.clone()));
        messages.extend_from_slice(history);
        messages
    }
}

#[async_trait]
impl Agent for ChatAgent {
    fn name(&self) -> &str {
        &self.persona.name
    }

    fn role(&self) -> &str {
        &self.persona.role
    }

    fn description(&self) -> &str {
        &self.persona.description
    }

    fn system_instruction(&self) -> &str {
        &self.persona.system_instruction
    }

    async fn respond_once(&self, history: &[Message]) -> Result<String, LLMError> {
        let messages = self.outbound(history);
        debug!(
            "{} responding via {} ({} messages)",
            self.persona.name,
            self.backend.name(),
            messages.len()
        );
        self.backend.complete(&messages).await
    }

    fn respond_streaming(&self, history: &[Message]) -> AgentStream {
        let backend = Arc::clone(&self.backend);
        let messages = self.outbound(history);
        let name = self.persona.name.clone();

        Box::pin(stream! {
            let mut tokens = match backend.stream(&messages).await {
                Ok(tokens) => tokens,
                Err(e) => {
                    warn!("{} could not open stream: {}", name, e);
                    yield notice_for(&e);
                    return;
                }
            };

            while let Some(item) = tokens.next().await {
                match item {
                    Ok(chunk) => {
                        if !chunk.is_empty() {
                            yield chunk;
                        }
                    }
                    Err(e) => {
                        warn!("{} stream interrupted: {}", name, e);
                        yield notice_for(&e);
                        return;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Result as LLMResult, TokenStream};
    use std::sync::Mutex;

    /// Backend that records the last request and replays a fixed script
    struct ScriptedBackend {
        chunks: Vec<LLMResult<String>>,
        open_error: Option<LLMError>,
        seen: Mutex<Vec<Message>>,
    }

    impl ScriptedBackend {
        fn new(chunks: Vec<LLMResult<String>>) -> Self {
            Self {
                chunks,
                open_error: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, messages: &[Message]) -> LLMResult<String> {
            *self.seen.lock().unwrap() = messages.to_vec();
            if let Some(e) = &self.open_error {
                return Err(e.clone());
            }
            Ok(self
                .chunks
                .iter()
                .filter_map(|c| c.as_ref().ok().cloned())
                .collect())
        }

        async fn stream(&self, messages: &[Message]) -> LLMResult<TokenStream> {
            *self.seen.lock().unwrap() = messages.to_vec();
            if let Some(e) = &self.open_error {
                return Err(e.clone());
            }
            Ok(Box::pin(futures::stream::iter(self.chunks.clone())))
        }
    }

    async fn drain(agent: &ChatAgent, history: &[Message]) -> Vec<String> {
        agent.respond_streaming(history).collect().await
    }

    #[tokio::test]
    async fn test_outbound_starts_with_system_instruction() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("hi".into())]));
        let agent = ChatAgent::new(AgentKind::ProductManager, backend.clone());

        let reply = agent.respond_once(&[Message::user("hello")]).await.unwrap();
        assert_eq!(reply, "hi");

        let seen = backend.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], Message::system(agent.system_instruction()));
        assert_eq!(seen[1], Message::user("hello"));
    }

    #[tokio::test]
    async fn test_respond_once_propagates_fault() {
        let mut backend = ScriptedBackend::new(vec![]);
        backend.open_error = Some(LLMError::Timeout);
        let agent = ChatAgent::new(AgentKind::SystemAnalyst, Arc::new(backend));

        assert!(matches!(
            agent.respond_once(&[]).await,
            Err(LLMError::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_clean_stream_has_no_notice() {
        let backend = ScriptedBackend::new(vec![Ok("Hel".into()), Ok("lo".into())]);
        let agent = ChatAgent::new(AgentKind::Programmer, Arc::new(backend));

        assert_eq!(drain(&agent, &[]).await, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_content_filter_yields_single_notice() {
        let backend = ScriptedBackend::new(vec![
            Ok("partial".into()),
            Err(LLMError::ContentFiltered("violence".into())),
            Ok("never".into()),
        ]);
        let agent = ChatAgent::new(AgentKind::ProductManager, Arc::new(backend));

        let chunks = drain(&agent, &[]).await;
        assert_eq!(chunks, vec!["partial".to_string(), CONTENT_FILTERED_NOTICE.to_string()]);
    }

    #[tokio::test]
    async fn test_open_failure_yields_error_notice() {
        let mut backend = ScriptedBackend::new(vec![]);
        backend.open_error = Some(LLMError::AuthenticationFailed(
            "bad key sk-abcdefghijklmnopqrstuvwx".into(),
        ));
        let agent = ChatAgent::new(AgentKind::ProductManager, Arc::new(backend));

        let chunks = drain(&agent, &[]).await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("\n\n🛑 **(Error)**: "));
        assert!(chunks[0].contains("[REDACTED]"));
        assert!(!chunks[0].contains("sk-abcdefghijklmnopqrstuvwx"));
    }

    #[tokio::test]
    async fn test_custom_persona_name() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let agent = ChatAgent::with_persona(
            Persona::new("SA_Bob", "System Analyst", "designs", "be precise"),
            backend,
        );
        assert_eq!(agent.name(), "SA_Bob");
        assert_eq!(agent.system_instruction(), "be precise");
    }
}

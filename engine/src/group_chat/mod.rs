//! Group Chat Orchestration
//!
//! `GroupChat` owns one conversation: the append-only history and the roster
//! of agents. Each step selects the next speaker from the history (see
//! [`selection`]) and runs it, appending its reply as an assistant message
//! tagged with the agent's name.
//!
//! Stepping takes `&mut self`, so a conversation is never re-entered. Run
//! separate `GroupChat`s for parallel conversations; the agents themselves
//! can be shared between them.

pub mod cancellation;
pub mod selection;

use async_stream::stream;
use futures::{Stream, StreamExt};
use sdk::Message;
use std::sync::Arc;
use tracing::info;

use crate::agent::Agent;
use crate::llm::LLMError;

pub use cancellation::CancellationFlag;
pub use selection::{find_agent_by_name, has_role_tag, select_next_speaker, SelectionRule};

/// One multi-agent conversation
#[derive(Default)]
pub struct GroupChat {
    agents: Vec<Arc<dyn Agent>>,
    history: Vec<Message>,
    current_speaker: Option<Arc<dyn Agent>>,
}

impl GroupChat {
    /// Create an empty conversation with no agents
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation with the given roster
    pub fn with_agents(agents: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            agents,
            ..Self::default()
        }
    }

    /// Add an agent to the end of the roster
    pub fn add_agent(&mut self, agent: Arc<dyn Agent>) {
        self.agents.push(agent);
    }

    /// Append a user message, starting a new turn
    pub fn add_user_message(&mut self, text: impl Into<String>) {
        self.history.push(Message::user(text));
    }

    /// Conversation so far, oldest first
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }

    /// Agent chosen by the most recent step, if any
    pub fn current_speaker(&self) -> Option<&Arc<dyn Agent>> {
        self.current_speaker.as_ref()
    }

    /// Who would speak if `step` were called now
    pub fn next_speaker(&self) -> Option<Arc<dyn Agent>> {
        select_next_speaker(&self.history, &self.agents)
    }

    /// Run one agent to completion.
    ///
    /// Returns `Ok(None)` without touching anything when the turn is over.
    /// Backend faults propagate and leave the history unchanged.
    pub async fn step(&mut self) -> Result<Option<String>, LLMError> {
        let Some(speaker) = self.next_speaker() else {
            return Ok(None);
        };

        info!("{} is speaking", speaker.name());
        self.current_speaker = Some(Arc::clone(&speaker));

        let reply = speaker.respond_once(&self.history).await?;
        self.history
            .push(Message::from_agent(speaker.name(), reply.clone()));

        info!("{} finished ({} chars)", speaker.name(), reply.len());
        Ok(Some(reply))
    }

    /// Run one agent as a stream of reply fragments.
    ///
    /// The stream is empty when the turn is over. Once it has been drained,
    /// the full reply is appended to the history as a single message.
    pub fn step_streaming(&mut self) -> impl Stream<Item = String> + Send + '_ {
        self.step_streaming_with(CancellationFlag::new())
    }

    /// Like [`step_streaming`](Self::step_streaming), stopping early once
    /// `cancel` is tripped, even while the backend is stalled.
    ///
    /// A cancelled or dropped stream appends nothing.
    pub fn step_streaming_with(
        &mut self,
        cancel: CancellationFlag,
    ) -> impl Stream<Item = String> + Send + '_ {
        stream! {
            let Some(speaker) = self.next_speaker() else {
                return;
            };

            info!("{} is speaking (streaming)", speaker.name());
            self.current_speaker = Some(Arc::clone(&speaker));

            let mut chunks = speaker.respond_streaming(&self.history);
            let mut reply = String::new();

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!("{} cancelled after {} chars; history unchanged", speaker.name(), reply.len());
                        return;
                    }
                    next = chunks.next() => next,
                };
                match next {
                    Some(chunk) => {
                        reply.push_str(&chunk);
                        yield chunk;
                    }
                    None => break,
                }
            }

            info!("{} finished ({} chars)", speaker.name(), reply.len());
            self.history.push(Message::from_agent(speaker.name(), reply));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentStream, Persona};
    use async_trait::async_trait;
    use futures::stream;
    use sdk::ChatRole;
    use std::time::Duration;

    /// Agent that always replies with the same fragments
    struct Canned {
        persona: Persona,
        chunks: Vec<&'static str>,
    }

    impl Canned {
        fn agent(name: &str, chunks: Vec<&'static str>) -> Arc<dyn Agent> {
            Arc::new(Self {
                persona: Persona::new(name, name, "", ""),
                chunks,
            })
        }
    }

    #[async_trait]
    impl Agent for Canned {
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
        async fn respond_once(&self, _history: &[Message]) -> Result<String, LLMError> {
            Ok(self.chunks.concat())
        }
        fn respond_streaming(&self, _history: &[Message]) -> AgentStream {
            let chunks: Vec<String> = self.chunks.iter().map(|c| c.to_string()).collect();
            Box::pin(stream::iter(chunks))
        }
    }

    #[tokio::test]
    async fn test_step_without_agents() {
        let mut chat = GroupChat::new();
        chat.add_user_message("hello");
        assert_eq!(chat.step().await.unwrap(), None);
        assert_eq!(chat.history().len(), 1);
        assert!(chat.current_speaker().is_none());
    }

    #[tokio::test]
    async fn test_step_appends_tagged_reply() {
        let mut chat = GroupChat::with_agents(vec![Canned::agent("PM", vec!["What ", "scope?"])]);
        chat.add_user_message("I need an app");

        let reply = chat.step().await.unwrap();
        assert_eq!(reply.as_deref(), Some("What scope?"));
        assert_eq!(chat.history().len(), 2);
        assert_eq!(chat.history()[1].role, ChatRole::Assistant);
        assert_eq!(chat.history()[1].author(), Some("PM"));
        assert_eq!(chat.current_speaker().unwrap().name(), "PM");

        // PM asked a question without a handoff, so the turn is over.
        assert_eq!(chat.step().await.unwrap(), None);
        assert_eq!(chat.history().len(), 2);
    }

    #[tokio::test]
    async fn test_step_streaming_appends_once() {
        let mut chat = GroupChat::new();
        chat.add_agent(Canned::agent("PM", vec!["a", "b", "c"]));
        chat.add_user_message("go");

        let chunks: Vec<String> = chat.step_streaming().collect().await;
        assert_eq!(chunks, vec!["a", "b", "c"]);
        assert_eq!(chat.history().len(), 2);
        assert_eq!(chat.history()[1].text, "abc");
    }

    #[tokio::test]
    async fn test_step_streaming_cancelled_before_start() {
        let mut chat = GroupChat::with_agents(vec![Canned::agent("PM", vec!["a", "b"])]);
        chat.add_user_message("go");

        let cancel = CancellationFlag::new();
        cancel.cancel();
        let chunks: Vec<String> = chat.step_streaming_with(cancel).collect().await;

        assert!(chunks.is_empty());
        assert_eq!(chat.history().len(), 1);
    }

    /// Agent that sends one fragment and then never produces another
    struct Stalling(Persona);

    #[async_trait]
    impl Agent for Stalling {
        fn name(&self) -> &str {
            &self.0.name
        }
        fn role(&self) -> &str {
            &self.0.role
        }
        fn description(&self) -> &str {
            &self.0.description
        }
        fn system_instruction(&self) -> &str {
            &self.0.system_instruction
        }
        async fn respond_once(&self, _history: &[Message]) -> Result<String, LLMError> {
            Ok(String::new())
        }
        fn respond_streaming(&self, _history: &[Message]) -> AgentStream {
            Box::pin(stream::iter(vec!["first".to_string()]).chain(stream::pending()))
        }
    }

    #[tokio::test]
    async fn test_cancel_interrupts_stalled_backend() {
        let stalling: Arc<dyn Agent> = Arc::new(Stalling(Persona::new("PM", "PM", "", "")));
        let mut chat = GroupChat::with_agents(vec![stalling]);
        chat.add_user_message("go");

        let cancel = CancellationFlag::new();
        {
            let stream = chat.step_streaming_with(cancel.clone());
            tokio::pin!(stream);
            assert_eq!(stream.next().await.as_deref(), Some("first"));

            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                trigger.cancel();
            });

            let next = tokio::time::timeout(Duration::from_secs(2), stream.next())
                .await
                .expect("stream kept waiting on the backend after cancel");
            assert!(next.is_none());
        }

        assert!(cancel.is_cancelled());
        assert_eq!(chat.history().len(), 1);
    }

    #[tokio::test]
    async fn test_step_streaming_dropped_midway() {
        let mut chat = GroupChat::with_agents(vec![Canned::agent("PM", vec!["a", "b"])]);
        chat.add_user_message("go");

        {
            let mut s = Box::pin(chat.step_streaming());
            assert_eq!(s.next().await.as_deref(), Some("a"));
        }

        assert_eq!(chat.history().len(), 1);
    }
}

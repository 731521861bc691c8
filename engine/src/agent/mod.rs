//! Group Chat Agents
//!
//! An agent is a named, role-tagged capability object that turns the shared
//! conversation history into a reply. Agents carry no conversation state:
//! they are configuration plus a backend handle, so one `Arc<dyn Agent>` can
//! serve any number of conversations at once.
//!
//! The concrete agent is [`ChatAgent`], parameterized by a [`Persona`]. The
//! closed set of built-in personas is enumerated by [`AgentKind`].

pub mod core;
pub mod personas;

use async_trait::async_trait;
use futures::stream::BoxStream;
use sdk::Message;
use std::sync::Arc;

use crate::llm::{ChatBackend, LLMError};

pub use self::core::{error_notice, ChatAgent, CONTENT_FILTERED_NOTICE};
pub use self::personas::Persona;

/// Lazy, finite, non-restartable sequence of reply fragments.
///
/// Backend faults never surface as errors here; they are folded into a
/// single trailing notice chunk.
pub type AgentStream = BoxStream<'static, String>;

/// Capability set shared by every group chat participant
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique name within a roster (e.g., "PM"). Used for routing.
    fn name(&self) -> &str;

    /// Human-readable role (e.g., "Product Manager")
    fn role(&self) -> &str;

    /// One-line summary of the agent's responsibility
    fn description(&self) -> &str;

    /// Instruction prepended to every outbound request
    fn system_instruction(&self) -> &str;

    /// Produce one complete reply. Backend faults propagate.
    async fn respond_once(&self, history: &[Message]) -> Result<String, LLMError>;

    /// Produce a reply as a stream of fragments.
    fn respond_streaming(&self, history: &[Message]) -> AgentStream;
}

/// Built-in agent kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    /// Requirements interviewer
    ProductManager,

    /// Technical designer
    SystemAnalyst,

    /// Implementer
    Programmer,

    /// Emits a JSON routing decision instead of content
    Manager,
}

impl AgentKind {
    /// The three content-producing kinds, in handoff order
    pub const TEAM: [AgentKind; 3] = [
        AgentKind::ProductManager,
        AgentKind::SystemAnalyst,
        AgentKind::Programmer,
    ];

    /// Roster name and role tag of this kind
    pub fn tag(&self) -> &'static str {
        match self {
            AgentKind::ProductManager => "PM",
            AgentKind::SystemAnalyst => "SA",
            AgentKind::Programmer => "PG",
            AgentKind::Manager => "Manager",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Build the standard roster (PM, SA, PG and optionally the Manager), all
/// sharing one backend.
pub fn default_roster(backend: Arc<dyn ChatBackend>, include_manager: bool) -> Vec<Arc<dyn Agent>> {
    let mut roster: Vec<Arc<dyn Agent>> = AgentKind::TEAM
        .iter()
        .map(|kind| Arc::new(ChatAgent::new(*kind, Arc::clone(&backend))) as Arc<dyn Agent>)
        .collect();

    if include_manager {
        roster.push(Arc::new(ChatAgent::new(AgentKind::Manager, backend)));
    }

    roster
}

//! Conversation message types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System instruction
    System,

    /// Human user
    User,

    /// Agent reply
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::System => write!(f, "system"),
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Message in a group chat history
///
/// `author_name` is only set on assistant messages produced by a named agent.
/// It is the identity signal the speaker selection reads, so it must match a
/// roster agent's name exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Role of the message sender
    pub role: ChatRole,

    /// Text content
    pub text: String,

    /// Name of the agent that produced the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
}

impl Message {
    /// Create a new system message
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            text: text.into(),
            author_name: None,
        }
    }

    /// Create a new user message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            author_name: None,
        }
    }

    /// Create an anonymous assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
            author_name: None,
        }
    }

    /// Create an assistant message attributed to a named agent
    pub fn from_agent(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
            author_name: Some(author.into()),
        }
    }

    /// Author name, if any
    pub fn author(&self) -> Option<&str> {
        self.author_name.as_deref()
    }
}

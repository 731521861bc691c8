//! ReqLab SDK
//!
//! Shared library providing the conversation types, error taxonomy and
//! stream-folding helpers used by the engine and by any UI that renders a
//! group chat.

/// Error types and handling
pub mod errors;

/// Conversation message types
pub mod types;

/// Stateless reducers for folding streamed chunks
pub mod aggregators;

// Re-export commonly used types
pub use errors::{EngineError, ReqLabErrorExt};
pub use types::{ChatRole, Message};

//! ReqLab Engine Library
//!
//! This library provides the group chat orchestration behind the `reqlab`
//! binary. It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// Session directory containment
pub mod fs_guard;

/// Chat backend abstraction layer
pub mod llm;

/// Group chat agents and personas
pub mod agent;

/// Conversation orchestration and speaker selection
pub mod group_chat;

/// Code block extraction into session directories
pub mod artifacts;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;

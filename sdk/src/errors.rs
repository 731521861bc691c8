//! Error types and handling
//!
//! This module provides the error types used throughout the ReqLab engine
//! outside of the chat backends (which report `LLMError`). All errors
//! implement the `ReqLabErrorExt` trait which provides user-friendly hints
//! and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Hints never contain secrets or file paths, so they are safe to show in a
//! chat transcript.

use std::path::PathBuf;
use thiserror::Error;

/// Trait for ReqLab error extensions
pub trait ReqLabErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain secrets,
    /// file paths or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors require the user to fix their setup first.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Secrets**: API keys missing from the environment and keychain
/// - **File System**: Artifact path validation and access errors
/// - **Session**: Session identifiers that cannot name a directory
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ReqLabErrorExt};
/// use std::path::PathBuf;
///
/// let error = EngineError::PathOutsideSession(PathBuf::from("/etc/passwd"));
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::Config("bad provider".to_string());
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Secret errors
    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    #[error("Keyring error: {0}")]
    KeyringError(String),

    // Artifact path errors
    #[error("Path outside session directory: {0:?}")]
    PathOutsideSession(PathBuf),

    #[error("Path canonicalization failed for {0:?}: {1}")]
    PathCanonicalization(PathBuf, String),

    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReqLabErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",

            Self::SecretNotFound(_) => {
                "API key missing. Export it as an environment variable or store it in the keychain"
            }
            Self::KeyringError(_) => "Failed to access secure storage. Check system keychain",

            Self::PathOutsideSession(_) => "Generated files must stay inside the session folder",
            Self::PathCanonicalization(_, _) => "Invalid path specified",
            Self::InvalidSessionId(_) => "Session ids must be a single plain folder name",

            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) | Self::SecretNotFound(_) | Self::KeyringError(_) => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::Config("unknown provider".to_string());
        assert_eq!(err.to_string(), "Configuration error: unknown provider");

        let err = EngineError::InvalidSessionId("../x".to_string());
        assert_eq!(err.to_string(), "Invalid session id: \"../x\"");
    }

    #[test]
    fn test_recoverability() {
        assert!(!EngineError::Config("x".into()).is_recoverable());
        assert!(!EngineError::SecretNotFound("openai_api_key".into()).is_recoverable());
        assert!(EngineError::PathOutsideSession(PathBuf::from("/tmp")).is_recoverable());
        assert!(EngineError::InvalidSessionId(String::new()).is_recoverable());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EngineError = io.into();
        assert!(matches!(err, EngineError::Io(_)));
        assert_eq!(err.user_hint(), "File system operation failed");
    }
}

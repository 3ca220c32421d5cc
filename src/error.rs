//! Error types for MathTutor
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

use crate::tutor::encoder::EncodeError;

/// Main error type for MathTutor operations
///
/// This enum covers configuration loading, session client failures,
/// image encoding problems and controller misuse.
#[derive(Error, Debug)]
pub enum TutorError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-related errors (API calls, malformed responses, quota, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Authentication errors (e.g., 401 Unauthorized, rejected API key)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Missing credentials for provider
    #[error("Missing credentials for provider: {0}")]
    MissingCredentials(String),

    /// Uploaded file could not be turned into an inline image
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// A reply is already pending for the active session
    #[error("A reply is already pending; wait for it before sending another message")]
    Busy,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for MathTutor operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

//! Base session client traits and common types for MathTutor
//!
//! This module defines the [`SessionClient`] and [`ChatSession`] traits every
//! conversational backend implements, along with the turn and model
//! configuration types they exchange with the controller.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One user contribution sent to a chat session
///
/// A turn is either plain text or an inline image carried as base64 data
/// together with its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// Plain text typed by the user
    Text(String),
    /// Inline image data
    InlineImage {
        /// Media type such as `image/png`
        media_type: String,
        /// Base64 (standard alphabet, padded) encoded image bytes
        data: String,
    },
}

impl Turn {
    /// Creates a text turn
    ///
    /// # Examples
    ///
    /// ```
    /// use mathtutor::providers::Turn;
    ///
    /// let turn = Turn::text("x = 4?");
    /// assert_eq!(turn, Turn::Text("x = 4?".to_string()));
    /// ```
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// Creates an inline image turn
    pub fn inline_image(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::InlineImage {
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// Short description used in log lines (never includes image data)
    pub fn describe(&self) -> String {
        match self {
            Self::Text(text) => format!("text ({} chars)", text.chars().count()),
            Self::InlineImage { media_type, data } => {
                format!("inline image ({}, {} base64 chars)", media_type, data.len())
            }
        }
    }
}

/// Model settings fixed at session creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier (e.g., "gemini-2.5-flash")
    pub model: String,
    /// Optional reasoning token budget
    pub thinking_budget: Option<i32>,
}

impl ModelConfig {
    /// Create a model configuration
    ///
    /// # Examples
    ///
    /// ```
    /// use mathtutor::providers::ModelConfig;
    ///
    /// let config = ModelConfig::new("gemini-2.5-flash", Some(1024));
    /// assert_eq!(config.model, "gemini-2.5-flash");
    /// ```
    pub fn new(model: impl Into<String>, thinking_budget: Option<i32>) -> Self {
        Self {
            model: model.into(),
            thinking_budget,
        }
    }
}

impl From<&crate::config::GeminiConfig> for ModelConfig {
    fn from(config: &crate::config::GeminiConfig) -> Self {
        Self::new(config.model.clone(), config.thinking_budget)
    }
}

/// A stateful remote conversation
///
/// The session keeps the turn history, so each call to [`ChatSession::send`]
/// continues the same conversation. Implementations only record a turn in the
/// history once its reply has been received.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Sends one turn and returns the assistant's reply text
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, is rejected, or the response
    /// carries no text
    async fn send(&self, turn: Turn) -> Result<String>;

    /// Number of turns (user and assistant) recorded so far
    fn history_len(&self) -> usize;
}

/// Factory for chat sessions
///
/// # Examples
///
/// ```no_run
/// use mathtutor::providers::{ChatSession, ModelConfig, SessionClient, Turn};
/// use mathtutor::error::Result;
/// use async_trait::async_trait;
/// use std::sync::Arc;
///
/// struct EchoSession;
///
/// #[async_trait]
/// impl ChatSession for EchoSession {
///     async fn send(&self, turn: Turn) -> Result<String> {
///         Ok(turn.describe())
///     }
///
///     fn history_len(&self) -> usize {
///         0
///     }
/// }
///
/// struct EchoClient;
///
/// impl SessionClient for EchoClient {
///     fn create_session(
///         &self,
///         _system_instruction: &str,
///         _config: &ModelConfig,
///     ) -> Result<Arc<dyn ChatSession>> {
///         Ok(Arc::new(EchoSession))
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait SessionClient: Send + Sync {
    /// Opens a new conversation with a system instruction and model settings
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be created
    fn create_session(
        &self,
        system_instruction: &str,
        config: &ModelConfig,
    ) -> Result<Arc<dyn ChatSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_text_constructor() {
        let turn = Turn::text("hello");
        assert_eq!(turn, Turn::Text("hello".to_string()));
    }

    #[test]
    fn test_turn_inline_image_constructor() {
        let turn = Turn::inline_image("image/png", "iVBORw0KGgo=");
        assert!(matches!(
            turn,
            Turn::InlineImage { ref media_type, .. } if media_type == "image/png"
        ));
    }

    #[test]
    fn test_turn_describe_omits_image_data() {
        let turn = Turn::inline_image("image/jpeg", "QUJDRA==");
        let description = turn.describe();
        assert!(description.contains("image/jpeg"));
        assert!(!description.contains("QUJDRA=="));
    }

    #[test]
    fn test_turn_describe_counts_chars() {
        assert_eq!(Turn::text("héllo").describe(), "text (5 chars)");
    }

    #[test]
    fn test_model_config_from_gemini_config() {
        let gemini = crate::config::GeminiConfig::default();
        let config = ModelConfig::from(&gemini);
        assert_eq!(config.model, gemini.model);
        assert_eq!(config.thinking_budget, gemini.thinking_budget);
    }
}

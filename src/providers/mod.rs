//! Provider module for MathTutor
//!
//! This module contains the session client abstraction, the Google Gemini
//! implementation, and an in-process scripted client for tests.

pub mod base;
pub mod fake;
pub mod gemini;

pub use base::{ChatSession, ModelConfig, SessionClient, Turn};
pub use gemini::{GeminiClient, GeminiSession};

use crate::config::ProviderConfig;
use crate::error::{Result, TutorError};
use std::sync::Arc;

/// Create a session client based on configuration
///
/// # Arguments
///
/// * `config` - Provider configuration
///
/// # Returns
///
/// Returns a shared session client
///
/// # Errors
///
/// Returns error if provider type is invalid or initialization fails
///
/// # Examples
///
/// ```
/// use mathtutor::config::Config;
/// use mathtutor::providers::create_session_client;
///
/// let config = Config::default();
/// assert!(create_session_client(&config.provider).is_ok());
/// ```
pub fn create_session_client(config: &ProviderConfig) -> Result<Arc<dyn SessionClient>> {
    match config.provider_type.as_str() {
        "gemini" => Ok(Arc::new(GeminiClient::new(config.gemini.clone())?)),
        other => Err(TutorError::Provider(format!("Unknown provider type: {}", other)).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeminiConfig;

    #[test]
    fn test_create_session_client_gemini() {
        let config = ProviderConfig {
            provider_type: "gemini".to_string(),
            gemini: GeminiConfig::default(),
        };
        assert!(create_session_client(&config).is_ok());
    }

    #[test]
    fn test_create_session_client_invalid_type() {
        let config = ProviderConfig {
            provider_type: "invalid".to_string(),
            gemini: GeminiConfig::default(),
        };

        let err = create_session_client(&config).err().unwrap();
        assert!(err.to_string().contains("Unknown provider type"));
    }
}

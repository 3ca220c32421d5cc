//! Configuration management for MathTutor
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{Result, TutorError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for MathTutor
///
/// Holds the session client settings and the tutoring behavior knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider configuration (Gemini)
    pub provider: ProviderConfig,
    /// Tutoring behavior configuration
    #[serde(default)]
    pub tutor: TutorConfig,
}

/// Provider configuration
///
/// Specifies which AI provider to use and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use
    #[serde(rename = "type")]
    pub provider_type: String,

    /// Google Gemini configuration
    #[serde(default)]
    pub gemini: GeminiConfig,
}

/// Google Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Model identifier sent in the request path
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// API base URL (useful for tests and local mocks)
    ///
    /// Requests go to `{api_base}/v1beta/models/{model}:generateContent`.
    #[serde(default = "default_gemini_api_base")]
    pub api_base: String,

    /// Token budget the model may spend on internal reasoning
    ///
    /// `None` leaves the model default in place; `0` disables thinking.
    #[serde(default = "default_thinking_budget")]
    pub thinking_budget: Option<i32>,

    /// HTTP request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_thinking_budget() -> Option<i32> {
    Some(1024)
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_gemini_model(),
            api_base: default_gemini_api_base(),
            thinking_budget: default_thinking_budget(),
            timeout_seconds: default_request_timeout(),
        }
    }
}

/// Tutoring behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorConfig {
    /// Literal text sent when the follow-up affordance is used
    #[serde(default = "default_follow_up_prompt")]
    pub follow_up_prompt: String,

    /// Largest image accepted for inline upload (bytes)
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,

    /// Replacement for the built-in Socratic system instruction
    #[serde(default)]
    pub system_instruction: Option<String>,
}

fn default_follow_up_prompt() -> String {
    crate::prompts::FOLLOW_UP_PROMPT.to_string()
}

fn default_max_image_bytes() -> u64 {
    // Base64 inflates by 4/3; keeps the encoded turn under the 20 MB request cap
    14 * 1024 * 1024
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            follow_up_prompt: default_follow_up_prompt(),
            max_image_bytes: default_max_image_bytes(),
            system_instruction: None,
        }
    }
}

impl TutorConfig {
    /// System instruction to install on every new session
    ///
    /// Returns the configured override, or the built-in Socratic prompt.
    pub fn system_instruction(&self) -> String {
        match &self.system_instruction {
            Some(custom) if !custom.trim().is_empty() => custom.clone(),
            _ => crate::prompts::socratic_system_instruction(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default_config()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn default_config() -> Self {
        Self {
            provider: ProviderConfig {
                provider_type: "gemini".to_string(),
                gemini: GeminiConfig::default(),
            },
            tutor: TutorConfig::default(),
        }
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TutorError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| TutorError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(provider_type) = std::env::var("MATHTUTOR_PROVIDER") {
            self.provider.provider_type = provider_type;
        }

        if let Ok(model) = std::env::var("MATHTUTOR_GEMINI_MODEL") {
            self.provider.gemini.model = model;
        }

        if let Ok(api_base) = std::env::var("MATHTUTOR_GEMINI_API_BASE") {
            self.provider.gemini.api_base = api_base;
        }

        if let Ok(budget) = std::env::var("MATHTUTOR_THINKING_BUDGET") {
            match budget.parse::<i32>() {
                Ok(v) => {
                    self.provider.gemini.thinking_budget = Some(v);
                    tracing::debug!(thinking_budget = v, "Env override: MATHTUTOR_THINKING_BUDGET");
                }
                Err(_) => {
                    tracing::warn!("Invalid MATHTUTOR_THINKING_BUDGET: {}", budget);
                }
            }
        }

        if let Ok(max_bytes) = std::env::var("MATHTUTOR_MAX_IMAGE_BYTES") {
            if let Ok(value) = max_bytes.parse() {
                self.tutor.max_image_bytes = value;
            } else {
                tracing::warn!("Invalid MATHTUTOR_MAX_IMAGE_BYTES: {}", max_bytes);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(model) = cli.command.model_override() {
            tracing::debug!("Using model override from CLI: {}", model);
            self.provider.gemini.model = model.to_string();
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.provider_type.is_empty() {
            return Err(TutorError::Config("Provider type cannot be empty".to_string()).into());
        }

        let valid_providers = ["gemini"];
        if !valid_providers.contains(&self.provider.provider_type.as_str()) {
            return Err(TutorError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                valid_providers.join(", ")
            ))
            .into());
        }

        let gemini = &self.provider.gemini;
        if gemini.model.trim().is_empty() {
            return Err(
                TutorError::Config("provider.gemini.model cannot be empty".to_string()).into(),
            );
        }

        let api_base = url::Url::parse(&gemini.api_base).map_err(|e| {
            TutorError::Config(format!(
                "provider.gemini.api_base is not a valid URL ({}): {}",
                gemini.api_base, e
            ))
        })?;
        if !matches!(api_base.scheme(), "http" | "https") {
            return Err(TutorError::Config(format!(
                "provider.gemini.api_base must use http or https, got {}",
                api_base.scheme()
            ))
            .into());
        }

        if gemini.timeout_seconds == 0 {
            return Err(TutorError::Config(
                "provider.gemini.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.tutor.max_image_bytes == 0 {
            return Err(TutorError::Config(
                "tutor.max_image_bytes must be greater than 0".to_string(),
            )
            .into());
        }

        if self.tutor.follow_up_prompt.trim().is_empty() {
            return Err(TutorError::Config(
                "tutor.follow_up_prompt cannot be empty".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

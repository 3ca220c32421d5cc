//! Google Gemini provider implementation for MathTutor
//!
//! This module implements [`SessionClient`] on top of the Gemini
//! `generateContent` REST endpoint. The endpoint is stateless, so each
//! [`GeminiSession`] keeps the conversation history locally and replays it
//! with every request, matching the behavior of the hosted chat SDKs.

use crate::config::GeminiConfig;
use crate::error::{Result, TutorError};
use crate::providers::{ChatSession, ModelConfig, SessionClient, Turn};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Environment variables consulted, in order, for the API key
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Gemini API session factory
///
/// The API key is read once at construction. A missing key is not an error
/// here; it surfaces on the first [`ChatSession::send`].
///
/// # Examples
///
/// ```no_run
/// use mathtutor::config::GeminiConfig;
/// use mathtutor::providers::{GeminiClient, ModelConfig, SessionClient, Turn};
///
/// # async fn example() -> mathtutor::error::Result<()> {
/// let config = GeminiConfig::default();
/// let client = GeminiClient::new(config.clone())?;
/// let session = client.create_session("You are a tutor.", &ModelConfig::from(&config))?;
/// let reply = session.send(Turn::text("What is 2 + 2?")).await?;
/// # Ok(())
/// # }
/// ```
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
    api_key: Option<String>,
}

impl GeminiClient {
    /// Create a client, reading the API key from the environment
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let api_key = API_KEY_ENV_VARS
            .iter()
            .find_map(|name| std::env::var(name).ok())
            .filter(|key| !key.trim().is_empty());

        if api_key.is_none() {
            tracing::debug!(
                "No Gemini API key found in {}; requests will fail until one is set",
                API_KEY_ENV_VARS.join(" or ")
            );
        }

        Self::with_api_key(config, api_key)
    }

    /// Create a client with an explicit API key
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    ///
    /// # Examples
    ///
    /// ```
    /// use mathtutor::config::GeminiConfig;
    /// use mathtutor::providers::GeminiClient;
    ///
    /// let client = GeminiClient::with_api_key(GeminiConfig::default(), Some("key".to_string()));
    /// assert!(client.is_ok());
    /// ```
    pub fn with_api_key(config: GeminiConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("mathtutor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TutorError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Gemini client: api_base={}, model={}",
            config.api_base,
            config.model
        );

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// Full `generateContent` URL for a model
    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            model
        )
    }
}

impl SessionClient for GeminiClient {
    fn create_session(
        &self,
        system_instruction: &str,
        config: &ModelConfig,
    ) -> Result<Arc<dyn ChatSession>> {
        tracing::debug!(
            model = %config.model,
            thinking_budget = ?config.thinking_budget,
            "Creating Gemini chat session"
        );

        Ok(Arc::new(GeminiSession {
            client: self.client.clone(),
            url: self.endpoint(&config.model),
            api_key: self.api_key.clone(),
            system_instruction: Content::system(system_instruction),
            generation_config: GenerationConfig::from_model_config(config),
            history: Mutex::new(Vec::new()),
        }))
    }
}

/// One Gemini conversation
pub struct GeminiSession {
    client: Client,
    url: String,
    api_key: Option<String>,
    system_instruction: Content,
    generation_config: Option<GenerationConfig>,
    history: Mutex<Vec<Content>>,
}

impl GeminiSession {
    fn history_snapshot(&self) -> Result<Vec<Content>> {
        self.history
            .lock()
            .map(|history| history.clone())
            .map_err(|_| {
                TutorError::Provider("Failed to acquire lock on session history".to_string())
                    .into()
            })
    }

    fn record_exchange(&self, user: Content, reply: &str) -> Result<()> {
        let mut history = self.history.lock().map_err(|_| {
            TutorError::Provider("Failed to acquire lock on session history".to_string())
        })?;
        history.push(user);
        history.push(Content::model(reply));
        Ok(())
    }
}

#[async_trait]
impl ChatSession for GeminiSession {
    async fn send(&self, turn: Turn) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            TutorError::MissingCredentials(format!(
                "gemini (set {})",
                API_KEY_ENV_VARS.join(" or ")
            ))
        })?;

        let user_content = Content::user(turn);
        let mut contents = self.history_snapshot()?;
        contents.push(user_content.clone());

        let request = GenerateContentRequest {
            system_instruction: Some(self.system_instruction.clone()),
            contents,
            generation_config: self.generation_config.clone(),
        };

        tracing::debug!(
            "Sending Gemini request: {} contents to {}",
            request.contents.len(),
            self.url
        );

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Gemini request failed: {}", e);
                TutorError::Provider(format!("Gemini request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Gemini returned error {}: {}", status, error_text);
            return Err(map_http_error(status, &error_text).into());
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Gemini response: {}", e);
            TutorError::Provider(format!("Failed to parse Gemini response: {}", e))
        })?;

        if let Some(usage) = &parsed.usage_metadata {
            tracing::debug!(
                prompt_tokens = ?usage.prompt_token_count,
                completion_tokens = ?usage.candidates_token_count,
                thought_tokens = ?usage.thoughts_token_count,
                "Gemini token usage"
            );
        }

        let reply = extract_reply(parsed)?;
        self.record_exchange(user_content, &reply)?;
        Ok(reply)
    }

    fn history_len(&self) -> usize {
        self.history.lock().map(|h| h.len()).unwrap_or_default()
    }
}

/// Request body for `generateContent`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

/// Conversation content; also the stored history format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn system(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }

    fn user(turn: Turn) -> Self {
        let part = match turn {
            Turn::Text(text) => Part::text(text),
            Turn::InlineImage { media_type, data } => Part::inline(media_type, data),
        };
        Self {
            role: Some("user".to_string()),
            parts: vec![part],
        }
    }

    fn model(text: &str) -> Self {
        Self {
            role: Some("model".to_string()),
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    fn inline(mime_type: String, data: String) -> Self {
        Self {
            inline_data: Some(InlineData { mime_type, data }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

impl GenerationConfig {
    fn from_model_config(config: &ModelConfig) -> Option<Self> {
        config.thinking_budget.map(|thinking_budget| Self {
            thinking_config: Some(ThinkingConfig { thinking_budget }),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: i32,
}

/// Response body from `generateContent`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
    #[serde(default)]
    thoughts_token_count: Option<u32>,
}

/// Error envelope returned on non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Concatenates the first candidate's answer text, skipping thought parts
fn extract_reply(response: GenerateContentResponse) -> Result<String> {
    let block_reason = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason);

    let Some(candidate) = response.candidates.into_iter().next() else {
        let message = match block_reason {
            Some(reason) => format!("Gemini blocked the request: {}", reason),
            None => "Gemini returned no candidates".to_string(),
        };
        return Err(TutorError::Provider(message).into());
    };

    let text: String = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|part| part.thought != Some(true))
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() {
        return Err(TutorError::Provider(format!(
            "Gemini returned no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        ))
        .into());
    }

    Ok(text)
}

/// Turns a non-2xx response into a readable error
fn map_http_error(status: StatusCode, body: &str) -> TutorError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .map(|wrapper| {
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            match wrapper.error.status {
                Some(status_text) if !status_text.is_empty() => {
                    format!("{}: {}", status_text, msg)
                }
                _ => msg,
            }
        })
        .unwrap_or_else(|| body.to_string());

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || message.contains("API key not valid")
    {
        return TutorError::Authentication(message);
    }

    TutorError::Provider(format!("Gemini returned error {}: {}", status, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = GeminiConfig {
            api_base: "http://localhost:8080/".to_string(),
            ..Default::default()
        };
        let client = GeminiClient::with_api_key(config, None).unwrap();
        assert_eq!(
            client.endpoint("gemini-2.5-flash"),
            "http://localhost:8080/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = GenerateContentRequest {
            system_instruction: Some(Content::system("Be Socratic")),
            contents: vec![Content::user(Turn::inline_image("image/png", "AAAA"))],
            generation_config: GenerationConfig::from_model_config(&ModelConfig::new(
                "m",
                Some(512),
            )),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "Be Socratic");
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(
            value["contents"][0]["parts"][0]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(value["contents"][0]["parts"][0]["inlineData"]["data"], "AAAA");
        assert_eq!(
            value["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            512
        );
    }

    #[test]
    fn test_request_omits_generation_config_without_budget() {
        let request = GenerateContentRequest {
            system_instruction: None,
            contents: vec![Content::user(Turn::text("hi"))],
            generation_config: GenerationConfig::from_model_config(&ModelConfig::new("m", None)),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("generationConfig").is_none());
        assert!(value.get("systemInstruction").is_none());
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn test_extract_reply_joins_text_parts_and_skips_thoughts() {
        let parsed = response(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "planning the hint", "thought": true},
                        {"text": "What is "},
                        {"text": "3 + 4?"}
                    ]
                },
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(extract_reply(parsed).unwrap(), "What is 3 + 4?");
    }

    #[test]
    fn test_extract_reply_reports_block_reason() {
        let parsed = response(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }));
        let err = extract_reply(parsed).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_extract_reply_without_text_reports_finish_reason() {
        let parsed = response(json!({
            "candidates": [{"finishReason": "MAX_TOKENS"}]
        }));
        let err = extract_reply(parsed).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn test_map_http_error_uses_error_envelope() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = map_http_error(StatusCode::TOO_MANY_REQUESTS, body);
        assert!(matches!(err, TutorError::Provider(_)));
        let text = err.to_string();
        assert!(text.contains("RESOURCE_EXHAUSTED: Quota exceeded"));
        assert!(text.contains("429"));
    }

    #[test]
    fn test_map_http_error_invalid_key_is_authentication() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        let err = map_http_error(StatusCode::BAD_REQUEST, body);
        assert!(matches!(err, TutorError::Authentication(_)));
    }

    #[test]
    fn test_map_http_error_plain_body() {
        let err = map_http_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(err.to_string().contains("upstream down"));
    }

    #[tokio::test]
    async fn test_send_without_api_key_fails_before_network() {
        let config = GeminiConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let client = GeminiClient::with_api_key(config.clone(), None).unwrap();
        let session = client
            .create_session("tutor", &ModelConfig::from(&config))
            .unwrap();

        let err = session.send(Turn::text("hello")).await.unwrap_err();
        let err = err.downcast::<TutorError>().unwrap();
        assert!(matches!(err, TutorError::MissingCredentials(_)));
        assert_eq!(session.history_len(), 0);
    }
}

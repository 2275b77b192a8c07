/// Model Client: the single point of entry for language-model calls.
///
/// ARCHITECTURAL RULE: no other module talks to the model service directly.
/// One request, one response. Retries are the orchestrator's decision; this
/// client only classifies each failure as auth, transient, or protocol.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::credentials::{CredentialError, CredentialStore};
use crate::generation::prompt_builder::{Prompt, DEFAULT_TEMPERATURE};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
/// Cheapest model, used only to check that a key is accepted.
const VERIFY_MODEL: &str = "claude-3-haiku-20240307";
const VERIFY_MAX_TOKENS: u32 = 10;

/// Models offered to the user, with a short label.
pub const KNOWN_MODELS: &[(&str, &str)] = &[
    ("claude-sonnet-4-20250514", "Claude Sonnet 4 (balanced)"),
    ("claude-opus-4-20250514", "Claude Opus 4 (most capable)"),
    ("claude-3-5-sonnet-20241022", "Claude 3.5 Sonnet (legacy)"),
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Transient model service failure: {0}")]
    Transient(String),

    #[error("Unexpected model service response: {0}")]
    Protocol(String),
}

impl ModelError {
    /// Only transient failures may be retried by the caller.
    pub fn is_transient(&self) -> bool {
        matches!(self, ModelError::Transient(_))
    }
}

impl From<CredentialError> for ModelError {
    fn from(e: CredentialError) -> Self {
        ModelError::Auth(e.to_string())
    }
}

/// Raw answer text plus token accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Sends one prompt and returns the model's text, bounded by `timeout`.
    async fn send(
        &self,
        prompt: &Prompt,
        model_id: &str,
        timeout: Duration,
    ) -> Result<RawResponse, ModelError>;

    /// Checks the credential with a minimal request.
    async fn verify(&self, timeout: Duration) -> Result<(), ModelError> {
        let probe = Prompt {
            system: String::new(),
            user: "Hi".to_string(),
            delimiter: String::new(),
            slot_count: 0,
            max_output_tokens: VERIFY_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        };
        self.send(&probe, VERIFY_MODEL, timeout).await.map(|_| ())
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicResponse {
    /// Text of the first text block.
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Anthropic Messages API client.
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    credentials: Arc<dyn CredentialStore>,
    endpoint: String,
}

impl AnthropicClient {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            client: Client::new(),
            credentials,
            endpoint: ANTHROPIC_API_URL.to_string(),
        }
    }

    async fn call(
        &self,
        prompt: &Prompt,
        model_id: &str,
    ) -> Result<RawResponse, ModelError> {
        let credential = self.credentials.get()?;

        let request_body = AnthropicRequest {
            model: model_id,
            max_tokens: prompt.max_output_tokens,
            temperature: prompt.temperature,
            system: &prompt.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: &prompt.user,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", credential.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!("Model API returned {status}: {message}");
            return Err(classify_status(status, message));
        }

        let body = response.text().await.map_err(classify_transport_error)?;
        let parsed: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::Protocol(format!("undecodable response body: {e}")))?;

        let text = parsed
            .text()
            .ok_or_else(|| ModelError::Protocol("response has no text content".to_string()))?;

        debug!(
            "Model call succeeded: model={model_id}, input_tokens={}, output_tokens={}",
            parsed.usage.input_tokens, parsed.usage.output_tokens
        );

        Ok(RawResponse {
            text: strip_code_fences(text).to_string(),
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
        })
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn send(
        &self,
        prompt: &Prompt,
        model_id: &str,
        timeout: Duration,
    ) -> Result<RawResponse, ModelError> {
        match tokio::time::timeout(timeout, self.call(prompt, model_id)).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::Transient(format!(
                "no response within {}s",
                timeout.as_secs()
            ))),
        }
    }
}

fn classify_status(status: StatusCode, message: String) -> ModelError {
    match status.as_u16() {
        401 | 403 => ModelError::Auth(message),
        408 | 429 => ModelError::Transient(format!("status {status}: {message}")),
        _ if status.is_server_error() => ModelError::Transient(format!("status {status}: {message}")),
        _ => ModelError::Protocol(format!("status {status}: {message}")),
    }
}

fn classify_transport_error(e: reqwest::Error) -> ModelError {
    if e.is_decode() {
        ModelError::Protocol(e.to_string())
    } else {
        ModelError::Transient(e.to_string())
    }
}

/// Strips ```latex ... ```, ```tex ... ``` or ``` ... ``` fences from model output.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(stripped) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an info string such as `latex` up to the first newline.
    let body = match stripped.find('\n') {
        Some(nl) if !stripped[..nl].contains(char::is_whitespace) => &stripped[nl + 1..],
        _ => stripped,
    };
    body.trim_end()
        .strip_suffix("```")
        .map(|s| s.trim())
        .unwrap_or(body.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences_with_language_tag() {
        let input = "```latex\nA||B||C\n```";
        assert_eq!(strip_code_fences(input), "A||B||C");
    }

    #[test]
    fn test_strip_fences_without_tag() {
        let input = "```\nA||B\n```";
        assert_eq!(strip_code_fences(input), "A||B");
    }

    #[test]
    fn test_strip_fences_no_fences() {
        assert_eq!(strip_code_fences("  A||B  "), "A||B");
    }

    #[test]
    fn test_strip_fences_unterminated() {
        assert_eq!(strip_code_fences("```tex\nA||B"), "A||B");
    }

    #[test]
    fn test_status_classification() {
        let auth = classify_status(StatusCode::UNAUTHORIZED, "bad key".into());
        assert_eq!(auth, ModelError::Auth("bad key".into()));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, String::new()),
            ModelError::Auth(_)
        ));
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, String::new()).is_transient());
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, String::new()),
            ModelError::Protocol(_)
        ));
    }

    #[test]
    fn test_missing_credential_is_auth_error() {
        let e: ModelError = CredentialError::NotConfigured.into();
        assert!(matches!(e, ModelError::Auth(_)));
        assert!(!e.is_transient());
    }

    #[test]
    fn test_response_text_picks_first_text_block() {
        let json = r#"{
            "content": [{"type": "thinking", "text": null}, {"type": "text", "text": "A||B"}],
            "usage": {"input_tokens": 10, "output_tokens": 3}
        }"#;
        let parsed: AnthropicResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.text(), Some("A||B"));
    }

    #[test]
    fn test_request_omits_empty_system() {
        let body = AnthropicRequest {
            model: DEFAULT_MODEL,
            max_tokens: 10,
            temperature: 0.3,
            system: "",
            messages: vec![AnthropicMessage { role: "user", content: "Hi" }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("system").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_send_without_credential_fails_before_network() {
        use crate::credentials::ConfiguredCredentialStore;

        let client = AnthropicClient::new(Arc::new(ConfiguredCredentialStore::new(None, None)));
        let prompt = Prompt {
            system: String::new(),
            user: "Hi".into(),
            delimiter: "||".into(),
            slot_count: 1,
            max_output_tokens: 10,
            temperature: 0.3,
        };
        let err = client
            .send(&prompt, DEFAULT_MODEL, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Auth(_)));
    }
}

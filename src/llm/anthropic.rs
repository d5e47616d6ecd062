use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use super::CompletionProvider;
use crate::config::AnthropicConfig;
use crate::http::build_client;
use crate::models::GenerationRequest;
use crate::prompt::{ASSISTANT_TURN, HUMAN_TURN};

const API_VERSION: &str = "2023-06-01";
const PREFLIGHT_MAX_TOKENS: u32 = 100;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("api error: HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("http error: {0}")]
    Http(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

pub struct AnthropicClient {
    http: Client,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(config: &AnthropicConfig) -> Self {
        Self {
            http: build_client(),
            config: config.clone(),
        }
    }

    /// One tiny completion to validate the key before the catalog is touched.
    pub async fn preflight(&self) -> Result<(), LlmError> {
        let prompt = format!("{HUMAN_TURN} Hello!{ASSISTANT_TURN}");
        self.complete_raw(&prompt, PREFLIGHT_MAX_TOKENS).await.map(drop)
    }

    async fn complete_raw(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let body = CompletionRequest {
            model: &self.config.model,
            prompt,
            max_tokens_to_sample: max_tokens,
        };
        let response = self
            .http
            .post(format!("{}/v1/complete", self.config.base_url))
            .header("x-api-key", self.config.api_key.trim())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|err| LlmError::Http(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let payload: CompletionResponse = response
            .json()
            .await
            .map_err(|err| LlmError::InvalidResponse(err.to_string()))?;
        Ok(payload.completion)
    }
}

impl CompletionProvider for AnthropicClient {
    /// No retry here: the call is costly and not assumed idempotent-safe, so
    /// a failed attempt is skipped rather than replayed.
    async fn complete(&self, request: &GenerationRequest) -> Option<String> {
        match self.complete_raw(&request.prompt, request.max_tokens).await {
            Ok(text) => Some(text),
            Err(err) => {
                error!(
                    target = "calliope.llm",
                    subject = %request.subject,
                    error = %err,
                    "completion failed",
                );
                None
            }
        }
    }
}

/// Best-effort extraction of the provider's error envelope; falls back to the
/// raw body.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "<empty body>".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens_to_sample: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    completion: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_reads_the_provider_envelope() {
        let body = r#"{"error": {"type": "overloaded_error", "message": "Overloaded"}}"#;
        assert_eq!(error_message(body), "Overloaded");
    }

    #[test]
    fn error_message_falls_back_to_the_raw_body() {
        assert_eq!(error_message("upstream timeout"), "upstream timeout");
        assert_eq!(error_message("  "), "<empty body>");
    }

    #[test]
    fn completion_request_serializes_the_legacy_shape() {
        let body = CompletionRequest {
            model: "claude-2.1",
            prompt: "\n\nHuman: Hi\n\nAssistant:",
            max_tokens_to_sample: 500,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "claude-2.1");
        assert_eq!(json["max_tokens_to_sample"], 500);
        assert!(json["prompt"].as_str().unwrap().starts_with("\n\nHuman:"));
    }
}

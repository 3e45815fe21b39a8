//! Gateway to the remote chat-completion provider.
//!
//! Every prompt is wrapped as a single user turn and sent to an OpenAI-compatible
//! `chat/completions` endpoint (OpenRouter by default). One request per call, no retry,
//! no streaming.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Output-token ceiling applied to every completion request.
pub const MAX_COMPLETION_TOKENS: u32 = 1500;

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Provider answered with a non-success status; carries the raw body.
    #[error("{body}")]
    Upstream {
        /// Status code returned by the provider.
        status: u16,
        /// Raw response body, kept verbatim as diagnostic detail.
        body: String,
    },
    /// Provider could not be reached.
    #[error("Failed to reach completion provider: {0}")]
    Transport(String),
    /// Request did not finish within the stage timeout.
    #[error("Completion request timed out after {0:?}")]
    Timeout(Duration),
    /// Provider answered 2xx but the body had no usable message.
    #[error("Malformed completion response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by completion backends.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `prompt` as a single user message and return the trimmed reply.
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Completion client for OpenAI-compatible chat endpoints.
pub struct OpenRouterClient {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenRouterClient {
    /// Build a client for `endpoint` authenticating with `api_key`.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let http = Client::builder()
            .user_agent("docpipe/completion")
            .timeout(timeout)
            .build()
            .map_err(|error| CompletionError::Transport(error.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout,
        })
    }

    /// Build a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, CompletionError> {
        Self::new(
            config.completion_url.clone(),
            config.completion_api_key.clone(),
            config.completion_model.clone(),
            config.stage_timeout(),
        )
    }

    fn map_send_error(&self, error: reqwest::Error) -> CompletionError {
        if error.is_timeout() {
            CompletionError::Timeout(self.timeout)
        } else {
            CompletionError::Transport(format!("{}: {error}", self.endpoint))
        }
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let payload = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: MAX_COMPLETION_TOKENS,
        };
        tracing::debug!(
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "Sending completion request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| self.map_send_error(error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|error| self.map_send_error(error))?;
            tracing::warn!(status = status.as_u16(), body = %body, "Completion provider rejected request");
            return Err(CompletionError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatResponse = response.json().await.map_err(|error| {
            if error.is_timeout() {
                CompletionError::Timeout(self.timeout)
            } else {
                CompletionError::InvalidResponse(format!(
                    "failed to decode completion response: {error}"
                ))
            }
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| CompletionError::InvalidResponse("response contained no message".into()))
    }
}

//! Groq generation backend using the OpenAI-compatible chat completions API.
//!
//! This module is only available when the `groq` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{GenerationError, RagError, Result};
use crate::generation::{GenerationBackend, GenerationRequest};

/// The default Groq API base URL.
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// The default Groq-hosted model.
pub const DEFAULT_MODEL: &str = "llama3-8b-8192";

/// A [`GenerationBackend`] backed by Groq, or any OpenAI-compatible
/// `/chat/completions` endpoint.
///
/// # Configuration
///
/// - `model` – defaults to `llama3-8b-8192`.
/// - `base_url` – defaults to the Groq API.
/// - `api_key` – from the constructor or the `GROQ_API_KEY` environment variable.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::GroqBackend;
///
/// let backend = GroqBackend::new("gsk_...")?.with_model("llama-3.1-8b-instant");
/// ```
pub struct GroqBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GroqBackend {
    /// Create a backend with the given API key, default model and base URL.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::ConfigError("Groq API key must not be empty".into()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: GROQ_API_BASE.into(),
            model: DEFAULT_MODEL.into(),
        })
    }

    /// Create a backend using the `GROQ_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GROQ_API_KEY").map_err(|_| {
            RagError::ConfigError("GROQ_API_KEY environment variable not set".into())
        })?;
        Self::new(api_key)
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the backend at another OpenAI-compatible API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

// ── Chat completions request types ─────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

// ── GenerationBackend implementation ───────────────────────────────

#[async_trait]
impl GenerationBackend for GroqBackend {
    fn name(&self) -> &str {
        "Groq"
    }

    async fn complete(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<Value, GenerationError> {
        debug!(
            provider = "Groq",
            model = %self.model,
            prompt_chars = request.prompt.chars().count(),
            "chat completion request"
        );

        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: &request.prompt }],
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "Groq", error = %e, "request failed");
                GenerationError::Transport(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after(response.headers());
            error!(provider = "Groq", ?retry_after, "rate limited");
            return Err(GenerationError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(provider = "Groq", %status, "API error");
            return Err(GenerationError::Http { status: status.as_u16(), body });
        }

        response.json::<Value>().await.map_err(|e| {
            error!(provider = "Groq", error = %e, "failed to decode response body");
            GenerationError::MalformedResponse(format!("response body is not JSON: {e}"))
        })
    }
}

//! Resilient wrapper around a [`GenerationBackend`].
//!
//! [`ResilientGenerationClient`] validates and truncates prompts locally,
//! bounds every backend call with a timeout, parses the reply strictly, and
//! retries transient failures with exponential backoff. One call moves
//! through the states
//!
//! ```text
//! Pending ──► Success
//!    │
//!    └──► RetryableFailure ──► Pending        (attempts left)
//!                         └──► TerminalFailure (attempts exhausted)
//! Pending ──► TerminalFailure                  (non-retryable error, cancellation)
//! ```
//!
//! Waiting goes through a [`Sleeper`], so backoff can be observed in tests
//! without real delays.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RetryConfig;
use crate::error::GenerationError;
use crate::generation::{GenerationBackend, GenerationRequest, ParsedCompletion, parse_completion};

/// Something that can wait for a duration.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// A [`Sleeper`] backed by `tokio::time::sleep`.
///
/// Under a paused tokio clock (`#[tokio::test(start_paused = true)]`) the
/// sleep completes by auto-advancing virtual time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

enum CallState {
    Pending { attempt: usize },
    RetryableFailure { attempt: usize, error: GenerationError },
    Success(String),
    TerminalFailure(GenerationError),
}

/// Generation client with validation, truncation, timeout and retry.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use docqa_rag::{GroqBackend, ResilientGenerationClient};
///
/// let client = ResilientGenerationClient::new(Arc::new(GroqBackend::from_env()?));
/// let answer = client.generate("Summarize: ...", 300, 0.2).await?;
/// ```
pub struct ResilientGenerationClient {
    backend: Arc<dyn GenerationBackend>,
    config: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl ResilientGenerationClient {
    /// Wrap a backend with the default [`RetryConfig`] and a [`TokioSleeper`].
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend, config: RetryConfig::default(), sleeper: Arc::new(TokioSleeper) }
    }

    /// Replace the retry configuration.
    pub fn with_config(mut self, config: RetryConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the sleeper used for backoff delays.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Return the retry configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Reject empty prompts and cut over-long ones to the character budget.
    ///
    /// A truncated prompt is exactly `max_prompt_chars` characters long and
    /// ends with the configured marker, unless the marker alone does not fit
    /// the budget.
    pub fn prepare_prompt(&self, prompt: &str) -> Result<String, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let max_chars = self.config.max_prompt_chars;
        let len = prompt.chars().count();
        if len <= max_chars {
            return Ok(prompt.to_string());
        }

        let marker = &self.config.truncation_marker;
        let marker_len = marker.chars().count();
        let keep = if marker_len < max_chars { max_chars - marker_len } else { max_chars };
        let mut truncated: String = prompt.chars().take(keep).collect();
        if keep < max_chars {
            truncated.push_str(marker);
        }
        debug!(original_chars = len, kept_chars = keep, "prompt truncated");
        Ok(truncated)
    }

    /// Generate text for `prompt`.
    ///
    /// # Errors
    ///
    /// [`GenerationError::EmptyPrompt`] without contacting the backend,
    /// [`GenerationError::RetriesExhausted`] once every attempt failed
    /// transiently, or the first non-retryable error.
    pub async fn generate(
        &self,
        prompt: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        self.generate_with_cancel(prompt, max_output_tokens, temperature, &CancellationToken::new())
            .await
    }

    /// Like [`generate`](Self::generate), but stops retrying once `cancel`
    /// fires.
    ///
    /// An attempt already in flight runs to completion or to its timeout; no
    /// new attempt and no backoff delay starts after cancellation.
    pub async fn generate_with_cancel(
        &self,
        prompt: &str,
        max_output_tokens: u32,
        temperature: f32,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        let request = GenerationRequest {
            prompt: self.prepare_prompt(prompt)?,
            max_output_tokens,
            temperature,
        };
        let max_attempts = self.config.max_attempts.max(1);
        let mut state = CallState::Pending { attempt: 0 };

        loop {
            state = match state {
                CallState::Pending { attempt } => {
                    if cancel.is_cancelled() {
                        CallState::TerminalFailure(GenerationError::Cancelled)
                    } else {
                        debug!(backend = self.backend.name(), attempt = attempt + 1, "generation attempt");
                        match self.attempt(&request).await {
                            Ok(text) => {
                                if attempt > 0 {
                                    info!(attempt = attempt + 1, "generation succeeded after retry");
                                }
                                CallState::Success(text)
                            }
                            Err(error) if error.is_retryable() => {
                                CallState::RetryableFailure { attempt, error }
                            }
                            Err(error) => CallState::TerminalFailure(error),
                        }
                    }
                }
                CallState::RetryableFailure { attempt, error } => {
                    let attempts = attempt + 1;
                    if attempts >= max_attempts {
                        warn!(attempts, error = %error, "generation failed, retries exhausted");
                        CallState::TerminalFailure(GenerationError::RetriesExhausted {
                            attempts,
                            last: Box::new(error),
                        })
                    } else {
                        let delay = self.backoff(attempt, &error);
                        warn!(
                            attempt = attempts,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "generation attempt failed, retrying"
                        );
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => CallState::TerminalFailure(GenerationError::Cancelled),
                            _ = self.sleeper.sleep(delay) => CallState::Pending { attempt: attempts },
                        }
                    }
                }
                CallState::Success(text) => return Ok(text),
                CallState::TerminalFailure(error) => return Err(error),
            };
        }
    }

    /// Backoff before retry `attempt`, stretched to honour a rate limit's
    /// `retry_after` up to `max_delay`.
    fn backoff(&self, attempt: usize, error: &GenerationError) -> Duration {
        let delay = self.config.delay_for(attempt);
        match error {
            GenerationError::RateLimited { retry_after: Some(after) } => {
                delay.max((*after).min(self.config.max_delay))
            }
            _ => delay,
        }
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let timeout = self.config.timeout;
        let body = tokio::time::timeout(timeout, self.backend.complete(request))
            .await
            .map_err(|_| GenerationError::Timeout(timeout))??;

        match parse_completion(&body) {
            ParsedCompletion::Parsed(text) => Ok(text),
            ParsedCompletion::ParseFailure(reason) => Err(GenerationError::MalformedResponse(reason)),
        }
    }
}

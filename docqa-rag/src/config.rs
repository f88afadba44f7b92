//! Configuration for the retrieval pipeline and the generation client.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunking::{Chunker, OverlapChunker, SentenceChunker};
use crate::error::{RagError, Result};

/// Which chunking algorithm ingestion uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingMode {
    /// Paragraph and sentence boundaries ([`SentenceChunker`]).
    #[default]
    Sentence,
    /// Sliding window with overlap ([`OverlapChunker`]).
    Overlap,
}

/// Configuration parameters for the retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks in [`ChunkingMode::Overlap`].
    pub chunk_overlap: usize,
    /// Chunking algorithm used on ingestion.
    pub chunking: ChunkingMode,
    /// Number of results retrieved per question.
    pub top_k: usize,
    /// Maximum cosine distance kept on the hybrid-search path; `None` keeps everything.
    pub relevance_threshold: Option<f32>,
    /// Character budget of the assembled context.
    pub max_context_chars: usize,
    /// Character budget of a prompt sent to the generation backend.
    pub max_prompt_chars: usize,
    /// Maximum number of tokens the backend may generate.
    pub max_output_tokens: u32,
    /// Sampling temperature passed to the backend.
    pub temperature: f32,
    /// Pause between generation calls in batch answering. Zero disables it.
    #[serde(with = "duration_millis")]
    pub batch_delay: Duration,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 200,
            chunking: ChunkingMode::Sentence,
            top_k: 4,
            relevance_threshold: Some(0.8),
            max_context_chars: 3000,
            max_prompt_chars: 4000,
            max_output_tokens: 300,
            temperature: 0.2,
            batch_delay: Duration::from_secs(4),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Build the chunker selected by [`chunking`](RagConfig::chunking).
    pub fn chunker(&self) -> Arc<dyn Chunker> {
        match self.chunking {
            ChunkingMode::Sentence => Arc::new(SentenceChunker::new(self.chunk_size)),
            ChunkingMode::Overlap => {
                Arc::new(OverlapChunker::new(self.chunk_size, self.chunk_overlap))
            }
        }
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Select the chunking algorithm.
    pub fn chunking(mut self, mode: ChunkingMode) -> Self {
        self.config.chunking = mode;
        self
    }

    /// Set the number of results retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set or clear the hybrid-search distance cutoff.
    pub fn relevance_threshold(mut self, threshold: Option<f32>) -> Self {
        self.config.relevance_threshold = threshold;
        self
    }

    /// Set the character budget of the assembled context.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    /// Set the character budget of a prompt.
    pub fn max_prompt_chars(mut self, chars: usize) -> Self {
        self.config.max_prompt_chars = chars;
        self
    }

    /// Set the maximum number of generated tokens.
    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.config.max_output_tokens = tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the pause between batch generation calls.
    pub fn batch_delay(mut self, delay: Duration) -> Self {
        self.config.batch_delay = delay;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `relevance_threshold` is outside `[0, 2]`
    /// - `max_context_chars >= max_prompt_chars`
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        if config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if let Some(threshold) = config.relevance_threshold {
            if !(0.0..=2.0).contains(&threshold) {
                return Err(RagError::ConfigError(format!(
                    "relevance_threshold ({threshold}) must be a cosine distance in [0, 2]"
                )));
            }
        }
        if config.max_context_chars >= config.max_prompt_chars {
            return Err(RagError::ConfigError(format!(
                "max_context_chars ({}) must be less than max_prompt_chars ({})",
                config.max_context_chars, config.max_prompt_chars
            )));
        }
        Ok(config)
    }
}

/// Retry and timeout settings for the resilient generation client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Total attempts per call (1 = no retry).
    pub max_attempts: usize,
    /// Delay before the first retry; doubled for every further retry.
    #[serde(with = "duration_millis")]
    pub base_delay: Duration,
    /// Upper bound for a single backoff delay.
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
    /// Bound on a single backend call.
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Character budget of a prompt; longer prompts are truncated.
    pub max_prompt_chars: usize,
    /// Appended to truncated prompts.
    pub truncation_marker: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            timeout: Duration::from_secs(10),
            max_prompt_chars: 4000,
            truncation_marker: "\n...[truncated]".to_string(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (0-based): `base_delay * 2^retry`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, retry: usize) -> Duration {
        let factor = 1u32.checked_shl(retry as u32).unwrap_or(u32::MAX);
        self.base_delay.checked_mul(factor).map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

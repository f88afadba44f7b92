//! Question-answering pipeline orchestrator.
//!
//! The [`Pipeline`] composes a [`Chunker`], a shared [`VectorIndex`], a
//! [`Retriever`] and a [`ResilientGenerationClient`]:
//!
//! - ingest: chunk → embed → index
//! - answer: retrieve → assemble prompt → generate
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{Pipeline, RagConfig, VectorIndex, ResilientGenerationClient};
//!
//! let pipeline = Pipeline::builder()
//!     .config(RagConfig::default())
//!     .index(Arc::new(VectorIndex::in_memory(Arc::new(HashEmbeddingProvider::default()))))
//!     .generator(Arc::new(ResilientGenerationClient::new(Arc::new(backend))))
//!     .build()?;
//!
//! pipeline.ingest(text, metadata).await?;
//! let answer = pipeline.answer("What does Alpha cause?").await?;
//! ```

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::document::{Document, Metadata, SearchResult};
use crate::error::{GenerationError, RagError, Result};
use crate::index::VectorIndex;
use crate::prompt::{
    CANCELLED_ANSWER, FAILED_ANSWER, NO_RELEVANT_ANSWER, NOT_FOUND_ANSWER, grounded_prompt,
    simulation_prompt,
};
use crate::resilient::{ResilientGenerationClient, Sleeper, TokioSleeper};
use crate::retriever::{Retrieval, Retriever};

/// Result of the hybrid (vector search + generation) path.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HybridAnswer {
    /// Results that passed the relevance threshold.
    pub results: Vec<SearchResult>,
    /// The generated answer or a sentinel.
    pub answer: String,
}

/// The question-answering pipeline.
///
/// Holds only shared references; cloning the `Arc`s is all it takes to serve
/// concurrent requests. Construct one via [`Pipeline::builder()`].
pub struct Pipeline {
    config: RagConfig,
    chunker: Arc<dyn Chunker>,
    index: Arc<VectorIndex>,
    retriever: Retriever,
    generator: Arc<ResilientGenerationClient>,
    sleeper: Arc<dyn Sleeper>,
}

impl Pipeline {
    /// Create a new [`PipelineBuilder`].
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the shared index.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// A pipeline sharing everything with this one except the index.
    pub fn with_index(&self, index: Arc<VectorIndex>) -> Pipeline {
        Pipeline {
            config: self.config.clone(),
            chunker: Arc::clone(&self.chunker),
            retriever: build_retriever(&self.config, Arc::clone(&index)),
            index,
            generator: Arc::clone(&self.generator),
            sleeper: Arc::clone(&self.sleeper),
        }
    }

    /// Ingest raw text as a new document: chunk → embed → index.
    ///
    /// Returns the ids of the stored chunks.
    ///
    /// # Errors
    ///
    /// [`RagError::ValidationError`] for empty text; embedding and index
    /// errors abort the whole ingestion with nothing stored.
    pub async fn ingest(&self, text: &str, metadata: Metadata) -> Result<Vec<String>> {
        self.ingest_document(&Document::new(text, metadata)).await
    }

    /// Ingest a document: chunk → embed → index.
    pub async fn ingest_document(&self, document: &Document) -> Result<Vec<String>> {
        if document.text.trim().is_empty() {
            return Err(RagError::ValidationError(format!(
                "document '{}' has no text",
                document.id
            )));
        }

        let chunks = self.chunker.chunk(document);
        let ids = self.index.insert(&chunks).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "ingestion failed");
            e
        })?;

        info!(document.id = %document.id, chunk_count = ids.len(), "ingested document");
        Ok(ids)
    }

    /// Answer a question from the indexed documents.
    ///
    /// Returns [`NOT_FOUND_ANSWER`] without calling generation when nothing
    /// was retrieved and [`FAILED_ANSWER`] when generation failed.
    ///
    /// # Errors
    ///
    /// Only retrieval failures (embedding, index read) are errors.
    pub async fn answer(&self, question: &str) -> Result<String> {
        self.answer_with_cancel(question, &CancellationToken::new()).await
    }

    async fn answer_with_cancel(&self, question: &str, cancel: &CancellationToken) -> Result<String> {
        if question.trim().is_empty() {
            return Err(RagError::ValidationError("question must not be empty".to_string()));
        }

        let retrieval = self.retriever.retrieve(question, self.config.top_k).await?;
        let Some(found) = retrieval.context() else {
            debug!("no context retrieved, skipping generation");
            return Ok(NOT_FOUND_ANSWER.to_string());
        };

        let prompt = grounded_prompt(&found.context, question, self.config.max_prompt_chars);
        Ok(self.generate_or_sentinel(&prompt, cancel).await)
    }

    /// Answer a question from caller-supplied context instead of the index.
    pub async fn answer_with_context(&self, question: &str, context: &str) -> Result<String> {
        if question.trim().is_empty() {
            return Err(RagError::ValidationError("question must not be empty".to_string()));
        }
        if context.trim().is_empty() {
            return Ok(NOT_FOUND_ANSWER.to_string());
        }

        let prompt = grounded_prompt(context, question, self.config.max_prompt_chars);
        Ok(self.generate_or_sentinel(&prompt, &CancellationToken::new()).await)
    }

    /// Analyse a hypothetical scenario against caller-supplied context.
    pub async fn simulate(&self, context: &str, scenario: &str) -> Result<String> {
        if scenario.trim().is_empty() {
            return Err(RagError::ValidationError("scenario must not be empty".to_string()));
        }

        let prompt = simulation_prompt(context, scenario, self.config.max_prompt_chars);
        Ok(self.generate_or_sentinel(&prompt, &CancellationToken::new()).await)
    }

    /// Vector search filtered by the relevance threshold, followed by generation.
    ///
    /// Short-circuits with [`NO_RELEVANT_ANSWER`] when the threshold removed
    /// every result and with [`NOT_FOUND_ANSWER`] when nothing was found.
    pub async fn hybrid_search(&self, query: &str, k: usize) -> Result<HybridAnswer> {
        if query.trim().is_empty() {
            return Err(RagError::ValidationError("query must not be empty".to_string()));
        }

        match self.retriever.retrieve_relevant(query, k).await? {
            Retrieval::Found(found) => {
                let prompt = grounded_prompt(&found.context, query, self.config.max_prompt_chars);
                let answer = self.generate_or_sentinel(&prompt, &CancellationToken::new()).await;
                Ok(HybridAnswer { results: found.results, answer })
            }
            Retrieval::NoRelevantContent { .. } => {
                Ok(HybridAnswer { results: Vec::new(), answer: NO_RELEVANT_ANSWER.to_string() })
            }
            Retrieval::NothingIndexed => {
                Ok(HybridAnswer { results: Vec::new(), answer: NOT_FOUND_ANSWER.to_string() })
            }
        }
    }

    /// Answer questions one at a time, pausing `batch_delay` between
    /// generation calls.
    ///
    /// Always returns exactly one answer per question: failures become
    /// sentinels and questions left after `cancel` fires become
    /// [`CANCELLED_ANSWER`].
    pub async fn answer_many(&self, questions: &[String], cancel: &CancellationToken) -> Vec<String> {
        let mut answers = Vec::with_capacity(questions.len());
        let mut called_generation = false;

        for (i, question) in questions.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(answered = i, total = questions.len(), "batch cancelled");
                break;
            }

            let delay = self.config.batch_delay;
            if called_generation && !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        warn!(answered = i, total = questions.len(), "batch cancelled during delay");
                        break;
                    }
                    _ = self.sleeper.sleep(delay) => {}
                }
            }

            let answer = match self.answer_with_cancel(question, cancel).await {
                Ok(answer) => {
                    called_generation = answer != NOT_FOUND_ANSWER;
                    answer
                }
                Err(e) => {
                    error!(question_index = i, error = %e, "question failed");
                    called_generation = false;
                    FAILED_ANSWER.to_string()
                }
            };
            answers.push(answer);
        }

        answers.resize(questions.len(), CANCELLED_ANSWER.to_string());
        info!(question_count = questions.len(), "batch answered");
        answers
    }

    async fn generate_or_sentinel(&self, prompt: &str, cancel: &CancellationToken) -> String {
        match self
            .generator
            .generate_with_cancel(
                prompt,
                self.config.max_output_tokens,
                self.config.temperature,
                cancel,
            )
            .await
        {
            Ok(text) => text,
            Err(GenerationError::Cancelled) => CANCELLED_ANSWER.to_string(),
            Err(e) => {
                error!(error = %e, "generation failed, returning sentinel answer");
                FAILED_ANSWER.to_string()
            }
        }
    }
}

fn build_retriever(config: &RagConfig, index: Arc<VectorIndex>) -> Retriever {
    Retriever::new(index)
        .with_relevance_threshold(config.relevance_threshold)
        .with_max_context_chars(config.max_context_chars)
}

/// Builder for constructing a [`Pipeline`].
///
/// `index` and `generator` are required. The chunker defaults to the one
/// selected by the configuration and the sleeper to [`TokioSleeper`].
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = Pipeline::builder()
///     .config(RagConfig::default())
///     .index(index)
///     .generator(generator)
///     .chunker(Arc::new(SentenceChunker::new(20)))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<RagConfig>,
    chunker: Option<Arc<dyn Chunker>>,
    index: Option<Arc<VectorIndex>>,
    generator: Option<Arc<ResilientGenerationClient>>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the chunker selected by the configuration.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the shared vector index.
    pub fn index(mut self, index: Arc<VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the generation client.
    pub fn generator(mut self, generator: Arc<ResilientGenerationClient>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the sleeper used for the batch delay.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Build the [`Pipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `index` or `generator` is missing,
    /// or if the configured prompt budget exceeds the generator's, which
    /// would cut the question off the end of the prompt.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        let index =
            self.index.ok_or_else(|| RagError::ConfigError("index is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;
        let generator_budget = generator.config().max_prompt_chars;
        if config.max_prompt_chars > generator_budget {
            return Err(RagError::ConfigError(format!(
                "max_prompt_chars ({}) exceeds the generator's prompt budget ({})",
                config.max_prompt_chars, generator_budget
            )));
        }
        let chunker = self.chunker.unwrap_or_else(|| config.chunker());

        Ok(Pipeline {
            retriever: build_retriever(&config, Arc::clone(&index)),
            config,
            chunker,
            index,
            generator,
            sleeper: self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper)),
        })
    }
}

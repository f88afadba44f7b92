//! # docqa-rag
//!
//! Retrieval pipeline for document question answering.
//!
//! ## Overview
//!
//! A document is split into chunks, every chunk is embedded and stored in a
//! vector index, and a question is answered by retrieving the nearest chunks
//! and asking a generation backend to answer from them alone.
//!
//! - [`Chunker`] - [`SentenceChunker`] (sentence packing) and [`OverlapChunker`] (sliding window)
//! - [`EmbeddingProvider`] - [`HashEmbeddingProvider`] (deterministic, local)
//! - [`VectorStore`] - [`InMemoryVectorStore`] and [`LocalVectorStore`] (JSON snapshot on disk)
//! - [`VectorIndex`] - embeds on insert and on query
//! - [`Retriever`] - relevance filtering and bounded context assembly
//! - [`ResilientGenerationClient`] - truncation, timeout and retry around a [`GenerationBackend`]
//! - [`Pipeline`] - ingest, answer, simulate, hybrid search and batch answering
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{
//!     GroqBackend, HashEmbeddingProvider, Pipeline, RagConfig, ResilientGenerationClient,
//!     VectorIndex,
//! };
//!
//! let index = Arc::new(VectorIndex::in_memory(Arc::new(HashEmbeddingProvider::default())));
//! let generator = Arc::new(ResilientGenerationClient::new(Arc::new(GroqBackend::from_env()?)));
//! let pipeline = Pipeline::builder()
//!     .config(RagConfig::default())
//!     .index(index)
//!     .generator(generator)
//!     .build()?;
//!
//! pipeline.ingest("Alpha causes Beta. Gamma is unrelated.", Default::default()).await?;
//! println!("{}", pipeline.answer("What does Alpha cause?").await?);
//! ```
//!
//! ## Features
//!
//! - `groq` (default) - [`GroqBackend`] for Groq's OpenAI-compatible API

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
#[cfg(feature = "groq")]
pub mod groq;
pub mod hashing;
pub mod index;
pub mod inmemory;
pub mod local;
pub mod mock;
pub mod pipeline;
pub mod prompt;
pub mod resilient;
pub mod retriever;
pub mod vectorstore;

pub use chunking::{Chunker, OverlapChunker, SentenceChunker};
pub use config::{ChunkingMode, RagConfig, RagConfigBuilder, RetryConfig};
pub use document::{Chunk, Document, IndexEntry, Metadata, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{GenerationError, RagError, Result};
pub use generation::{GenerationBackend, GenerationRequest, ParsedCompletion, parse_completion};
#[cfg(feature = "groq")]
pub use groq::GroqBackend;
pub use hashing::HashEmbeddingProvider;
pub use index::VectorIndex;
pub use inmemory::InMemoryVectorStore;
pub use local::LocalVectorStore;
pub use pipeline::{HybridAnswer, Pipeline, PipelineBuilder};
pub use prompt::{CANCELLED_ANSWER, FAILED_ANSWER, NO_RELEVANT_ANSWER, NOT_FOUND_ANSWER};
pub use resilient::{ResilientGenerationClient, Sleeper, TokioSleeper};
pub use retriever::{Retrieval, RetrievedContext, Retriever};
pub use vectorstore::VectorStore;

//! The vector index: an embedding provider paired with a vector store.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::document::{Chunk, IndexEntry, Metadata, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::inmemory::InMemoryVectorStore;
use crate::vectorstore::VectorStore;

/// Embeds chunks on insertion and queries on search.
///
/// A single `VectorIndex` is meant to be shared (behind an `Arc`) by every
/// request that reads or writes the same collection of entries; the store
/// serializes writes internally.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use docqa_rag::{HashEmbeddingProvider, InMemoryVectorStore, VectorIndex};
///
/// let index = VectorIndex::new(
///     Arc::new(HashEmbeddingProvider::default()),
///     Arc::new(InMemoryVectorStore::new()),
/// );
/// let ids = index.insert_texts(vec![("Alpha causes Beta.".into(), Default::default())]).await?;
/// let results = index.query("What does Alpha cause?", 4).await?;
/// ```
pub struct VectorIndex {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl VectorIndex {
    /// Create an index over the given provider and store.
    pub fn new(embedding_provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedding_provider, store }
    }

    /// Create an index backed by a fresh [`InMemoryVectorStore`].
    pub fn in_memory(embedding_provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::new(embedding_provider, Arc::new(InMemoryVectorStore::new()))
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Embed and store chunks as one batch, returning their ids in input order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if the provider fails or returns a
    /// different number of vectors than chunks, and
    /// [`RagError::IndexWriteError`] if the store rejects the batch. In both
    /// cases nothing from the batch is stored.
    pub async fn insert(&self, chunks: &[Chunk]) -> Result<Vec<String>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let provider = self.embedding_provider.name().to_string();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            error!(provider = %provider, error = %e, "embedding failed during insert");
            match e {
                RagError::EmbeddingError { .. } => e,
                other => RagError::EmbeddingError { provider: provider.clone(), message: other.to_string() },
            }
        })?;

        if embeddings.len() != chunks.len() {
            error!(provider = %provider, expected = chunks.len(), got = embeddings.len(), "embedding count mismatch");
            return Err(RagError::EmbeddingError {
                provider,
                message: format!("expected {} embeddings, got {}", chunks.len(), embeddings.len()),
            });
        }

        let entries: Vec<IndexEntry> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry::from_chunk(chunk, embedding))
            .collect();

        self.store.upsert(&entries).await.map_err(|e| {
            error!(backend = self.store.backend(), error = %e, "insert failed");
            e
        })?;

        info!(backend = self.store.backend(), chunk_count = entries.len(), "inserted chunks");
        Ok(entries.into_iter().map(|e| e.id).collect())
    }

    /// Wrap `(text, metadata)` pairs in freshly identified chunks and insert them.
    pub async fn insert_texts(&self, items: Vec<(String, Metadata)>) -> Result<Vec<String>> {
        let chunks: Vec<Chunk> =
            items.into_iter().map(|(text, metadata)| Chunk::new(text, metadata)).collect();
        self.insert(&chunks).await
    }

    /// Return up to `k` entries closest to `text`, by ascending cosine distance.
    ///
    /// An empty index yields an empty result without calling the embedding
    /// provider.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 || self.store.count().await? == 0 {
            debug!(k, "query skipped: nothing to search");
            return Ok(Vec::new());
        }

        let embedding = self.embedding_provider.embed(text).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            e
        })?;
        let results = self.store.search(&embedding, k).await?;
        debug!(k, result_count = results.len(), "query completed");
        Ok(results)
    }

    /// Fetch one entry by id.
    pub async fn get(&self, id: &str) -> Result<Option<IndexEntry>> {
        self.store.get(id).await
    }

    /// Delete one entry by id. Returns `false` if it did not exist.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let deleted = self.store.delete(id).await?;
        info!(id, deleted, "delete requested");
        Ok(deleted)
    }

    /// Return every stored entry in insertion order.
    pub async fn list_all(&self) -> Result<Vec<IndexEntry>> {
        self.store.list().await
    }

    /// Return the number of stored entries.
    pub async fn count(&self) -> Result<usize> {
        self.store.count().await
    }
}

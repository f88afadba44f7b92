//! Vector store trait for storing and searching index entries.

use async_trait::async_trait;

use crate::document::{IndexEntry, SearchResult};
use crate::error::Result;

/// A storage backend for index entries with cosine-distance search.
///
/// Every method is atomic with respect to the others: a batch passed to
/// [`upsert`](VectorStore::upsert) becomes visible all at once or not at all.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.upsert(&entries).await?;
/// let results = store.search(&query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name used in errors and logs.
    fn backend(&self) -> &str;

    /// Insert or replace entries as a single batch.
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<()>;

    /// Delete one entry. Returns `false` if no entry had that id.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Fetch one entry by id.
    async fn get(&self, id: &str) -> Result<Option<IndexEntry>>;

    /// Return the `top_k` entries closest to `embedding`, ordered by ascending
    /// cosine distance.
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    /// Return every entry in insertion order.
    async fn list(&self) -> Result<Vec<IndexEntry>>;

    /// Return the number of stored entries.
    async fn count(&self) -> Result<usize>;
}

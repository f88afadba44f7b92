//! In-memory vector store using cosine distance.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by a
//! `Vec` of entries protected by a `tokio::sync::RwLock`. It is suitable for
//! per-request indexes, development and tests. The same table type backs
//! [`LocalVectorStore`](crate::local::LocalVectorStore).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::document::{IndexEntry, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "InMemory";

/// Compute cosine distance (`1 - cosine similarity`) between two vectors.
///
/// Returns 1.0 if either vector has zero magnitude, so an empty embedding is
/// never considered close to anything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (norm_a * norm_b)).clamp(0.0, 2.0)
}

/// Entries in insertion order. Shared by the in-memory and local stores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct EntryTable {
    entries: Vec<IndexEntry>,
}

impl EntryTable {
    pub(crate) fn dimensions(&self) -> Option<usize> {
        self.entries.first().map(|e| e.embedding.len())
    }

    /// Check that a batch can be stored next to the existing entries.
    pub(crate) fn check_batch(&self, batch: &[IndexEntry]) -> std::result::Result<(), String> {
        let expected = self.dimensions().or_else(|| batch.first().map(|e| e.embedding.len()));
        for entry in batch {
            if entry.embedding.is_empty() {
                return Err(format!("entry '{}' has no embedding", entry.id));
            }
            if Some(entry.embedding.len()) != expected {
                return Err(format!(
                    "entry '{}' has {} dimensions, index uses {}",
                    entry.id,
                    entry.embedding.len(),
                    expected.unwrap_or_default()
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn upsert(&mut self, batch: &[IndexEntry]) {
        for entry in batch {
            match self.entries.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry.clone(),
                None => self.entries.push(entry.clone()),
            }
        }
    }

    pub(crate) fn delete(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub(crate) fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub(crate) fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> std::result::Result<Vec<SearchResult>, String> {
        if let Some(dimensions) = self.dimensions() {
            if dimensions != embedding.len() {
                return Err(format!(
                    "query has {} dimensions, index uses {dimensions}",
                    embedding.len()
                ));
            }
        }

        let mut scored: Vec<SearchResult> = self
            .entries
            .iter()
            .map(|entry| SearchResult {
                id: entry.id.clone(),
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
                distance: cosine_distance(&entry.embedding, embedding),
            })
            .collect();

        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// An in-memory vector store using cosine distance for search.
///
/// All operations are async-safe via `tokio::sync::RwLock`; a write holds the
/// lock for the whole batch.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.upsert(&entries).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    table: RwLock<EntryTable>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> Result<()> {
        let mut table = self.table.write().await;
        table.check_batch(entries).map_err(|message| RagError::IndexWriteError {
            backend: BACKEND.to_string(),
            message,
        })?;
        table.upsert(entries);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.table.write().await.delete(id))
    }

    async fn get(&self, id: &str) -> Result<Option<IndexEntry>> {
        Ok(self.table.read().await.get(id).cloned())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        self.table.read().await.search(embedding, top_k).map_err(|message| {
            RagError::IndexReadError { backend: BACKEND.to_string(), message }
        })
    }

    async fn list(&self) -> Result<Vec<IndexEntry>> {
        Ok(self.table.read().await.entries().to_vec())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.table.read().await.len())
    }
}

//! Vector store persisted to a local directory.
//!
//! [`LocalVectorStore`] keeps the same entry table as
//! [`InMemoryVectorStore`](crate::inmemory::InMemoryVectorStore) and writes a
//! JSON snapshot to `<dir>/index.json` on every mutation. A snapshot is written
//! to a temporary file and renamed into place before the new state becomes
//! visible, so a failed write leaves both memory and disk unchanged.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::document::{IndexEntry, SearchResult};
use crate::error::{RagError, Result};
use crate::inmemory::EntryTable;
use crate::vectorstore::VectorStore;

const BACKEND: &str = "Local";
const SNAPSHOT_FILE: &str = "index.json";

/// A vector store whose contents survive restarts.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::LocalVectorStore;
///
/// let store = LocalVectorStore::open("./vector_db").await?;
/// ```
#[derive(Debug)]
pub struct LocalVectorStore {
    dir: PathBuf,
    table: RwLock<EntryTable>,
}

fn write_error(message: impl Into<String>) -> RagError {
    RagError::IndexWriteError { backend: BACKEND.to_string(), message: message.into() }
}

fn read_error(message: impl Into<String>) -> RagError {
    RagError::IndexReadError { backend: BACKEND.to_string(), message: message.into() }
}

impl LocalVectorStore {
    /// Open the store in `dir`, creating the directory if needed and loading
    /// an existing snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexWriteError`] if the directory cannot be
    /// created and [`RagError::IndexReadError`] if a snapshot exists but
    /// cannot be read or parsed.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| write_error(format!("cannot create '{}': {e}", dir.display())))?;

        let path = dir.join(SNAPSHOT_FILE);
        let table = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<EntryTable>(&bytes)
                .map_err(|e| read_error(format!("corrupt snapshot '{}': {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => EntryTable::default(),
            Err(e) => return Err(read_error(format!("cannot read '{}': {e}", path.display()))),
        };

        info!(dir = %dir.display(), entries = table.len(), "opened local vector store");
        Ok(Self { dir, table: RwLock::new(table) })
    }

    /// The directory holding the snapshot.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn persist(&self, table: &EntryTable) -> Result<()> {
        let bytes = serde_json::to_vec(table)
            .map_err(|e| write_error(format!("cannot serialize snapshot: {e}")))?;
        let path = self.dir.join(SNAPSHOT_FILE);
        let tmp = self.dir.join(format!("{SNAPSHOT_FILE}.tmp"));

        tokio::fs::write(&tmp, &bytes).await.map_err(|e| {
            error!(path = %tmp.display(), error = %e, "snapshot write failed");
            write_error(format!("cannot write '{}': {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "snapshot rename failed");
            write_error(format!("cannot replace '{}': {e}", path.display()))
        })?;

        debug!(path = %path.display(), entries = table.len(), "snapshot persisted");
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> Result<()> {
        let mut table = self.table.write().await;
        table.check_batch(entries).map_err(write_error)?;

        let mut next = table.clone();
        next.upsert(entries);
        self.persist(&next).await?;
        *table = next;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut table = self.table.write().await;
        let mut next = table.clone();
        if !next.delete(id) {
            return Ok(false);
        }
        self.persist(&next).await?;
        *table = next;
        Ok(true)
    }

    async fn get(&self, id: &str) -> Result<Option<IndexEntry>> {
        Ok(self.table.read().await.get(id).cloned())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        self.table.read().await.search(embedding, top_k).map_err(read_error)
    }

    async fn list(&self) -> Result<Vec<IndexEntry>> {
        Ok(self.table.read().await.entries().to_vec())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.table.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn entry(id: &str, embedding: Vec<f32>) -> IndexEntry {
        let metadata = HashMap::from([("source".to_string(), "test".to_string())]);
        IndexEntry { id: id.to_string(), embedding, text: format!("text of {id}"), metadata }
    }

    #[tokio::test]
    async fn reopened_store_returns_same_entries() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalVectorStore::open(dir.path()).await.unwrap();
            store.upsert(&[entry("a", vec![1.0, 0.0]), entry("b", vec![0.0, 1.0])]).await.unwrap();
            assert!(store.delete("a").await.unwrap());
        }

        let reopened = LocalVectorStore::open(dir.path()).await.unwrap();
        let entries = reopened.list().await.unwrap();
        assert_eq!(entries, vec![entry("b", vec![0.0, 1.0])]);
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SNAPSHOT_FILE), b"not json").unwrap();

        let err = LocalVectorStore::open(dir.path()).await.unwrap_err();
        assert!(matches!(err, RagError::IndexReadError { .. }));
    }

    #[tokio::test]
    async fn failed_persist_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path().join("db")).await.unwrap();
        store.upsert(&[entry("a", vec![1.0])]).await.unwrap();

        std::fs::remove_dir_all(dir.path().join("db")).unwrap();
        let err = store.upsert(&[entry("b", vec![2.0])]).await.unwrap_err();

        assert!(matches!(err, RagError::IndexWriteError { .. }));
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.get("b").await.unwrap().is_none());
    }
}

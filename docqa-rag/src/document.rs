//! Data types for documents, chunks, index entries, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key-value metadata carried by documents and chunks.
pub type Metadata = HashMap<String, String>;

/// A source document containing extracted text and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The plain text content of the document.
    pub text: String,
    /// Key-value metadata such as filename, size or upload time.
    pub metadata: Metadata,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Create a document with a freshly generated identifier.
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self { id: Uuid::new_v4().to_string(), text: text.into(), metadata, source_uri: None }
    }

    /// Attach the URI the document was fetched from.
    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }
}

/// A contiguous piece of a [`Document`], not yet embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier, reused as the index entry id.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Metadata copied from the parent document plus chunk-specific fields.
    pub metadata: Metadata,
}

impl Chunk {
    /// Create a chunk with a freshly generated identifier.
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self { id: Uuid::new_v4().to_string(), text: text.into(), metadata }
    }
}

/// The persisted unit inside a vector store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// Identifier of the chunk this entry was created from.
    pub id: String,
    /// The embedding of `text`.
    pub embedding: Vec<f32>,
    /// The chunk text.
    pub text: String,
    /// The chunk metadata.
    pub metadata: Metadata,
}

impl IndexEntry {
    /// Pair a chunk with its embedding.
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: chunk.id.clone(),
            embedding,
            text: chunk.text.clone(),
            metadata: chunk.metadata.clone(),
        }
    }
}

/// A retrieved entry paired with its distance to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// Identifier of the matching entry.
    pub id: String,
    /// The matching chunk text.
    pub text: String,
    /// The matching chunk metadata.
    pub metadata: Metadata,
    /// Cosine distance to the query (lower is more similar).
    pub distance: f32,
}

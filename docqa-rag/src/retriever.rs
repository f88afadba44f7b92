//! Retrieval: query the index, filter by relevance, assemble a context string.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::document::SearchResult;
use crate::error::Result;
use crate::index::VectorIndex;

/// Separator placed between retrieved passages in the context string.
pub const DEFAULT_SEPARATOR: &str = "\n---\n";

/// Context assembled from retrieved passages.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RetrievedContext {
    /// Passages joined with the separator, bounded by the character budget.
    pub context: String,
    /// The results the context was built from, by ascending distance.
    pub results: Vec<SearchResult>,
}

/// Outcome of a retrieval.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// At least one passage survived.
    Found(RetrievedContext),
    /// The index returned nothing at all.
    NothingIndexed,
    /// Passages were found but every one was farther than the relevance threshold.
    NoRelevantContent {
        /// Number of results dropped by the threshold.
        discarded: usize,
    },
}

impl Retrieval {
    /// The assembled context, if any passage survived.
    pub fn context(&self) -> Option<&RetrievedContext> {
        match self {
            Retrieval::Found(context) => Some(context),
            _ => None,
        }
    }

    /// The surviving results; empty when nothing survived.
    pub fn results(&self) -> &[SearchResult] {
        self.context().map_or(&[], |c| c.results.as_slice())
    }
}

/// Turns a question into a bounded context string.
pub struct Retriever {
    index: Arc<VectorIndex>,
    relevance_threshold: Option<f32>,
    max_context_chars: usize,
    separator: String,
}

impl Retriever {
    /// Create a retriever with no relevance threshold and a 3000-char budget.
    pub fn new(index: Arc<VectorIndex>) -> Self {
        Self {
            index,
            relevance_threshold: None,
            max_context_chars: 3000,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }

    /// Set the maximum cosine distance kept by [`retrieve_relevant`](Self::retrieve_relevant).
    pub fn with_relevance_threshold(mut self, threshold: Option<f32>) -> Self {
        self.relevance_threshold = threshold;
        self
    }

    /// Set the character budget of the assembled context.
    pub fn with_max_context_chars(mut self, chars: usize) -> Self {
        self.max_context_chars = chars;
        self
    }

    /// Set the separator placed between passages.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Return the index this retriever reads from.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Retrieve the `k` nearest passages without relevance filtering.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Retrieval> {
        let results = self.index.query(query, k).await?;
        Ok(self.assemble(results, None))
    }

    /// Retrieve the `k` nearest passages and drop those farther than the
    /// configured relevance threshold.
    pub async fn retrieve_relevant(&self, query: &str, k: usize) -> Result<Retrieval> {
        let results = self.index.query(query, k).await?;
        Ok(self.assemble(results, self.relevance_threshold))
    }

    fn assemble(&self, results: Vec<SearchResult>, threshold: Option<f32>) -> Retrieval {
        if results.is_empty() {
            debug!("retrieval found nothing");
            return Retrieval::NothingIndexed;
        }

        let found = results.len();
        let results: Vec<SearchResult> = match threshold {
            Some(max_distance) => results.into_iter().filter(|r| r.distance <= max_distance).collect(),
            None => results,
        };
        if results.is_empty() {
            info!(discarded = found, ?threshold, "no result passed the relevance threshold");
            return Retrieval::NoRelevantContent { discarded: found };
        }

        let context = join_within_budget(
            results.iter().map(|r| r.text.as_str()),
            &self.separator,
            self.max_context_chars,
        );
        debug!(result_count = results.len(), context_chars = context.chars().count(), "context assembled");
        Retrieval::Found(RetrievedContext { context, results })
    }
}

/// Join passages with `separator` without exceeding `budget` chars.
///
/// Whole passages are taken while they fit; the first one that does not is
/// cut at a char boundary and the rest are dropped.
pub fn join_within_budget<'a>(
    passages: impl IntoIterator<Item = &'a str>,
    separator: &str,
    budget: usize,
) -> String {
    let separator_len = separator.chars().count();
    let mut context = String::new();
    let mut used = 0;

    for passage in passages {
        let needed_separator = if context.is_empty() { 0 } else { separator_len };
        if used + needed_separator >= budget {
            break;
        }
        let room = budget - used - needed_separator;
        if needed_separator > 0 {
            context.push_str(separator);
            used += separator_len;
        }

        let passage_len = passage.chars().count();
        if passage_len <= room {
            context.push_str(passage);
            used += passage_len;
        } else {
            context.extend(passage.chars().take(room));
            break;
        }
    }

    context
}

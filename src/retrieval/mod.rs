//! Hybrid retrieval: candidate generation, rank fusion, reranking
//!
//! The retriever fuses lexical and semantic candidates, optionally reranks
//! with a cross-encoder, and applies strict metadata preferences as a
//! re-sort rather than a filter, so a typo'd identifier can never empty the
//! result set.

mod fusion;
mod hybrid;
mod rerank;

pub use fusion::{weighted_rank_fusion, FusionConfig};
pub use hybrid::HybridRetriever;
pub use rerank::{CrossEncoder, NoopReranker, Rerank, RerankError};

use crate::corpus::Chunk;
use serde::Serialize;

/// A chunk with its relevance score for one request.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Ordered retrieval output, relevance-descending, at most the requested k.
///
/// Exists only for the duration of one request; never persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalResult {
    hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn new(hits: Vec<ScoredChunk>) -> Self {
        Self { hits }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn hits(&self) -> &[ScoredChunk] {
        &self.hits
    }

    pub fn top(&self) -> Option<&ScoredChunk> {
        self.hits.first()
    }

    pub fn chunks(&self) -> Vec<Chunk> {
        self.hits.iter().map(|h| h.chunk.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredChunk> {
        self.hits.iter()
    }
}

impl IntoIterator for RetrievalResult {
    type Item = ScoredChunk;
    type IntoIter = std::vec::IntoIter<ScoredChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter()
    }
}

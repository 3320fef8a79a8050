//! Search backend adapters
//!
//! The retrieval engine talks to its indexes through the [`LexicalSearch`]
//! and [`SemanticSearch`] capability traits, so backends can be swapped or
//! mocked. Concrete adapters wrap tantivy (BM25) and hnsw_rs (cosine ANN
//! over FastEmbed vectors). Both indexes store chunk ids only; chunk
//! hydration goes through the catalog.

mod keyword;
mod provider;
mod vector;

pub use keyword::{KeywordIndexError, TantivyLexicalIndex};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use vector::{HnswSemanticIndex, VectorIndexError};

use crate::corpus::FieldFilter;
use thiserror::Error;

/// Error surface shared by both search backends.
///
/// The hybrid retriever catches these and degrades; they never propagate to
/// the pipeline.
#[derive(Error, Debug)]
pub enum SearchBackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),
}

/// Keyword-based (BM25-style) search over pre-chunked documents.
pub trait LexicalSearch: Send + Sync {
    /// Return up to `limit` (chunk id, score) pairs, relevance-descending.
    /// `filter` is at most one metadata constraint, applied loosely.
    fn search(
        &self,
        query: &str,
        filter: Option<&FieldFilter>,
        limit: usize,
    ) -> Result<Vec<(u64, f32)>, SearchBackendError>;
}

/// Vector-similarity search over the same chunk set.
pub trait SemanticSearch: Send + Sync {
    /// Return up to `limit` (chunk id, similarity) pairs, descending.
    fn search(
        &self,
        query: &str,
        filter: Option<&FieldFilter>,
        limit: usize,
    ) -> Result<Vec<(u64, f32)>, SearchBackendError>;
}
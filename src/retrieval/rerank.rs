//! Cross-encoder reranking capability
//!
//! Reranking is optional: the retriever asks `is_available()` and skips the
//! step silently when the capability is absent or fails. The no-op
//! implementation is selected at construction time instead of feature-flag
//! branching inside retrieval code.

use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Reranker initialization failed: {0}")]
    InitializationError(String),

    #[error("Reranking failed: {0}")]
    RerankingError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Fine-grained (query, passage) relevance scoring.
pub trait Rerank: Send + Sync {
    /// Whether the capability is actually usable.
    fn is_available(&self) -> bool;

    /// Score each passage against the query. The returned scores align with
    /// the input order, one per passage.
    fn rerank(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, RerankError>;
}

/// Cross-encoder reranker backed by FastEmbed
pub struct CrossEncoder {
    model: Arc<TextRerank>,
    model_name: String,
}

impl CrossEncoder {
    /// Create a new reranker with the specified model
    pub fn new(model_name: &str) -> Result<Self, RerankError> {
        tracing::info!("Initializing reranker model: {}", model_name);

        let reranker_model = match model_name {
            "bge-reranker-base" => RerankerModel::BGERerankerBase,
            "jina-reranker-v1-turbo-en" => RerankerModel::JINARerankerV1TurboEn,
            _ => RerankerModel::BGERerankerBase,
        };

        let init_options =
            RerankInitOptions::new(reranker_model).with_show_download_progress(true);

        let model = TextRerank::try_new(init_options)
            .map_err(|e| RerankError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
        })
    }

    /// Create reranker with the default model
    pub fn with_default_model() -> Result<Self, RerankError> {
        Self::new("bge-reranker-base")
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl Rerank for CrossEncoder {
    fn is_available(&self) -> bool {
        true
    }

    fn rerank(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, RerankError> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        if query.is_empty() {
            return Err(RerankError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        let documents: Vec<&str> = passages.iter().map(|s| s.as_str()).collect();

        let results = self
            .model
            .rerank(query, documents, false, None)
            .map_err(|e| RerankError::RerankingError(e.to_string()))?;

        // FastEmbed returns results sorted by score; map back to input order
        let mut scores = vec![0.0f32; passages.len()];
        for result in results {
            if let Some(slot) = scores.get_mut(result.index) {
                *slot = result.score;
            }
        }

        Ok(scores)
    }
}

/// Trivial implementation used when no cross-encoder is configured.
pub struct NoopReranker;

impl Rerank for NoopReranker {
    fn is_available(&self) -> bool {
        false
    }

    fn rerank(&self, _query: &str, passages: &[String]) -> Result<Vec<f32>, RerankError> {
        Ok(vec![0.0; passages.len()])
    }
}

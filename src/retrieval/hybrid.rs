//! Hybrid retriever: loose-retrieve, fuse, rerank, strict-resort

use crate::config::RetrievalConfig;
use crate::corpus::{ChunkStore, FieldFilter, Filters};
use crate::index::{LexicalSearch, SemanticSearch};
use crate::retrieval::{
    weighted_rank_fusion, FusionConfig, Rerank, RetrievalResult, ScoredChunk,
};
use std::sync::Arc;
use std::time::Duration;

/// Hybrid retriever combining lexical and semantic candidates.
///
/// `retrieve` never fails: backend errors degrade to the surviving source,
/// and total unavailability yields an empty result for the caller's own
/// fallback logic.
pub struct HybridRetriever {
    lexical: Arc<dyn LexicalSearch>,
    semantic: Arc<dyn SemanticSearch>,
    store: Arc<ChunkStore>,
    reranker: Arc<dyn Rerank>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        lexical: Arc<dyn LexicalSearch>,
        semantic: Arc<dyn SemanticSearch>,
        store: Arc<ChunkStore>,
        reranker: Arc<dyn Rerank>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            lexical,
            semantic,
            store,
            reranker,
            config,
        }
    }

    /// Retrieve up to `k` chunks for `query` under `filters`.
    ///
    /// Candidate generation applies at most one loose metadata constraint
    /// (chapter, else doc_type, else block_kind; never block_id) and
    /// over-fetches to leave room for fusion and reranking losses. Exact
    /// block_id/block_kind preferences are honored afterwards as a re-sort,
    /// not a filter.
    pub async fn retrieve(&self, query: &str, filters: &Filters, k: usize) -> RetrievalResult {
        if query.trim().is_empty() || k == 0 {
            return RetrievalResult::empty();
        }

        let loose = FieldFilter::loose_from(filters);
        let fetch = k * self.config.candidate_multiplier.max(1);

        let (lexical_results, semantic_results) = tokio::join!(
            self.lexical_candidates(query, loose.clone(), fetch),
            self.semantic_candidates(query, loose, fetch),
        );

        if lexical_results.is_empty() && semantic_results.is_empty() {
            return RetrievalResult::empty();
        }

        let fusion_config = FusionConfig::adaptive(
            self.config.rrf_k,
            self.config.technical_lexical_weight,
            self.config.default_lexical_weight,
            query,
        )
        .unwrap_or_else(|e| {
            tracing::warn!("Invalid fusion weights ({}), using 0.5/0.5", e);
            FusionConfig {
                rrf_k: self.config.rrf_k,
                lexical_weight: 0.5,
                semantic_weight: 0.5,
            }
        });

        let fused = weighted_rank_fusion(&lexical_results, &semantic_results, &fusion_config);

        let candidates = self.hydrate(fused);
        let mut candidates = self.apply_rerank(query, candidates).await;

        if filters.has_strict_fields() {
            strict_resort(&mut candidates, filters);
        }

        candidates.truncate(k);
        RetrievalResult::new(candidates)
    }

    async fn lexical_candidates(
        &self,
        query: &str,
        filter: Option<FieldFilter>,
        limit: usize,
    ) -> Vec<(u64, f32)> {
        match self.lexical.search(query, filter.as_ref(), limit) {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("Lexical search degraded to empty: {}", e);
                Vec::new()
            }
        }
    }

    async fn semantic_candidates(
        &self,
        query: &str,
        filter: Option<FieldFilter>,
        limit: usize,
    ) -> Vec<(u64, f32)> {
        match self.semantic.search(query, filter.as_ref(), limit) {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("Semantic search degraded to empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Resolve fused ids against the catalog. Ids the catalog does not know
    /// are dropped.
    fn hydrate(&self, fused: Vec<(u64, f32)>) -> Vec<ScoredChunk> {
        let mut chunks = Vec::with_capacity(fused.len());
        for (id, score) in fused {
            match self.store.get(id) {
                Some(chunk) => chunks.push(ScoredChunk {
                    chunk: chunk.clone(),
                    score,
                }),
                None => tracing::warn!("Chunk {} missing from catalog, dropped", id),
            }
        }
        chunks
    }

    /// Rerank the top candidates with the cross-encoder, under a timeout.
    /// Absence, failure or timeout all skip the step silently.
    async fn apply_rerank(&self, query: &str, mut candidates: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
        if !self.reranker.is_available() || candidates.len() < 2 {
            return candidates;
        }

        let take = self.config.rerank_candidates.min(candidates.len());
        let tail = candidates.split_off(take);
        let head = candidates;

        let texts: Vec<String> = head.iter().map(|c| c.chunk.text.clone()).collect();
        let reranker = Arc::clone(&self.reranker);
        let query_owned = query.to_string();
        let timeout = Duration::from_millis(self.config.rerank_timeout_ms);

        let outcome = tokio::time::timeout(
            timeout,
            tokio::task::spawn_blocking(move || reranker.rerank(&query_owned, &texts)),
        )
        .await;

        let scores = match outcome {
            Ok(Ok(Ok(scores))) if scores.len() == head.len() => Some(scores),
            Ok(Ok(Ok(_))) => {
                tracing::debug!("Reranker returned mismatched score count, skipped");
                None
            }
            Ok(Ok(Err(e))) => {
                tracing::debug!("Reranking skipped: {}", e);
                None
            }
            Ok(Err(e)) => {
                tracing::debug!("Reranking task failed, skipped: {}", e);
                None
            }
            Err(_) => {
                tracing::debug!("Reranking timed out after {:?}, skipped", timeout);
                None
            }
        };

        let mut merged = match scores {
            Some(scores) => {
                let mut rescored: Vec<ScoredChunk> = head
                    .into_iter()
                    .zip(scores)
                    .map(|(mut candidate, score)| {
                        candidate.score = score;
                        candidate
                    })
                    .collect();
                rescored.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.chunk.id.cmp(&b.chunk.id))
                });
                rescored
            }
            None => head,
        };

        merged.extend(tail);
        merged
    }
}

/// Stable re-sort surfacing exact metadata matches ahead of relevance:
/// block_id match first, then block_kind, then chapter. Within each group
/// the fused/reranked order is preserved. Nothing is discarded, so a typo'd
/// identifier degrades to plain relevance order instead of emptiness.
fn strict_resort(candidates: &mut [ScoredChunk], filters: &Filters) {
    use crate::corpus::normalize::normalize;

    let want_block = filters.block_id.as_deref().map(normalize);
    let want_kind = filters.block_kind.as_deref().map(normalize);
    let want_chapter = filters.chapter.as_deref().map(normalize);

    candidates.sort_by_key(|c| {
        let id_match = match (&want_block, &c.chunk.block_id) {
            (Some(want), Some(have)) => normalize(have) == *want,
            _ => false,
        };
        let kind_match = match (&want_kind, &c.chunk.block_kind) {
            (Some(want), Some(have)) => normalize(have) == *want,
            _ => false,
        };
        let chapter_match = match (&want_chapter, &c.chunk.chapter) {
            (Some(want), Some(have)) => normalize(have) == *want,
            _ => false,
        };
        std::cmp::Reverse((id_match, kind_match, chapter_match))
    });
}

//! Weighted reciprocal-rank fusion of lexical and semantic candidates

use ahash::AHashMap;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Structural vocabulary that marks a query as technical: explicit block
/// references, chapter mentions, formula requests.
static STRUCTURAL_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(theoreme|théorème|definition|définition|lemme|proposition|corollaire|exercice|demonstration|démonstration|formule|chapitre|propriete|propriété|axiome)\b",
    )
    .expect("structural terms regex is valid")
});

/// Numeric block identifiers such as "3.2" or "28.7".
static BLOCK_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\.\d+\b").expect("block ref regex is valid"));

/// Formula-like tokens: operators, sub/superscripts, common symbols.
static FORMULA_TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[=∑∫√^_≤≥≠±]|\\(sum|int|sqrt|frac|lim)").expect("formula regex is valid")
});

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid weight configuration: weights must be positive")]
    InvalidWeights,
}

/// Configuration for one fusion pass
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// RRF K constant (typically 60)
    pub rrf_k: f32,

    /// Weight for lexical results
    pub lexical_weight: f32,

    /// Weight for semantic results
    pub semantic_weight: f32,
}

impl FusionConfig {
    pub fn new(rrf_k: f32, lexical_weight: f32, semantic_weight: f32) -> Result<Self, FusionError> {
        if lexical_weight <= 0.0 || semantic_weight <= 0.0 {
            return Err(FusionError::InvalidWeights);
        }

        Ok(Self {
            rrf_k,
            lexical_weight,
            semantic_weight,
        })
    }

    /// Pick weights for a query: technical queries (structural terms,
    /// numeric block identifiers, formula-like tokens) lean on the lexical
    /// ranking, everything else leans semantic.
    pub fn adaptive(
        rrf_k: f32,
        technical_lexical_weight: f32,
        default_lexical_weight: f32,
        query: &str,
    ) -> Result<Self, FusionError> {
        let lexical = if is_technical_query(query) {
            technical_lexical_weight
        } else {
            default_lexical_weight
        };
        Self::new(rrf_k, lexical, 1.0 - lexical)
    }
}

/// True when the query carries technical markers that BM25 resolves better
/// than embeddings.
pub fn is_technical_query(query: &str) -> bool {
    STRUCTURAL_TERMS.is_match(query) || BLOCK_REF.is_match(query) || FORMULA_TOKENS.is_match(query)
}

/// Fuse two ranked candidate lists by weighted reciprocal rank.
///
/// Each chunk's fused score is the sum over the lists it appears in of
/// `weight / (rrf_k + rank + 1)`; duplicates keep their best rank per
/// source. Output is (id, fused_score) sorted score-descending, with ties
/// broken by ascending id so the ranking is reproducible across calls.
pub fn weighted_rank_fusion(
    lexical_results: &[(u64, f32)],
    semantic_results: &[(u64, f32)],
    config: &FusionConfig,
) -> Vec<(u64, f32)> {
    let mut scores: AHashMap<u64, f32> = AHashMap::new();
    let mut seen_lexical: AHashMap<u64, usize> = AHashMap::new();
    let mut seen_semantic: AHashMap<u64, usize> = AHashMap::new();

    for (rank, (chunk_id, _)) in lexical_results.iter().enumerate() {
        seen_lexical.entry(*chunk_id).or_insert(rank);
    }
    for (rank, (chunk_id, _)) in semantic_results.iter().enumerate() {
        seen_semantic.entry(*chunk_id).or_insert(rank);
    }

    for (chunk_id, rank) in &seen_lexical {
        let rrf = config.lexical_weight / (config.rrf_k + (*rank as f32) + 1.0);
        *scores.entry(*chunk_id).or_insert(0.0) += rrf;
    }
    for (chunk_id, rank) in &seen_semantic {
        let rrf = config.semantic_weight / (config.rrf_k + (*rank as f32) + 1.0);
        *scores.entry(*chunk_id).or_insert(0.0) += rrf;
    }

    let mut results: Vec<(u64, f32)> = scores.into_iter().collect();
    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    results
}

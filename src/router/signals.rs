//! Routing signals
//!
//! Four independent scores in [0, 1], combined by a configurable weighted
//! sum. The similarity probe is the only I/O the router performs.

use crate::corpus::normalize::normalize;
use crate::corpus::Filters;
use crate::session::SessionContext;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Explicit structural references: "chapitre 28", "28.7", "exercice 3.2".
static STRUCTURE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(chapitre\s+\d+|\d+\.\d+)\b").expect("structure ref regex is valid")
});

/// Factual/definitional domain markers, matched on normalized text.
static FACTUAL_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(definition|enonce|theoreme|lemme|proposition|corollaire|formule|propriete|que dit|qu est ce qu)\b",
    )
    .expect("factual markers regex is valid")
});

/// Referential markers suggesting a follow-up to the previous turn.
static REFERENTIAL_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(ce theoreme|cette definition|ce resultat|celui ci|celle ci|ci dessus|precedent|precedente|le meme|la meme|aussi|encore|un exemple|un autre)\b",
    )
    .expect("referential markers regex is valid")
});

/// French subject/object pronouns counted for pronoun density.
static PRONOUNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(il|elle|ils|elles|ca|cela|le|la|les|lui|leur|en|y)\b")
        .expect("pronouns regex is valid")
});

/// The four routing signals, each in [0, 1].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SignalScores {
    pub similarity: f32,
    pub structure: f32,
    pub keyword: f32,
    pub pin: f32,
}

impl SignalScores {
    /// Weighted sum against `weights`; the caller guarantees the weights
    /// sum to 1, so the result stays in [0, 1].
    pub fn combine(&self, weights: &SignalWeights) -> f32 {
        self.similarity * weights.similarity
            + self.structure * weights.structure
            + self.keyword * weights.keyword
            + self.pin * weights.pin
    }
}

/// Weights for the signal combination. Tuned values, kept configurable.
#[derive(Debug, Clone, Copy, serde::Deserialize, Serialize)]
pub struct SignalWeights {
    pub similarity: f32,
    pub structure: f32,
    pub keyword: f32,
    pub pin: f32,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            similarity: 0.65,
            structure: 0.20,
            keyword: 0.075,
            pin: 0.075,
        }
    }
}

impl SignalWeights {
    pub fn sum(&self) -> f32 {
        self.similarity + self.structure + self.keyword + self.pin
    }
}

/// Squash an unbounded BM25 probe score into [0, 1). Monotone, so ranking
/// comparisons survive the transform.
pub fn squash_probe_score(score: f32) -> f32 {
    let score = score.max(0.0);
    score / (score + 1.0)
}

/// Structure signal: an explicit chapter/block reference in the question,
/// or one supplied by the filters in effect (scope, pin or caller).
pub fn structure_signal(resolved_question: &str, effective_filters: &Filters) -> f32 {
    let has_reference = STRUCTURE_REF.is_match(&normalize(resolved_question));
    let supplied = effective_filters.chapter.is_some() || effective_filters.block_id.is_some();

    if has_reference || supplied {
        1.0
    } else {
        0.0
    }
}

/// Keyword signal: factual/definitional markers present.
pub fn keyword_signal(resolved_question: &str) -> f32 {
    if FACTUAL_MARKERS.is_match(&crate::corpus::normalize::fold_key(resolved_question)) {
        1.0
    } else {
        0.0
    }
}

/// Pin signal: a pinned anchor exists, auto-link is on, and the question
/// reads like a follow-up.
pub fn pin_signal(raw_question: &str, session: &SessionContext) -> f32 {
    if session.pinned.is_some() && session.auto_link && looks_like_followup(raw_question) {
        1.0
    } else {
        0.0
    }
}

/// Follow-up heuristic: short questions, pronoun-heavy questions, or
/// explicitly referential phrasing.
pub fn looks_like_followup(question: &str) -> bool {
    let folded = crate::corpus::normalize::fold_key(question);
    let tokens: Vec<&str> = folded.split_whitespace().collect();

    if tokens.is_empty() {
        return false;
    }
    if tokens.len() <= 6 {
        return true;
    }
    if REFERENTIAL_MARKERS.is_match(&folded) {
        return true;
    }

    let pronouns = PRONOUNS.find_iter(&folded).count();
    pronouns as f32 / tokens.len() as f32 >= 0.3
}

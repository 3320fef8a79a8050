//! Routing: decide, per turn, whether and how to retrieve
//!
//! The router is a pure decision function apart from one cheap lexical
//! probe. Canonical overrides win over everything; an explicit session
//! route override wins over computed scores.

mod canonical;
mod signals;
mod tasks;

pub use canonical::{CanonicalRoutes, CanonicalTarget};
pub use signals::{
    keyword_signal, looks_like_followup, pin_signal, squash_probe_score, structure_signal,
    SignalScores, SignalWeights,
};
pub use tasks::match_task;

use crate::config::RouterConfig;
use crate::corpus::Filters;
use crate::index::LexicalSearch;
use crate::session::SessionContext;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How the orchestrator should handle the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteMode {
    /// Retrieve passages, then answer from them
    RetrieveFirst,
    /// Retrieve passages, then compose a task-specific output
    RetrieveThenCompose,
    /// Answer directly, without retrieval
    AnswerOnly,
}

/// Task-specific behaviors recognized by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    ExamGeneration,
    ExerciseCorrection,
    FormulaLookup,
    ProofRequest,
    Summary,
}

/// One routing decision. Produced once per turn, immutable.
#[derive(Debug, Clone, Serialize)]
pub struct RouterDecision {
    pub mode: RouteMode,
    pub task: Option<TaskKind>,
    pub filters: Filters,
    pub confidence: f32,
    pub rationale: String,
}

impl RouterDecision {
    pub fn requires_retrieval(&self) -> bool {
        self.mode != RouteMode::AnswerOnly
    }
}

/// The decision engine.
pub struct Router {
    probe: Arc<dyn LexicalSearch>,
    canonical: CanonicalRoutes,
    config: RouterConfig,
}

impl Router {
    pub fn new(
        probe: Arc<dyn LexicalSearch>,
        canonical: CanonicalRoutes,
        config: RouterConfig,
    ) -> Self {
        Self {
            probe,
            canonical,
            config,
        }
    }

    /// Decide how to handle one turn.
    ///
    /// `caller_filters` are the explicit filters passed with the question;
    /// they outrank the pin anchor, which outranks the session scope.
    pub async fn decide(
        &self,
        raw_question: &str,
        resolved_question: &str,
        caller_filters: &Filters,
        session: &SessionContext,
    ) -> RouterDecision {
        // Canonical overrides bypass scoring entirely.
        if let Some(target) = self.canonical.resolve(resolved_question) {
            return RouterDecision {
                mode: RouteMode::RetrieveFirst,
                task: None,
                filters: CanonicalRoutes::target_filters(target),
                confidence: 1.0,
                rationale: format!("canonical route '{}'", target.phrase),
            };
        }

        let pin = pin_signal(raw_question, session);
        let filters = self.derive_filters(caller_filters, session, pin >= 1.0);

        let probe_score = self.probe_top_score(resolved_question);
        let scores = SignalScores {
            similarity: squash_probe_score(probe_score),
            structure: structure_signal(resolved_question, &filters),
            keyword: keyword_signal(resolved_question),
            pin,
        };

        let mut combined = scores.combine(&self.config.weights);
        let mut penalized = false;
        if scores.similarity < self.config.weak_probe_threshold {
            let penalty = if scores.structure >= 1.0 {
                self.config.weak_probe_penalty_structured
            } else {
                self.config.weak_probe_penalty
            };
            combined -= penalty;
            penalized = true;
        }
        let combined = combined.clamp(0.0, 1.0);

        let mut rationale = format!(
            "signals: similarity={:.2} structure={:.1} keyword={:.1} pin={:.1}, combined={:.2} (threshold {:.2})",
            scores.similarity,
            scores.structure,
            scores.keyword,
            scores.pin,
            combined,
            self.config.retrieve_threshold,
        );
        if penalized {
            rationale.push_str(", weak-probe penalty applied");
        }

        let mut mode = if combined >= self.config.retrieve_threshold {
            RouteMode::RetrieveFirst
        } else {
            RouteMode::AnswerOnly
        };

        // Task patterns force composition regardless of score.
        let task = match_task(resolved_question);
        if let Some(task) = task {
            mode = RouteMode::RetrieveThenCompose;
            rationale.push_str(&format!(", task {:?}", task));
        }

        // An explicit user directive always wins over computed scores.
        if let Some(forced) = session.route_override {
            mode = forced;
            rationale.push_str(", route override in effect");
        }

        RouterDecision {
            mode,
            task,
            filters,
            confidence: combined,
            rationale,
        }
    }

    /// Merge filters by priority: caller > pin anchor (when the pin signal
    /// fired) > session scope.
    fn derive_filters(
        &self,
        caller_filters: &Filters,
        session: &SessionContext,
        pin_fired: bool,
    ) -> Filters {
        let mut filters = session.scope.clone();

        if pin_fired {
            if let Some(pinned) = &session.pinned {
                filters = filters.merge(&pinned.filters);
            }
        }

        filters.merge(caller_filters)
    }

    /// Cheap relevance probe: a tiny lexical retrieval, top score only.
    /// Probe failures score 0 and are handled by the weak-probe penalty.
    fn probe_top_score(&self, resolved_question: &str) -> f32 {
        match self
            .probe
            .search(resolved_question, None, self.config.probe_k)
        {
            Ok(results) => results.first().map(|(_, score)| *score).unwrap_or(0.0),
            Err(e) => {
                tracing::debug!("Router probe degraded: {}", e);
                0.0
            }
        }
    }
}

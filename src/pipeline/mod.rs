//! Per-request pipeline
//!
//! One question walks RECEIVED → REWRITTEN → ROUTED → RETRIEVED (when the
//! decision calls for it) → ANSWERED → MEMORY_UPDATED. The only loop is a
//! single degraded retry: an empty retrieval is re-attempted once with the
//! filters reduced to chapter-only before generation proceeds. Session
//! memory is committed last, after the turn fully completes, so an aborted
//! request leaves no partial state.

use crate::config::PipelineConfig;
use crate::corpus::Filters;
use crate::error::{Result, ScoliaError};
use crate::generate::{TaskRegistry, TextGenerator, SOURCES_HEADER};
use crate::retrieval::{HybridRetriever, RetrievalResult};
use crate::router::{Router, RouterDecision};
use crate::rewrite::QueryRewriter;
use crate::session::{PinnedAnchor, SessionStore};
use serde::Serialize;
use std::sync::Arc;

const ANSWER_SYSTEM: &str = "Tu es un assistant de cours. Tu réponds uniquement à partir des \
extraits fournis et tu cites leurs références. Si le contexte est insuffisant, dis-le.";

const INSUFFICIENT_CONTEXT_NOTE: &str = "Aucun passage pertinent n'a été trouvé dans le cours \
pour cette question, même après élargissement de la recherche. Signale-le dans ta réponse au \
lieu de répondre de mémoire.";

/// Pipeline states, in walking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Received,
    Rewritten,
    Routed,
    Retrieved,
    Answered,
    MemoryUpdated,
}

/// What one turn returns to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutcome {
    pub answer_text: String,
    pub sources: Vec<crate::corpus::Chunk>,
    pub decision: RouterDecision,
    /// Set when retrieval was required but yielded nothing, even after the
    /// degraded retry. The UI should say so instead of presenting the
    /// answer as grounded.
    pub insufficient_context: bool,
}

/// Top-level engine: sequences rewriter, router, retriever, generation and
/// the session update.
pub struct Orchestrator {
    rewriter: QueryRewriter,
    router: Router,
    retriever: HybridRetriever,
    generator: Arc<dyn TextGenerator>,
    tasks: TaskRegistry,
    sessions: Arc<SessionStore>,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        rewriter: QueryRewriter,
        router: Router,
        retriever: HybridRetriever,
        generator: Arc<dyn TextGenerator>,
        tasks: TaskRegistry,
        sessions: Arc<SessionStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            rewriter,
            router,
            retriever,
            generator,
            tasks,
            sessions,
            config,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Answer one question within a conversation.
    ///
    /// Only generation failures propagate; every retrieval-side problem
    /// degrades inside the pipeline.
    pub async fn answer(
        &self,
        question: &str,
        chat_id: &str,
        caller_filters: Option<Filters>,
        auto_link: Option<bool>,
    ) -> Result<AnswerOutcome> {
        let mut state = PipelineState::Received;
        tracing::debug!(chat_id, ?state, "turn started");

        if let Some(auto_link) = auto_link {
            self.sessions.set_auto_link(chat_id, auto_link).await;
        }
        let session = self.sessions.get(chat_id).await;
        let caller_filters = caller_filters.unwrap_or_default();

        let resolved = self.rewriter.rewrite(question, &session).await;
        state = PipelineState::Rewritten;
        tracing::debug!(chat_id, ?state, resolved, "query resolved");

        let decision = self
            .router
            .decide(question, &resolved, &caller_filters, &session)
            .await;
        state = PipelineState::Routed;
        tracing::debug!(chat_id, ?state, mode = ?decision.mode, rationale = %decision.rationale, "routed");

        let mut insufficient_context = false;
        let retrieval = if decision.requires_retrieval() {
            let result = self
                .retrieve_with_degraded_retry(&resolved, &decision.filters)
                .await;
            state = PipelineState::Retrieved;
            tracing::debug!(chat_id, ?state, hits = result.len(), "retrieved");

            if result.is_empty() {
                insufficient_context = true;
            }
            result
        } else {
            RetrievalResult::empty()
        };

        let (prompt, system) = self.build_prompt(&resolved, &decision, &retrieval, insufficient_context);

        let answer_text = self
            .generator
            .generate(&prompt, Some(&system))
            .await
            .map_err(|e| ScoliaError::Generation(e.to_string()))?;
        state = PipelineState::Answered;
        tracing::debug!(chat_id, ?state, "answer generated");

        let pin_candidate = if decision.requires_retrieval() {
            PinnedAnchor::from_retrieval(&retrieval)
        } else {
            None
        };
        let summary = turn_summary(&answer_text, self.config.summary_chars);
        self.sessions
            .update(chat_id, question, &summary, decision.filters.clone(), pin_candidate)
            .await;
        state = PipelineState::MemoryUpdated;
        tracing::debug!(chat_id, ?state, "turn committed");

        Ok(AnswerOutcome {
            answer_text,
            sources: retrieval.chunks(),
            decision,
            insufficient_context,
        })
    }

    /// Retrieve, retrying exactly once with chapter-only filters when the
    /// strict set comes back empty.
    async fn retrieve_with_degraded_retry(
        &self,
        resolved: &str,
        filters: &Filters,
    ) -> RetrievalResult {
        let result = self
            .retriever
            .retrieve(resolved, filters, self.config.retrieval_k)
            .await;

        if !result.is_empty() {
            return result;
        }

        let reduced = filters.chapter_only();
        if reduced == *filters {
            return result;
        }

        tracing::info!("Retrieval empty, retrying with chapter-only filters");
        self.retriever
            .retrieve(resolved, &reduced, self.config.retrieval_k)
            .await
    }

    fn build_prompt(
        &self,
        resolved: &str,
        decision: &RouterDecision,
        retrieval: &RetrievalResult,
        insufficient_context: bool,
    ) -> (String, String) {
        let context = render_sources(retrieval);

        if let Some(task) = decision.task {
            if let Some(template) = self.tasks.get(task) {
                let mut prompt = template.render(resolved, &context);
                if insufficient_context {
                    prompt = format!("{}\n\n{}", INSUFFICIENT_CONTEXT_NOTE, prompt);
                }
                return (prompt, template.system.clone());
            }
            tracing::warn!(?task, "No template registered for task, using default prompt");
        }

        let prompt = if decision.requires_retrieval() {
            if insufficient_context {
                format!(
                    "{}\n\nQuestion : {}\n\n{}\n(aucune source)",
                    INSUFFICIENT_CONTEXT_NOTE, resolved, SOURCES_HEADER
                )
            } else {
                format!("Question : {}\n\n{}\n{}", resolved, SOURCES_HEADER, context)
            }
        } else {
            format!("Question : {}", resolved)
        };

        (prompt, ANSWER_SYSTEM.to_string())
    }
}

/// Render retrieved chunks as a numbered sources block.
fn render_sources(retrieval: &RetrievalResult) -> String {
    let mut block = String::new();
    for (i, hit) in retrieval.iter().enumerate() {
        let mut label = Vec::new();
        if let Some(chapter) = &hit.chunk.chapter {
            label.push(format!("chapitre {}", chapter));
        }
        if let Some(block_id) = &hit.chunk.block_id {
            label.push(format!("bloc {}", block_id));
        }
        if let Some(page) = hit.chunk.page {
            label.push(format!("p. {}", page));
        }

        let label = if label.is_empty() {
            String::new()
        } else {
            format!(" ({})", label.join(", "))
        };

        block.push_str(&format!("[source {}]{} {}\n", i + 1, label, hit.chunk.text));
    }
    block
}

/// Truncate an answer into a history summary on a char boundary.
fn turn_summary(answer: &str, max_chars: usize) -> String {
    if answer.chars().count() <= max_chars {
        answer.to_string()
    } else {
        answer.chars().take(max_chars).collect()
    }
}

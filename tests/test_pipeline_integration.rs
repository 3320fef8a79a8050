//! Full pipeline integration: rewrite → route → retrieve → generate →
//! memory update, including the degraded retry and the insufficient-context
//! signal.

mod common;

use common::{fixture_store, InMemoryLexical, InMemorySemantic};
use scolia::config::{PipelineConfig, RetrievalConfig, RouterConfig};
use scolia::corpus::{DocType, Filters};
use scolia::error::ScoliaError;
use scolia::generate::{MockGenerator, TaskRegistry};
use scolia::pipeline::Orchestrator;
use scolia::retrieval::{HybridRetriever, NoopReranker};
use scolia::router::{CanonicalRoutes, RouteMode, Router};
use scolia::rewrite::QueryRewriter;
use scolia::session::SessionStore;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    engine: Orchestrator,
    lexical: Arc<InMemoryLexical>,
    generator: Arc<MockGenerator>,
}

fn harness() -> Harness {
    let store = fixture_store();
    let lexical = Arc::new(InMemoryLexical::new(Arc::clone(&store)));
    let semantic = Arc::new(InMemorySemantic::new(Arc::clone(&store)));
    let generator = Arc::new(MockGenerator::new());

    let retriever = HybridRetriever::new(
        lexical.clone(),
        semantic,
        Arc::clone(&store),
        Arc::new(NoopReranker),
        RetrievalConfig::default(),
    );

    let router = Router::new(
        lexical.clone(),
        CanonicalRoutes::with_defaults(),
        RouterConfig::default(),
    );

    let rewriter = QueryRewriter::new(
        generator.clone(),
        Duration::from_millis(500),
        2,
    );

    let engine = Orchestrator::new(
        rewriter,
        router,
        retriever,
        generator.clone(),
        TaskRegistry::with_defaults(),
        Arc::new(SessionStore::new(5, true)),
        PipelineConfig::default(),
    );

    Harness {
        engine,
        lexical,
        generator,
    }
}

#[tokio::test]
async fn test_happy_path_answers_with_sources_and_commits_memory() {
    let h = harness();
    h.generator.enqueue("Le théorème de Leibniz affirme que la série converge.");

    let chat_id = h.engine.sessions().new_session();
    let outcome = h
        .engine
        .answer("Énoncé du théorème de Leibniz", &chat_id, None, None)
        .await
        .unwrap();

    assert_eq!(
        outcome.answer_text,
        "Le théorème de Leibniz affirme que la série converge."
    );
    assert_eq!(outcome.decision.mode, RouteMode::RetrieveFirst);
    assert!(!outcome.sources.is_empty());
    assert!(outcome.sources.len() <= 6);
    assert!(!outcome.insufficient_context);

    let session = h.engine.sessions().get(&chat_id).await;
    assert_eq!(session.history.len(), 1);
    assert_eq!(
        session.history.back().unwrap().question,
        "Énoncé du théorème de Leibniz"
    );
}

#[tokio::test]
async fn test_empty_retrieval_does_exactly_one_degraded_retry() {
    let h = harness();

    let chat_id = h.engine.sessions().new_session();
    h.engine
        .sessions()
        .set_route_override(&chat_id, Some(RouteMode::RetrieveFirst))
        .await;

    // Off-corpus query; the doc_type filter gives the retry something to drop
    let filters = Filters::new(None, None, None, Some(DocType::Exercise));
    let outcome = h
        .engine
        .answer("xyzzy", &chat_id, Some(filters), None)
        .await
        .unwrap();

    assert!(outcome.insufficient_context);
    assert!(outcome.sources.is_empty());

    // One probe + the first retrieval + exactly one retry
    assert_eq!(h.lexical.call_count(), 3);
}

#[tokio::test]
async fn test_degraded_retry_recovers_chunks() {
    let h = harness();
    h.generator.enqueue("Réponse");

    // The exercise filter matches nothing for this query; the retry without
    // it finds the theorem
    let filters = Filters::new(None, None, None, Some(DocType::Exercise));
    let chat_id = h.engine.sessions().new_session();
    let outcome = h
        .engine
        .answer("théorème Leibniz alternée", &chat_id, Some(filters), None)
        .await
        .unwrap();

    assert!(!outcome.insufficient_context);
    assert!(!outcome.sources.is_empty());
    assert_eq!(outcome.sources[0].id, 1);
}

#[tokio::test]
async fn test_generation_failure_propagates_and_commits_nothing() {
    let h = harness();
    h.generator.enqueue_failure("backend down");

    let chat_id = h.engine.sessions().new_session();
    let result = h
        .engine
        .answer("Énoncé du théorème de Leibniz", &chat_id, None, None)
        .await;

    assert!(matches!(result, Err(ScoliaError::Generation(_))));

    let session = h.engine.sessions().get(&chat_id).await;
    assert!(session.history.is_empty());
}

#[tokio::test]
async fn test_answer_only_skips_retrieval() {
    let h = harness();
    h.generator.enqueue("Je ne mange pas.");

    let chat_id = h.engine.sessions().new_session();
    let outcome = h
        .engine
        .answer("Quel est ton plat préféré", &chat_id, None, None)
        .await
        .unwrap();

    assert_eq!(outcome.decision.mode, RouteMode::AnswerOnly);
    assert!(outcome.sources.is_empty());
    assert!(!outcome.insufficient_context);
}

#[tokio::test]
async fn test_task_question_routes_to_composition() {
    let h = harness();
    h.generator.enqueue("Correction : ...");

    let chat_id = h.engine.sessions().new_session();
    let outcome = h
        .engine
        .answer("Corrige l'exercice 3.5", &chat_id, None, None)
        .await
        .unwrap();

    assert_eq!(outcome.decision.mode, RouteMode::RetrieveThenCompose);
    assert!(outcome.decision.task.is_some());
}

#[tokio::test]
async fn test_scoped_single_hit_enables_pin_then_followup_links() {
    let h = harness();

    let chat_id = h.engine.sessions().new_session();
    h.engine
        .sessions()
        .set_scope(&chat_id, Filters::chapter("12"))
        .await;

    // Sole hit in chapter 12: a strong single-chunk match
    h.generator.enqueue("La convergence uniforme signifie...");
    let outcome = h
        .engine
        .answer(
            "Définition de la convergence uniforme",
            &chat_id,
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(outcome.sources.len(), 1);
    assert_eq!(outcome.sources[0].block_id.as_deref(), Some("12.1"));

    let anchor = h.engine.sessions().pin(&chat_id).await.unwrap();
    assert_eq!(anchor.filters.block_id.as_deref(), Some("12.1"));

    // Referential follow-up: the rewriter reformulates, the pin carries the
    // anchor filters into the decision
    h.generator.enqueue("Donne un exemple de convergence uniforme");
    h.generator.enqueue("Par exemple, la suite de fonctions...");
    let followup = h
        .engine
        .answer("Donne un exemple", &chat_id, None, None)
        .await
        .unwrap();

    assert_eq!(followup.decision.filters.chapter.as_deref(), Some("12"));
    assert_eq!(followup.decision.filters.block_id.as_deref(), Some("12.1"));
}

#[tokio::test]
async fn test_auto_link_flag_is_applied_to_the_session() {
    let h = harness();
    h.generator.enqueue("Réponse");

    let chat_id = h.engine.sessions().new_session();
    h.engine
        .answer(
            "Énoncé du théorème de Leibniz",
            &chat_id,
            None,
            Some(false),
        )
        .await
        .unwrap();

    let session = h.engine.sessions().get(&chat_id).await;
    assert!(!session.auto_link);
}

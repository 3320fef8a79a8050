//! Query rewriting for follow-up questions
//!
//! Turns an elliptical follow-up into a standalone query using the last
//! turns of the conversation. Every failure path is the identity: the raw
//! question always flows on, never an error and never an empty string.

use crate::generate::TextGenerator;
use crate::session::SessionContext;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

/// Markers referencing the previous turns: demonstratives, subject
/// pronouns in question position, elliptical connectors.
static REFERENTIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(ce|cette|ces|cela|ca|celui|celle|il|elle|en|y|meme|aussi|pareil|precedent|precedente|dessus|autre)\b",
    )
    .expect("referential regex is valid")
});

const REWRITE_INSTRUCTION: &str = "Reformule la dernière question en une question autonome et \
complète, en t'appuyant sur l'échange précédent. Réponds uniquement par la question reformulée.";

/// Rewrites follow-up questions into standalone ones.
pub struct QueryRewriter {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
    context_turns: usize,
}

impl QueryRewriter {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration, context_turns: usize) -> Self {
        Self {
            generator,
            timeout,
            context_turns: context_turns.clamp(1, 2),
        }
    }

    /// Produce a standalone query for the question.
    ///
    /// Identity fallback throughout: self-contained questions (or an empty
    /// history) pass through untouched, and a failed, empty or timed-out
    /// generation falls back to the raw question. Because standalone
    /// questions are returned unchanged, the function is idempotent on its
    /// own output.
    pub async fn rewrite(&self, raw_question: &str, session: &SessionContext) -> String {
        if session.history.is_empty() || !is_referential(raw_question) {
            return raw_question.to_string();
        }

        let prompt = self.build_prompt(raw_question, session);

        let outcome = tokio::time::timeout(
            self.timeout,
            self.generator.generate(&prompt, Some(REWRITE_INSTRUCTION)),
        )
        .await;

        match outcome {
            Ok(Ok(rewritten)) => {
                let rewritten = rewritten.trim();
                if rewritten.is_empty() {
                    tracing::debug!("Rewriter returned empty output, keeping raw question");
                    raw_question.to_string()
                } else {
                    rewritten.to_string()
                }
            }
            Ok(Err(e)) => {
                tracing::debug!("Rewriter degraded to identity: {}", e);
                raw_question.to_string()
            }
            Err(_) => {
                tracing::debug!("Rewriter timed out after {:?}, keeping raw question", self.timeout);
                raw_question.to_string()
            }
        }
    }

    fn build_prompt(&self, raw_question: &str, session: &SessionContext) -> String {
        let mut prompt = String::new();

        for turn in session.recent_turns(self.context_turns) {
            prompt.push_str(&format!("Question : {}\n", turn.question));
            if !turn.answer_summary.is_empty() {
                prompt.push_str(&format!("Réponse : {}\n", turn.answer_summary));
            }
        }

        prompt.push_str(&format!("Dernière question : {}", raw_question));
        prompt
    }
}

/// True when the question leans on prior turns: referential markers, or so
/// short it cannot stand alone.
pub fn is_referential(question: &str) -> bool {
    let folded = crate::corpus::normalize::fold_key(question);
    let token_count = folded.split_whitespace().count();

    if token_count == 0 {
        return false;
    }

    token_count <= 3 || REFERENTIAL.is_match(&folded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Filters;
    use crate::generate::MockGenerator;
    use crate::session::{HistoryTurn, SessionContext};
    use chrono::Utc;

    fn session_with_history() -> SessionContext {
        let mut session = SessionContext::new(5, true);
        session.push_turn(HistoryTurn {
            question: "Énoncé du théorème de Leibniz".to_string(),
            answer_summary: "Le théorème porte sur les séries alternées.".to_string(),
            filters: Filters::default(),
            asked_at: Utc::now(),
        });
        session
    }

    fn rewriter(mock: Arc<MockGenerator>) -> QueryRewriter {
        QueryRewriter::new(mock, Duration::from_millis(200), 2)
    }

    #[test]
    fn test_referential_detection() {
        assert!(is_referential("Donne un exemple"));
        assert!(is_referential("pourquoi ce theoreme est-il vrai dans le cas general"));
        assert!(!is_referential(
            "Quelle est la definition de la convergence uniforme des suites de fonctions"
        ));
    }

    #[tokio::test]
    async fn test_standalone_question_is_identity() {
        let mock = Arc::new(MockGenerator::new());
        mock.enqueue("should never be used");
        let rewriter = rewriter(Arc::clone(&mock));

        let question = "Quelle est la definition de la convergence uniforme des suites de fonctions";
        let rewritten = rewriter.rewrite(question, &session_with_history()).await;
        assert_eq!(rewritten, question);
    }

    #[tokio::test]
    async fn test_empty_history_is_identity() {
        let mock = Arc::new(MockGenerator::new());
        let rewriter = rewriter(mock);

        let session = SessionContext::new(5, true);
        let rewritten = rewriter.rewrite("Donne un exemple", &session).await;
        assert_eq!(rewritten, "Donne un exemple");
    }

    #[tokio::test]
    async fn test_followup_is_rewritten() {
        let mock = Arc::new(MockGenerator::new());
        mock.enqueue("Donne un exemple d'application du théorème de Leibniz");
        let rewriter = rewriter(mock);

        let rewritten = rewriter
            .rewrite("Donne un exemple", &session_with_history())
            .await;
        assert_eq!(
            rewritten,
            "Donne un exemple d'application du théorème de Leibniz"
        );
    }

    #[tokio::test]
    async fn test_generation_failure_falls_back_to_identity() {
        let mock = Arc::new(MockGenerator::new());
        mock.enqueue_failure("backend down");
        let rewriter = rewriter(mock);

        let rewritten = rewriter
            .rewrite("Donne un exemple", &session_with_history())
            .await;
        assert_eq!(rewritten, "Donne un exemple");
    }

    #[tokio::test]
    async fn test_empty_generation_falls_back_to_identity() {
        let mock = Arc::new(MockGenerator::new());
        mock.enqueue("   ");
        let rewriter = rewriter(mock);

        let rewritten = rewriter
            .rewrite("Donne un exemple", &session_with_history())
            .await;
        assert_eq!(rewritten, "Donne un exemple");
    }

    #[tokio::test]
    async fn test_idempotent_on_rewritten_output() {
        let mock = Arc::new(MockGenerator::new());
        mock.enqueue("Donne un exemple d'application du theoreme de Leibniz sur les series");
        let rewriter = rewriter(mock);

        let session = session_with_history();
        let once = rewriter.rewrite("Donne un exemple", &session).await;
        let twice = rewriter.rewrite(&once, &session).await;
        assert_eq!(once, twice);
    }
}

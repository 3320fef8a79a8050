//! Task prompt registry
//!
//! Maps a routed task to its formatting template. Template wording is
//! deliberately minimal; callers may replace entries wholesale.

use crate::generate::SOURCES_HEADER;
use crate::router::TaskKind;
use ahash::AHashMap;

/// A prompt template with `{question}` and `{context}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub system: String,
    pub template: String,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            template: template.into(),
        }
    }

    /// Render the template with the question and the sources block.
    pub fn render(&self, question: &str, context: &str) -> String {
        self.template
            .replace("{question}", question)
            .replace("{context}", context)
    }
}

/// Registry of task templates, keyed by routed task.
pub struct TaskRegistry {
    templates: AHashMap<TaskKind, PromptTemplate>,
}

impl TaskRegistry {
    /// Registry with built-in defaults for every task.
    pub fn with_defaults() -> Self {
        let mut templates = AHashMap::new();

        templates.insert(
            TaskKind::ExamGeneration,
            PromptTemplate::new(
                "Tu es un professeur qui rédige des sujets d'examen à partir du cours fourni.",
                format!(
                    "Compose un sujet d'examen couvrant la demande suivante : {{question}}\n\n{}\n{{context}}",
                    SOURCES_HEADER
                ),
            ),
        );

        templates.insert(
            TaskKind::ExerciseCorrection,
            PromptTemplate::new(
                "Tu es un professeur qui corrige des exercices pas à pas, en citant le cours.",
                format!(
                    "Corrige l'exercice suivant : {{question}}\n\n{}\n{{context}}",
                    SOURCES_HEADER
                ),
            ),
        );

        templates.insert(
            TaskKind::FormulaLookup,
            PromptTemplate::new(
                "Tu réponds par la formule exacte du cours, sans paraphrase.",
                format!(
                    "Donne la formule demandée : {{question}}\n\n{}\n{{context}}",
                    SOURCES_HEADER
                ),
            ),
        );

        templates.insert(
            TaskKind::ProofRequest,
            PromptTemplate::new(
                "Tu rédiges des démonstrations complètes en suivant le cours fourni.",
                format!(
                    "Rédige la démonstration demandée : {{question}}\n\n{}\n{{context}}",
                    SOURCES_HEADER
                ),
            ),
        );

        templates.insert(
            TaskKind::Summary,
            PromptTemplate::new(
                "Tu résumes fidèlement le cours fourni.",
                format!(
                    "Résume : {{question}}\n\n{}\n{{context}}",
                    SOURCES_HEADER
                ),
            ),
        );

        Self { templates }
    }

    /// Fetch the template for a task.
    pub fn get(&self, task: TaskKind) -> Option<&PromptTemplate> {
        self.templates.get(&task)
    }

    /// Replace or add a template.
    pub fn register(&mut self, task: TaskKind, template: PromptTemplate) {
        self.templates.insert(task, template);
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

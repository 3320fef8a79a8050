//! Task pattern recognition
//!
//! Certain question shapes are not plain lookups: they ask the system to
//! compose something from retrieved material. Matching happens on the
//! folded question so accents and punctuation do not matter.

use crate::corpus::normalize::fold_key;
use crate::router::TaskKind;
use regex::Regex;
use std::sync::LazyLock;

static EXAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(sujet d examen|examen blanc|genere un examen|cree un examen|qcm|interrogation ecrite)\b")
        .expect("exam regex is valid")
});

static CORRECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(corrige|correction de l exercice|corriger l exercice|verifie ma solution|ma reponse est elle)\b")
        .expect("correction regex is valid")
});

static FORMULA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(formule de|formule du|formule pour|donne la formule|quelle est la formule)\b")
        .expect("formula regex is valid")
});

static PROOF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(demontre|demonstration de|demonstration du|prouve|preuve de|preuve du|redige la demonstration)\b")
        .expect("proof regex is valid")
});

static SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(resume|recapitule|fiche de revision|synthese du chapitre)\b")
        .expect("summary regex is valid")
});

/// Match a question against the known task patterns. First match wins, in
/// order of specificity.
pub fn match_task(question: &str) -> Option<TaskKind> {
    let folded = fold_key(question);

    if EXAM.is_match(&folded) {
        return Some(TaskKind::ExamGeneration);
    }
    if CORRECTION.is_match(&folded) {
        return Some(TaskKind::ExerciseCorrection);
    }
    if FORMULA.is_match(&folded) {
        return Some(TaskKind::FormulaLookup);
    }
    if PROOF.is_match(&folded) {
        return Some(TaskKind::ProofRequest);
    }
    if SUMMARY.is_match(&folded) {
        return Some(TaskKind::Summary);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_patterns() {
        assert_eq!(
            match_task("Génère un examen blanc sur le chapitre 28"),
            Some(TaskKind::ExamGeneration)
        );
        assert_eq!(
            match_task("Corrige l'exercice 3.2 s'il te plaît"),
            Some(TaskKind::ExerciseCorrection)
        );
        assert_eq!(
            match_task("Quelle est la formule de Taylor ?"),
            Some(TaskKind::FormulaLookup)
        );
        assert_eq!(
            match_task("Démontre le théorème de Rolle"),
            Some(TaskKind::ProofRequest)
        );
        assert_eq!(
            match_task("Résume le chapitre 12"),
            Some(TaskKind::Summary)
        );
    }

    #[test]
    fn test_plain_questions_match_nothing() {
        assert_eq!(match_task("Énoncé du théorème de Leibniz"), None);
        assert_eq!(match_task("Qu'est-ce qu'une série alternée ?"), None);
    }
}

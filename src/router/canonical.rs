//! Canonical routes for known-ambiguous questions
//!
//! Some textbook names are shared by several blocks (the same theorem name
//! appearing in two chapters). Those phrases are pre-registered and resolve
//! to a fixed (chapter, block_id) target, bypassing scoring entirely.

use crate::corpus::normalize::fold_key;
use crate::corpus::Filters;
use serde::{Deserialize, Serialize};

/// A fixed retrieval target for an ambiguous phrase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalTarget {
    /// Phrase matched against the folded question (substring match)
    pub phrase: String,
    /// Chapter the phrase resolves to
    pub chapter: String,
    /// Block the phrase resolves to
    pub block_id: String,
}

/// Static table of canonical phrase -> target mappings.
pub struct CanonicalRoutes {
    entries: Vec<CanonicalTarget>,
}

impl CanonicalRoutes {
    /// Built-in entries for phrases known to collide in the corpus.
    pub fn with_defaults() -> Self {
        Self::from_entries(vec![
            CanonicalTarget {
                phrase: "theoreme de comparaison des series".to_string(),
                chapter: "26".to_string(),
                block_id: "26.4".to_string(),
            },
            CanonicalTarget {
                phrase: "theoreme de comparaison des integrales".to_string(),
                chapter: "31".to_string(),
                block_id: "31.2".to_string(),
            },
        ])
    }

    /// Build a table from explicit entries (configuration extends or
    /// replaces the defaults). Phrases are folded on ingestion; longer
    /// phrases take precedence so the most specific entry wins.
    pub fn from_entries(mut entries: Vec<CanonicalTarget>) -> Self {
        for entry in &mut entries {
            entry.phrase = fold_key(&entry.phrase);
        }
        entries.retain(|e| !e.phrase.is_empty());
        entries.sort_by(|a, b| b.phrase.len().cmp(&a.phrase.len()));
        Self { entries }
    }

    /// Append entries to the default table.
    pub fn extend_defaults(extra: Vec<CanonicalTarget>) -> Self {
        let mut entries = Self::with_defaults().entries;
        entries.extend(extra);
        Self::from_entries(entries)
    }

    /// Look up the question against the table. The question is folded the
    /// same way as the stored phrases; the first (longest) containing match
    /// wins.
    pub fn resolve(&self, question: &str) -> Option<&CanonicalTarget> {
        let key = fold_key(question);
        if key.is_empty() {
            return None;
        }
        self.entries.iter().find(|e| key.contains(&e.phrase))
    }

    /// Filters for a resolved target.
    pub fn target_filters(target: &CanonicalTarget) -> Filters {
        Filters::new(Some(&target.chapter), None, Some(&target.block_id), None)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CanonicalRoutes {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_accent_and_case_insensitive() {
        let routes = CanonicalRoutes::with_defaults();

        let target = routes
            .resolve("Énoncé du THÉORÈME de comparaison des séries ?")
            .unwrap();
        assert_eq!(target.chapter, "26");
        assert_eq!(target.block_id, "26.4");
    }

    #[test]
    fn test_resolve_misses_unknown_phrases() {
        let routes = CanonicalRoutes::with_defaults();
        assert!(routes.resolve("theoreme de Leibniz").is_none());
    }

    #[test]
    fn test_longest_phrase_wins() {
        let routes = CanonicalRoutes::from_entries(vec![
            CanonicalTarget {
                phrase: "theoreme de comparaison".to_string(),
                chapter: "1".to_string(),
                block_id: "1.1".to_string(),
            },
            CanonicalTarget {
                phrase: "theoreme de comparaison des series".to_string(),
                chapter: "26".to_string(),
                block_id: "26.4".to_string(),
            },
        ]);

        let target = routes
            .resolve("le theoreme de comparaison des series")
            .unwrap();
        assert_eq!(target.chapter, "26");
    }

    #[test]
    fn test_target_filters() {
        let target = CanonicalTarget {
            phrase: "x".to_string(),
            chapter: "26".to_string(),
            block_id: "26.4".to_string(),
        };
        let filters = CanonicalRoutes::target_filters(&target);
        assert_eq!(filters.chapter.as_deref(), Some("26"));
        assert_eq!(filters.block_id.as_deref(), Some("26.4"));
    }
}

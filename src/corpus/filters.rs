//! Metadata filters applied to retrieval

use crate::corpus::normalize::normalize;
use crate::corpus::DocType;
use serde::{Deserialize, Serialize};

/// Immutable set of metadata constraints for a retrieval call.
///
/// Every field is optional; absence means "no constraint". Values are
/// normalized (lowercase, unaccented) on construction, so a user-typed
/// "Théorème" and an indexed "theoreme" compare equal. Malformed values
/// normalize to something harmless rather than erroring, keeping the
/// pipeline resilient to typos.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    /// Chapter label, e.g. "28"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,

    /// Structural block kind, e.g. "theoreme", "definition"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_kind: Option<String>,

    /// Human block label within a chapter, e.g. "28.7"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,

    /// Document type classification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<DocType>,
}

impl Filters {
    /// Build a filter set, normalizing every supplied value.
    pub fn new(
        chapter: Option<&str>,
        block_kind: Option<&str>,
        block_id: Option<&str>,
        doc_type: Option<DocType>,
    ) -> Self {
        Self {
            chapter: chapter.map(normalize).filter(|s| !s.is_empty()),
            block_kind: block_kind.map(normalize).filter(|s| !s.is_empty()),
            block_id: block_id.map(normalize).filter(|s| !s.is_empty()),
            doc_type,
        }
    }

    /// Filter on a chapter only.
    pub fn chapter(chapter: &str) -> Self {
        Self::new(Some(chapter), None, None, None)
    }

    /// True when no field constrains anything.
    pub fn is_empty(&self) -> bool {
        self.chapter.is_none()
            && self.block_kind.is_none()
            && self.block_id.is_none()
            && self.doc_type.is_none()
    }

    /// Merge two filter sets; fields present in `other` win.
    pub fn merge(&self, other: &Filters) -> Filters {
        Filters {
            chapter: other.chapter.clone().or_else(|| self.chapter.clone()),
            block_kind: other.block_kind.clone().or_else(|| self.block_kind.clone()),
            block_id: other.block_id.clone().or_else(|| self.block_id.clone()),
            doc_type: other.doc_type.or(self.doc_type),
        }
    }

    /// Copy with everything but the chapter dropped. Used by the degraded
    /// retry in the orchestrator.
    pub fn chapter_only(&self) -> Filters {
        Filters {
            chapter: self.chapter.clone(),
            ..Filters::default()
        }
    }

    /// True when the filter names an exact block or kind that the strict
    /// post-filter should surface first.
    pub fn has_strict_fields(&self) -> bool {
        self.block_id.is_some() || self.block_kind.is_some()
    }
}

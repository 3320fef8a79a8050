//! Corpus data model: indexed chunks and their metadata
//!
//! Chunks are produced at ingestion time (out of scope here) and consumed
//! read-only by retrieval. The catalog is a pre-built collection loaded from
//! a JSON-lines file, one chunk per line.

mod filters;
pub mod normalize;

pub use filters::Filters;

use crate::error::{Result, ScoliaError};
use ahash::AHashMap;
use normalize::normalize;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Document type classification for a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Theory,
    Exercise,
    Method,
    Example,
}

impl DocType {
    /// Parse a user- or catalog-supplied label, tolerating accents and case.
    pub fn parse(s: &str) -> Option<Self> {
        match normalize(s).as_str() {
            "theory" | "theorie" | "cours" => Some(Self::Theory),
            "exercise" | "exercice" => Some(Self::Exercise),
            "method" | "methode" => Some(Self::Method),
            "example" | "exemple" => Some(Self::Example),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Theory => "theory",
            Self::Exercise => "exercise",
            Self::Method => "method",
            Self::Example => "example",
        }
    }
}

/// An indexed unit of text with structural metadata.
///
/// Immutable once indexed. `block_kind` and `chapter` are stored in their
/// normalized form; `block_id` keeps its human label but is compared through
/// [`normalize::normalize`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable unique identifier
    pub id: u64,

    /// Passage text
    pub text: String,

    /// Source page, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Chapter label, e.g. "28"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,

    /// Structural kind, e.g. "theoreme", "definition", "exercice"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_kind: Option<String>,

    /// Human block label within a chapter, e.g. "28.7"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,

    /// Document type classification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<DocType>,
}

impl Chunk {
    /// Get a short preview of the text (first N characters)
    pub fn preview(&self, max_chars: usize) -> String {
        if self.text.chars().count() <= max_chars {
            self.text.clone()
        } else {
            let cut: String = self.text.chars().take(max_chars).collect();
            format!("{}...", cut)
        }
    }

    /// True when this chunk's metadata matches the given loose field/value.
    pub fn matches_field(&self, field: FilterField, value: &str) -> bool {
        let value = normalize(value);
        match field {
            FilterField::Chapter => self
                .chapter
                .as_deref()
                .map(|c| normalize(c) == value)
                .unwrap_or(false),
            FilterField::DocType => self
                .doc_type
                .map(|d| d.as_str() == value)
                .unwrap_or(false),
            FilterField::BlockKind => self
                .block_kind
                .as_deref()
                .map(|k| normalize(k) == value)
                .unwrap_or(false),
        }
    }
}

/// A single metadata field usable as a loose candidate-generation constraint.
///
/// `block_id` is deliberately absent: user-supplied identifiers are
/// error-prone and are only applied by the strict post-filter re-sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Chapter,
    DocType,
    BlockKind,
}

/// A single-field constraint passed down to the search backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub field: FilterField,
    pub value: String,
}

impl FieldFilter {
    pub fn new(field: FilterField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: normalize(&value.into()),
        }
    }

    /// Pick at most one loose constraint from a filter set, by priority:
    /// chapter, else doc_type, else block_kind. Applying them as a
    /// conjunction at candidate time collapses recall, so only the most
    /// selective one is used.
    pub fn loose_from(filters: &Filters) -> Option<FieldFilter> {
        if let Some(chapter) = &filters.chapter {
            return Some(FieldFilter::new(FilterField::Chapter, chapter.as_str()));
        }
        if let Some(doc_type) = filters.doc_type {
            return Some(FieldFilter::new(FilterField::DocType, doc_type.as_str()));
        }
        filters
            .block_kind
            .as_deref()
            .map(|kind| FieldFilter::new(FilterField::BlockKind, kind))
    }
}

/// Read-only, in-memory chunk catalog.
///
/// The catalog is the hydration source for retrieval results; indexes store
/// chunk ids only.
pub struct ChunkStore {
    by_id: AHashMap<u64, Chunk>,
}

impl ChunkStore {
    /// Build a catalog from an already-loaded chunk list. Later duplicates
    /// of an id replace earlier ones.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        let mut by_id = AHashMap::with_capacity(chunks.len());
        for mut chunk in chunks {
            chunk.chapter = chunk.chapter.as_deref().map(normalize);
            chunk.block_kind = chunk.block_kind.as_deref().map(normalize);
            by_id.insert(chunk.id, chunk);
        }
        Self { by_id }
    }

    /// Load a catalog from a JSON-lines file, one chunk per line. Blank
    /// lines are skipped; a malformed line is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ScoliaError::Io {
            source: e,
            context: format!("Failed to read chunk catalog: {}", path.display()),
        })?;

        let mut chunks = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let chunk: Chunk = serde_json::from_str(line).map_err(|e| ScoliaError::Json {
                source: e,
                context: format!(
                    "Malformed chunk at {}:{}",
                    path.display(),
                    line_no + 1
                ),
            })?;
            chunks.push(chunk);
        }

        tracing::info!("Loaded {} chunks from {}", chunks.len(), path.display());
        Ok(Self::from_chunks(chunks))
    }

    pub fn get(&self, id: u64) -> Option<&Chunk> {
        self.by_id.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.by_id.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: u64, chapter: &str, kind: &str, block: &str) -> Chunk {
        Chunk {
            id,
            text: format!("chunk {}", id),
            page: None,
            chapter: Some(chapter.to_string()),
            block_kind: Some(kind.to_string()),
            block_id: Some(block.to_string()),
            doc_type: Some(DocType::Theory),
        }
    }

    #[test]
    fn test_doc_type_parse_tolerates_accents() {
        assert_eq!(DocType::parse("Théorie"), Some(DocType::Theory));
        assert_eq!(DocType::parse("EXERCICE"), Some(DocType::Exercise));
        assert_eq!(DocType::parse("exemple"), Some(DocType::Example));
        assert_eq!(DocType::parse("unknown"), None);
    }

    #[test]
    fn test_loose_filter_priority() {
        let f = Filters::new(Some("3"), Some("theoreme"), Some("3.2"), Some(DocType::Theory));
        let loose = FieldFilter::loose_from(&f).unwrap();
        assert_eq!(loose.field, FilterField::Chapter);

        let f = Filters::new(None, Some("theoreme"), None, Some(DocType::Theory));
        let loose = FieldFilter::loose_from(&f).unwrap();
        assert_eq!(loose.field, FilterField::DocType);

        let f = Filters::new(None, Some("theoreme"), None, None);
        let loose = FieldFilter::loose_from(&f).unwrap();
        assert_eq!(loose.field, FilterField::BlockKind);

        let f = Filters::new(None, None, Some("3.2"), None);
        assert!(FieldFilter::loose_from(&f).is_none());
    }

    #[test]
    fn test_store_normalizes_metadata() {
        let store = ChunkStore::from_chunks(vec![chunk(1, "28", "Théorème", "28.7")]);
        let c = store.get(1).unwrap();
        assert_eq!(c.block_kind.as_deref(), Some("theoreme"));
        assert!(c.matches_field(FilterField::BlockKind, "théorème"));
    }

    #[test]
    fn test_chunk_preview() {
        let c = chunk(1, "1", "theoreme", "1.1");
        assert_eq!(c.preview(100), "chunk 1");
        assert_eq!(c.preview(5), "chunk...");
    }
}

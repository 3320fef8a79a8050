//! Shared fixtures: a small French textbook corpus and in-memory search
//! backends with deterministic scoring.
#![allow(dead_code)]

use scolia::corpus::normalize::fold_key;
use scolia::corpus::{Chunk, ChunkStore, DocType, FieldFilter};
use scolia::index::{LexicalSearch, SearchBackendError, SemanticSearch};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn chunk(
    id: u64,
    text: &str,
    chapter: &str,
    block_kind: &str,
    block_id: &str,
    doc_type: DocType,
) -> Chunk {
    Chunk {
        id,
        text: text.to_string(),
        page: Some(100 + id as u32),
        chapter: Some(chapter.to_string()),
        block_kind: Some(block_kind.to_string()),
        block_id: Some(block_id.to_string()),
        doc_type: Some(doc_type),
    }
}

/// Fixture corpus: a handful of blocks across four chapters.
pub fn fixture_chunks() -> Vec<Chunk> {
    vec![
        chunk(
            1,
            "Théorème de Leibniz : une série alternée dont le terme général décroît vers zéro converge.",
            "28",
            "theoreme",
            "28.7",
            DocType::Theory,
        ),
        chunk(
            2,
            "Exemple : la série harmonique alternée converge d'après le théorème de Leibniz.",
            "28",
            "exemple",
            "28.8",
            DocType::Example,
        ),
        chunk(
            3,
            "Théorème de comparaison des séries : si les termes positifs sont majorés terme à terme, la convergence se transmet.",
            "26",
            "theoreme",
            "26.4",
            DocType::Theory,
        ),
        chunk(
            4,
            "Définition : une suite converge lorsque ses termes s'approchent d'une limite finie.",
            "3",
            "definition",
            "3.1",
            DocType::Theory,
        ),
        chunk(
            5,
            "Théorème : toute suite convergente est bornée.",
            "3",
            "theoreme",
            "3.2",
            DocType::Theory,
        ),
        chunk(
            6,
            "Exercice : montrer que la suite de terme général un sur n converge vers zéro.",
            "3",
            "exercice",
            "3.5",
            DocType::Exercise,
        ),
        chunk(
            7,
            "Définition de la convergence uniforme d'une suite de fonctions sur un intervalle.",
            "12",
            "definition",
            "12.1",
            DocType::Theory,
        ),
        chunk(
            8,
            "Théorème de comparaison des intégrales : l'intégrabilité se compare comme les séries.",
            "31",
            "theoreme",
            "31.2",
            DocType::Theory,
        ),
    ]
}

pub fn fixture_store() -> Arc<ChunkStore> {
    Arc::new(ChunkStore::from_chunks(fixture_chunks()))
}

fn tokens(text: &str) -> HashSet<String> {
    fold_key(text)
        .split_whitespace()
        .map(String::from)
        .collect()
}

fn overlap(query: &HashSet<String>, text: &str) -> usize {
    let doc = tokens(text);
    query.intersection(&doc).count()
}

fn matches(chunk: &Chunk, filter: Option<&FieldFilter>) -> bool {
    match filter {
        Some(f) => chunk.matches_field(f.field, &f.value),
        None => true,
    }
}

/// Token-overlap lexical backend. Scores are raw shared-token counts, so
/// they behave like an unbounded BM25-ish signal.
pub struct InMemoryLexical {
    store: Arc<ChunkStore>,
    pub calls: AtomicUsize,
    fail: bool,
}

impl InMemoryLexical {
    pub fn new(store: Arc<ChunkStore>) -> Self {
        Self {
            store,
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            store: Arc::new(ChunkStore::from_chunks(Vec::new())),
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LexicalSearch for InMemoryLexical {
    fn search(
        &self,
        query: &str,
        filter: Option<&FieldFilter>,
        limit: usize,
    ) -> Result<Vec<(u64, f32)>, SearchBackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SearchBackendError::Unavailable("lexical down".to_string()));
        }

        let query_tokens = tokens(query);
        let mut hits: Vec<(u64, f32)> = self
            .store
            .iter()
            .filter(|c| matches(c, filter))
            .filter_map(|c| {
                let score = overlap(&query_tokens, &c.text);
                (score > 0).then_some((c.id, score as f32))
            })
            .collect();

        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

/// Jaccard-similarity semantic backend: bounded scores, slightly different
/// ranking than the lexical one.
pub struct InMemorySemantic {
    store: Arc<ChunkStore>,
    fail: bool,
}

impl InMemorySemantic {
    pub fn new(store: Arc<ChunkStore>) -> Self {
        Self { store, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            store: Arc::new(ChunkStore::from_chunks(Vec::new())),
            fail: true,
        }
    }
}

impl SemanticSearch for InMemorySemantic {
    fn search(
        &self,
        query: &str,
        filter: Option<&FieldFilter>,
        limit: usize,
    ) -> Result<Vec<(u64, f32)>, SearchBackendError> {
        if self.fail {
            return Err(SearchBackendError::Unavailable("semantic down".to_string()));
        }

        let query_tokens = tokens(query);
        let mut hits: Vec<(u64, f32)> = self
            .store
            .iter()
            .filter(|c| matches(c, filter))
            .filter_map(|c| {
                let doc = tokens(&c.text);
                let shared = query_tokens.intersection(&doc).count();
                if shared == 0 {
                    return None;
                }
                let union = query_tokens.union(&doc).count().max(1);
                Some((c.id, shared as f32 / union as f32))
            })
            .collect();

        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

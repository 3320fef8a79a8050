/// Tantivy keyword index for full-text search over chunk passages
use crate::corpus::{Chunk, FieldFilter, FilterField};
use crate::index::{LexicalSearch, SearchBackendError};
use std::path::PathBuf;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::*;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyError, Term};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeywordIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    TantivyError(#[from] TantivyError),

    #[error("Query parsing error: {0}")]
    QueryParseError(String),
}

/// Tantivy keyword index wrapper
///
/// Provides BM25 full-text search over chunk text, with the chapter,
/// doc_type and block_kind metadata indexed as raw terms so a single loose
/// constraint can be pushed down into the query.
pub struct TantivyLexicalIndex {
    index: Index,
    reader: IndexReader,
    writer: IndexWriter,
    id_field: Field,
    text_field: Field,
    chapter_field: Field,
    doc_type_field: Field,
    block_kind_field: Field,
    #[allow(dead_code)]
    index_path: PathBuf,
}

impl TantivyLexicalIndex {
    /// Open an existing index at `index_path`, or create a fresh one.
    pub fn new(index_path: PathBuf) -> Result<Self, KeywordIndexError> {
        if index_path.exists() && index_path.join("meta.json").exists() {
            Self::load(index_path)
        } else {
            Self::create(index_path)
        }
    }

    fn schema() -> Schema {
        let mut schema_builder = Schema::builder();
        schema_builder.add_u64_field("id", INDEXED | STORED);
        schema_builder.add_text_field("text", TEXT);
        schema_builder.add_text_field("chapter", STRING);
        schema_builder.add_text_field("doc_type", STRING);
        schema_builder.add_text_field("block_kind", STRING);
        schema_builder.build()
    }

    fn create(index_path: PathBuf) -> Result<Self, KeywordIndexError> {
        std::fs::create_dir_all(&index_path)?;

        let schema = Self::schema();
        let index = Index::create_in_dir(&index_path, schema)
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        Self::open(index, index_path)
    }

    fn load(index_path: PathBuf) -> Result<Self, KeywordIndexError> {
        if !index_path.exists() {
            return Err(KeywordIndexError::IndexNotFound(
                index_path.display().to_string(),
            ));
        }

        let index = Index::open_in_dir(&index_path)
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        Self::open(index, index_path)
    }

    fn open(index: Index, index_path: PathBuf) -> Result<Self, KeywordIndexError> {
        let schema = index.schema();

        let field = |name: &str| {
            schema.get_field(name).map_err(|_| {
                KeywordIndexError::InitializationError(format!(
                    "Missing '{}' field in schema",
                    name
                ))
            })
        };

        let id_field = field("id")?;
        let text_field = field("text")?;
        let chapter_field = field("chapter")?;
        let doc_type_field = field("doc_type")?;
        let block_kind_field = field("block_kind")?;

        let writer = index
            .writer(50_000_000)
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e: TantivyError| KeywordIndexError::InitializationError(e.to_string()))?;

        Ok(Self {
            index,
            reader,
            writer,
            id_field,
            text_field,
            chapter_field,
            doc_type_field,
            block_kind_field,
            index_path,
        })
    }

    /// Index one chunk. Metadata fields absent on the chunk are simply not
    /// indexed for it.
    pub fn insert(&mut self, chunk: &Chunk) -> Result<(), KeywordIndexError> {
        let mut document = doc!(
            self.id_field => chunk.id,
            self.text_field => chunk.text.as_str(),
        );

        if let Some(chapter) = &chunk.chapter {
            document.add_text(self.chapter_field, chapter);
        }
        if let Some(doc_type) = chunk.doc_type {
            document.add_text(self.doc_type_field, doc_type.as_str());
        }
        if let Some(kind) = &chunk.block_kind {
            document.add_text(self.block_kind_field, kind);
        }

        self.writer
            .add_document(document)
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;

        Ok(())
    }

    /// Index multiple chunks in batch
    pub fn insert_batch<'a>(
        &mut self,
        chunks: impl IntoIterator<Item = &'a Chunk>,
    ) -> Result<(), KeywordIndexError> {
        for chunk in chunks {
            self.insert(chunk)?;
        }
        Ok(())
    }

    /// Commit all pending changes and wait for the reader to reload
    pub fn commit(&mut self) -> Result<(), KeywordIndexError> {
        self.writer
            .commit()
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;

        self.reader
            .reload()
            .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

        Ok(())
    }

    /// Search the index, optionally constrained to one metadata term.
    pub fn query(
        &self,
        query: &str,
        filter: Option<&FieldFilter>,
        limit: usize,
    ) -> Result<Vec<(u64, f32)>, KeywordIndexError> {
        let searcher = self.reader.searcher();

        let query_parser = QueryParser::for_index(&self.index, vec![self.text_field]);
        let text_query = query_parser
            .parse_query_lenient(query)
            .0;

        let final_query: Box<dyn Query> = match filter {
            Some(f) => {
                let term = Term::from_field_text(self.filter_field(f.field), &f.value);
                let term_query = TermQuery::new(term, IndexRecordOption::Basic);
                Box::new(BooleanQuery::new(vec![
                    (Occur::Must, text_query),
                    (Occur::Must, Box::new(term_query)),
                ]))
            }
            None => text_query,
        };

        let top_docs = searcher
            .search(&final_query, &TopDocs::with_limit(limit))
            .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved: tantivy::TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

            let id = retrieved
                .get_first(self.id_field)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| {
                    KeywordIndexError::SearchError("Missing or invalid ID field".to_string())
                })?;

            results.push((id, score));
        }

        Ok(results)
    }

    fn filter_field(&self, field: FilterField) -> Field {
        match field {
            FilterField::Chapter => self.chapter_field,
            FilterField::DocType => self.doc_type_field,
            FilterField::BlockKind => self.block_kind_field,
        }
    }

    /// Clear the entire index
    pub fn clear(&mut self) -> Result<(), KeywordIndexError> {
        self.writer
            .delete_all_documents()
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;
        self.commit()
    }

    /// Get the number of documents in the index
    pub fn len(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LexicalSearch for TantivyLexicalIndex {
    fn search(
        &self,
        query: &str,
        filter: Option<&FieldFilter>,
        limit: usize,
    ) -> Result<Vec<(u64, f32)>, SearchBackendError> {
        self.query(query, filter, limit)
            .map_err(|e| SearchBackendError::Query(e.to_string()))
    }
}

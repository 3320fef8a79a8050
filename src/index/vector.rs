/// HNSW vector index for similarity search over chunk embeddings
use crate::corpus::{ChunkStore, FieldFilter};
use crate::index::{EmbeddingProvider, SearchBackendError, SemanticSearch};
use hnsw_rs::prelude::*;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("Embedding failed: {0}")]
    EmbeddingError(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}

/// HNSW vector index wrapper
///
/// Approximate nearest neighbor search with cosine similarity over
/// embeddings produced by the configured provider. Metadata filtering is an
/// over-fetch plus in-memory post-check against the chunk catalog, since the
/// graph itself knows nothing about metadata.
pub struct HnswSemanticIndex {
    index: Arc<RwLock<Hnsw<'static, f32, DistCosine>>>,
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<ChunkStore>,
    dimension: usize,
    ef_search: usize,
    count: Arc<RwLock<u64>>,
}

impl HnswSemanticIndex {
    /// Create a new, empty index.
    ///
    /// # Arguments
    /// * `provider` - Embedding provider; its dimension fixes the index's
    /// * `store` - Chunk catalog used for the metadata post-check
    /// * `ef_construction` - HNSW construction parameter
    /// * `m` - HNSW M parameter (connections per layer)
    /// * `ef_search` - HNSW search parameter
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<ChunkStore>,
        ef_construction: usize,
        m: usize,
        ef_search: usize,
    ) -> Self {
        let dimension = provider.dimension();
        let index = Hnsw::<f32, DistCosine>::new(m, dimension, ef_construction, 200, DistCosine);

        Self {
            index: Arc::new(RwLock::new(index)),
            provider,
            store,
            dimension,
            ef_search,
            count: Arc::new(RwLock::new(0)),
        }
    }

    /// Embed and insert one text under the given chunk id.
    pub fn insert(&self, id: u64, text: &str) -> Result<(), VectorIndexError> {
        let vector = self
            .provider
            .embed(text)
            .map_err(|e| VectorIndexError::EmbeddingError(e.to_string()))?;
        self.insert_vector(id, &vector)
    }

    /// Insert a pre-computed embedding.
    pub fn insert_vector(&self, id: u64, vector: &[f32]) -> Result<(), VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let data = vector.to_vec();
        let index = self
            .index
            .write()
            .map_err(|_| VectorIndexError::InsertError("Index lock poisoned".to_string()))?;
        index.insert((&data, id as usize));

        let mut count = self
            .count
            .write()
            .map_err(|_| VectorIndexError::InsertError("Count lock poisoned".to_string()))?;
        *count += 1;

        Ok(())
    }

    /// Embed and insert texts in batch.
    pub fn insert_batch(&self, items: &[(u64, String)]) -> Result<(), VectorIndexError> {
        if items.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = items.iter().map(|(_, t)| t.clone()).collect();
        let vectors = self
            .provider
            .embed_batch(&texts)
            .map_err(|e| VectorIndexError::EmbeddingError(e.to_string()))?;

        for ((id, _), vector) in items.iter().zip(vectors.iter()) {
            self.insert_vector(*id, vector)?;
        }
        Ok(())
    }

    /// Search for the nearest neighbors of `query`, post-checking the loose
    /// metadata filter against the catalog. Over-fetches when a filter is
    /// present so the post-check does not starve the result set.
    pub fn query(
        &self,
        query: &str,
        filter: Option<&FieldFilter>,
        limit: usize,
    ) -> Result<Vec<(u64, f32)>, VectorIndexError> {
        let embedding = self
            .provider
            .embed(query)
            .map_err(|e| VectorIndexError::EmbeddingError(e.to_string()))?;

        let fetch = if filter.is_some() { limit * 4 } else { limit };

        let index = self
            .index
            .read()
            .map_err(|_| VectorIndexError::SearchError("Index lock poisoned".to_string()))?;
        let neighbors = index.search(&embedding, fetch, self.ef_search);
        drop(index);

        let mut results = Vec::with_capacity(limit);
        for neighbor in neighbors {
            let id = neighbor.d_id as u64;

            if let Some(f) = filter {
                match self.store.get(id) {
                    Some(chunk) if chunk.matches_field(f.field, &f.value) => {}
                    _ => continue,
                }
            }

            // Distance to similarity
            results.push((id, 1.0 - neighbor.distance));
            if results.len() == limit {
                break;
            }
        }

        Ok(results)
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> u64 {
        self.count.read().map(|c| *c).unwrap_or(0)
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

impl SemanticSearch for HnswSemanticIndex {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Chunk, DocType, FilterField};
    use crate::index::EmbeddingError;

    /// Deterministic toy provider: embeds by character-class histogram.
    struct ToyProvider;

    impl EmbeddingProvider for ToyProvider {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let mut v = vec![0.0f32; 8];
            for (i, b) in text.bytes().enumerate() {
                v[(b as usize + i) % 8] += 1.0;
            }
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
            Ok(v.into_iter().map(|x| x / norm).collect())
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimension(&self) -> usize {
            8
        }

        fn model_name(&self) -> &str {
            "toy"
        }
    }

    fn store() -> Arc<ChunkStore> {
        let chunks = vec![
            Chunk {
                id: 1,
                text: "series alternees".into(),
                page: None,
                chapter: Some("28".into()),
                block_kind: Some("theoreme".into()),
                block_id: Some("28.7".into()),
                doc_type: Some(DocType::Theory),
            },
            Chunk {
                id: 2,
                text: "convergence uniforme".into(),
                page: None,
                chapter: Some("12".into()),
                block_kind: Some("definition".into()),
                block_id: Some("12.1".into()),
                doc_type: Some(DocType::Theory),
            },
        ];
        Arc::new(ChunkStore::from_chunks(chunks))
    }

    #[test]
    fn test_insert_and_search() {
        let index = HnswSemanticIndex::new(Arc::new(ToyProvider), store(), 200, 16, 50);
        index.insert(1, "series alternees").unwrap();
        index.insert(2, "convergence uniforme").unwrap();

        let results = index.query("series alternees", None, 2).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].0, 1);
    }

    #[test]
    fn test_filter_post_check() {
        let index = HnswSemanticIndex::new(Arc::new(ToyProvider), store(), 200, 16, 50);
        index.insert(1, "series alternees").unwrap();
        index.insert(2, "convergence uniforme").unwrap();

        let filter = FieldFilter::new(FilterField::Chapter, "12");
        let results = index.query("series", Some(&filter), 5).unwrap();
        assert!(results.iter().all(|(id, _)| *id == 2));
    }

    #[test]
    fn test_dimension_validation() {
        let index = HnswSemanticIndex::new(Arc::new(ToyProvider), store(), 200, 16, 50);
        assert!(index.insert_vector(1, &[0.5; 3]).is_err());
    }
}

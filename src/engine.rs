//! Engine assembly
//!
//! Builds the full pipeline out of a validated configuration: catalog,
//! indexes, reranker, rewriter, router and orchestrator. The semantic index
//! is rebuilt in memory from the catalog at startup; the lexical index
//! lives on disk under `corpus.index_dir`.

use crate::config::Config;
use crate::corpus::ChunkStore;
use crate::error::{Result, ScoliaError};
use crate::generate::{ExtractiveGenerator, TaskRegistry, TextGenerator};
use crate::index::{
    EmbeddingProvider, FastEmbedProvider, HnswSemanticIndex, TantivyLexicalIndex,
};
use crate::pipeline::Orchestrator;
use crate::retrieval::{CrossEncoder, HybridRetriever, NoopReranker, Rerank};
use crate::rewrite::QueryRewriter;
use crate::router::{CanonicalRoutes, Router};
use crate::session::SessionStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Build the orchestrator from configuration, wiring the default offline
/// generator. Callers with a real language-model collaborator pass it in
/// through [`build_with_generator`].
pub fn build(config: &Config) -> Result<Orchestrator> {
    build_with_generator(config, Arc::new(ExtractiveGenerator))
}

/// Build the orchestrator around a caller-supplied generation capability.
pub fn build_with_generator(
    config: &Config,
    generator: Arc<dyn TextGenerator>,
) -> Result<Orchestrator> {
    let store = Arc::new(ChunkStore::load(&config.corpus.catalog_file)?);
    if store.is_empty() {
        return Err(ScoliaError::Corpus(format!(
            "Catalog {} contains no chunks",
            config.corpus.catalog_file.display()
        )));
    }

    let lexical: Arc<dyn crate::index::LexicalSearch> =
        Arc::new(open_lexical_index(&config.corpus.index_dir, &store)?);

    let provider: Arc<dyn EmbeddingProvider> = Arc::new(
        FastEmbedProvider::new(&config.embedding.model)
            .map_err(|e| ScoliaError::Config(e.to_string()))?,
    );
    let semantic = Arc::new(build_semantic_index(config, provider, &store)?);

    let reranker: Arc<dyn Rerank> = if config.retrieval.enable_reranking {
        match CrossEncoder::new(&config.retrieval.reranker_model) {
            Ok(encoder) => Arc::new(encoder),
            Err(e) => {
                tracing::warn!("Reranker unavailable, continuing without it: {}", e);
                Arc::new(NoopReranker)
            }
        }
    } else {
        Arc::new(NoopReranker)
    };

    let retriever = HybridRetriever::new(
        Arc::clone(&lexical),
        semantic,
        Arc::clone(&store),
        reranker,
        config.retrieval.clone(),
    );

    let canonical = CanonicalRoutes::extend_defaults(config.router.canonical.clone());
    let router = Router::new(Arc::clone(&lexical), canonical, config.router.clone());

    let rewriter = QueryRewriter::new(
        Arc::clone(&generator),
        Duration::from_millis(config.rewriter.timeout_ms),
        config.rewriter.context_turns,
    );

    let sessions = Arc::new(SessionStore::new(
        config.session.history_cap,
        config.session.auto_link,
    ));

    Ok(Orchestrator::new(
        rewriter,
        router,
        retriever,
        generator,
        TaskRegistry::with_defaults(),
        sessions,
        config.pipeline.clone(),
    ))
}

/// Open the on-disk lexical index, building it from the catalog when it
/// does not exist yet.
fn open_lexical_index(index_dir: &Path, store: &ChunkStore) -> Result<TantivyLexicalIndex> {
    let fresh = !index_dir.join("meta.json").exists();

    let mut index = TantivyLexicalIndex::new(index_dir.to_path_buf())
        .map_err(|e| ScoliaError::IndexUnavailable(e.to_string()))?;

    if fresh || index.is_empty() {
        tracing::info!("Building lexical index for {} chunks", store.len());
        index
            .insert_batch(store.iter())
            .and_then(|_| index.commit())
            .map_err(|e| ScoliaError::IndexUnavailable(e.to_string()))?;
    }

    Ok(index)
}

/// Embed the whole catalog into a fresh in-memory HNSW graph.
fn build_semantic_index(
    config: &Config,
    provider: Arc<dyn EmbeddingProvider>,
    store: &Arc<ChunkStore>,
) -> Result<HnswSemanticIndex> {
    let index = HnswSemanticIndex::new(
        provider,
        Arc::clone(store),
        config.indexing.hnsw_ef_construction,
        config.indexing.hnsw_m,
        config.indexing.hnsw_ef_search,
    );

    let items: Vec<(u64, String)> = store.iter().map(|c| (c.id, c.text.clone())).collect();
    tracing::info!("Embedding {} chunks for the semantic index", items.len());

    for batch in items.chunks(config.embedding.batch_size.max(1)) {
        index
            .insert_batch(batch)
            .map_err(|e| ScoliaError::IndexUnavailable(e.to_string()))?;
    }

    Ok(index)
}

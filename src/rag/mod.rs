//! RAG (Retrieval-Augmented Generation) module.
//!
//! This module provides:
//! - `RagEngine`: loads the local corpus and splits it into overlapping chunks
//! - `VectorIndex`: the persisted embedding index over those chunks
//! - `Retriever`: the read-only lookup used by the market analysis stages

mod engine;
mod index;
mod vector_math;

use std::sync::Arc;

use async_trait::async_trait;

pub use engine::{RagEngine, TextChunk};
pub use index::{corpus_fingerprint, VectorIndex};

use crate::core::config::{AppPaths, LlmSettings, RagSettings};
use crate::core::errors::CapabilityError;
use crate::llm::LlmService;

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` snippets relevant to `query`, best first.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, CapabilityError>;
}

/// Embeds the query and ranks it against a `VectorIndex`.
pub struct IndexRetriever {
    index: VectorIndex,
    llm: LlmService,
}

impl IndexRetriever {
    pub fn new(index: VectorIndex, llm: LlmService) -> Self {
        Self { index, llm }
    }
}

#[async_trait]
impl Retriever for IndexRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, CapabilityError> {
        if self.index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let embeddings = self.llm.embed(&[query.to_string()]).await?;
        let query_embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| CapabilityError::Retrieval("query embedding missing".to_string()))?;

        Ok(self
            .index
            .search(&query_embedding, k)?
            .into_iter()
            .map(|chunk| chunk.text.clone())
            .collect())
    }
}

/// Stand-in when retrieval is disabled in config.
pub struct NoRetriever;

#[async_trait]
impl Retriever for NoRetriever {
    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<String>, CapabilityError> {
        Ok(Vec::new())
    }
}

/// Opens (or builds) the configured index; failures degrade to an empty retriever.
pub async fn open_retriever(
    settings: &RagSettings,
    llm_settings: &LlmSettings,
    paths: &AppPaths,
    llm: &LlmService,
) -> Arc<dyn Retriever> {
    if !settings.enabled {
        return Arc::new(NoRetriever);
    }

    let corpus_dir = paths.resolve(&settings.corpus_dir);
    let index_path = paths.resolve(&settings.index_path);
    let engine = RagEngine::from_settings(settings);

    match VectorIndex::load_or_build(
        &corpus_dir,
        &index_path,
        &engine,
        llm,
        &llm_settings.embedding_model,
    )
    .await
    {
        Ok(index) => Arc::new(IndexRetriever::new(index, llm.clone())),
        Err(err) => {
            tracing::warn!("Vector index unavailable, continuing without retrieval: {}", err);
            Arc::new(NoRetriever)
        }
    }
}

//! Persisted embedding index over the local market-data corpus.
//!
//! The index file carries a sha256 fingerprint of the corpus and the name of
//! the embedding model. Either changing invalidates it and triggers a rebuild.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::engine::{load_corpus, RagEngine, TextChunk};
use super::vector_math::rank_descending_by_cosine;
use crate::core::errors::CapabilityError;
use crate::llm::LlmService;

const EMBED_BATCH: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexedChunk {
    chunk: TextChunk,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    fingerprint: String,
    embedding_model: String,
    entries: Vec<IndexedChunk>,
}

impl VectorIndex {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loads the index at `index_path` if it still matches the corpus, otherwise rebuilds and saves it.
    pub async fn load_or_build(
        corpus_dir: &Path,
        index_path: &Path,
        engine: &RagEngine,
        llm: &LlmService,
        embedding_model: &str,
    ) -> Result<Self, CapabilityError> {
        let existing = Self::load(index_path);

        if !corpus_dir.is_dir() {
            return Ok(match existing {
                Some(index) => {
                    tracing::info!(
                        "Corpus dir {} missing, using persisted index ({} chunks)",
                        corpus_dir.display(),
                        index.len()
                    );
                    index
                }
                None => {
                    tracing::warn!(
                        "No corpus at {} and no persisted index, retrieval will return nothing",
                        corpus_dir.display()
                    );
                    Self::default()
                }
            });
        }

        let documents = load_corpus(corpus_dir).map_err(retrieval_error)?;
        let fingerprint = corpus_fingerprint(&documents);

        if let Some(index) = existing {
            if index.fingerprint == fingerprint && index.embedding_model == embedding_model {
                tracing::info!("Loaded vector index with {} chunks", index.len());
                return Ok(index);
            }
            tracing::info!("Corpus or embedding model changed, rebuilding vector index");
        }

        let index = Self::build(&documents, fingerprint, engine, llm, embedding_model).await?;
        index.save(index_path)?;
        tracing::info!(
            "Built vector index with {} chunks from {} documents",
            index.len(),
            documents.len()
        );
        Ok(index)
    }

    async fn build(
        documents: &[(String, String)],
        fingerprint: String,
        engine: &RagEngine,
        llm: &LlmService,
        embedding_model: &str,
    ) -> Result<Self, CapabilityError> {
        let chunks = engine.collect_from_documents(documents);
        let mut entries = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = llm.embed(&texts).await?;
            entries.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(embeddings)
                    .map(|(chunk, embedding)| IndexedChunk { chunk, embedding }),
            );
        }

        Ok(Self {
            fingerprint,
            embedding_model: embedding_model.to_string(),
            entries,
        })
    }

    fn load(path: &Path) -> Option<Self> {
        let contents = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(index) => Some(index),
            Err(err) => {
                tracing::warn!("Ignoring unreadable vector index {}: {}", path.display(), err);
                None
            }
        }
    }

    fn save(&self, path: &Path) -> Result<(), CapabilityError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(retrieval_error)?;
        }
        let contents = serde_json::to_string(self).map_err(retrieval_error)?;
        fs::write(path, contents).map_err(retrieval_error)
    }

    /// Top `k` chunks by cosine similarity to `query_embedding`.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<&TextChunk>, CapabilityError> {
        let candidates: Vec<Vec<f32>> = self.entries.iter().map(|e| e.embedding.clone()).collect();
        let ranked = rank_descending_by_cosine(query_embedding, &candidates)?;
        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(idx, _)| &self.entries[idx].chunk)
            .collect())
    }
}

pub fn corpus_fingerprint(documents: &[(String, String)]) -> String {
    let mut hasher = Sha256::new();
    for (source, text) in documents {
        hasher.update(source.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

fn retrieval_error<E: std::fmt::Display>(err: E) -> CapabilityError {
    CapabilityError::Retrieval(err.to_string())
}

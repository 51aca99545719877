//! Diversity-aware retrieval of transcript chunks.
//!
//! The retriever embeds the question, fetches `fetch_k` nearest chunks and keeps
//! `k` of them by Maximal Marginal Relevance so the context handed to the model
//! is not three copies of the same sentence.

mod mmr;

pub use mmr::mmr_select;

use crate::config::RetrievalSettings;
use crate::embedding::Embedder;
use crate::error::{ClipseekError, Result};
use crate::vector_store::VectorIndex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Metadata stored alongside every chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub video_id: String,
    pub start: f64,
    pub duration: f64,
}

/// A chunk selected as context for a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Ranked context for a question.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    /// At most `k` chunks, relevance and diversity ranked.
    pub chunks: Vec<RetrievedChunk>,
    /// Video id to build links for: the first chunk's video, else the requested one.
    pub video_id: String,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// MMR retriever over a vector index.
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    k: usize,
    fetch_k: usize,
    lambda_mult: f32,
    scope_to_video: bool,
}

impl Retriever {
    /// Create a retriever with the default `k = 3`, `fetch_k = 5`, `lambda_mult = 0.5`.
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self::with_settings(index, embedder, &RetrievalSettings::default())
    }

    pub fn with_settings(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        settings: &RetrievalSettings,
    ) -> Self {
        Self {
            index,
            embedder,
            k: settings.k,
            fetch_k: settings.fetch_k.max(settings.k),
            lambda_mult: settings.lambda_mult,
            scope_to_video: settings.scope_to_video,
        }
    }

    /// Retrieve context for `query` about `video_id`.
    ///
    /// No match is not an error: the result is simply empty.
    #[instrument(skip(self, query))]
    pub async fn search(&self, video_id: &str, query: &str) -> Result<RetrievalResult> {
        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| ClipseekError::Retrieval(format!("Query embedding failed: {}", e)))?;

        let filter = self.scope_to_video.then_some(video_id);
        let candidates = self
            .index
            .search(&query_embedding, self.fetch_k, filter)
            .await
            .map_err(|e| ClipseekError::Retrieval(format!("Index query failed: {}", e)))?;

        debug!("Fetched {} candidates", candidates.len());

        let embeddings: Vec<Vec<f32>> = candidates
            .iter()
            .map(|c| c.record.embedding.clone())
            .collect();
        let picked = mmr_select(&query_embedding, &embeddings, self.k, self.lambda_mult);

        let chunks: Vec<RetrievedChunk> = picked
            .into_iter()
            .map(|i| {
                let record = &candidates[i].record;
                RetrievedChunk {
                    text: record.text.clone(),
                    metadata: ChunkMetadata {
                        video_id: record.video_id.clone(),
                        start: record.start,
                        duration: record.duration,
                    },
                }
            })
            .collect();

        let resolved = chunks
            .first()
            .map(|c| c.metadata.video_id.clone())
            .unwrap_or_else(|| video_id.to_string());

        if resolved != video_id {
            info!("Retrieved context belongs to {} rather than {}", resolved, video_id);
        }

        Ok(RetrievalResult {
            chunks,
            video_id: resolved,
        })
    }
}

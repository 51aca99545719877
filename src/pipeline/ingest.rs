//! Transcript ingestion: fetch, chunk, embed, index.

use super::locks::KeyedLocks;
use crate::chunking::TranscriptChunker;
use crate::embedding::Embedder;
use crate::error::{ClipseekError, Result};
use crate::transcript::{TranscriptFailure, TranscriptFailureReason, TranscriptSource};
use crate::vector_store::{VectorIndex, VectorRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument};

/// Result of a successful ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub video_id: String,
    /// Records stored for the video after this call.
    pub chunks_indexed: usize,
    /// The video was already indexed and nothing was fetched or embedded.
    pub already_indexed: bool,
}

/// Why an ingest failed.
#[derive(Debug, Error)]
pub enum IngestFailure {
    #[error(transparent)]
    Transcript(#[from] TranscriptFailure),

    /// Embedding or storage failed after the transcript was fetched.
    #[error("Indexing failed: {0}")]
    Index(ClipseekError),
}

impl IngestFailure {
    /// Stable reason code for API responses.
    pub fn reason(&self) -> &'static str {
        match self {
            IngestFailure::Transcript(failure) => failure.reason.as_str(),
            IngestFailure::Index(_) => "index_failed",
        }
    }
}

/// Turns a video id into indexed, embedded transcript chunks.
pub struct IngestionPipeline {
    source: Arc<dyn TranscriptSource>,
    chunker: TranscriptChunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    locks: KeyedLocks,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn TranscriptSource>,
        chunker: TranscriptChunker,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            source,
            chunker,
            embedder,
            index,
            locks: KeyedLocks::new(),
        }
    }

    /// Index a video's transcript unless it is already indexed.
    ///
    /// Concurrent calls for the same video are serialised; only the first one
    /// fetches and embeds.
    #[instrument(skip(self))]
    pub async fn ingest(&self, video_id: &str) -> std::result::Result<IngestReport, IngestFailure> {
        let _guard = self.locks.lock(video_id).await;

        if self.index.exists(video_id).await.map_err(IngestFailure::Index)? {
            info!("Video {} already indexed, skipping", video_id);
            return self.already_indexed(video_id).await;
        }

        let chunks = self.chunker.fetch_and_chunk(self.source.as_ref(), video_id).await?;
        if chunks.is_empty() {
            return Err(TranscriptFailure::new(
                video_id,
                TranscriptFailureReason::TranscriptNotFound,
                "transcript has no text",
            )
            .into());
        }

        let records = self.embed(chunks).await.map_err(|e| {
            error!("Embedding failed for {}: {}", video_id, e);
            IngestFailure::Index(e)
        })?;
        let count = records.len();

        let inserted = self
            .index
            .insert_if_absent(video_id, &records)
            .await
            .map_err(|e| {
                error!("Index write failed for {}: {}", video_id, e);
                IngestFailure::Index(e)
            })?;

        if !inserted {
            info!("Video {} was indexed concurrently, keeping existing records", video_id);
            return self.already_indexed(video_id).await;
        }

        info!("Indexed {} chunks for {}", count, video_id);
        Ok(IngestReport {
            video_id: video_id.to_string(),
            chunks_indexed: count,
            already_indexed: false,
        })
    }

    async fn embed(&self, chunks: Vec<crate::chunking::Chunk>) -> Result<Vec<VectorRecord>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(ClipseekError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorRecord::from_chunk(chunk, embedding))
            .collect())
    }

    async fn already_indexed(
        &self,
        video_id: &str,
    ) -> std::result::Result<IngestReport, IngestFailure> {
        let chunks_indexed = self
            .index
            .count_for_video(video_id)
            .await
            .map_err(IngestFailure::Index)?;
        Ok(IngestReport {
            video_id: video_id.to_string(),
            chunks_indexed,
            already_indexed: true,
        })
    }
}

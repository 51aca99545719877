//! Vector index abstraction for Clipseek.
//!
//! One logical collection holds the chunks of every video. Records are addressed
//! by their deterministic chunk id and carry the video id, start offset and
//! duration as metadata.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::chunking::Chunk;
use crate::error::{ClipseekError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An embedded chunk stored in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Chunk id, `<video_id>#text<n>`.
    pub id: String,
    /// Video this record belongs to.
    pub video_id: String,
    /// Chunk text.
    pub text: String,
    /// Start offset in the video (seconds).
    pub start: f64,
    /// Duration covered by the chunk (seconds).
    pub duration: f64,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this record was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl VectorRecord {
    /// Create a record for a chunk and its embedding.
    pub fn from_chunk(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: chunk.id,
            video_id: chunk.video_id,
            text: chunk.text,
            start: chunk.start,
            duration: chunk.duration,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched record.
    pub record: VectorRecord,
    /// Cosine similarity to the query (higher is better).
    pub score: f32,
}

/// Summary information about an indexed video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedVideo {
    /// Video ID.
    pub video_id: String,
    /// Number of indexed chunks.
    pub chunk_count: u32,
    /// Start offset of the last chunk, in seconds.
    pub last_start_seconds: f64,
    /// When the video was indexed.
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector index implementations.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Whether at least one record exists for the video (a filtered `LIMIT 1` lookup).
    async fn exists(&self, video_id: &str) -> Result<bool>;

    /// Insert records keyed by id. A record with an existing id replaces it.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize>;

    /// Insert the records of `video_id` only if none exist yet, atomically.
    ///
    /// Returns `false` without writing when the video is already indexed.
    async fn insert_if_absent(&self, video_id: &str, records: &[VectorRecord]) -> Result<bool>;

    /// Nearest records to `query_embedding`, best first, optionally restricted to one video.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        video_id: Option<&str>,
    ) -> Result<Vec<SearchResult>>;

    /// Number of records stored for a video.
    async fn count_for_video(&self, video_id: &str) -> Result<usize>;

    /// Delete records by video ID.
    async fn delete_by_video_id(&self, video_id: &str) -> Result<usize>;

    /// List all indexed videos, most recently indexed first.
    async fn list_videos(&self) -> Result<Vec<IndexedVideo>>;

    /// Total record count.
    async fn record_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Score `records` against a query and keep the best `limit`.
///
/// The sort is stable, so equal scores keep the order records were given in.
pub(crate) fn rank_records(
    query_embedding: &[f32],
    records: impl IntoIterator<Item = VectorRecord>,
    limit: usize,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = records
        .into_iter()
        .map(|record| {
            let score = cosine_similarity(query_embedding, &record.embedding);
            SearchResult { record, score }
        })
        .collect();

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(limit);
    results
}

/// Check that every record has the collection's dimensionality and belongs to `video_id`.
///
/// `expected` is `None` for a collection that has never stored a vector.
pub(crate) fn validate_records(
    expected: Option<usize>,
    video_id: Option<&str>,
    records: &[VectorRecord],
) -> Result<Option<usize>> {
    let mut dims = expected;
    for record in records {
        if let Some(vid) = video_id {
            if record.video_id != vid {
                return Err(ClipseekError::VectorStore(format!(
                    "Record {} belongs to video {}, not {}",
                    record.id, record.video_id, vid
                )));
            }
        }
        match dims {
            Some(d) if d != record.embedding.len() => {
                return Err(ClipseekError::VectorStore(format!(
                    "Embedding dimension mismatch for {}: collection uses {}, got {}",
                    record.id,
                    d,
                    record.embedding.len()
                )));
            }
            Some(_) => {}
            None => dims = Some(record.embedding.len()),
        }
    }
    Ok(dims)
}

#[cfg(test)]
pub(crate) fn test_record(video_id: &str, n: usize, embedding: Vec<f32>) -> VectorRecord {
    VectorRecord::from_chunk(
        Chunk {
            id: Chunk::make_id(video_id, n),
            text: format!("chunk {} of {}", n, video_id),
            start: (n as f64 - 1.0) * 20.0,
            duration: 20.0,
            video_id: video_id.to_string(),
        },
        embedding,
    )
}

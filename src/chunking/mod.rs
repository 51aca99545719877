//! Transcript chunking.
//!
//! Consecutive caption segments are merged into fixed-size windows so each
//! indexed unit carries enough text to be searchable on its own.

use crate::transcript::{TranscriptFailure, TranscriptSegment, TranscriptSource};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// A window of consecutive transcript segments, ready to be embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `<video_id>#text<n>`, 1-indexed.
    pub id: String,
    /// Space-joined segment texts.
    pub text: String,
    /// Start of the first segment, in seconds (2-decimal precision).
    pub start: f64,
    /// Sum of the segment durations, in seconds (2-decimal precision).
    pub duration: f64,
    /// Video this chunk belongs to.
    pub video_id: String,
}

impl Chunk {
    /// Build the deterministic id of the `n`-th chunk (1-indexed) of a video.
    pub fn make_id(video_id: &str, n: usize) -> String {
        format!("{}#text{}", video_id, n)
    }
}

/// Fixed-window transcript chunker.
#[derive(Debug, Clone, Copy)]
pub struct TranscriptChunker {
    chunk_size: usize,
}

impl TranscriptChunker {
    /// Default number of segments per chunk.
    pub const DEFAULT_CHUNK_SIZE: usize = 10;

    /// Create a chunker. A `chunk_size` of 0 is treated as 1.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split segments into `ceil(len / chunk_size)` chunks; the last one may be shorter.
    pub fn chunk(&self, video_id: &str, segments: &[TranscriptSegment]) -> Vec<Chunk> {
        segments
            .chunks(self.chunk_size)
            .enumerate()
            .map(|(i, window)| Chunk {
                id: Chunk::make_id(video_id, i + 1),
                text: window
                    .iter()
                    .map(|s| s.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
                start: round2(window[0].start),
                duration: round2(window.iter().map(|s| s.duration).sum()),
                video_id: video_id.to_string(),
            })
            .collect()
    }

    /// Fetch a transcript and chunk it.
    ///
    /// Fetch failures come back as a classified [`TranscriptFailure`]; each is logged
    /// with its reason before being handed to the caller.
    #[instrument(skip(self, source))]
    pub async fn fetch_and_chunk(
        &self,
        source: &dyn TranscriptSource,
        video_id: &str,
    ) -> std::result::Result<Vec<Chunk>, TranscriptFailure> {
        let segments = match source.fetch(video_id).await {
            Ok(segments) => segments,
            Err(failure) => {
                warn!(
                    reason = %failure.reason,
                    "Transcript unavailable for {}: {}",
                    video_id,
                    failure.detail
                );
                return Err(failure);
            }
        };

        let chunks = self.chunk(video_id, &segments);
        info!(
            "Transcript of {} segments chunked into {} chunks",
            segments.len(),
            chunks.len()
        );
        Ok(chunks)
    }
}

impl Default for TranscriptChunker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHUNK_SIZE)
    }
}

/// Round to two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

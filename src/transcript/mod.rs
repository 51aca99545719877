//! Transcript sources for Clipseek.
//!
//! A transcript is the ordered list of timed caption segments of a video. Fetching
//! it can fail for several distinct reasons; they are kept apart in
//! [`TranscriptFailureReason`] so callers can log them precisely while still treating
//! every one of them as "no transcript".

mod youtube;

pub use youtube::{classify_ytdlp_output, parse_json3, YtDlpTranscriptSource};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

/// A single timed caption line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Caption text.
    pub text: String,
    /// Offset into the video, in seconds.
    pub start: f64,
    /// How long the caption is shown, in seconds.
    pub duration: f64,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }
}

/// Why a transcript could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptFailureReason {
    TranscriptDisabled,
    TranscriptNotFound,
    InvalidVideoId,
    VideoUnavailable,
    RequestFailed,
    UnknownError,
}

impl TranscriptFailureReason {
    /// Stable snake_case name, as exposed over the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptFailureReason::TranscriptDisabled => "transcript_disabled",
            TranscriptFailureReason::TranscriptNotFound => "transcript_not_found",
            TranscriptFailureReason::InvalidVideoId => "invalid_video_id",
            TranscriptFailureReason::VideoUnavailable => "video_unavailable",
            TranscriptFailureReason::RequestFailed => "request_failed",
            TranscriptFailureReason::UnknownError => "unknown_error",
        }
    }
}

impl std::fmt::Display for TranscriptFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified transcript fetch failure.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{reason} for video {video_id}: {detail}")]
pub struct TranscriptFailure {
    pub video_id: String,
    pub reason: TranscriptFailureReason,
    /// Free-form detail for logs (tool output, HTTP status, ...).
    pub detail: String,
}

impl TranscriptFailure {
    pub fn new(
        video_id: impl Into<String>,
        reason: TranscriptFailureReason,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            reason,
            detail: detail.into(),
        }
    }
}

/// Provider of timed transcripts.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Fetch the ordered caption segments of a video.
    async fn fetch(
        &self,
        video_id: &str,
    ) -> std::result::Result<Vec<TranscriptSegment>, TranscriptFailure>;
}

static VIDEO_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // Matches various YouTube URL formats and bare video IDs
    Regex::new(
        r"(?x)
        (?:
            (?:https?://)?
            (?:www\.|m\.)?
            (?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/shorts/|youtube\.com/v/)
            ([a-zA-Z0-9_-]{11})
        )
        |
        ^([a-zA-Z0-9_-]{11})$
    ",
    )
    .expect("video id pattern is valid")
});

/// Extract a YouTube video ID from a URL or bare ID.
pub fn parse_video_id(input: &str) -> Option<String> {
    let caps = VIDEO_ID_REGEX.captures(input.trim())?;

    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_id() {
        assert_eq!(
            parse_video_id("https://www.youtube.com/watch?v=X7gKBGVz4vs"),
            Some("X7gKBGVz4vs".to_string())
        );
        assert_eq!(
            parse_video_id("https://www.youtube.com/watch?list=PL1&v=X7gKBGVz4vs"),
            Some("X7gKBGVz4vs".to_string())
        );
        assert_eq!(
            parse_video_id("https://youtu.be/X7gKBGVz4vs"),
            Some("X7gKBGVz4vs".to_string())
        );
        assert_eq!(
            parse_video_id("https://youtube.com/embed/X7gKBGVz4vs"),
            Some("X7gKBGVz4vs".to_string())
        );
        assert_eq!(parse_video_id("  X7gKBGVz4vs "), Some("X7gKBGVz4vs".to_string()));

        assert_eq!(parse_video_id("not-a-video-id"), None);
        assert_eq!(parse_video_id(""), None);
    }

    #[test]
    fn test_failure_reason_names() {
        assert_eq!(
            TranscriptFailureReason::TranscriptDisabled.to_string(),
            "transcript_disabled"
        );
        let json = serde_json::to_string(&TranscriptFailureReason::InvalidVideoId).unwrap();
        assert_eq!(json, "\"invalid_video_id\"");
    }

    #[test]
    fn test_failure_display() {
        let failure = TranscriptFailure::new(
            "abc",
            TranscriptFailureReason::VideoUnavailable,
            "removed by uploader",
        );
        assert_eq!(
            failure.to_string(),
            "video_unavailable for video abc: removed by uploader"
        );
    }
}

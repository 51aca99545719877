//! Timestamped YouTube links.

use crate::error::{ClipseekError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A watch link that starts playback at the answer's offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampLink {
    pub youtube_link: String,
    /// Offset in whole seconds, rounded.
    pub start: i64,
}

/// Builds `watch?v=<id>&t=<m>m<s>s` links.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkBuilder;

impl LinkBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build a link for `start_value` seconds into `video_id`.
    ///
    /// Minutes and seconds in the link are truncated while the reported `start`
    /// is rounded, so 125.7 links to `2m5s` and reports 126. Negative offsets
    /// clamp to zero.
    pub fn build(&self, video_id: &str, start_value: f64) -> Result<TimestampLink> {
        if !start_value.is_finite() {
            return Err(ClipseekError::Link(format!(
                "Start value {} is not a finite number",
                start_value
            )));
        }

        let value = start_value.max(0.0);
        let minutes = (value / 60.0).floor() as i64;
        let seconds = (value % 60.0).floor() as i64;

        let youtube_link = format!(
            "https://www.youtube.com/watch?v={}&t={}m{}s",
            video_id, minutes, seconds
        );
        debug!("Built link {} for start value {}", youtube_link, start_value);

        Ok(TimestampLink {
            youtube_link,
            start: value.round() as i64,
        })
    }
}

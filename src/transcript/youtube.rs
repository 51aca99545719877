//! YouTube caption fetching via yt-dlp.
//!
//! Captions are downloaded in YouTube's `json3` format into a temporary directory
//! and converted to [`TranscriptSegment`]s. yt-dlp's console output is used to tell
//! the failure reasons apart.

use super::{
    parse_video_id, TranscriptFailure, TranscriptFailureReason, TranscriptSegment,
    TranscriptSource,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::TranscriptFailureReason::*;

/// Transcript source backed by the yt-dlp command line tool.
pub struct YtDlpTranscriptSource {
    binary: String,
    languages: String,
}

impl YtDlpTranscriptSource {
    pub fn new() -> Self {
        Self::with_config("yt-dlp", "en.*,en")
    }

    /// Use a specific yt-dlp binary and `--sub-langs` selector.
    pub fn with_config(binary: &str, languages: &str) -> Self {
        Self {
            binary: binary.to_string(),
            languages: languages.to_string(),
        }
    }

    async fn download_captions(
        &self,
        video_id: &str,
        output_dir: &Path,
    ) -> std::result::Result<PathBuf, TranscriptFailure> {
        let url = format!("https://www.youtube.com/watch?v={}", video_id);
        let template = output_dir.join("%(id)s.%(ext)s");

        let result = Command::new(&self.binary)
            .arg("--skip-download")
            .arg("--write-subs")
            .arg("--write-auto-subs")
            .arg("--sub-langs")
            .arg(&self.languages)
            .arg("--sub-format")
            .arg("json3")
            .arg("--no-playlist")
            .arg("--output")
            .arg(&template)
            .arg(&url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TranscriptFailure::new(
                    video_id,
                    RequestFailed,
                    format!("{} not found in PATH", self.binary),
                ));
            }
            Err(e) => {
                return Err(TranscriptFailure::new(
                    video_id,
                    RequestFailed,
                    format!("{} execution failed: {}", self.binary, e),
                ));
            }
        };

        let console = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        if !output.status.success() {
            let reason = classify_ytdlp_output(&console).unwrap_or(UnknownError);
            return Err(TranscriptFailure::new(video_id, reason, last_line(&console)));
        }

        match find_caption_file(output_dir, video_id, &self.languages) {
            Some(path) => Ok(path),
            None => {
                // yt-dlp succeeds even when it wrote no captions
                let reason = classify_ytdlp_output(&console).unwrap_or(TranscriptNotFound);
                Err(TranscriptFailure::new(video_id, reason, last_line(&console)))
            }
        }
    }
}

impl Default for YtDlpTranscriptSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptSource for YtDlpTranscriptSource {
    #[instrument(skip(self))]
    async fn fetch(
        &self,
        video_id: &str,
    ) -> std::result::Result<Vec<TranscriptSegment>, TranscriptFailure> {
        let video_id = parse_video_id(video_id).ok_or_else(|| {
            TranscriptFailure::new(video_id, InvalidVideoId, "not a YouTube video id or URL")
        })?;

        info!("Fetching transcript for video_id: {}", video_id);

        let temp_dir = tempfile::tempdir().map_err(|e| {
            TranscriptFailure::new(&video_id, UnknownError, format!("temp dir: {}", e))
        })?;

        let caption_path = self.download_captions(&video_id, temp_dir.path()).await?;
        debug!("Reading captions from {:?}", caption_path);

        let raw = tokio::fs::read_to_string(&caption_path).await.map_err(|e| {
            TranscriptFailure::new(&video_id, UnknownError, format!("read captions: {}", e))
        })?;

        let segments = parse_json3(&raw).map_err(|e| {
            TranscriptFailure::new(&video_id, UnknownError, format!("malformed json3: {}", e))
        })?;

        if segments.is_empty() {
            warn!("Caption track for {} is empty", video_id);
            return Err(TranscriptFailure::new(
                &video_id,
                TranscriptNotFound,
                "caption track contains no text",
            ));
        }

        info!("Transcript fetched: {} segments", segments.len());
        Ok(segments)
    }
}

/// Map yt-dlp console output to a failure reason, if it matches a known message.
pub fn classify_ytdlp_output(output: &str) -> Option<TranscriptFailureReason> {
    let text = output.to_lowercase();

    if text.contains("incomplete youtube id")
        || text.contains("is not a valid url")
        || text.contains("unsupported url")
    {
        return Some(InvalidVideoId);
    }
    if text.contains("video unavailable")
        || text.contains("private video")
        || text.contains("has been removed")
        || text.contains("this video is not available")
    {
        return Some(VideoUnavailable);
    }
    if text.contains("no subtitles for the requested languages") {
        return Some(TranscriptNotFound);
    }
    if text.contains("has no subtitles")
        || text.contains("subtitles are disabled")
        || text.contains("no automatic captions")
    {
        return Some(TranscriptDisabled);
    }
    if text.contains("http error")
        || text.contains("unable to download")
        || text.contains("timed out")
        || text.contains("connection")
    {
        return Some(RequestFailed);
    }
    None
}

#[derive(Debug, Deserialize)]
struct Json3Document {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    #[serde(default)]
    segs: Vec<Json3Seg>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Convert a `json3` caption document to transcript segments.
///
/// Events without visible text (window definitions, line breaks) are dropped.
pub fn parse_json3(raw: &str) -> serde_json::Result<Vec<TranscriptSegment>> {
    let doc: Json3Document = serde_json::from_str(raw)?;

    let segments = doc
        .events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if text.is_empty() {
                return None;
            }
            Some(TranscriptSegment::new(
                text,
                event.t_start_ms as f64 / 1000.0,
                event.d_duration_ms as f64 / 1000.0,
            ))
        })
        .collect();

    Ok(segments)
}

/// Locate the caption file yt-dlp wrote for a video.
///
/// yt-dlp names a manual track `<id>.<lang>.json3` and the automatic original-language
/// track `<id>.<lang>-orig.json3`. Tracks whose language is listed verbatim in
/// `languages` rank first, in list order, then other tracks, then `-orig` tracks.
fn find_caption_file(dir: &Path, video_id: &str, languages: &str) -> Option<PathBuf> {
    let prefix = format!("{}.", video_id);
    let preferred: Vec<&str> = languages
        .split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty() && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
        .collect();

    let mut candidates: Vec<(usize, String, PathBuf)> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            let name = path.file_name()?.to_string_lossy().to_string();
            let lang = name.strip_prefix(&prefix)?.strip_suffix(".json3")?;
            let rank = match preferred.iter().position(|p| *p == lang) {
                Some(i) => i,
                None if lang.ends_with("-orig") => preferred.len() + 1,
                None => preferred.len(),
            };
            Some((rank, name, path))
        })
        .collect();

    candidates.sort();
    candidates.into_iter().next().map(|(_, _, path)| path)
}

fn last_line(output: &str) -> String {
    output
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no output")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_messages() {
        assert_eq!(
            classify_ytdlp_output("ERROR: [youtube] abc: Incomplete YouTube ID abc."),
            Some(InvalidVideoId)
        );
        assert_eq!(
            classify_ytdlp_output("ERROR: [youtube] X7gKBGVz4vs: Video unavailable"),
            Some(VideoUnavailable)
        );
        assert_eq!(
            classify_ytdlp_output("ERROR: [youtube] X7gKBGVz4vs: Private video. Sign in"),
            Some(VideoUnavailable)
        );
        assert_eq!(
            classify_ytdlp_output(
                "[info] X7gKBGVz4vs: There are no subtitles for the requested languages"
            ),
            Some(TranscriptNotFound)
        );
        assert_eq!(
            classify_ytdlp_output("[info] X7gKBGVz4vs has no subtitles"),
            Some(TranscriptDisabled)
        );
        assert_eq!(
            classify_ytdlp_output("ERROR: unable to download video data: HTTP Error 429"),
            Some(RequestFailed)
        );
        assert_eq!(classify_ytdlp_output("something odd happened"), None);
    }

    #[test]
    fn test_parse_json3_drops_blank_events() {
        let raw = r#"{
            "wireMagic": "pb3",
            "events": [
                {"tStartMs": 0, "dDurationMs": 500000, "id": 1, "wpWinPosId": 1},
                {"tStartMs": 1200, "dDurationMs": 3400,
                 "segs": [{"utf8": "hello "}, {"utf8": "world"}]},
                {"tStartMs": 4600, "dDurationMs": 10, "aAppend": 1, "segs": [{"utf8": "\n"}]},
                {"tStartMs": 4610, "dDurationMs": 2390, "segs": [{"utf8": "second\nline"}]}
            ]
        }"#;

        let segments = parse_json3(raw).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], TranscriptSegment::new("hello world", 1.2, 3.4));
        assert_eq!(segments[1].text, "second line");
        assert!((segments[1].start - 4.61).abs() < 1e-9);
        assert!((segments[1].duration - 2.39).abs() < 1e-9);
    }

    #[test]
    fn test_parse_json3_rejects_garbage() {
        assert!(parse_json3("not json").is_err());
    }

    #[test]
    fn test_find_caption_file_prefers_manual_track() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "X7gKBGVz4vs.en-GB.json3",
            "X7gKBGVz4vs.en-orig.json3",
            "X7gKBGVz4vs.en.json3",
            "other.en.json3",
        ] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }

        let found = find_caption_file(dir.path(), "X7gKBGVz4vs", "en.*,en").unwrap();
        assert!(found.ends_with("X7gKBGVz4vs.en.json3"));
        assert!(find_caption_file(dir.path(), "zzzzzzzzzzz", "en.*,en").is_none());
    }

    #[test]
    fn test_find_caption_file_ranks_orig_last() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("X7gKBGVz4vs.en-orig.json3"), "{}").unwrap();
        std::fs::write(dir.path().join("X7gKBGVz4vs.en-GB.json3"), "{}").unwrap();

        let found = find_caption_file(dir.path(), "X7gKBGVz4vs", "en.*,en").unwrap();
        assert!(found.ends_with("X7gKBGVz4vs.en-GB.json3"));

        std::fs::remove_file(dir.path().join("X7gKBGVz4vs.en-GB.json3")).unwrap();
        let found = find_caption_file(dir.path(), "X7gKBGVz4vs", "en.*,en").unwrap();
        assert!(found.ends_with("X7gKBGVz4vs.en-orig.json3"));
    }

    #[test]
    fn test_find_caption_file_follows_language_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("X7gKBGVz4vs.de.json3"), "{}").unwrap();
        std::fs::write(dir.path().join("X7gKBGVz4vs.en.json3"), "{}").unwrap();

        let found = find_caption_file(dir.path(), "X7gKBGVz4vs", "de,en").unwrap();
        assert!(found.ends_with("X7gKBGVz4vs.de.json3"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_id_without_running_tool() {
        let source = YtDlpTranscriptSource::with_config("definitely-not-yt-dlp", "en");
        let failure = source.fetch("nope").await.unwrap_err();
        assert_eq!(failure.reason, InvalidVideoId);
    }

    #[tokio::test]
    async fn test_fetch_missing_tool_is_request_failure() {
        let source = YtDlpTranscriptSource::with_config("definitely-not-yt-dlp", "en");
        let failure = source.fetch("X7gKBGVz4vs").await.unwrap_err();
        assert_eq!(failure.reason, RequestFailed);
        assert!(failure.detail.contains("definitely-not-yt-dlp"));
    }
}

//! Deterministic test doubles for the external services.

use crate::embedding::Embedder;
use crate::error::{ClipseekError, Result};
use crate::rag::ChatModel;
use crate::transcript::{
    TranscriptFailure, TranscriptFailureReason, TranscriptSegment, TranscriptSource,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const KEYWORD_DIMENSIONS: usize = 32;

/// Bag-of-words embedder: each distinct lowercase word gets its own axis.
///
/// Axes are assigned on first sight, so identical words always embed identically
/// and unrelated words are orthogonal. Words beyond the last axis share it.
pub struct KeywordEmbedder {
    vocabulary: Mutex<HashMap<String, usize>>,
    batch_calls: AtomicUsize,
    texts_embedded: AtomicUsize,
    delay: Option<Duration>,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            vocabulary: Mutex::new(HashMap::new()),
            batch_calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Sleep before every batch, to widen race windows in concurrency tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vocabulary = self.vocabulary.lock().unwrap();
        let mut vector = vec![0.0; KEYWORD_DIMENSIONS];
        for word in text.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.is_empty() {
                continue;
            }
            let next = vocabulary.len().min(KEYWORD_DIMENSIONS - 1);
            let axis = *vocabulary.entry(word).or_insert(next);
            vector[axis] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        KEYWORD_DIMENSIONS
    }
}

/// Chat model that replays a canned reply and records the prompts it saw.
pub struct ScriptedChatModel {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedChatModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A model whose every call errors.
    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_user_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, _system: &str, user: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(user.to_string());
        self.reply
            .clone()
            .ok_or_else(|| ClipseekError::OpenAI("scripted failure".to_string()))
    }
}

/// Transcript source backed by a map of video id to segments.
///
/// Unknown ids fail with the reason given to [`StaticTranscriptSource::failing_with`],
/// `TranscriptNotFound` by default.
pub struct StaticTranscriptSource {
    transcripts: HashMap<String, Vec<TranscriptSegment>>,
    failure: TranscriptFailureReason,
    fetches: AtomicUsize,
}

impl StaticTranscriptSource {
    pub fn new() -> Self {
        Self {
            transcripts: HashMap::new(),
            failure: TranscriptFailureReason::TranscriptNotFound,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_transcript(mut self, video_id: &str, segments: Vec<TranscriptSegment>) -> Self {
        self.transcripts.insert(video_id.to_string(), segments);
        self
    }

    pub fn failing_with(mut self, reason: TranscriptFailureReason) -> Self {
        self.failure = reason;
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptSource for StaticTranscriptSource {
    async fn fetch(
        &self,
        video_id: &str,
    ) -> std::result::Result<Vec<TranscriptSegment>, TranscriptFailure> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.transcripts
            .get(video_id)
            .cloned()
            .ok_or_else(|| TranscriptFailure::new(video_id, self.failure, "no scripted transcript"))
    }
}

/// `count` caption lines of the form `"<topic> line <i>"`, 5 seconds apart.
pub fn segments(topic: &str, count: usize) -> Vec<TranscriptSegment> {
    (0..count)
        .map(|i| TranscriptSegment::new(format!("{} line {}", topic, i), i as f64 * 5.0, 4.5))
        .collect()
}

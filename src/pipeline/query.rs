//! Question answering: retrieve, generate, link.

use crate::rag::{AnswerGenerator, LinkBuilder, GENERATION_FAILED_ANSWER};
use crate::retrieval::Retriever;
use crate::vector_store::VectorIndex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Error returned when the model produced no usable timestamp.
pub const MISSING_TIMESTAMP_ERROR: &str = "Unable to create YouTube link or retrieve answer.";

/// What a question resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    Answered {
        youtube_link: String,
        answer: String,
        start: i64,
    },
    Failed {
        error: String,
        /// Always `null`; present so clients can read `start` from either shape.
        start: Option<i64>,
        /// The answer text, when the model answered without a usable timestamp.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<String>,
    },
}

impl QueryOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        QueryOutcome::Failed {
            error: error.into(),
            start: None,
            answer: None,
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, QueryOutcome::Answered { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            QueryOutcome::Failed { error, .. } => Some(error),
            QueryOutcome::Answered { .. } => None,
        }
    }
}

/// Answers questions about indexed videos.
pub struct QueryPipeline {
    index: Arc<dyn VectorIndex>,
    retriever: Retriever,
    generator: AnswerGenerator,
    links: LinkBuilder,
}

impl QueryPipeline {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        retriever: Retriever,
        generator: AnswerGenerator,
    ) -> Self {
        Self {
            index,
            retriever,
            generator,
            links: LinkBuilder::new(),
        }
    }

    /// Answer `question` about `video_id` with a timestamped link.
    ///
    /// Every failure is reported as [`QueryOutcome::Failed`].
    #[instrument(skip(self, question))]
    pub async fn answer(&self, question: &str, video_id: &str) -> QueryOutcome {
        match self.index.exists(video_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Question for unindexed video {}", video_id);
                return QueryOutcome::failed(format!("Video {} has not been indexed.", video_id));
            }
            Err(e) => {
                error!("Index lookup failed: {}", e);
                return QueryOutcome::failed(e.to_string());
            }
        }

        let retrieved = match self.retriever.search(video_id, question).await {
            Ok(retrieved) => retrieved,
            Err(e) => {
                error!("{}", e);
                return QueryOutcome::failed(e.to_string());
            }
        };
        info!(
            "Retrieved {} chunks, resolved video {}",
            retrieved.chunks.len(),
            retrieved.video_id
        );

        let result = self.generator.generate(question, &retrieved.chunks).await;
        if result.is_generation_failure() {
            return QueryOutcome::failed(GENERATION_FAILED_ANSWER);
        }

        let Some(start_value) = result.start_value else {
            warn!("Model gave no start value");
            return QueryOutcome::Failed {
                error: MISSING_TIMESTAMP_ERROR.to_string(),
                start: None,
                answer: Some(result.answer),
            };
        };
        info!("Start value {}", start_value);

        match self.links.build(&retrieved.video_id, start_value) {
            Ok(link) => {
                info!("Answer link {}", link.youtube_link);
                QueryOutcome::Answered {
                    youtube_link: link.youtube_link,
                    answer: result.answer,
                    start: link.start,
                }
            }
            Err(e) => {
                error!("{}", e);
                QueryOutcome::Failed {
                    error: MISSING_TIMESTAMP_ERROR.to_string(),
                    start: None,
                    answer: Some(result.answer),
                }
            }
        }
    }
}

//! Component wiring for Clipseek.
//!
//! Builds the transcript source, embedder, index and chat model from settings
//! and exposes the ingest and answer flows over them.

use crate::chunking::TranscriptChunker;
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{ClipseekError, Result};
use crate::openai::resolve_api_key;
use crate::pipeline::{
    IngestFailure, IngestReport, IngestionPipeline, QueryOutcome, QueryPipeline,
};
use crate::rag::{AnswerGenerator, ChatModel, OpenAIChatModel};
use crate::retrieval::Retriever;
use crate::transcript::{
    parse_video_id, TranscriptFailure, TranscriptFailureReason, TranscriptSource,
    YtDlpTranscriptSource,
};
use crate::vector_store::{IndexedVideo, SqliteVectorStore, VectorIndex};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Error reported when answering is requested from an ingest-only orchestrator.
pub const ANSWERING_DISABLED_ERROR: &str = "Answering is not configured.";

/// The main orchestrator for the Clipseek pipelines.
pub struct Orchestrator {
    index: Arc<dyn VectorIndex>,
    ingestion: IngestionPipeline,
    query: Option<QueryPipeline>,
}

impl Orchestrator {
    /// Create an orchestrator that can both ingest and answer.
    ///
    /// Validates the settings and resolves both API keys up front, so a missing
    /// key fails here rather than on the first request.
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;

        let generation_key = resolve_api_key(&settings.generation.api_key_env)?;
        let (source, embedder, index) = open_components(&settings)?;

        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let model: Arc<dyn ChatModel> =
            Arc::new(OpenAIChatModel::from_settings(&settings.generation, &generation_key)?);
        info!("Answers from {}", settings.generation.model);

        Ok(Self::with_components(settings, prompts, source, embedder, index, model))
    }

    /// Create an orchestrator that only ingests.
    ///
    /// Needs the embedding key but not the generation key.
    pub fn for_ingest(settings: Settings) -> Result<Self> {
        settings.validate()?;

        let (source, embedder, index) = open_components(&settings)?;
        Ok(Self::ingest_only(settings, source, embedder, index))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        source: Arc<dyn TranscriptSource>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        let retriever =
            Retriever::with_settings(index.clone(), embedder.clone(), &settings.retrieval);
        let generator = AnswerGenerator::new(model).with_prompts(prompts);
        let query = QueryPipeline::new(index.clone(), retriever, generator);

        let mut orchestrator = Self::ingest_only(settings, source, embedder, index);
        orchestrator.query = Some(query);
        orchestrator
    }

    /// Create an ingest-only orchestrator with custom components.
    pub fn ingest_only(
        settings: Settings,
        source: Arc<dyn TranscriptSource>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        let ingestion = IngestionPipeline::new(
            source,
            TranscriptChunker::new(settings.transcript.chunk_size),
            embedder,
            index.clone(),
        );

        Self {
            index,
            ingestion,
            query: None,
        }
    }

    /// Index a video given its id or URL.
    #[instrument(skip(self), fields(input = %input))]
    pub async fn ingest(&self, input: &str) -> std::result::Result<IngestReport, IngestFailure> {
        let video_id = resolve_video_id(input)?;
        self.ingestion.ingest(&video_id).await
    }

    /// Answer a question about a video given its id or URL.
    #[instrument(skip(self, question), fields(input = %input))]
    pub async fn answer(&self, question: &str, input: &str) -> QueryOutcome {
        match resolve_video_id(input) {
            Ok(video_id) => self.answer_video(question, &video_id).await,
            Err(failure) => QueryOutcome::failed(failure.to_string()),
        }
    }

    /// Ingest a video if needed, then answer a question about it.
    pub async fn process(
        &self,
        input: &str,
        question: &str,
    ) -> std::result::Result<QueryOutcome, IngestFailure> {
        let report = self.ingest(input).await?;
        Ok(self.answer_video(question, &report.video_id).await)
    }

    async fn answer_video(&self, question: &str, video_id: &str) -> QueryOutcome {
        match &self.query {
            Some(query) => query.answer(question, video_id).await,
            None => {
                warn!("Question for {} on an ingest-only orchestrator", video_id);
                QueryOutcome::failed(ANSWERING_DISABLED_ERROR)
            }
        }
    }

    /// List indexed videos, most recent first.
    pub async fn list_videos(&self) -> Result<Vec<IndexedVideo>> {
        self.index.list_videos().await
    }
}

/// Build the transcript source, embedder and index shared by both modes.
///
/// Resolves the embedding key and rejects an index whose stored vectors have a
/// different size than the configured embedder produces.
fn open_components(
    settings: &Settings,
) -> Result<(Arc<dyn TranscriptSource>, Arc<dyn Embedder>, Arc<dyn VectorIndex>)> {
    let embedding_key = resolve_api_key(&settings.embedding.api_key_env)?;

    let source: Arc<dyn TranscriptSource> = Arc::new(YtDlpTranscriptSource::with_config(
        &settings.transcript.yt_dlp,
        &settings.transcript.languages,
    ));
    let embedder = OpenAIEmbedder::from_settings(&settings.embedding, &embedding_key)?;

    let index_path = settings.sqlite_path();
    let collection = &settings.vector_store.collection;
    let store = SqliteVectorStore::new(&index_path, collection)?;
    check_dimensions(collection, store.dimensions()?, embedder.dimensions())?;

    info!(
        "Using index {} (collection {}), embeddings {}",
        index_path.display(),
        collection,
        settings.embedding.model
    );

    Ok((source, Arc::new(embedder), Arc::new(store)))
}

fn check_dimensions(collection: &str, stored: Option<usize>, embedder: usize) -> Result<()> {
    match stored {
        Some(stored) if stored != embedder => Err(ClipseekError::Config(format!(
            "Collection '{}' holds {}-dimensional embeddings but the embedder produces {}. \
             Use another collection or match embedding.dimensions.",
            collection, stored, embedder
        ))),
        _ => Ok(()),
    }
}

fn resolve_video_id(input: &str) -> std::result::Result<String, TranscriptFailure> {
    parse_video_id(input).ok_or_else(|| {
        TranscriptFailure::new(
            input,
            TranscriptFailureReason::InvalidVideoId,
            "not a YouTube video id or URL",
        )
    })
}

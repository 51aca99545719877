//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for indexing videos and asking questions about them.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::pipeline::{IngestReport, QueryOutcome};
use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

const MISSING_FIELDS_ERROR: &str = "Both 'video_id' and 'user_question' are required.";

/// Shared application state.
pub struct AppState {
    pub orchestrator: Orchestrator,
}

/// Run the HTTP API server.
pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    settings: Settings,
) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let cors_origins = settings.server.cors_origins.clone();

    let orchestrator = Orchestrator::new(settings)?;
    let app = router(Arc::new(AppState { orchestrator }), &cors_origins);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Clipseek API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Process", "POST /process");
    Output::kv("Ingest", "POST /ingest");
    Output::kv("Ask", "POST /ask");
    Output::kv("Videos", "GET  /videos");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the API router.
pub fn router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/process", post(process))
        .route("/ingest", post(ingest))
        .route("/ask", post(ask))
        .route("/videos", get(list_videos))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// CORS limited to the configured origins; `"*"` allows any.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct QuestionRequest {
    #[serde(default)]
    video_id: Option<String>,
    #[serde(default)]
    user_question: Option<String>,
}

impl QuestionRequest {
    /// Both fields, trimmed, when present and non-blank.
    fn fields(&self) -> Option<(&str, &str)> {
        let video_id = self.video_id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let question = self
            .user_question
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        Some((video_id, question))
    }
}

#[derive(Deserialize)]
struct IngestRequest {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct VideoListResponse {
    videos: Vec<VideoInfo>,
    total: usize,
}

#[derive(Serialize)]
struct VideoInfo {
    video_id: String,
    chunk_count: u32,
    last_start_seconds: f64,
    indexed_at: String,
}

fn error_response(status: StatusCode, error: impl Into<String>, reason: Option<&str>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            reason: reason.map(str::to_string),
        }),
    )
        .into_response()
}

fn outcome_response(outcome: QueryOutcome) -> Response {
    let status = if outcome.is_answered() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(outcome)).into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn process(State(state): State<Arc<AppState>>, Json(req): Json<QuestionRequest>) -> Response {
    let Some((video_id, question)) = req.fields() else {
        return error_response(StatusCode::BAD_REQUEST, MISSING_FIELDS_ERROR, None);
    };
    info!("Processing question for {}", video_id);

    match state.orchestrator.process(video_id, question).await {
        Ok(outcome) => outcome_response(outcome),
        Err(failure) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to process video_id: {}.", video_id),
            Some(failure.reason()),
        ),
    }
}

async fn ingest(State(state): State<Arc<AppState>>, Json(req): Json<IngestRequest>) -> Response {
    let Some(video_id) = req.video_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "'video_id' is required.", None);
    };

    match state.orchestrator.ingest(video_id).await {
        Ok(report) => Json::<IngestReport>(report).into_response(),
        Err(failure) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to process video_id: {}.", video_id),
            Some(failure.reason()),
        ),
    }
}

async fn ask(State(state): State<Arc<AppState>>, Json(req): Json<QuestionRequest>) -> Response {
    let Some((video_id, question)) = req.fields() else {
        return error_response(StatusCode::BAD_REQUEST, MISSING_FIELDS_ERROR, None);
    };

    outcome_response(state.orchestrator.answer(question, video_id).await)
}

async fn list_videos(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.list_videos().await {
        Ok(videos) => Json(VideoListResponse {
            total: videos.len(),
            videos: videos
                .into_iter()
                .map(|v| VideoInfo {
                    video_id: v.video_id,
                    chunk_count: v.chunk_count,
                    last_start_seconds: v.last_start_seconds,
                    indexed_at: v.indexed_at.to_rfc3339(),
                })
                .collect(),
        })
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prompts;
    use crate::testing::{segments, KeywordEmbedder, ScriptedChatModel, StaticTranscriptSource};
    use crate::transcript::TranscriptFailureReason;
    use crate::vector_store::MemoryVectorStore;
    use serde_json::{json, Value};

    async fn spawn_server(source: StaticTranscriptSource) -> String {
        let orchestrator = Orchestrator::with_components(
            Settings::default(),
            Prompts::default(),
            Arc::new(source),
            Arc::new(KeywordEmbedder::new()),
            Arc::new(MemoryVectorStore::new()),
            Arc::new(ScriptedChatModel::replying(
                r#"{"answer": "Covered near the start.", "start_value": 12.4}"#,
            )),
        );
        let app = router(
            Arc::new(AppState { orchestrator }),
            &["http://localhost:3000".to_string()],
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn post(url: String, body: Value) -> (StatusCode, Value) {
        let response = reqwest::Client::new().post(url).json(&body).send().await.unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_process_answers_with_link() {
        let base = spawn_server(
            StaticTranscriptSource::new().with_transcript("abcdefghijk", segments("intro", 20)),
        )
        .await;

        let (status, body) = post(
            format!("{}/process", base),
            json!({"video_id": "abcdefghijk", "user_question": "What is in the intro?"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "youtube_link": "https://www.youtube.com/watch?v=abcdefghijk&t=0m12s",
                "answer": "Covered near the start.",
                "start": 12
            })
        );

        let videos: Value = reqwest::get(format!("{}/videos", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(videos["total"], 1);
        assert_eq!(videos["videos"][0]["chunk_count"], 2);
    }

    #[tokio::test]
    async fn test_missing_fields_is_bad_request() {
        let base = spawn_server(StaticTranscriptSource::new()).await;

        for body in [
            json!({"video_id": "abcdefghijk"}),
            json!({"user_question": "why?"}),
            json!({"video_id": "  ", "user_question": "why?"}),
        ] {
            let (status, body) = post(format!("{}/process", base), body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], MISSING_FIELDS_ERROR);
        }
    }

    #[tokio::test]
    async fn test_ingest_failure_reports_reason() {
        let base = spawn_server(
            StaticTranscriptSource::new().failing_with(TranscriptFailureReason::TranscriptDisabled),
        )
        .await;

        let (status, body) = post(
            format!("{}/process", base),
            json!({"video_id": "abcdefghijk", "user_question": "why?"}),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to process video_id: abcdefghijk.");
        assert_eq!(body["reason"], "transcript_disabled");

        let (status, body) = post(
            format!("{}/ask", base),
            json!({"video_id": "abcdefghijk", "user_question": "why?"}),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Video abcdefghijk has not been indexed.");
        assert!(body["start"].is_null());
    }

    #[tokio::test]
    async fn test_health() {
        let base = spawn_server(StaticTranscriptSource::new()).await;
        let body: Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }
}

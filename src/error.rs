//! Error types for Clipseek.

use crate::transcript::TranscriptFailure;
use thiserror::Error;

/// Library-level error type for Clipseek operations.
#[derive(Error, Debug)]
pub enum ClipseekError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transcript unavailable: {0}")]
    Transcript(#[from] TranscriptFailure),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error("Link construction failed: {0}")]
    Link(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),
}

/// Result type alias for Clipseek operations.
pub type Result<T> = std::result::Result<T, ClipseekError>;

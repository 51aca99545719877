//! Clipseek - question answering over YouTube transcripts
//!
//! Clipseek indexes the transcript of a YouTube video and answers questions
//! about it with a link that starts playback where the answer is given.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `transcript` - Transcript fetching through yt-dlp, with classified failures
//! - `chunking` - Fixed-window transcript chunking
//! - `embedding` - Embedding generation
//! - `vector_store` - Persistent vector index
//! - `retrieval` - MMR retrieval over the index
//! - `rag` - Answer generation and timestamped links
//! - `pipeline` - The ingest and query flows
//! - `orchestrator` - Component wiring from settings
//!
//! # Example
//!
//! ```rust,no_run
//! use clipseek::config::Settings;
//! use clipseek::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = Orchestrator::new(Settings::load()?)?;
//!
//!     let report = orchestrator.ingest("dQw4w9WgXcQ").await?;
//!     println!("Indexed {} chunks", report.chunks_indexed);
//!
//!     let outcome = orchestrator.answer("What is this song about?", "dQw4w9WgXcQ").await;
//!     println!("{}", serde_json::to_string_pretty(&outcome)?);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod openai;
pub mod orchestrator;
pub mod pipeline;
pub mod rag;
pub mod retrieval;
pub mod transcript;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ClipseekError, Result};

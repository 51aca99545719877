//! List command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::vector_store::{SqliteVectorStore, VectorIndex};
use anyhow::Result;

/// Run the list command.
///
/// Reads the index directly, so no API keys are needed.
pub async fn run_list(settings: Settings) -> Result<()> {
    preflight::check(Operation::List, &settings)?;

    let store = SqliteVectorStore::new(&settings.sqlite_path(), &settings.vector_store.collection)?;

    match store.list_videos().await {
        Ok(videos) => {
            if videos.is_empty() {
                Output::info("No videos indexed yet. Use 'clipseek ingest <video>' to add one.");
            } else {
                Output::header(&format!("Indexed Videos ({})", videos.len()));
                println!();

                for video in &videos {
                    Output::video_info(
                        &video.video_id,
                        video.chunk_count,
                        video.last_start_seconds,
                        &video.indexed_at.format("%Y-%m-%d %H:%M").to_string(),
                    );
                }

                let total_chunks: u32 = videos.iter().map(|v| v.chunk_count).sum();
                println!();
                Output::kv("Total videos", &videos.len().to_string());
                Output::kv("Total chunks", &total_chunks.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list videos: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}

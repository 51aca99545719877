//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the ingest command.
pub async fn run_ingest(video: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::for_ingest(settings)?;

    let spinner = Output::spinner(&format!("Indexing {}...", video));
    let result = orchestrator.ingest(video).await;
    spinner.finish_and_clear();

    match result {
        Ok(report) if report.already_indexed => {
            Output::warning(&format!(
                "{} is already indexed ({} chunks).",
                report.video_id, report.chunks_indexed
            ));
        }
        Ok(report) => {
            Output::success(&format!(
                "Indexed {} ({} chunks)",
                report.video_id, report.chunks_indexed
            ));
        }
        Err(failure) => {
            Output::error(&format!("Failed to process {}: {}", video, failure));
            Output::kv("Reason", failure.reason());
            return Err(failure.into());
        }
    }

    Ok(())
}

//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::pipeline::QueryOutcome;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    video: &str,
    question: &str,
    ingest: bool,
    settings: Settings,
) -> Result<()> {
    let mut checks = preflight::check(Operation::Ask, &settings);
    if ingest {
        checks = checks.and_then(|_| preflight::check(Operation::Ingest, &settings));
    }
    if let Err(e) = checks {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    if ingest {
        let spinner = Output::spinner(&format!("Indexing {}...", video));
        let result = orchestrator.ingest(video).await;
        spinner.finish_and_clear();

        if let Err(failure) = result {
            Output::error(&format!("Failed to process {}: {}", video, failure));
            return Err(failure.into());
        }
    }

    let spinner = Output::spinner("Searching transcript...");
    let outcome = orchestrator.answer(question, video).await;
    spinner.finish_and_clear();

    match outcome {
        QueryOutcome::Answered {
            youtube_link,
            answer,
            start,
        } => {
            Output::answer(&answer, &youtube_link, start);
            Ok(())
        }
        QueryOutcome::Failed { error, answer, .. } => {
            if let Some(answer) = answer {
                println!("\n{}\n", answer);
            }
            Output::error(&error);
            Err(anyhow::anyhow!(error))
        }
    }
}

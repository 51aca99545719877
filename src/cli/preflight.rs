//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{ClipseekError, Result};
use crate::openai::resolve_api_key;
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion runs yt-dlp and calls the embedding API only.
    Ingest,
    /// Asking calls both the embedding and the chat API.
    Ask,
    /// Listing only reads the local index.
    List,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    for env_var in required_keys(operation, settings) {
        resolve_api_key(env_var)?;
    }
    if let Operation::Ingest = operation {
        check_tool(&settings.transcript.yt_dlp)?;
    }
    Ok(())
}

/// API-key environment variables an operation needs.
fn required_keys(operation: Operation, settings: &Settings) -> Vec<&str> {
    match operation {
        Operation::Ingest => vec![settings.embedding.api_key_env.as_str()],
        Operation::Ask => vec![
            settings.embedding.api_key_env.as_str(),
            settings.generation.api_key_env.as_str(),
        ],
        Operation::List => Vec::new(),
    }
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(ClipseekError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ClipseekError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(ClipseekError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

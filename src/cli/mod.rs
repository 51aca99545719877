//! CLI module for Clipseek.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Clipseek - ask questions about YouTube videos
///
/// Indexes video transcripts and answers questions with a link to the moment
/// in the video where the answer is given.
#[derive(Parser, Debug)]
#[command(name = "clipseek")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "CLIPSEEK_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch, chunk and index a video's transcript
    Ingest {
        /// YouTube URL or video ID
        video: String,
    },

    /// Ask a question about a video and get a timestamped link
    Ask {
        /// YouTube URL or video ID
        video: String,

        /// The question to ask
        question: String,

        /// Index the video first if it is not indexed yet
        #[arg(short, long)]
        ingest: bool,
    },

    /// List indexed videos
    List,

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the current configuration to the config file
    Init,

    /// Show configuration file path
    Path,
}

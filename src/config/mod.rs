//! Configuration module for Clipseek.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AnswerPrompts, Prompts};
pub use settings::{
    EmbeddingSettings, GeneralSettings, GenerationSettings, PromptSettings, RetrievalSettings,
    ServerSettings, Settings, TranscriptSettings, VectorStoreSettings,
};

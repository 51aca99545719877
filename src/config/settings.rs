//! Configuration settings for Clipseek.

use crate::error::{ClipseekError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub transcript: TranscriptSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub retrieval: RetrievalSettings,
    pub generation: GenerationSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.clipseek".to_string(),
        }
    }
}

/// Transcript fetching and chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptSettings {
    /// Number of consecutive caption segments merged into one chunk.
    pub chunk_size: usize,
    /// Caption languages passed to yt-dlp's `--sub-langs`.
    pub languages: String,
    /// yt-dlp executable name or path.
    pub yt_dlp: String,
}

impl Default for TranscriptSettings {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            languages: "en.*,en".to_string(),
            yt_dlp: "yt-dlp".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Texts per embedding request.
    pub batch_size: usize,
    /// Maximum embedding requests in flight.
    pub max_concurrent: usize,
    /// Base URL of an OpenAI-compatible API (None = OpenAI).
    pub api_base: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            batch_size: 512,
            max_concurrent: 2,
            api_base: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Path to the SQLite index file.
    pub sqlite_path: String,
    /// Name of the single logical collection shared by all videos.
    pub collection: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.clipseek/index.db".to_string(),
            collection: "video_transcripts".to_string(),
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of chunks handed to the generator.
    pub k: usize,
    /// Number of nearest neighbours fetched before MMR re-ranking.
    pub fetch_k: usize,
    /// MMR trade-off: 1.0 = pure relevance, 0.0 = pure diversity.
    pub lambda_mult: f32,
    /// Restrict search to the requested video.
    pub scope_to_video: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            k: 3,
            fetch_k: 5,
            lambda_mult: 0.5,
            scope_to_video: true,
        }
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Chat model used to answer questions.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Base URL of an OpenAI-compatible API.
    pub api_base: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.5,
            api_base: Some("https://api.groq.com/openai/v1".to_string()),
            api_key_env: "GROQ_API_KEY".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Origins allowed to call the API from a browser.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec![
                "http://localhost:8080".to_string(),
                "http://127.0.0.1:8080".to_string(),
            ],
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Check invariants that would otherwise surface mid-request.
    pub fn validate(&self) -> Result<()> {
        if self.transcript.chunk_size == 0 {
            return Err(ClipseekError::Config(
                "transcript.chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.retrieval.k == 0 {
            return Err(ClipseekError::Config(
                "retrieval.k must be greater than 0".to_string(),
            ));
        }
        if self.retrieval.k > self.retrieval.fetch_k {
            return Err(ClipseekError::Config(format!(
                "retrieval.k ({}) must not exceed retrieval.fetch_k ({})",
                self.retrieval.k, self.retrieval.fetch_k
            )));
        }
        if !(0.0..=1.0).contains(&self.retrieval.lambda_mult) {
            return Err(ClipseekError::Config(format!(
                "retrieval.lambda_mult must be within 0.0..=1.0, got {}",
                self.retrieval.lambda_mult
            )));
        }
        if self.vector_store.collection.trim().is_empty() {
            return Err(ClipseekError::Config(
                "vector_store.collection must not be empty".to_string(),
            ));
        }
        if self.embedding.dimensions == 0 || self.embedding.batch_size == 0 {
            return Err(ClipseekError::Config(
                "embedding.dimensions and embedding.batch_size must be greater than 0".to_string(),
            ));
        }
        if self.embedding.max_concurrent == 0 {
            return Err(ClipseekError::Config(
                "embedding.max_concurrent must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ClipseekError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("clipseek")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite index path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.transcript.chunk_size, 10);
        assert_eq!(settings.retrieval.k, 3);
        assert_eq!(settings.retrieval.fetch_k, 5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.transcript.chunk_size = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.retrieval.k = 6;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.retrieval.lambda_mult = 1.5;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.vector_store.collection = "  ".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [retrieval]
            k = 2

            [generation]
            model = "gpt-4o-mini"
            "#,
        )
        .unwrap();

        assert_eq!(settings.retrieval.k, 2);
        assert_eq!(settings.retrieval.fetch_k, 5);
        assert_eq!(settings.generation.model, "gpt-4o-mini");
        assert_eq!(settings.transcript.chunk_size, 10);
    }

    #[test]
    fn test_save_and_load_roundtrip_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.server.port = 9090;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.server.port, 9090);
    }
}

//! Embeddings from an OpenAI-compatible API.

use super::Embedder;
use crate::config::EmbeddingSettings;
use crate::error::{ClipseekError, Result};
use crate::openai::create_client;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, instrument};

/// OpenAI-based embedder.
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    dimensions: usize,
    batch_size: usize,
    max_concurrent: usize,
}

impl OpenAIEmbedder {
    /// Create an embedder from settings and an already resolved API key.
    pub fn from_settings(settings: &EmbeddingSettings, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: create_client(settings.api_base.as_deref(), api_key)?,
            model: settings.model.clone(),
            dimensions: settings.dimensions as usize,
            batch_size: settings.batch_size.max(1),
            max_concurrent: settings.max_concurrent.max(1),
        })
    }

    async fn embed_one_batch(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(input))
            .dimensions(self.dimensions as u32)
            .build()
            .map_err(|e| ClipseekError::Embedding(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| ClipseekError::OpenAI(format!("Embedding API error: {}", e)))?;

        // Sort by index to ensure correct order
        let mut embeddings: Vec<_> = response.data.into_iter().collect();
        embeddings.sort_by_key(|e| e.index);

        Ok(embeddings.into_iter().map(|e| e.embedding).collect())
    }
}

/// Owned request batches of at most `size` texts, in input order.
fn split_batches(texts: &[String], size: usize) -> Vec<Vec<String>> {
    texts.chunks(size.max(1)).map(<[String]>::to_vec).collect()
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ClipseekError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        // Batches run concurrently up to the limit; `buffered` keeps input order
        let batches: Vec<Vec<Vec<f32>>> = stream::iter(split_batches(texts, self.batch_size))
            .map(|batch| self.embed_one_batch(batch))
            .buffered(self.max_concurrent)
            .try_collect()
            .await?;

        let all_embeddings: Vec<Vec<f32>> = batches.into_iter().flatten().collect();

        if all_embeddings.len() != texts.len() {
            return Err(ClipseekError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                all_embeddings.len()
            )));
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_creation() {
        let embedder = OpenAIEmbedder::from_settings(&EmbeddingSettings::default(), "test-key")
            .unwrap();
        assert_eq!(embedder.dimensions(), 1536);
        assert_eq!(embedder.batch_size, 512);

        let settings = EmbeddingSettings {
            model: "text-embedding-3-large".to_string(),
            dimensions: 3072,
            batch_size: 0,
            ..EmbeddingSettings::default()
        };
        let embedder = OpenAIEmbedder::from_settings(&settings, "test-key").unwrap();
        assert_eq!(embedder.dimensions(), 3072);
        assert_eq!(embedder.batch_size, 1);
    }

    #[test]
    fn test_split_batches_keeps_order() {
        let texts: Vec<String> = (0..5).map(|i| format!("t{}", i)).collect();
        let batches = split_batches(&texts, 2);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], vec!["t0", "t1"]);
        assert_eq!(batches[2], vec!["t4"]);
        assert_eq!(batches.concat(), texts);
        assert_eq!(split_batches(&texts, 0).len(), 5);
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let embedder = OpenAIEmbedder::from_settings(&EmbeddingSettings::default(), "test-key")
            .unwrap();
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }
}

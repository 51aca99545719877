//! Chat-completion backend for answer generation.

use crate::config::GenerationSettings;
use crate::error::{ClipseekError, Result};
use crate::openai::create_client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// A generative model that turns a system and user prompt into text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Chat model reached through an OpenAI-compatible endpoint.
pub struct OpenAIChatModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIChatModel {
    /// Build from generation settings and an already resolved API key.
    pub fn from_settings(settings: &GenerationSettings, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: create_client(settings.api_base.as_deref(), api_key)?,
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    #[instrument(skip(self, system, user), fields(model = %self.model))]
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| ClipseekError::Generation(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| ClipseekError::Generation(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| ClipseekError::Generation(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            ClipseekError::OpenAI(format!("Failed to generate response: {}", e))
        })?;

        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| ClipseekError::Generation("Empty response from model".to_string()))?
            .clone();

        debug!("Model returned {} characters", text.len());
        Ok(text)
    }
}

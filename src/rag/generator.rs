//! Timestamped answer generation.

use super::chat::ChatModel;
use crate::config::Prompts;
use crate::error::{ClipseekError, Result};
use crate::retrieval::RetrievedChunk;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Answer text reported when generation fails.
pub const GENERATION_FAILED_ANSWER: &str = "Error occurred";

/// The model's answer and the offset (seconds) it is best supported at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    #[serde(default)]
    pub start_value: Option<f64>,
    /// Set only on the value produced when generation itself failed.
    #[serde(skip)]
    failed: bool,
}

impl AnswerResult {
    /// The value returned in place of an answer when the model call or parsing failed.
    pub fn generation_failed() -> Self {
        Self {
            answer: GENERATION_FAILED_ANSWER.to_string(),
            start_value: None,
            failed: true,
        }
    }

    /// Whether this is the fallback value rather than a model answer, even one
    /// whose text happens to read "Error occurred".
    pub fn is_generation_failure(&self) -> bool {
        self.failed
    }
}

/// Asks a chat model for a JSON answer grounded in retrieved chunks.
pub struct AnswerGenerator {
    model: Arc<dyn ChatModel>,
    prompts: Prompts,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            prompts: Prompts::default(),
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Generate an answer. Never fails: any error becomes [`AnswerResult::generation_failed`].
    #[instrument(skip(self, context), fields(chunks = context.len()))]
    pub async fn generate(&self, question: &str, context: &[RetrievedChunk]) -> AnswerResult {
        match self.try_generate(question, context).await {
            Ok(result) => {
                info!("Generated answer, start value {:?}", result.start_value);
                result
            }
            Err(e) => {
                error!("Answer generation failed: {}", e);
                AnswerResult::generation_failed()
            }
        }
    }

    async fn try_generate(
        &self,
        question: &str,
        context: &[RetrievedChunk],
    ) -> Result<AnswerResult> {
        let user_prompt = self.build_user_prompt(question, context);
        let raw = self
            .model
            .complete(&self.prompts.answer.system, &user_prompt)
            .await?;
        debug!("Raw model output: {}", raw);
        parse_answer(&raw)
    }

    fn build_user_prompt(&self, question: &str, context: &[RetrievedChunk]) -> String {
        let mut vars = HashMap::new();
        vars.insert(
            "format_instructions".to_string(),
            self.prompts.answer.format_instructions.clone(),
        );
        vars.insert("context".to_string(), format_context(context));
        vars.insert("question".to_string(), question.to_string());

        self.prompts.render_with_custom(&self.prompts.answer.user, &vars)
    }
}

/// Render retrieved chunks for the prompt, each labelled with its offsets.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return "(no relevant transcript excerpts found)".to_string();
    }

    chunks
        .iter()
        .map(|c| {
            format!(
                "[start: {}, duration: {}]\n{}",
                c.metadata.start, c.metadata.duration, c.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Parse model output as `{"answer": string, "start_value": number | null}`.
///
/// A surrounding markdown code fence and text around the JSON object are tolerated.
pub fn parse_answer(raw: &str) -> Result<AnswerResult> {
    let body = strip_code_fence(raw.trim());

    match serde_json::from_str::<AnswerResult>(body) {
        Ok(result) => Ok(result),
        Err(first_err) => {
            let object = match (body.find('{'), body.rfind('}')) {
                (Some(open), Some(close)) if open < close => &body[open..=close],
                _ => {
                    return Err(ClipseekError::Generation(format!(
                        "Model output is not JSON: {}",
                        first_err
                    )))
                }
            };
            serde_json::from_str(object).map_err(|e| {
                ClipseekError::Generation(format!("Model output does not match schema: {}", e))
            })
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an info string such as `json`
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

//! Prompt templates for Clipseek.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub answer: AnswerPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for timestamped answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerPrompts {
    pub system: String,
    pub user: String,
    pub format_instructions: String,
}

impl Default for AnswerPrompts {
    fn default() -> Self {
        Self {
            system: r#"You answer questions about a single video using excerpts from its transcript.
Every excerpt is labelled with the second offset ('start') where it begins in the video.
Only use the excerpts. If they do not contain the answer, say so in the answer text."#
                .to_string(),

            user: r#"Answer the user query and give a detailed explanation to the reasoning for your 'answer'. You MUST provide the 'start' value associated to the best answer.
{{format_instructions}}
Context:
{{context}}
Question: {{question}}
"#
            .to_string(),

            format_instructions: r#"The output should be formatted as a JSON instance that conforms to the JSON schema below.

Here is the output schema:
```
{"properties": {"answer": {"title": "Answer", "description": "The detailed response to the question", "type": "string"}, "start_value": {"title": "Start Value", "description": "The 'start' value associated with the best answer", "type": "number"}}, "required": ["answer", "start_value"]}
```
Respond with the JSON object only."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let answer_path = custom_path.join("answer.toml");
            if answer_path.exists() {
                let content = std::fs::read_to_string(&answer_path)?;
                prompts.answer = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are substituted in a single left-to-right pass; substituted
    /// values are never scanned again, so a `{{name}}` inside a value stays literal.
    /// Unknown placeholders are left as they are.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find("{{") {
            result.push_str(&rest[..open]);
            let after = &rest[open + 2..];

            let Some(close) = after.find("}}") else {
                rest = &rest[open..];
                break;
            };

            let name = &after[..close];
            let is_name = !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

            match vars.get(name).filter(|_| is_name) {
                Some(value) => {
                    result.push_str(value);
                    rest = &after[close + 2..];
                }
                None if is_name => {
                    result.push_str(&rest[open..open + 2 + close + 2]);
                    rest = &after[close + 2..];
                }
                None => {
                    result.push_str("{{");
                    rest = after;
                }
            }
        }

        result.push_str(rest);
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.answer.user.contains("{{context}}"));
        assert!(prompts.answer.user.contains("{{question}}"));
        assert!(prompts.answer.format_instructions.contains("start_value"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = std::collections::HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_render_does_not_expand_substituted_values() {
        let template = "{{format_instructions}}\nContext:\n{{context}}\nQuestion: {{question}}";
        let mut vars = std::collections::HashMap::new();
        vars.insert("format_instructions".to_string(), "JSON please".to_string());
        vars.insert("context".to_string(), "SECRET_TRANSCRIPT".to_string());
        vars.insert(
            "question".to_string(),
            "what does {{context}} mean in {{format_instructions}}?".to_string(),
        );

        let expected = "JSON please\nContext:\nSECRET_TRANSCRIPT\n\
                        Question: what does {{context}} mean in {{format_instructions}}?";
        for _ in 0..50 {
            assert_eq!(Prompts::render(template, &vars), expected);
        }
    }

    #[test]
    fn test_render_keeps_unknown_and_malformed_placeholders() {
        let mut vars = std::collections::HashMap::new();
        vars.insert("name".to_string(), "Ada".to_string());

        assert_eq!(Prompts::render("{{missing}} {{name}}", &vars), "{{missing}} Ada");
        assert_eq!(Prompts::render("{{ {{name}}", &vars), "{{ Ada");
        assert_eq!(Prompts::render("{\"a\": 1} {{name", &vars), "{\"a\": 1} {{name");
        assert_eq!(Prompts::render("", &vars), "");
    }

    #[test]
    fn test_custom_answer_prompt_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("answer.toml"),
            "system = \"be brief\"\nuser = \"Q: {{question}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.answer.system, "be brief");
        assert_eq!(prompts.answer.user, "Q: {{question}}");
        // Unspecified fields fall back to defaults
        assert!(prompts.answer.format_instructions.contains("start_value"));
    }
}

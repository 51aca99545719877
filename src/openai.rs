//! Client construction for OpenAI-compatible APIs.
//!
//! Both the embedding provider and the chat model speak the OpenAI wire format,
//! so they share one constructor that takes an optional base URL and a resolved key.

use crate::error::{ClipseekError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create a client with the default timeout.
pub fn create_client(api_base: Option<&str>, api_key: &str) -> Result<Client<OpenAIConfig>> {
    create_client_with_timeout(api_base, api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create a client with a custom timeout.
pub fn create_client_with_timeout(
    api_base: Option<&str>,
    api_key: &str,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ClipseekError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base) = api_base.filter(|b| !b.is_empty()) {
        config = config.with_api_base(base);
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}

/// Read an API key from the named environment variable.
///
/// Called once at startup so a missing key fails fast instead of mid-request.
pub fn resolve_api_key(env_var: &str) -> Result<String> {
    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        Ok(_) => Err(ClipseekError::Config(format!(
            "{} is empty. Set it with: export {}='...'",
            env_var, env_var
        ))),
        Err(_) => Err(ClipseekError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            env_var, env_var
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_missing_key() {
        let err = resolve_api_key("CLIPSEEK_TEST_SURELY_UNSET_KEY").unwrap_err();
        assert!(err.to_string().contains("not set"));
    }

    #[test]
    fn test_client_with_custom_base() {
        assert!(create_client(Some("https://api.groq.com/openai/v1"), "test-key").is_ok());
        assert!(create_client(None, "test-key").is_ok());
    }
}

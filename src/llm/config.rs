//! Completion client configuration from the environment

use crate::error::CompletionError;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.swisscom.com/layer/swiss-ai-weeks/apertus-70b/v1";
pub const DEFAULT_MODEL: &str = "swiss-ai/Apertus-70B";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Client-side timeout for one round trip
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Read `LLM_API_KEY`, `LLM_BASE_URL`, `LLM_MODEL` and `LLM_TIMEOUT_SECS`,
    /// loading a `.env` file first if one exists.
    pub fn from_env() -> Result<Self, CompletionError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, CompletionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("LLM_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CompletionError::Config("LLM_API_KEY environment variable required".into()))?;

        let base_url = lookup("LLM_BASE_URL")
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(CompletionError::Config(
                "LLM_BASE_URL must start with http:// or https://".into(),
            ));
        }

        let model = lookup("LLM_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout_secs = match lookup("LLM_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                CompletionError::Config("LLM_TIMEOUT_SECS must be a whole number of seconds".into())
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        log::debug!("Completion endpoint: {} (model {})", base_url, model);

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

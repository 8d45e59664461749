//! OpenAI-compatible chat completion client over blocking HTTP

use super::{CompletionRequest, CompletionService, LlmConfig};
use crate::error::CompletionError;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for a `/chat/completions` endpoint
#[derive(Clone)]
pub struct ChatCompletionClient {
    client: Client,
    config: LlmConfig,
}

impl ChatCompletionClient {
    pub fn new(config: LlmConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Build a client from `LLM_*` environment variables
    pub fn from_env() -> Result<Self, CompletionError> {
        Self::new(LlmConfig::from_env()?)
    }

    fn messages<'a>(request: &'a CompletionRequest) -> Vec<ChatMessage<'a>> {
        let mut messages = Vec::with_capacity(2);
        if !request.system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: &request.system_prompt,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });
        messages
    }
}

impl CompletionService for ChatCompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = ChatRequest {
            model: &self.config.model,
            messages: Self::messages(request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        log::debug!("Making completion request to {}", url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()?;

        if let Some(remaining) = response
            .headers()
            .get("x-ratelimit-remaining-tokens")
            .and_then(|v| v.to_str().ok())
        {
            log::info!("Remaining tokens: {}", remaining);
        }

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let message = response.text().unwrap_or_default();
            log::error!("Rate limit exceeded: {}", message);
            return Err(CompletionError::RateLimitExceeded(message));
        }
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("Completion service returned {}: {}", status, message);
            return Err(CompletionError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response.json()?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(CompletionError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_include_system_prompt_first() {
        let request = CompletionRequest {
            prompt: "Create a persona".to_string(),
            system_prompt: "Respond with JSON".to_string(),
            temperature: 0.7,
            max_tokens: 3000,
        };
        let messages = ChatCompletionClient::messages(&request);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].content, "Create a persona");
    }

    #[test]
    fn test_empty_system_prompt_omitted() {
        let request = CompletionRequest {
            prompt: "hi".to_string(),
            system_prompt: String::new(),
            temperature: 0.0,
            max_tokens: 10,
        };
        let messages = ChatCompletionClient::messages(&request);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"{\"a\":1}"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("{\"a\":1}"));

        let empty: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.choices.is_empty());
    }
}

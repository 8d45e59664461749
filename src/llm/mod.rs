//! Completion service contract and the HTTP chat-completion client

mod client;
mod config;

pub use client::ChatCompletionClient;
pub use config::LlmConfig;

use crate::error::CompletionError;

/// One text-completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system_prompt: String,
    /// Sampling temperature in [0, 1]
    pub temperature: f64,
    pub max_tokens: u32,
}

/// A black-box text generator.
///
/// Implementations must be shareable across worker threads. Errors are
/// surfaced as-is; callers do not retry.
pub trait CompletionService: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

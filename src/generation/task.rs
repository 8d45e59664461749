//! Single persona generation: prompt, rate-limited completion, sanitizing

use super::params::BankingParameters;
use super::prompt::PromptTemplate;
use super::rate_limiter::RateLimiter;
use super::sanitizer::{sanitize, PersonaRecord};
use crate::demographics::DemographicSample;
use crate::error::GenerationError;
use crate::llm::{CompletionRequest, CompletionService};
use crate::store::PersonaEntry;
use serde::{Deserialize, Serialize};

/// Inputs for one persona, owned by exactly one worker
#[derive(Debug, Clone)]
pub struct GenerationTask {
    /// 0-based position in the requested batch
    pub index: usize,
    pub sample: DemographicSample,
    pub params: BankingParameters,
}

/// A failed task, with enough detail to retry just that one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub index: usize,
    pub message: String,
}

impl TaskFailure {
    pub fn new(index: usize, error: &GenerationError) -> Self {
        Self {
            index,
            message: format!("Error generating persona {}: {}", index + 1, error),
        }
    }
}

/// Outcome of one task
#[derive(Debug, Clone)]
pub enum TaskResult {
    Success { index: usize, entry: Box<PersonaEntry> },
    Failure(TaskFailure),
}

/// Generates one persona record through a shared limiter and completion service
pub struct PersonaTask<'a> {
    service: &'a dyn CompletionService,
    limiter: &'a RateLimiter,
    template: &'a PromptTemplate,
    temperature: f64,
    max_tokens: u32,
}

impl<'a> PersonaTask<'a> {
    pub fn new(
        service: &'a dyn CompletionService,
        limiter: &'a RateLimiter,
        template: &'a PromptTemplate,
        temperature: f64,
        max_tokens: u32,
    ) -> Self {
        Self {
            service,
            limiter,
            template,
            temperature,
            max_tokens,
        }
    }

    /// Build the request for one sample; no side effects
    pub fn request(&self, sample: &DemographicSample, params: &BankingParameters) -> CompletionRequest {
        CompletionRequest {
            prompt: self.template.render(sample, params),
            system_prompt: self.template.system_prompt.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    pub fn run(
        &self,
        sample: &DemographicSample,
        params: &BankingParameters,
    ) -> Result<PersonaRecord, GenerationError> {
        let request = self.request(sample, params);

        self.limiter.acquire();
        let raw = self.service.complete(&request)?;

        Ok(sanitize(&raw)?)
    }
}

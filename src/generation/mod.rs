//! Persona generation: prompts, rate limiting, response sanitizing and batch dispatch

mod dispatcher;
mod params;
mod prompt;
mod rate_limiter;
mod sanitizer;
mod task;

pub use dispatcher::{BatchDispatcher, BatchOutcome, CancellationToken, DispatchConfig, ProgressFn};
pub(crate) use dispatcher::panic_message;
pub use params::{
    BankingParameters, DisposableIncome, FinancialExperience, NetWorth, ParameterMode, Tenure,
};
pub use prompt::PromptTemplate;
pub use rate_limiter::RateLimiter;
pub use sanitizer::{sanitize, PersonaRecord};
pub use task::{GenerationTask, PersonaTask, TaskFailure, TaskResult};

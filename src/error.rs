//! Error types for persona generation, lifecycle projection and batch storage

use thiserror::Error;

/// Failure reported by a completion service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompletionError {
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Completion service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("Completion request failed: {0}")]
    Transport(String),

    #[error("Completion service returned no content")]
    EmptyResponse,

    #[error("Completion client misconfigured: {0}")]
    Config(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        CompletionError::Transport(err.to_string())
    }
}

/// Model output that could not be coerced into a JSON object, even after repair.
///
/// `line`/`column` and `message` come from the first strict parse attempt;
/// `candidate` is the cleaned text that was handed to the parser.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Malformed response at line {line}, column {column}: {message}")]
pub struct MalformedResponse {
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub candidate: String,
}

/// Failure while generating a single persona
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Malformed(#[from] MalformedResponse),

    #[error("No demographic sample matches the active filters")]
    NoDemographicSample,

    #[error("Batch was cancelled before this task started")]
    Cancelled,

    #[error("Task panicked: {0}")]
    Panicked(String),
}

/// Failure while projecting one persona's lifecycle
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid value for '{field}': {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Whole-batch failure; per-task failures never surface here
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Failure reading or writing batch and sample files
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

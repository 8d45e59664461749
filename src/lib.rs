//! Persona Forge - rate-limited batch generation of synthetic banking personas
//!
//! This library provides:
//! - Census-style demographic sampling and filtering
//! - Prompt rendering and a blocking chat-completion client
//! - A bounded, rate-limited batch dispatcher with per-task failure isolation
//! - Repair and validation of model JSON output
//! - Deterministic lifecycle projections from birth to life expectancy
//! - Batch persistence and lifecycle enrichment of saved batches
//! - In-character chat with saved personas, one-to-one or batch-wide

pub mod chat;
pub mod demographics;
pub mod error;
pub mod generation;
pub mod lifecycle;
pub mod llm;
pub mod store;

// Re-export commonly used types
pub use chat::{ask_batch, persona_system_prompt, ChatReply, ChatTurn};
pub use demographics::{DemographicFilter, DemographicPool, DemographicSample, DemographicSource};
pub use error::{CompletionError, DispatchError, GenerationError, MalformedResponse, ProjectionError, StoreError};
pub use generation::{
    sanitize, BankingParameters, BatchDispatcher, BatchOutcome, DispatchConfig, ParameterMode,
    PromptTemplate, RateLimiter,
};
pub use lifecycle::{enrich_batch, LifecycleConfig, LifecycleInput, LifecycleProjector, LifecycleTrajectory};
pub use llm::{ChatCompletionClient, CompletionRequest, CompletionService, LlmConfig};
pub use store::{Batch, BatchStore, PersonaEntry};

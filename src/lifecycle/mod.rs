//! Lifecycle projection: year-by-year income, expenses, savings and assets for one persona

mod engine;
mod enrich;
mod input;
mod regional;
mod trajectory;

pub use engine::{LifecycleConfig, LifecycleProjector};
pub use enrich::{enrich_batch, EnrichmentReport, SkippedPersona};
pub use input::LifecycleInput;
pub use regional::{cost_of_living_multiplier, education_multiplier};
pub use trajectory::{LifeStage, LifecycleTrajectory, Milestone, RetirementProjection, YearRecord};

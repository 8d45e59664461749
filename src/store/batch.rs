//! Persisted batch file layout

use crate::demographics::{DemographicFilter, DemographicSample};
use super::timestamp;
use crate::generation::{BankingParameters, BatchOutcome, ParameterMode, PersonaRecord};
use crate::lifecycle::LifecycleTrajectory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One generated persona with the inputs that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaEntry {
    /// 0-based position in the requested batch
    #[serde(default)]
    pub index: usize,

    pub persona: PersonaRecord,

    #[serde(default)]
    pub source_data: DemographicSample,

    #[serde(default)]
    pub parameters_used: BankingParameters,

    #[serde(deserialize_with = "timestamp::deserialize")]
    pub generated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<LifecycleTrajectory>,
}

impl PersonaEntry {
    pub fn new(
        index: usize,
        persona: PersonaRecord,
        source_data: DemographicSample,
        parameters_used: BankingParameters,
    ) -> Self {
        Self {
            index,
            persona,
            source_data,
            parameters_used,
            generated_at: Utc::now(),
            lifecycle: None,
        }
    }

    /// Display name from the persona record, if the model supplied one
    pub fn name(&self) -> Option<&str> {
        self.persona
            .get("name")
            .or_else(|| self.persona.get("basic_info").and_then(|info| info.get("name")))
            .and_then(|name| name.as_str())
    }
}

/// Batch-level facts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMetadata {
    pub batch_id: Uuid,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub generated_at: DateTime<Utc>,
    /// Zero when the file predates the field; see `Batch::fill_missing_counts`
    #[serde(default)]
    pub requested_count: usize,
    #[serde(default)]
    pub total_personas: usize,
    #[serde(default)]
    pub filters_used: DemographicFilter,
    #[serde(default, alias = "additional_params")]
    pub parameter_mode: ParameterMode,
}

/// A saved batch: metadata, successful personas in submission order, and failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub metadata: BatchMetadata,
    pub personas: Vec<PersonaEntry>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub lifecycle_enhanced: bool,
}

impl Batch {
    pub fn from_outcome(
        outcome: BatchOutcome,
        requested_count: usize,
        filters_used: DemographicFilter,
        parameter_mode: ParameterMode,
    ) -> Self {
        let errors = outcome.errors();
        Self {
            metadata: BatchMetadata {
                batch_id: Uuid::new_v4(),
                generated_at: Utc::now(),
                requested_count,
                total_personas: outcome.personas.len(),
                filters_used,
                parameter_mode,
            },
            personas: outcome.personas,
            errors,
            lifecycle_enhanced: false,
        }
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    /// Older files carry no `requested_count` and may omit `total_personas`
    pub(crate) fn fill_missing_counts(&mut self) {
        if self.metadata.total_personas == 0 {
            self.metadata.total_personas = self.personas.len();
        }
        if self.metadata.requested_count == 0 {
            self.metadata.requested_count = self.metadata.total_personas + self.errors.len();
        }
    }
}

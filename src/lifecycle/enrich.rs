//! Attach lifecycle trajectories to a loaded batch

use super::engine::LifecycleProjector;
use crate::error::ProjectionError;
use crate::store::Batch;
use rayon::prelude::*;

/// A persona left unenriched
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPersona {
    /// Position in the batch's persona list
    pub position: usize,
    pub name: Option<String>,
    pub error: ProjectionError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentReport {
    pub enriched: usize,
    pub skipped: Vec<SkippedPersona>,
}

/// Project every persona in parallel. Failures leave the entry untouched.
pub fn enrich_batch(batch: &mut Batch, projector: &LifecycleProjector) -> EnrichmentReport {
    let outcomes: Vec<Option<SkippedPersona>> = batch
        .personas
        .par_iter_mut()
        .enumerate()
        .map(|(position, entry)| match projector.project_entry(entry) {
            Ok(trajectory) => {
                entry.lifecycle = Some(trajectory);
                None
            }
            Err(error) => Some(SkippedPersona {
                position,
                name: entry.name().map(str::to_string),
                error,
            }),
        })
        .collect();

    let skipped: Vec<SkippedPersona> = outcomes.into_iter().flatten().collect();
    for skip in &skipped {
        log::warn!(
            "Skipping lifecycle for persona {} ({}): {}",
            skip.position + 1,
            skip.name.as_deref().unwrap_or("Unknown"),
            skip.error
        );
    }

    batch.lifecycle_enhanced = true;
    let report = EnrichmentReport {
        enriched: batch.personas.len() - skipped.len(),
        skipped,
    };
    log::info!(
        "Enriched {} personas with lifecycle data ({} skipped)",
        report.enriched,
        report.skipped.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demographics::{DemographicFilter, DemographicSample};
    use crate::generation::{BankingParameters, BatchOutcome, ParameterMode, PersonaRecord};
    use crate::store::PersonaEntry;
    use serde_json::{json, Value};

    fn entry(index: usize, persona: Value) -> PersonaEntry {
        let persona: PersonaRecord = match persona {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        PersonaEntry::new(index, persona, DemographicSample::default(), BankingParameters::default())
    }

    fn batch(personas: Vec<PersonaEntry>) -> Batch {
        let outcome = BatchOutcome {
            personas,
            failures: Vec::new(),
        };
        Batch::from_outcome(outcome, 3, DemographicFilter::default(), ParameterMode::default())
    }

    #[test]
    fn test_failed_projection_keeps_original_entry() {
        let mut batch = batch(vec![
            entry(0, json!({"name": "Anna", "age": 31, "annual_income": 72000, "current_assets": 15000})),
            entry(1, json!({"name": "Reto", "annual_income": 50000})),
            entry(2, json!({"basic_info": {"age": 58}, "financial": {"annual_income": 120000}})),
        ]);
        let original = batch.personas[1].clone();

        let report = enrich_batch(&mut batch, &LifecycleProjector::default());

        assert_eq!(report.enriched, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].position, 1);
        assert_eq!(report.skipped[0].name.as_deref(), Some("Reto"));
        assert_eq!(report.skipped[0].error, ProjectionError::MissingField("age"));

        assert!(batch.lifecycle_enhanced);
        assert_eq!(batch.personas[1], original);

        let anna = batch.personas[0].lifecycle.as_ref().unwrap();
        assert_eq!(anna.current_age, 31);
        assert_eq!(anna.anchor().unwrap().cumulative_assets, 15000.0);
        assert_eq!(batch.personas[2].lifecycle.as_ref().unwrap().current_age, 58);
    }

    #[test]
    fn test_enriched_batch_serializes_lifecycle() {
        let mut batch = batch(vec![entry(0, json!({"age": 40, "annual_income": 90000}))]);
        enrich_batch(&mut batch, &LifecycleProjector::default());

        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["lifecycle_enhanced"], true);
        let lifecycle = &json["personas"][0]["lifecycle"];
        assert_eq!(lifecycle["current_age"], 40);
        assert_eq!(lifecycle["annual_trajectory"].as_array().unwrap().len(), 84);
        assert!(lifecycle["retirement_projections"].is_object());
    }

    #[test]
    fn test_empty_batch() {
        let mut batch = batch(Vec::new());
        let report = enrich_batch(&mut batch, &LifecycleProjector::default());
        assert_eq!(report, EnrichmentReport::default());
        assert!(batch.lifecycle_enhanced);
    }
}

//! Demographic samples, filters and the sampling source used by persona generation

mod filter;
mod loader;
mod sample;

pub use filter::{columns, AgeBand, DemographicFilter, GenderFilter, IncomeBand};
pub use loader::{load_samples, load_samples_from_reader};
pub use sample::{AttributeValue, DemographicSample};

use rand::seq::SliceRandom;
use std::collections::BTreeSet;

/// Anything that can hand out one demographic sample per persona
pub trait DemographicSource: Send + Sync {
    /// Draw one sample, or `None` if nothing is available
    fn draw(&self) -> Option<DemographicSample>;

    /// Draw the sample for the task at `index`. Sources that replay a fixed
    /// list can key on the position; the default ignores it.
    fn draw_for(&self, _index: usize) -> Option<DemographicSample> {
        self.draw()
    }
}

/// Distinct values offered for the text filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    pub cantons: Vec<String>,
    pub education_levels: Vec<String>,
    pub occupations: Vec<String>,
    pub language_regions: Vec<String>,
}

/// In-memory pool of samples, drawn uniformly at random
#[derive(Debug, Clone, Default)]
pub struct DemographicPool {
    samples: Vec<DemographicSample>,
}

impl DemographicPool {
    pub fn new(samples: Vec<DemographicSample>) -> Self {
        Self { samples }
    }

    /// Pool restricted to samples matching `filter`
    pub fn filtered(&self, filter: &DemographicFilter) -> Self {
        let samples: Vec<_> = self
            .samples
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        log::info!(
            "Filter applied: {} of {} samples match",
            samples.len(),
            self.samples.len()
        );
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[DemographicSample] {
        &self.samples
    }

    /// Sorted distinct values of the text filter columns
    pub fn filter_options(&self) -> FilterOptions {
        let distinct = |column: &str| -> Vec<String> {
            self.samples
                .iter()
                .filter_map(|s| s.display(column))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        };

        FilterOptions {
            cantons: distinct(columns::CANTON),
            education_levels: distinct(columns::EDUCATION),
            occupations: distinct(columns::OCCUPATION),
            language_regions: distinct(columns::LANGUAGE_REGION),
        }
    }
}

impl DemographicSource for DemographicPool {
    fn draw(&self) -> Option<DemographicSample> {
        self.samples.choose(&mut rand::thread_rng()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> DemographicPool {
        let csv = "alter,kanton,ausbildung\n\
                   30,Bern,Tertiaerstufe\n\
                   45,Zürich,Sekundarstufe II\n\
                   52,Bern,Sekundarstufe II\n";
        DemographicPool::new(load_samples_from_reader(csv.as_bytes()).unwrap())
    }

    #[test]
    fn test_draw_from_empty_pool() {
        assert!(DemographicPool::default().draw().is_none());
    }

    #[test]
    fn test_draw_returns_member() {
        let pool = pool();
        for _ in 0..20 {
            let drawn = pool.draw().unwrap();
            assert!(pool.samples().contains(&drawn));
        }
    }

    #[test]
    fn test_filtered_pool() {
        let filter = DemographicFilter {
            canton: Some("Bern".to_string()),
            ..Default::default()
        };
        let bern = pool().filtered(&filter);
        assert_eq!(bern.len(), 2);
        assert!(bern.samples().iter().all(|s| s.text("kanton") == Some("Bern")));
    }

    #[test]
    fn test_filter_options_sorted_and_distinct() {
        let options = pool().filter_options();
        assert_eq!(options.cantons, vec!["Bern", "Zürich"]);
        assert_eq!(options.education_levels, vec!["Sekundarstufe II", "Tertiaerstufe"]);
        assert!(options.occupations.is_empty());
    }
}

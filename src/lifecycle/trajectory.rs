//! Trajectory output types for lifecycle projections

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed age band a projected year falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeStage {
    Childhood,
    Education,
    EarlyCareer,
    CareerGrowth,
    PeakCareer,
    Retirement,
}

impl LifeStage {
    /// Stage for an integer age: 0-17, 18-24, 25-34, 35-49, 50-64, 65+
    pub fn for_age(age: u32) -> Self {
        match age {
            0..=17 => LifeStage::Childhood,
            18..=24 => LifeStage::Education,
            25..=34 => LifeStage::EarlyCareer,
            35..=49 => LifeStage::CareerGrowth,
            50..=64 => LifeStage::PeakCareer,
            _ => LifeStage::Retirement,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifeStage::Childhood => "childhood",
            LifeStage::Education => "education",
            LifeStage::EarlyCareer => "early_career",
            LifeStage::CareerGrowth => "career_growth",
            LifeStage::PeakCareer => "peak_career",
            LifeStage::Retirement => "retirement",
        }
    }
}

impl fmt::Display for LifeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One projected year. Amounts are whole CHF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearRecord {
    pub age: u32,

    pub annual_income: f64,

    /// Includes the regional adjustment and any life-event costs
    pub annual_expenses: f64,

    /// Income minus expenses minus pension contributions; may be negative
    pub annual_savings: f64,

    /// Mandatory pension contribution, zero before the contribution start age
    pub pension_contributions: f64,

    pub cumulative_assets: f64,

    pub life_stage: LifeStage,

    /// Label of the last life event that touched this year
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub life_event: Option<String>,
}

/// Named asset threshold, recorded at the first age it is crossed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub age: u32,
    pub milestone: String,
    pub value: f64,
    pub description: String,
}

/// Retirement readiness derived from a trajectory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetirementProjection {
    pub retirement_age: u32,

    /// Assets in the first retirement year
    pub projected_retirement_assets: f64,

    /// Safe withdrawal from projected assets over average working income
    pub income_replacement_ratio: f64,

    pub years_to_retirement: u32,

    pub monthly_retirement_income: f64,
}

/// Full projection for one persona, birth to life expectancy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleTrajectory {
    pub current_age: u32,
    pub projected_life_expectancy: f64,
    pub annual_trajectory: Vec<YearRecord>,
    pub life_milestones: Vec<Milestone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retirement_projections: Option<RetirementProjection>,
}

impl LifecycleTrajectory {
    /// Record for an integer age, if it falls inside the trajectory
    pub fn year(&self, age: u32) -> Option<&YearRecord> {
        // One record per age starting at 0
        self.annual_trajectory
            .get(age as usize)
            .filter(|record| record.age == age)
    }

    /// Record at the persona's current age
    pub fn anchor(&self) -> Option<&YearRecord> {
        self.year(self.current_age)
    }

    pub fn milestone(&self, name: &str) -> Option<&Milestone> {
        self.life_milestones.iter().find(|m| m.milestone == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_boundaries() {
        assert_eq!(LifeStage::for_age(0), LifeStage::Childhood);
        assert_eq!(LifeStage::for_age(17), LifeStage::Childhood);
        assert_eq!(LifeStage::for_age(18), LifeStage::Education);
        assert_eq!(LifeStage::for_age(24), LifeStage::Education);
        assert_eq!(LifeStage::for_age(25), LifeStage::EarlyCareer);
        assert_eq!(LifeStage::for_age(35), LifeStage::CareerGrowth);
        assert_eq!(LifeStage::for_age(50), LifeStage::PeakCareer);
        assert_eq!(LifeStage::for_age(64), LifeStage::PeakCareer);
        assert_eq!(LifeStage::for_age(65), LifeStage::Retirement);
        assert_eq!(LifeStage::for_age(99), LifeStage::Retirement);
    }

    #[test]
    fn test_year_record_serialization() {
        let record = YearRecord {
            age: 30,
            annual_income: 85000.0,
            annual_expenses: 60000.0,
            annual_savings: 10550.0,
            pension_contributions: 14450.0,
            cumulative_assets: 120000.0,
            life_stage: LifeStage::EarlyCareer,
            life_event: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["life_stage"], "early_career");
        assert!(json.get("life_event").is_none());

        let back: YearRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}

//! Lifecycle projection engine: one forward pass from birth to life expectancy

use super::input::LifecycleInput;
use super::regional::{cost_of_living_multiplier, education_multiplier};
use super::trajectory::{LifeStage, LifecycleTrajectory, Milestone, RetirementProjection, YearRecord};
use crate::error::ProjectionError;
use crate::store::PersonaEntry;

/// Part-time income during the education years
const EDUCATION_INCOME: f64 = 15_000.0;

/// Living costs during the education years, before the regional adjustment
const EDUCATION_EXPENSES: f64 = 20_000.0;

/// Growth-phase income factor ceiling. The factor starts at 1.0, so growth-phase
/// income stays at the starting level until the peak-career step.
const CAREER_GROWTH_CAP: f64 = 1.0;

/// Peak-career income factor
const PEAK_CAREER_FACTOR: f64 = 1.2;

const MARRIAGE_COST: f64 = 15_000.0;
const FIRST_CHILD_COST: f64 = 20_000.0;
const SECOND_CHILD_COST: f64 = 15_000.0;
const ONGOING_CHILD_COST: f64 = 25_000.0;
const HOME_PURCHASE_COST: f64 = 30_000.0;

const CAREER_ADVANCEMENT_AGES: [u32; 2] = [35, 45];
const CAREER_ADVANCEMENT_RAISE: f64 = 1.15;

/// Asset thresholds after the emergency fund, ascending
const ASSET_MILESTONES: [(f64, &str, &str); 3] = [
    (100_000.0, "First 100k", "First CHF 100,000 in assets"),
    (500_000.0, "Half Million", "CHF 500,000 in assets"),
    (1_000_000.0, "Millionaire", "First million CHF in assets"),
];

const EMERGENCY_FUND: &str = "Emergency Fund Complete";

/// Projection settings
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Years; the trajectory ends at the integer part
    pub life_expectancy: f64,

    /// Real return applied to prior-year assets
    pub annual_return: f64,

    /// Share of income paid into the pension system
    pub pension_contribution_rate: f64,

    /// First age with pension contributions
    pub pension_start_age: u32,

    pub retirement_age: u32,

    /// Retirement income as a share of current income
    pub pension_replacement_rate: f64,

    /// Annual withdrawal rate used for retirement income
    pub safe_withdrawal_rate: f64,

    /// Prior-year assets needed to trigger the home purchase
    pub home_purchase_threshold: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            life_expectancy: 83.8,
            annual_return: 0.03,
            pension_contribution_rate: 0.17,
            pension_start_age: 25,
            retirement_age: 65,
            pension_replacement_rate: 0.6,
            safe_withdrawal_rate: 0.04,
            home_purchase_threshold: 200_000.0,
        }
    }
}

/// Deterministic year-by-year financial projection
#[derive(Debug, Clone, Default)]
pub struct LifecycleProjector {
    config: LifecycleConfig,
}

impl LifecycleProjector {
    pub fn new(config: LifecycleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Last age in every trajectory
    pub fn final_age(&self) -> u32 {
        self.config.life_expectancy.max(0.0).floor() as u32
    }

    /// Project a stored persona
    pub fn project_entry(&self, entry: &PersonaEntry) -> Result<LifecycleTrajectory, ProjectionError> {
        self.project(&LifecycleInput::from_entry(entry)?)
    }

    pub fn project(&self, input: &LifecycleInput) -> Result<LifecycleTrajectory, ProjectionError> {
        let final_age = self.final_age();
        if input.age > final_age {
            return Err(ProjectionError::InvalidField {
                field: "age",
                value: input.age.to_string(),
            });
        }

        let education = education_multiplier(input.education_level.as_deref().unwrap_or_default());
        let region = cost_of_living_multiplier(input.location.as_deref().unwrap_or_default());

        let mut records = Vec::with_capacity(final_age as usize + 1);
        let mut prior_assets = input.current_assets;
        let mut home_purchased = false;

        for age in 0..=final_age {
            let stage = LifeStage::for_age(age);
            let mut income = self.income(age, stage, input, education);
            let mut expenses = self.expenses(age, stage, income, input, region);
            let mut life_event = None;

            if input.is_married() && (28..=35).contains(&age) {
                expenses += MARRIAGE_COST;
                life_event = Some("Marriage".to_string());
            }

            if input.has_children {
                match age {
                    30..=32 => {
                        expenses += FIRST_CHILD_COST;
                        life_event = Some("First Child".to_string());
                    }
                    33..=35 => {
                        expenses += SECOND_CHILD_COST;
                        life_event = Some("Second Child".to_string());
                    }
                    36..=45 => expenses += ONGOING_CHILD_COST,
                    _ => {}
                }
            }

            // Events that depend on projected outcomes only apply after the anchor
            let projected = age > input.age;

            if projected
                && !home_purchased
                && (30..=40).contains(&age)
                && prior_assets > self.config.home_purchase_threshold
            {
                home_purchased = true;
                expenses += HOME_PURCHASE_COST;
                life_event = Some("Home Purchase".to_string());
            }

            if projected && CAREER_ADVANCEMENT_AGES.contains(&age) {
                income = (income * CAREER_ADVANCEMENT_RAISE).round();
                life_event = Some(format!("Career Advancement at {}", age));
            }

            let pension_contributions = if age >= self.config.pension_start_age {
                (income * self.config.pension_contribution_rate).round()
            } else {
                0.0
            };
            let annual_savings = income - expenses - pension_contributions;

            let cumulative_assets = if projected {
                (prior_assets * (1.0 + self.config.annual_return) + annual_savings).round()
            } else {
                // Past years surface the anchor; history is not reconstructed
                input.current_assets
            };
            prior_assets = cumulative_assets;

            records.push(YearRecord {
                age,
                annual_income: income,
                annual_expenses: expenses,
                annual_savings,
                pension_contributions,
                cumulative_assets,
                life_stage: stage,
                life_event,
            });
        }

        let life_milestones = milestones(&records, input.age);
        let retirement_projections = self.retirement(&records, input.age);

        Ok(LifecycleTrajectory {
            current_age: input.age,
            projected_life_expectancy: self.config.life_expectancy,
            annual_trajectory: records,
            life_milestones,
            retirement_projections,
        })
    }

    /// Income before life events. Working years up to the current age use the reported income.
    fn income(&self, age: u32, stage: LifeStage, input: &LifecycleInput, education: f64) -> f64 {
        let current = input.annual_income;
        if age == input.age || (age >= self.config.pension_start_age && age < input.age) {
            return current;
        }

        let projected = match stage {
            LifeStage::Childhood => 0.0,
            LifeStage::Education => EDUCATION_INCOME,
            LifeStage::EarlyCareer => {
                let progress = (age - 25) as f64 / 10.0;
                current * education * (0.6 + 0.4 * progress)
            }
            LifeStage::CareerGrowth => {
                let growth = 1.0 + 0.3 * (age - 35) as f64 / 15.0;
                current * education * growth.min(CAREER_GROWTH_CAP)
            }
            LifeStage::PeakCareer => current * education * PEAK_CAREER_FACTOR,
            LifeStage::Retirement => current * education * self.config.pension_replacement_rate,
        };
        projected.round()
    }

    /// Expenses before life events. Reported spending replaces the model at the current age.
    fn expenses(
        &self,
        age: u32,
        stage: LifeStage,
        income: f64,
        input: &LifecycleInput,
        region: f64,
    ) -> f64 {
        let base = match input.monthly_expenses {
            Some(monthly) if age == input.age => monthly * 12.0,
            _ => match stage {
                LifeStage::Childhood => 0.0,
                LifeStage::Education => EDUCATION_EXPENSES,
                LifeStage::EarlyCareer => income * 0.7,
                LifeStage::CareerGrowth => income * 0.65,
                LifeStage::PeakCareer => income * 0.6,
                LifeStage::Retirement => income * 0.8,
            },
        };
        (base * region).round()
    }

    fn retirement(&self, records: &[YearRecord], current_age: u32) -> Option<RetirementProjection> {
        let retirement_age = self.config.retirement_age;
        if current_age >= retirement_age {
            return None;
        }

        let first_retired = records.iter().find(|r| r.age >= retirement_age)?;

        let working: Vec<f64> = records
            .iter()
            .filter(|r| r.age >= self.config.pension_start_age && r.age < retirement_age)
            .map(|r| r.annual_income)
            .collect();
        if working.is_empty() {
            return None;
        }
        let average_income = working.iter().sum::<f64>() / working.len() as f64;
        if average_income <= 0.0 {
            return None;
        }

        let assets = first_retired.cumulative_assets;
        let withdrawal = assets * self.config.safe_withdrawal_rate;

        Some(RetirementProjection {
            retirement_age,
            projected_retirement_assets: assets,
            income_replacement_ratio: withdrawal / average_income,
            years_to_retirement: retirement_age - current_age,
            monthly_retirement_income: (withdrawal / 12.0).round().max(0.0),
        })
    }
}

/// First crossing of each threshold from the anchor onwards
fn milestones(records: &[YearRecord], anchor_age: u32) -> Vec<Milestone> {
    let mut found = Vec::new();
    let mut emergency_fund = false;
    let mut reached = [false; ASSET_MILESTONES.len()];

    for record in records.iter().filter(|r| r.age >= anchor_age) {
        let assets = record.cumulative_assets;

        if !emergency_fund && record.annual_income > 0.0 && assets > 0.0 && assets >= record.annual_income {
            emergency_fund = true;
            found.push(Milestone {
                age: record.age,
                milestone: EMERGENCY_FUND.to_string(),
                value: assets,
                description: format!("Saved 1 year of income (CHF {})", group_thousands(assets)),
            });
        }

        for (done, (threshold, name, description)) in reached.iter_mut().zip(ASSET_MILESTONES) {
            if !*done && assets >= threshold {
                *done = true;
                found.push(Milestone {
                    age: record.age,
                    milestone: name.to_string(),
                    value: assets,
                    description: description.to_string(),
                });
            }
        }
    }

    found
}

/// Whole CHF with comma thousands separators
fn group_thousands(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if rounded < 0 {
        grouped.insert(0, '-');
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    fn professional() -> LifecycleInput {
        LifecycleInput {
            age: 34,
            annual_income: 95_000.0,
            current_assets: 80_000.0,
            monthly_expenses: Some(4_500.0),
            education_level: Some("Tertiaerstufe".to_string()),
            location: Some("Zürich".to_string()),
            family_status: Some("Verheiratet".to_string()),
            has_children: true,
        }
    }

    fn project(input: &LifecycleInput) -> LifecycleTrajectory {
        LifecycleProjector::default().project(input).unwrap()
    }

    #[test]
    fn test_one_record_per_age() {
        let trajectory = project(&professional());
        assert_eq!(trajectory.annual_trajectory.len(), 84);
        for (i, record) in trajectory.annual_trajectory.iter().enumerate() {
            assert_eq!(record.age, i as u32);
        }
        assert_eq!(trajectory.projected_life_expectancy, 83.8);
    }

    #[test]
    fn test_anchor_matches_reported_values() {
        let input = professional();
        let trajectory = project(&input);
        let anchor = trajectory.anchor().unwrap();

        assert_eq!(anchor.cumulative_assets, input.current_assets);
        assert_eq!(anchor.annual_income, input.annual_income);
        // Reported expenses at the Zürich level plus the marriage and second-child costs
        assert_eq!(anchor.annual_expenses, 54_000.0 * 1.2 + 15_000.0 + 15_000.0);
    }

    #[test]
    fn test_reported_expenses_follow_region() {
        let mut input = LifecycleInput::new(40, 90_000.0);
        input.monthly_expenses = Some(5_000.0);
        input.location = Some("Atlantis".to_string());
        assert_eq!(project(&input).anchor().unwrap().annual_expenses, 60_000.0);

        input.location = Some("Zürich".to_string());
        assert_eq!(project(&input).anchor().unwrap().annual_expenses, 72_000.0);
    }

    #[test]
    fn test_past_years_surface_anchor_assets() {
        let trajectory = project(&professional());
        for record in &trajectory.annual_trajectory[..34] {
            assert_eq!(record.cumulative_assets, 80_000.0);
        }
    }

    #[test]
    fn test_assets_grow_after_anchor() {
        let trajectory = project(&professional());
        let years = &trajectory.annual_trajectory;
        for age in 35..years.len() {
            let expected = (years[age - 1].cumulative_assets * 1.03 + years[age].annual_savings).round();
            assert_relative_eq!(years[age].cumulative_assets, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_savings_net_of_pension() {
        let trajectory = project(&professional());
        for record in &trajectory.annual_trajectory {
            assert_relative_eq!(
                record.annual_savings,
                record.annual_income - record.annual_expenses - record.pension_contributions,
                epsilon = 1e-9
            );
            if record.age < 25 {
                assert_eq!(record.pension_contributions, 0.0);
            } else {
                assert_eq!(record.pension_contributions, (record.annual_income * 0.17).round());
            }
        }
    }

    #[test]
    fn test_income_phases() {
        let input = LifecycleInput::new(25, 60_000.0);
        let trajectory = project(&input);

        assert_eq!(trajectory.year(10).unwrap().annual_income, 0.0);
        assert_eq!(trajectory.year(20).unwrap().annual_income, 15_000.0);
        assert_eq!(trajectory.year(25).unwrap().annual_income, 60_000.0);
        // 60000 * (0.6 + 0.4 * 0.5)
        assert_eq!(trajectory.year(30).unwrap().annual_income, 48_000.0);
        // Growth phase holds the starting level; only the raise at 45 lifts it
        assert_eq!(trajectory.year(40).unwrap().annual_income, 60_000.0);
        assert_eq!(trajectory.year(45).unwrap().annual_income, 69_000.0);
        assert_eq!(trajectory.year(49).unwrap().annual_income, 60_000.0);
        assert_eq!(trajectory.year(55).unwrap().annual_income, 72_000.0);
        assert_eq!(trajectory.year(70).unwrap().annual_income, 36_000.0);
    }

    #[test]
    fn test_past_working_years_use_current_income() {
        let trajectory = project(&LifecycleInput::new(52, 110_000.0));
        for age in 25..=52 {
            assert_eq!(trajectory.year(age).unwrap().annual_income, 110_000.0);
        }
        assert_eq!(trajectory.year(35).unwrap().life_event, None);
    }

    #[test]
    fn test_regional_adjustment_and_fallback() {
        let mut zurich = LifecycleInput::new(30, 80_000.0);
        zurich.location = Some("Zürich".to_string());
        let mut unknown = zurich.clone();
        unknown.location = Some("Atlantis".to_string());

        let zurich = project(&zurich);
        let unknown = project(&unknown);

        assert_eq!(unknown.year(30).unwrap().annual_expenses, 56_000.0);
        assert_eq!(zurich.year(30).unwrap().annual_expenses, 67_200.0);
        assert_eq!(unknown.year(20).unwrap().annual_expenses, 20_000.0);
        assert_eq!(zurich.year(20).unwrap().annual_expenses, 24_000.0);
    }

    #[test]
    fn test_life_events() {
        let trajectory = project(&professional());
        let event = |age: u32| trajectory.year(age).unwrap().life_event.clone();

        assert_eq!(event(29).as_deref(), Some("Marriage"));
        assert_eq!(event(31).as_deref(), Some("First Child"));
        assert_eq!(event(33).as_deref(), Some("Second Child"));
        assert_eq!(event(35).as_deref(), Some("Career Advancement at 35"));
        assert_eq!(event(45).as_deref(), Some("Career Advancement at 45"));
        assert_eq!(event(50), None);
    }

    #[test]
    fn test_home_purchase_happens_once() {
        let mut input = LifecycleInput::new(31, 150_000.0);
        input.current_assets = 250_000.0;
        let trajectory = project(&input);

        let purchases: Vec<u32> = trajectory
            .annual_trajectory
            .iter()
            .filter(|r| r.life_event.as_deref() == Some("Home Purchase"))
            .map(|r| r.age)
            .collect();
        assert_eq!(purchases, vec![32]);
    }

    #[test]
    fn test_milestones_unique_and_ordered() {
        let mut input = LifecycleInput::new(30, 150_000.0);
        input.current_assets = 50_000.0;
        input.education_level = Some("Tertiaerstufe".to_string());
        let trajectory = project(&input);

        let names: Vec<&str> = trajectory
            .life_milestones
            .iter()
            .map(|m| m.milestone.as_str())
            .collect();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());

        let first_100k = trajectory.milestone("First 100k").unwrap();
        let half = trajectory.milestone("Half Million").unwrap();
        let million = trajectory.milestone("Millionaire").unwrap();
        assert!(first_100k.age <= half.age && half.age <= million.age);
        assert!(first_100k.value >= 100_000.0);
        assert!(trajectory
            .life_milestones
            .windows(2)
            .all(|pair| pair[0].age <= pair[1].age));
    }

    #[test]
    fn test_milestones_ignore_past_years() {
        let mut input = LifecycleInput::new(40, 90_000.0);
        input.current_assets = 150_000.0;
        let trajectory = project(&input);

        let first_100k = trajectory.milestone("First 100k").unwrap();
        assert_eq!(first_100k.age, 40);
        assert_eq!(first_100k.description, "First CHF 100,000 in assets");
    }

    #[test]
    fn test_retirement_projection() {
        let trajectory = project(&professional());
        let retirement = trajectory.retirement_projections.as_ref().unwrap();
        let at_65 = trajectory.year(65).unwrap();

        assert_eq!(retirement.retirement_age, 65);
        assert_eq!(retirement.years_to_retirement, 31);
        assert_eq!(retirement.projected_retirement_assets, at_65.cumulative_assets);
        assert_eq!(
            retirement.monthly_retirement_income,
            (at_65.cumulative_assets * 0.04 / 12.0).round().max(0.0)
        );

        let working: Vec<f64> = trajectory.annual_trajectory[25..65]
            .iter()
            .map(|r| r.annual_income)
            .collect();
        let average = working.iter().sum::<f64>() / working.len() as f64;
        assert_relative_eq!(
            retirement.income_replacement_ratio,
            at_65.cumulative_assets * 0.04 / average,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_no_retirement_projection_once_retired() {
        let trajectory = project(&LifecycleInput::new(70, 40_000.0));
        assert!(trajectory.retirement_projections.is_none());
        assert_eq!(trajectory.anchor().unwrap().annual_income, 40_000.0);
    }

    #[test]
    fn test_zero_income_has_no_retirement_projection() {
        let trajectory = project(&LifecycleInput::new(40, 0.0));
        assert!(trajectory.retirement_projections.is_none());
    }

    #[test]
    fn test_age_beyond_life_expectancy_rejected() {
        let err = LifecycleProjector::default()
            .project(&LifecycleInput::new(90, 30_000.0))
            .unwrap_err();
        assert_eq!(
            err,
            ProjectionError::InvalidField {
                field: "age",
                value: "90".to_string()
            }
        );
    }

    #[test]
    fn test_projection_is_deterministic() {
        let input = professional();
        assert_eq!(project(&input), project(&input));
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0.0), "0");
        assert_eq!(group_thousands(999.0), "999");
        assert_eq!(group_thousands(1_000.0), "1,000");
        assert_eq!(group_thousands(1_234_567.4), "1,234,567");
        assert_eq!(group_thousands(-25_000.0), "-25,000");
    }
}

//! Financial snapshot extracted from a generated persona

use crate::demographics::{columns, DemographicSample};
use crate::error::ProjectionError;
use crate::generation::PersonaRecord;
use crate::store::PersonaEntry;
use serde_json::Value;

const AGE_PATHS: &[&[&str]] = &[&["age"], &["basic_info", "age"], &["demographics", "age"]];

const INCOME_PATHS: &[&[&str]] = &[
    &["annual_income"],
    &["financial", "annual_income"],
    &["financial", "income"],
    &["professional", "annual_income"],
];

const ASSET_PATHS: &[&[&str]] = &[
    &["current_assets"],
    &["financial", "current_assets"],
    &["financial", "assets"],
];

const EXPENSE_PATHS: &[&[&str]] = &[&["monthly_expenses"], &["financial", "monthly_expenses"]];

const EDUCATION_PATHS: &[&[&str]] = &[
    &["education_level"],
    &["demographics", "education_level"],
    &["professional", "education_level"],
    &["professional", "education"],
];

const LOCATION_PATHS: &[&[&str]] = &[
    &["location"],
    &["basic_info", "location"],
    &["demographics", "location"],
];

const FAMILY_PATHS: &[&[&str]] = &[
    &["family_status"],
    &["basic_info", "family_status"],
    &["demographics", "family_status"],
];

const CHILDREN_PATHS: &[&[&str]] = &[
    &["has_children"],
    &["demographics", "has_children"],
    &["basic_info", "has_children"],
    &["demographics", "children"],
    &["basic_info", "children"],
];

/// Inputs to a lifecycle projection
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleInput {
    /// Current age in whole years; the anchor of the trajectory
    pub age: u32,

    /// Current gross annual income
    pub annual_income: f64,

    /// Reported assets at the current age
    pub current_assets: f64,

    /// Reported monthly spending; replaces the modelled expenses at the current age
    pub monthly_expenses: Option<f64>,

    pub education_level: Option<String>,

    pub location: Option<String>,

    pub family_status: Option<String>,

    pub has_children: bool,
}

impl LifecycleInput {
    pub fn new(age: u32, annual_income: f64) -> Self {
        Self {
            age,
            annual_income,
            current_assets: 0.0,
            monthly_expenses: None,
            education_level: None,
            location: None,
            family_status: None,
            has_children: false,
        }
    }

    pub fn from_entry(entry: &PersonaEntry) -> Result<Self, ProjectionError> {
        Self::from_record(&entry.persona, &entry.source_data)
    }

    /// Resolve each field from the persona record, then from the census sample.
    ///
    /// A present but unparseable value is an error; it does not fall through
    /// to the sample.
    pub fn from_record(
        persona: &PersonaRecord,
        source: &DemographicSample,
    ) -> Result<Self, ProjectionError> {
        let age = match number_at(persona, AGE_PATHS, "age")? {
            Some(age) => Some(age),
            None => source.number(columns::AGE),
        }
        .ok_or(ProjectionError::MissingField("age"))?;

        if !age.is_finite() || age < 0.0 {
            return Err(ProjectionError::InvalidField {
                field: "age",
                value: age.to_string(),
            });
        }

        let annual_income = match number_at(persona, INCOME_PATHS, "annual_income")? {
            Some(income) => Some(income),
            None => source.number(columns::GROSS_INCOME),
        }
        .ok_or(ProjectionError::MissingField("annual_income"))?;

        if !annual_income.is_finite() || annual_income < 0.0 {
            return Err(ProjectionError::InvalidField {
                field: "annual_income",
                value: annual_income.to_string(),
            });
        }

        let has_children = match lookup(persona, CHILDREN_PATHS) {
            Some(value) => flag(value),
            None => source.number(columns::CHILDREN).map_or(false, |n| n > 0.0),
        };

        Ok(Self {
            age: age.floor() as u32,
            annual_income,
            current_assets: number_at(persona, ASSET_PATHS, "current_assets")?.unwrap_or(0.0),
            monthly_expenses: number_at(persona, EXPENSE_PATHS, "monthly_expenses")?,
            education_level: text_at(persona, EDUCATION_PATHS)
                .or_else(|| source.display(columns::EDUCATION)),
            location: text_at(persona, LOCATION_PATHS).or_else(|| source.display(columns::CANTON)),
            family_status: text_at(persona, FAMILY_PATHS),
            has_children,
        })
    }

    pub fn is_married(&self) -> bool {
        self.family_status.as_deref().map_or(false, |status| {
            let status = status.trim().to_lowercase();
            status == "verheiratet" || status == "married"
        })
    }
}

/// First non-null value found along any of the paths
fn lookup<'a>(record: &'a PersonaRecord, paths: &[&[&str]]) -> Option<&'a Value> {
    paths.iter().find_map(|path| {
        let (first, rest) = path.split_first()?;
        let value = rest
            .iter()
            .try_fold(record.get(*first)?, |value, key| value.get(*key))?;
        (!value.is_null()).then_some(value)
    })
}

fn number_at(
    record: &PersonaRecord,
    paths: &[&[&str]],
    field: &'static str,
) -> Result<Option<f64>, ProjectionError> {
    match lookup(record, paths) {
        Some(value) => parse_number(value).map_err(|raw| ProjectionError::InvalidField { field, value: raw }),
        None => Ok(None),
    }
}

/// Numbers as-is; strings with currency text and thousands separators stripped
fn parse_number(value: &Value) -> Result<Option<f64>, String> {
    match value {
        Value::Number(n) => n.as_f64().map(Some).ok_or_else(|| n.to_string()),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let digits: String = trimmed
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            digits.parse::<f64>().map(Some).map_err(|_| s.clone())
        }
        other => Err(other.to_string()),
    }
}

fn text_at(record: &PersonaRecord, paths: &[&[&str]]) -> Option<String> {
    match lookup(record, paths)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n > 0.0),
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "yes" | "ja" | "1"
        ),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}

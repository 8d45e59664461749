//! Prompt template rendering for persona generation

use super::params::BankingParameters;
use crate::demographics::{columns, DemographicSample};
use crate::error::StoreResult;
use std::fs;
use std::path::Path;

const MISSING: &str = "N/A";

const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant that creates realistic Swiss banking client \
personas. Always respond with a single valid JSON object and nothing else.";

const DEFAULT_TEMPLATE: &str = "Create one realistic banking client persona based on this census record:

{statistical_data}

Fixed attributes:
- age: {age}
- gender: {gender}
- occupation: {occupation}
- children in household: {children}
- single: {single}
- free net worth: {net_worth}
- disposable income: {disposable_income}
- major expenses planned: {major_expenses}
- housing: {tenure}
- financial experience: {financial_experience}

Return a JSON object with the sections basic_info, demographics, professional, financial, \
banking_persona and narrative.";

/// System prompt plus a user-prompt template with `{placeholder}` slots
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub system_prompt: String,
    pub template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPLATE)
    }
}

impl PromptTemplate {
    pub fn new(system_prompt: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            template: template.into(),
        }
    }

    /// Load `system.md` and `prompt.md` from a directory
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> StoreResult<Self> {
        let dir = dir.as_ref();
        let system_prompt = fs::read_to_string(dir.join("system.md"))?;
        let template = fs::read_to_string(dir.join("prompt.md"))?;
        Ok(Self::new(system_prompt, template))
    }

    /// Fill the template. Unknown placeholders and other braces are left as-is.
    pub fn render(&self, sample: &DemographicSample, params: &BankingParameters) -> String {
        let value = |column: &str| sample.display(column).unwrap_or_else(|| MISSING.to_string());
        let gender = match sample.number(columns::FEMALE) {
            Some(f) if f == 1.0 => "w",
            Some(_) => "m",
            None => MISSING,
        };

        let substitutions: [(&str, String); 11] = [
            ("{statistical_data}", sample.summary()),
            ("{age}", value(columns::AGE)),
            ("{gender}", gender.to_string()),
            ("{occupation}", value(columns::OCCUPATION)),
            ("{children}", value(columns::CHILDREN)),
            ("{single}", value(columns::SINGLE)),
            ("{net_worth}", params.net_worth.as_str().to_string()),
            ("{disposable_income}", params.disposable_income.as_str().to_string()),
            ("{major_expenses}", params.major_expenses_label().to_string()),
            ("{tenure}", params.tenure.as_str().to_string()),
            ("{financial_experience}", params.financial_experience.as_str().to_string()),
        ];

        substitutions
            .iter()
            .fold(self.template.clone(), |text, (placeholder, replacement)| {
                text.replace(placeholder, replacement)
            })
    }
}

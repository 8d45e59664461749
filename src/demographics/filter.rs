//! Filters narrowing the demographic dataset before sampling

use super::sample::DemographicSample;
use serde::{Deserialize, Serialize};

/// Dataset column names used by the filters and the prompt
pub mod columns {
    pub const AGE: &str = "alter";
    pub const FEMALE: &str = "weiblich";
    pub const CANTON: &str = "kanton";
    pub const LANGUAGE_REGION: &str = "sprachgebiet";
    pub const GROSS_INCOME: &str = "bruttojahr";
    pub const EDUCATION: &str = "ausbildung";
    pub const EMPLOYED: &str = "arbeit";
    pub const CHILDREN: &str = "kinder";
    pub const OCCUPATION: &str = "beruf";
    pub const SINGLE: &str = "ledig";
}

/// Age band filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeBand {
    /// 18-25
    From18To25,
    /// 26-35
    From26To35,
    /// 36-45
    From36To45,
    /// 46-65
    From46To65,
    /// over 65
    Over65,
}

impl AgeBand {
    pub fn contains(&self, age: f64) -> bool {
        match self {
            AgeBand::From18To25 => (18.0..=25.0).contains(&age),
            AgeBand::From26To35 => (26.0..=35.0).contains(&age),
            AgeBand::From36To45 => (36.0..=45.0).contains(&age),
            AgeBand::From46To65 => (46.0..=65.0).contains(&age),
            AgeBand::Over65 => age > 65.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgeBand::From18To25 => "18-25",
            AgeBand::From26To35 => "26-35",
            AgeBand::From36To45 => "36-45",
            AgeBand::From46To65 => "46-65",
            AgeBand::Over65 => "65+",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim() {
            "18-25" => Some(AgeBand::From18To25),
            "26-35" => Some(AgeBand::From26To35),
            "36-45" => Some(AgeBand::From36To45),
            "46-65" => Some(AgeBand::From46To65),
            "65+" => Some(AgeBand::Over65),
            _ => None,
        }
    }
}

/// Gender filter, matched against the `weiblich` 0/1 column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenderFilter {
    Male,
    Female,
}

/// Gross annual income band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncomeBand {
    /// < 60k
    Under60k,
    /// 60k-100k inclusive
    From60kTo100k,
    /// > 100k
    Over100k,
}

impl IncomeBand {
    pub fn contains(&self, income: f64) -> bool {
        match self {
            IncomeBand::Under60k => income < 60_000.0,
            IncomeBand::From60kTo100k => (60_000.0..=100_000.0).contains(&income),
            IncomeBand::Over100k => income > 100_000.0,
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.replace(' ', "").as_str() {
            "<60k" => Some(IncomeBand::Under60k),
            "60k-100k" => Some(IncomeBand::From60kTo100k),
            ">100k" => Some(IncomeBand::Over100k),
            _ => None,
        }
    }
}

/// Optional constraints on the sampled person. `None` means "any".
///
/// A sample missing a constrained attribute does not match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemographicFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_band: Option<AgeBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<GenderFilter>,
    #[serde(default, alias = "kanton", skip_serializing_if = "Option::is_none")]
    pub canton: Option<String>,
    #[serde(default, alias = "sprachgebiet", skip_serializing_if = "Option::is_none")]
    pub language_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income_band: Option<IncomeBand>,
    #[serde(default, alias = "ausbildung", skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_children: Option<bool>,
}

impl DemographicFilter {
    pub fn is_empty(&self) -> bool {
        *self == DemographicFilter::default()
    }

    pub fn matches(&self, sample: &DemographicSample) -> bool {
        if let Some(band) = self.age_band {
            match sample.number(columns::AGE) {
                Some(age) if band.contains(age) => {}
                _ => return false,
            }
        }

        if let Some(gender) = self.gender {
            let wanted = match gender {
                GenderFilter::Female => 1.0,
                GenderFilter::Male => 0.0,
            };
            if sample.number(columns::FEMALE) != Some(wanted) {
                return false;
            }
        }

        if let Some(band) = self.income_band {
            match sample.number(columns::GROSS_INCOME) {
                Some(income) if band.contains(income) => {}
                _ => return false,
            }
        }

        let text_constraints = [
            (columns::CANTON, &self.canton),
            (columns::LANGUAGE_REGION, &self.language_region),
            (columns::EDUCATION, &self.education),
        ];
        for (column, wanted) in text_constraints {
            if let Some(wanted) = wanted {
                if sample.display(column).as_deref() != Some(wanted.as_str()) {
                    return false;
                }
            }
        }

        let flag_constraints = [
            (columns::EMPLOYED, self.employed),
            (columns::CHILDREN, self.has_children),
        ];
        for (column, wanted) in flag_constraints {
            if let Some(wanted) = wanted {
                let expected = if wanted { 1.0 } else { 0.0 };
                if sample.number(column) != Some(expected) {
                    return false;
                }
            }
        }

        true
    }
}

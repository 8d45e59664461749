//! Demographic sample records drawn from the census extract

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single attribute value from the demographic dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
}

impl AttributeValue {
    /// Parse a raw CSV cell. Empty cells and NA markers are absent, never zero.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "na" | "nan" | "null" | "none" => return None,
            _ => {}
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Some(AttributeValue::Number(n)),
            Ok(_) => None,
            Err(_) => Some(AttributeValue::Text(trimmed.to_string())),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            AttributeValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s.as_str()),
            AttributeValue::Number(_) => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Integral values print without a trailing ".0"
            AttributeValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            AttributeValue::Number(n) => write!(f, "{}", n),
            AttributeValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Immutable mapping of named attributes for one sampled person.
///
/// Attributes that were missing in the source are simply not present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DemographicSample {
    attributes: BTreeMap<String, AttributeValue>,
}

/// Stored attribute as older batch files may hold it
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredAttribute {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl<'de> Deserialize<'de> for DemographicSample {
    /// Nulls are dropped so absent stays absent; booleans become 1/0
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let stored = BTreeMap::<String, Option<StoredAttribute>>::deserialize(deserializer)?;
        let attributes = stored
            .into_iter()
            .filter_map(|(key, value)| {
                let value = match value? {
                    StoredAttribute::Number(n) => AttributeValue::Number(n),
                    StoredAttribute::Text(s) => AttributeValue::Text(s),
                    StoredAttribute::Flag(b) => AttributeValue::Number(if b { 1.0 } else { 0.0 }),
                };
                Some((key, value))
            })
            .collect();
        Ok(Self { attributes })
    }
}

impl DemographicSample {
    pub fn new(attributes: BTreeMap<String, AttributeValue>) -> Self {
        Self { attributes }
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Numeric view of an attribute (text holding a number also counts)
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(AttributeValue::as_number)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttributeValue::as_text)
    }

    /// Display form of any attribute, numeric or text
    pub fn display(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.attributes.iter()
    }

    /// Statistical summary for the prompt: one `key: value` line per present attribute
    pub fn summary(&self) -> String {
        self.attributes
            .iter()
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl FromIterator<(String, AttributeValue)> for DemographicSample {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}

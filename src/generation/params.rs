//! Banking parameters attached to each generated persona

use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Freely available net worth bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetWorth {
    #[serde(rename = "< 10k")]
    Under10k,
    #[serde(rename = "10k-100k")]
    From10kTo100k,
    #[serde(rename = ">100k")]
    Over100k,
}

impl NetWorth {
    pub const ALL: [NetWorth; 3] = [NetWorth::Under10k, NetWorth::From10kTo100k, NetWorth::Over100k];

    pub fn as_str(&self) -> &'static str {
        match self {
            NetWorth::Under10k => "< 10k",
            NetWorth::From10kTo100k => "10k-100k",
            NetWorth::Over100k => ">100k",
        }
    }
}

/// Disposable income bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisposableIncome {
    #[serde(rename = "< 60k")]
    Under60k,
    #[serde(rename = "60k-100k")]
    From60kTo100k,
    #[serde(rename = ">100k")]
    Over100k,
}

impl DisposableIncome {
    pub const ALL: [DisposableIncome; 3] = [
        DisposableIncome::Under60k,
        DisposableIncome::From60kTo100k,
        DisposableIncome::Over100k,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DisposableIncome::Under60k => "< 60k",
            DisposableIncome::From60kTo100k => "60k-100k",
            DisposableIncome::Over100k => ">100k",
        }
    }
}

/// Housing tenure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tenure {
    Rent,
    Owner,
}

impl Tenure {
    pub const ALL: [Tenure; 2] = [Tenure::Rent, Tenure::Owner];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tenure::Rent => "rent",
            Tenure::Owner => "owner",
        }
    }
}

/// Self-assessed experience with financial products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinancialExperience {
    #[serde(alias = "Einsteiger")]
    Beginner,
    #[serde(alias = "Fortgeschritten")]
    Advanced,
    #[serde(alias = "Experte")]
    Expert,
}

impl FinancialExperience {
    pub const ALL: [FinancialExperience; 3] = [
        FinancialExperience::Beginner,
        FinancialExperience::Advanced,
        FinancialExperience::Expert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FinancialExperience::Beginner => "beginner",
            FinancialExperience::Advanced => "advanced",
            FinancialExperience::Expert => "expert",
        }
    }
}

/// Banking-relevant traits of one persona.
///
/// Deserialization also accepts the German keys of older batch files
/// (`vermoegen`, `grosse_ausgaben: "ja"`, `eigentum: 0|1`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankingParameters {
    #[serde(alias = "vermoegen")]
    pub net_worth: NetWorth,
    #[serde(alias = "verfuegbares_einkommen")]
    pub disposable_income: DisposableIncome,
    #[serde(alias = "grosse_ausgaben", deserialize_with = "yes_no")]
    pub major_expenses_planned: bool,
    #[serde(alias = "eigentum", deserialize_with = "tenure_code")]
    pub tenure: Tenure,
    #[serde(alias = "finanz_erfahrung")]
    pub financial_experience: FinancialExperience,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagRepr {
    Bool(bool),
    Int(i64),
    Label(String),
}

fn yes_no<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match FlagRepr::deserialize(deserializer)? {
        FlagRepr::Bool(b) => Ok(b),
        FlagRepr::Int(n) => Ok(n != 0),
        FlagRepr::Label(label) => match label.trim().to_lowercase().as_str() {
            "ja" | "yes" | "true" => Ok(true),
            "nein" | "no" | "false" => Ok(false),
            other => Err(D::Error::custom(format!("invalid yes/no value: {}", other))),
        },
    }
}

// 0 = rent, 1 = owner
fn tenure_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Tenure, D::Error> {
    match FlagRepr::deserialize(deserializer)? {
        FlagRepr::Bool(owner) => Ok(if owner { Tenure::Owner } else { Tenure::Rent }),
        FlagRepr::Int(0) => Ok(Tenure::Rent),
        FlagRepr::Int(1) => Ok(Tenure::Owner),
        FlagRepr::Int(n) => Err(D::Error::custom(format!("invalid tenure code: {}", n))),
        FlagRepr::Label(label) => match label.trim().to_lowercase().as_str() {
            "rent" | "miete" => Ok(Tenure::Rent),
            "owner" | "eigentum" => Ok(Tenure::Owner),
            other => Err(D::Error::custom(format!("invalid tenure: {}", other))),
        },
    }
}

impl Default for BankingParameters {
    fn default() -> Self {
        Self {
            net_worth: NetWorth::Under10k,
            disposable_income: DisposableIncome::Under60k,
            major_expenses_planned: false,
            tenure: Tenure::Rent,
            financial_experience: FinancialExperience::Advanced,
        }
    }
}

impl BankingParameters {
    /// Independent uniform draw of every attribute
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        // ALL arrays are non-empty, so `choose` always yields a value
        Self {
            net_worth: *NetWorth::ALL.choose(rng).unwrap_or(&NetWorth::Under10k),
            disposable_income: *DisposableIncome::ALL
                .choose(rng)
                .unwrap_or(&DisposableIncome::Under60k),
            major_expenses_planned: rng.gen_bool(0.5),
            tenure: *Tenure::ALL.choose(rng).unwrap_or(&Tenure::Rent),
            financial_experience: *FinancialExperience::ALL
                .choose(rng)
                .unwrap_or(&FinancialExperience::Beginner),
        }
    }

    pub fn major_expenses_label(&self) -> &'static str {
        if self.major_expenses_planned {
            "yes"
        } else {
            "no"
        }
    }
}

/// How each persona in a batch gets its banking parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "parameters", rename_all = "snake_case")]
pub enum ParameterMode {
    /// Every persona shares the same parameters
    Fixed(BankingParameters),
    /// Every persona gets an independent random draw
    Randomize,
}

#[derive(Deserialize)]
#[serde(tag = "mode", content = "parameters", rename_all = "snake_case")]
enum TaggedMode {
    Fixed(BankingParameters),
    Randomize,
}

/// Accepted shapes: the tagged form written by this crate, or a flat
/// parameter map with a `randomize` flag as older batch files store it
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredMode {
    Tagged(TaggedMode),
    Flat {
        #[serde(default)]
        randomize: bool,
        #[serde(flatten)]
        parameters: BankingParameters,
    },
    RandomizeOnly {
        randomize: bool,
    },
}

impl<'de> Deserialize<'de> for ParameterMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match StoredMode::deserialize(deserializer)? {
            StoredMode::Tagged(TaggedMode::Fixed(parameters)) => ParameterMode::Fixed(parameters),
            StoredMode::Tagged(TaggedMode::Randomize) => ParameterMode::Randomize,
            StoredMode::Flat { randomize: true, .. } => ParameterMode::Randomize,
            StoredMode::Flat { parameters, .. } => ParameterMode::Fixed(parameters),
            StoredMode::RandomizeOnly { randomize: true } => ParameterMode::Randomize,
            StoredMode::RandomizeOnly { randomize: false } => ParameterMode::default(),
        })
    }
}

impl Default for ParameterMode {
    fn default() -> Self {
        ParameterMode::Fixed(BankingParameters::default())
    }
}

impl ParameterMode {
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> BankingParameters {
        match self {
            ParameterMode::Fixed(params) => *params,
            ParameterMode::Randomize => BankingParameters::random(rng),
        }
    }

    pub fn is_randomized(&self) -> bool {
        matches!(self, ParameterMode::Randomize)
    }
}

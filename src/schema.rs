use crate::error::{FinancialRecordError, Result};
use chrono::{Datelike, NaiveDate};
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Unit of measure attached to a reported fact.
///
/// Serialized with the XBRL unit codes (`USD`, `USD/shares`, `shares`, `pure`).
/// Any other code is kept verbatim in [`Unit::Other`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Unit {
    Usd,
    UsdPerShare,
    Shares,
    Pure,
    Other(String),
}

impl Unit {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "USD" => Self::Usd,
            "USD/shares" | "USD-per-shares" => Self::UsdPerShare,
            "shares" => Self::Shares,
            "pure" => Self::Pure,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Usd => "USD",
            Self::UsdPerShare => "USD/shares",
            Self::Shares => "shares",
            Self::Pure => "pure",
            Self::Other(code) => code.as_str(),
        }
    }

    /// ISO currency code if this is a monetary or per-share monetary unit.
    pub fn currency(&self) -> Option<&str> {
        match self {
            Self::Usd | Self::UsdPerShare => Some("USD"),
            Self::Shares | Self::Pure => None,
            Self::Other(code) => {
                let base = code.strip_suffix("/shares").unwrap_or(code.as_str());
                let is_iso = base.len() == 3 && base.chars().all(|c| c.is_ascii_uppercase());
                is_iso.then_some(base)
            }
        }
    }

    pub fn is_per_share(&self) -> bool {
        match self {
            Self::UsdPerShare => true,
            Self::Other(code) => code.ends_with("/shares") && self.currency().is_some(),
            _ => false,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Unit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Self::from_code(&code))
    }
}

impl JsonSchema for Unit {
    fn schema_name() -> String {
        "Unit".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum FiscalPeriod {
    #[schemars(description = "Full fiscal year (annual report)")]
    Fy,
    Q1,
    Q2,
    Q3,
    Q4,
}

impl FiscalPeriod {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "FY" => Some(Self::Fy),
            "Q1" => Some(Self::Q1),
            "Q2" => Some(Self::Q2),
            "Q3" => Some(Self::Q3),
            "Q4" => Some(Self::Q4),
            _ => None,
        }
    }

    pub fn is_annual(self) -> bool {
        self == Self::Fy
    }
}

/// Provenance of a resolved value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Reported under the concept's preferred tag
    Exact,
    /// Reported under a lower-priority alias
    Fallback,
    /// Computed from other concepts of the same year
    Derived,
    /// Not reported and not derivable
    Missing,
}

/// A single reported XBRL fact as supplied by the retrieval layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawFact {
    #[schemars(description = "The reporting tag, e.g. 'NetIncomeLoss' (taxonomy prefix optional)")]
    pub concept_tag: String,

    #[schemars(description = "Reported numeric value in the given unit")]
    pub value: f64,

    #[schemars(description = "XBRL unit code: USD, USD/shares, shares, pure or another code")]
    pub unit: Unit,

    #[schemars(description = "Start of the reporting period; absent for instant (balance sheet) facts")]
    #[serde(default)]
    pub period_start: Option<NaiveDate>,

    #[schemars(description = "End of the reporting period or the instant date")]
    pub period_end: NaiveDate,

    #[schemars(description = "Fiscal year of the filing that reported this fact")]
    pub fiscal_year: i32,

    #[schemars(description = "Fiscal period of the filing: FY, Q1, Q2, Q3 or Q4")]
    pub fiscal_period: FiscalPeriod,

    #[schemars(description = "Date the filing was accepted")]
    pub filed_date: NaiveDate,

    #[schemars(description = "Form type of the filing, e.g. 10-K or 10-K/A")]
    #[serde(default)]
    pub form: Option<String>,
}

/// How many years after its period end a fact may still be repeated by a later filing.
pub const MAX_COMPARATIVE_LAG_YEARS: i64 = 5;

impl RawFact {
    /// Tag without a taxonomy prefix (`us-gaap:Assets` -> `Assets`).
    pub fn local_tag(&self) -> &str {
        self.concept_tag
            .rsplit_once(':')
            .map(|(_, local)| local)
            .unwrap_or(self.concept_tag.as_str())
    }

    /// Length of the reporting period in days; instant facts span zero days.
    pub fn span_days(&self) -> i64 {
        self.period_start
            .map(|start| (self.period_end - start).num_days())
            .unwrap_or(0)
    }

    pub fn validate(&self) -> Result<()> {
        if self.local_tag().trim().is_empty() {
            return Err(FinancialRecordError::MalformedFact {
                tag: self.concept_tag.clone(),
                details: "empty concept tag".to_string(),
            });
        }

        if !self.value.is_finite() {
            return Err(FinancialRecordError::MalformedFact {
                tag: self.concept_tag.clone(),
                details: format!("non-finite value {}", self.value),
            });
        }

        // A filing's fiscal year sits at most a year before the period end (early
        // year-ends, cover-page dates) and a few years after it (comparatives).
        let lag = i64::from(self.fiscal_year) - i64::from(self.period_end.year());
        if !(-1..=MAX_COMPARATIVE_LAG_YEARS).contains(&lag) {
            return Err(FinancialRecordError::MalformedFact {
                tag: self.concept_tag.clone(),
                details: format!(
                    "fiscal year {} is implausible for a period ending {}",
                    self.fiscal_year, self.period_end
                ),
            });
        }

        if let Some(start) = self.period_start {
            if start > self.period_end {
                return Err(FinancialRecordError::MalformedFact {
                    tag: self.concept_tag.clone(),
                    details: format!(
                        "period start {} is after period end {}",
                        start, self.period_end
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Facts for one company, the unit of work handed to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FactsPayload {
    #[schemars(description = "Canonical company identifier (e.g. zero-padded CIK)")]
    pub company: String,

    #[schemars(description = "All reported facts for the company, in any order")]
    pub facts: Vec<RawFact>,
}

impl FactsPayload {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(FactsPayload)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

//! Conversion of an SEC "company facts" document into [`RawFact`]s.
//!
//! Expected shape:
//! `{"cik": 320193, "entityName": "...", "facts": {"us-gaap": {"Revenues": {"units":
//! {"USD": [{"start": "2023-01-01", "end": "2023-12-31", "val": 1.0, "fy": 2023,
//! "fp": "FY", "form": "10-K", "filed": "2024-02-01"}]}}}}}`

use crate::error::{FinancialRecordError, Result};
use crate::schema::{FactsPayload, FiscalPeriod, RawFact, Unit};
use crate::utils::parse_iso_date;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct CompanyFactsDocument {
    #[serde(default)]
    cik: Option<Value>,
    #[serde(default, rename = "entityName")]
    entity_name: Option<String>,
    #[serde(default)]
    facts: BTreeMap<String, BTreeMap<String, TagFacts>>,
}

#[derive(Debug, Deserialize)]
struct TagFacts {
    #[serde(default)]
    units: BTreeMap<String, Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct FactEntry {
    start: Option<String>,
    end: String,
    val: f64,
    fy: Option<i32>,
    fp: Option<String>,
    form: Option<String>,
    filed: String,
}

#[derive(Debug, Clone)]
pub struct IngestedFacts {
    pub company: String,
    pub facts: Vec<RawFact>,
    /// Entries that could not be turned into a valid fact
    pub skipped: usize,
}

impl IngestedFacts {
    pub fn into_payload(self) -> FactsPayload {
        FactsPayload {
            company: self.company,
            facts: self.facts,
        }
    }
}

pub fn parse_company_facts(json: &str) -> Result<IngestedFacts> {
    let document: CompanyFactsDocument = serde_json::from_str(json)?;
    let company = company_id(&document);

    let mut facts = Vec::new();
    let mut skipped = 0;

    for (taxonomy, tags) in &document.facts {
        for (tag, tag_facts) in tags {
            let concept_tag = format!("{}:{}", taxonomy, tag);

            for (unit_code, entries) in &tag_facts.units {
                let unit = Unit::from_code(unit_code);

                for entry in entries {
                    match convert_entry(&concept_tag, &unit, entry) {
                        Ok(fact) => facts.push(fact),
                        Err(e) => {
                            warn!("Skipping fact for {}: {}", company, e);
                            skipped += 1;
                        }
                    }
                }
            }
        }
    }

    debug!(
        "Ingested {} fact(s) for {} ({} skipped)",
        facts.len(),
        company,
        skipped
    );

    Ok(IngestedFacts {
        company,
        facts,
        skipped,
    })
}

fn company_id(document: &CompanyFactsDocument) -> String {
    match &document.cik {
        Some(Value::Number(n)) => format!("{:0>10}", n.to_string()),
        Some(Value::String(s)) if !s.trim().is_empty() => format!("{:0>10}", s.trim()),
        _ => document
            .entity_name
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
    }
}

fn convert_entry(concept_tag: &str, unit: &Unit, entry: &Value) -> Result<RawFact> {
    let malformed = |details: String| FinancialRecordError::MalformedFact {
        tag: concept_tag.to_string(),
        details,
    };

    let entry = FactEntry::deserialize(entry).map_err(|e| malformed(e.to_string()))?;

    let fiscal_year = entry
        .fy
        .ok_or_else(|| malformed("missing fiscal year".to_string()))?;
    let fiscal_period = entry
        .fp
        .as_deref()
        .and_then(FiscalPeriod::from_code)
        .ok_or_else(|| malformed(format!("unrecognised fiscal period {:?}", entry.fp)))?;

    let period_start = entry
        .start
        .as_deref()
        .map(parse_iso_date)
        .transpose()
        .map_err(|e| malformed(e.to_string()))?;
    let period_end = parse_iso_date(&entry.end).map_err(|e| malformed(e.to_string()))?;
    let filed_date = parse_iso_date(&entry.filed).map_err(|e| malformed(e.to_string()))?;

    let fact = RawFact {
        concept_tag: concept_tag.to_string(),
        value: entry.val,
        unit: unit.clone(),
        period_start,
        period_end,
        fiscal_year,
        fiscal_period,
        filed_date,
        form: entry.form,
    };
    fact.validate()?;
    Ok(fact)
}

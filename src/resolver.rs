//! Selection of one value per (concept, fiscal year) from the raw facts.

use crate::concepts::{CanonicalConcept, UnitKind};
use crate::config::{ResolverConfig, RestatementPolicy};
use crate::schema::{Confidence, RawFact, Unit};
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResolvedValue {
    pub concept: CanonicalConcept,
    /// `None` exactly when `confidence` is `Missing`
    pub value: Option<f64>,
    /// The reporting tag the value came from; `None` for derived or missing values
    pub source_tag: Option<String>,
    pub fiscal_year: i32,
    pub confidence: Confidence,
    /// Set when the fact's unit did not fit the concept or could not be converted
    pub unit_issue: Option<String>,
}

impl ResolvedValue {
    pub fn missing(concept: CanonicalConcept, fiscal_year: i32) -> Self {
        Self {
            concept,
            value: None,
            source_tag: None,
            fiscal_year,
            confidence: Confidence::Missing,
            unit_issue: None,
        }
    }

    pub fn derived(concept: CanonicalConcept, fiscal_year: i32, value: f64) -> Self {
        Self {
            concept,
            value: Some(value),
            source_tag: None,
            fiscal_year,
            confidence: Confidence::Derived,
            unit_issue: None,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.confidence == Confidence::Missing
    }
}

/// Facts grouped by local tag, input order preserved within each group.
#[derive(Debug, Default)]
pub struct FactIndex<'a> {
    by_tag: HashMap<&'a str, Vec<&'a RawFact>>,
}

impl<'a> FactIndex<'a> {
    pub fn new(facts: &'a [RawFact]) -> Self {
        Self::from_facts(facts.iter())
    }

    pub fn from_facts(facts: impl IntoIterator<Item = &'a RawFact>) -> Self {
        let mut by_tag: HashMap<&'a str, Vec<&'a RawFact>> = HashMap::new();
        for fact in facts {
            by_tag.entry(fact.local_tag()).or_default().push(fact);
        }
        Self { by_tag }
    }

    pub fn facts_for(&self, tag: &str) -> &[&'a RawFact] {
        self.by_tag.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fiscal years with at least one annual fact on a known alias.
    pub fn fiscal_years(&self) -> BTreeSet<i32> {
        CanonicalConcept::all()
            .iter()
            .flat_map(|c| c.aliases().iter())
            .flat_map(|tag| self.facts_for(tag).iter())
            .filter(|f| f.fiscal_period.is_annual())
            .map(|f| f.fiscal_year)
            .collect()
    }
}

pub struct FactResolver<'a> {
    config: &'a ResolverConfig,
}

impl<'a> FactResolver<'a> {
    pub fn new(config: &'a ResolverConfig) -> Self {
        Self { config }
    }

    pub fn resolve(
        &self,
        facts: &[RawFact],
        fiscal_year: i32,
        concept: CanonicalConcept,
    ) -> ResolvedValue {
        let index = FactIndex::new(facts);
        self.resolve_indexed(&index, fiscal_year, concept)
    }

    pub fn resolve_indexed(
        &self,
        index: &FactIndex<'_>,
        fiscal_year: i32,
        concept: CanonicalConcept,
    ) -> ResolvedValue {
        for (position, alias) in concept.aliases().iter().enumerate() {
            let Some(chosen) = self.select(index.facts_for(alias), fiscal_year) else {
                continue;
            };

            let (value, unit_issue) = self.normalize_unit(concept, chosen);
            if let Some(issue) = &unit_issue {
                warn!("FY{} {}: {}", fiscal_year, concept, issue);
            }

            let confidence = if position == 0 {
                Confidence::Exact
            } else {
                debug!("FY{} {} resolved via fallback tag {}", fiscal_year, concept, alias);
                Confidence::Fallback
            };

            return ResolvedValue {
                concept,
                value: Some(value),
                source_tag: Some((*alias).to_string()),
                fiscal_year,
                confidence,
                unit_issue,
            };
        }

        debug!("FY{} {} not reported under any alias", fiscal_year, concept);
        ResolvedValue::missing(concept, fiscal_year)
    }

    /// Resolves every dictionary concept for one fiscal year, in dictionary order.
    pub fn resolve_year(&self, index: &FactIndex<'_>, fiscal_year: i32) -> Vec<ResolvedValue> {
        CanonicalConcept::all()
            .iter()
            .map(|concept| self.resolve_indexed(index, fiscal_year, *concept))
            .collect()
    }

    /// Picks one annual fact for `fiscal_year` among those filed for that year and any
    /// later filing that reports the same period again.
    fn select<'f>(&self, facts: &[&'f RawFact], fiscal_year: i32) -> Option<&'f RawFact> {
        let annual = || facts.iter().copied().filter(|f| f.fiscal_period.is_annual());

        let mut own: Vec<&'f RawFact> = annual().filter(|f| f.fiscal_year == fiscal_year).collect();
        let current = own
            .iter()
            .copied()
            .max_by(|a, b| {
                a.period_end
                    .cmp(&b.period_end)
                    .then_with(|| a.span_days().cmp(&b.span_days()))
            })?;
        let (start, end) = (current.period_start, current.period_end);

        if self.config.drop_comparatives {
            // An annual filing repeats prior-year figures under its own fiscal year.
            own.retain(|f| f.period_end == end);
        }

        let restated: Vec<&'f RawFact> = annual()
            .filter(|f| f.fiscal_year > fiscal_year && f.period_start == start && f.period_end == end)
            .collect();
        if !restated.is_empty() {
            debug!(
                "FY{} {}: {} later filing(s) report the same period",
                fiscal_year,
                current.local_tag(),
                restated.len()
            );
        }

        own.into_iter()
            .chain(restated)
            .min_by(|a, b| self.preference(a, b))
    }

    /// `Less` means `a` is preferred over `b`.
    fn preference(&self, a: &RawFact, b: &RawFact) -> Ordering {
        let by_filing = match self.config.restatement_policy {
            RestatementPolicy::LatestFiled => b.filed_date.cmp(&a.filed_date),
            RestatementPolicy::EarliestFiled => a.filed_date.cmp(&b.filed_date),
        };

        by_filing
            .then_with(|| b.span_days().cmp(&a.span_days()))
            .then_with(|| b.period_end.cmp(&a.period_end))
    }

    fn normalize_unit(&self, concept: CanonicalConcept, fact: &RawFact) -> (f64, Option<String>) {
        let unit = &fact.unit;
        let fits = match concept.unit_kind() {
            UnitKind::Monetary => unit.currency().is_some() && !unit.is_per_share(),
            UnitKind::PerShare => unit.is_per_share(),
            UnitKind::Shares => *unit == Unit::Shares,
        };

        if !fits {
            return (
                fact.value,
                Some(format!(
                    "unexpected unit '{}' on tag {} (expected {:?}); value kept as reported",
                    unit,
                    fact.local_tag(),
                    concept.unit_kind()
                )),
            );
        }

        match unit.currency() {
            Some(code) if code != self.config.base_currency => {
                match self.config.conversion_rates.get(code) {
                    Some(rate) => {
                        debug!(
                            "Converted {} from {} to {} at {}",
                            concept, code, self.config.base_currency, rate
                        );
                        (fact.value * rate, None)
                    }
                    None => (
                        fact.value,
                        Some(format!(
                            "no conversion rate from {} to {}; value kept in {}",
                            code, self.config.base_currency, code
                        )),
                    ),
                }
            }
            _ => (fact.value, None),
        }
    }
}

pub fn resolve(
    config: &ResolverConfig,
    facts: &[RawFact],
    fiscal_year: i32,
    concept: CanonicalConcept,
) -> ResolvedValue {
    FactResolver::new(config).resolve(facts, fiscal_year, concept)
}

pub fn fiscal_years(facts: &[RawFact]) -> BTreeSet<i32> {
    FactIndex::new(facts).fiscal_years()
}

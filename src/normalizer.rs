//! Per-year statement assembly: one slot per dictionary concept, scaled and
//! completed from accounting identities.

use crate::concepts::{CanonicalConcept, StatementKind, UnitKind};
use crate::config::NormalizerConfig;
use crate::resolver::ResolvedValue;
use crate::schema::Confidence;
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FinancialStatement {
    pub fiscal_year: i32,
    pub values: BTreeMap<CanonicalConcept, ResolvedValue>,
}

impl FinancialStatement {
    /// A statement with every dictionary concept present and missing.
    pub fn empty(fiscal_year: i32) -> Self {
        let values = CanonicalConcept::all()
            .iter()
            .map(|c| (*c, ResolvedValue::missing(*c, fiscal_year)))
            .collect();
        Self {
            fiscal_year,
            values,
        }
    }

    pub fn get(&self, concept: CanonicalConcept) -> Option<&ResolvedValue> {
        self.values.get(&concept)
    }

    pub fn value(&self, concept: CanonicalConcept) -> Option<f64> {
        self.values.get(&concept).and_then(|v| v.value)
    }

    /// True when the value came from a filing rather than a derivation.
    pub fn is_reported(&self, concept: CanonicalConcept) -> bool {
        matches!(
            self.get(concept).map(|v| v.confidence),
            Some(Confidence::Exact) | Some(Confidence::Fallback)
        )
    }

    pub fn section(&self, kind: StatementKind) -> impl Iterator<Item = &ResolvedValue> {
        self.values
            .values()
            .filter(move |v| v.concept.statement() == kind)
    }

    pub fn income(&self) -> impl Iterator<Item = &ResolvedValue> {
        self.section(StatementKind::Income)
    }

    pub fn balance(&self) -> impl Iterator<Item = &ResolvedValue> {
        self.section(StatementKind::Balance)
    }

    pub fn cash_flow(&self) -> impl Iterator<Item = &ResolvedValue> {
        self.section(StatementKind::CashFlow)
    }

    /// Share of dictionary concepts with a value.
    pub fn completeness(&self) -> f64 {
        let total = CanonicalConcept::all().len();
        let present = CanonicalConcept::all()
            .iter()
            .filter(|c| self.value(**c).is_some())
            .count();
        present as f64 / total as f64
    }

    pub fn unit_issues(&self) -> impl Iterator<Item = (CanonicalConcept, &str)> {
        self.values
            .values()
            .filter_map(|v| v.unit_issue.as_deref().map(|issue| (v.concept, issue)))
    }
}

type Identity = (
    CanonicalConcept,
    CanonicalConcept,
    CanonicalConcept,
    fn(f64, f64) -> f64,
);

/// Applied in order; a later identity may use a value derived by an earlier one.
const IDENTITIES: [Identity; 6] = [
    (
        CanonicalConcept::Revenue,
        CanonicalConcept::GrossProfit,
        CanonicalConcept::CostOfRevenue,
        add,
    ),
    (
        CanonicalConcept::GrossProfit,
        CanonicalConcept::Revenue,
        CanonicalConcept::CostOfRevenue,
        sub,
    ),
    (
        CanonicalConcept::OperatingIncome,
        CanonicalConcept::GrossProfit,
        CanonicalConcept::OperatingExpenses,
        sub,
    ),
    (
        CanonicalConcept::IncomeBeforeTax,
        CanonicalConcept::NetIncome,
        CanonicalConcept::IncomeTaxExpense,
        add,
    ),
    (
        CanonicalConcept::TotalLiabilities,
        CanonicalConcept::LiabilitiesAndEquity,
        CanonicalConcept::StockholdersEquity,
        sub,
    ),
    (
        CanonicalConcept::LiabilitiesAndEquity,
        CanonicalConcept::TotalLiabilities,
        CanonicalConcept::StockholdersEquity,
        add,
    ),
];

fn add(a: f64, b: f64) -> f64 {
    a + b
}

fn sub(a: f64, b: f64) -> f64 {
    a - b
}

pub struct StatementNormalizer<'a> {
    config: &'a NormalizerConfig,
}

impl<'a> StatementNormalizer<'a> {
    pub fn new(config: &'a NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        fiscal_year: i32,
        resolved: impl IntoIterator<Item = ResolvedValue>,
    ) -> FinancialStatement {
        let mut statement = FinancialStatement::empty(fiscal_year);

        for mut value in resolved {
            if value.fiscal_year != fiscal_year {
                warn!(
                    "Ignoring {} resolved for FY{} while building FY{}",
                    value.concept, value.fiscal_year, fiscal_year
                );
                continue;
            }

            if value.concept.unit_kind() == UnitKind::Monetary {
                value.value = value.value.map(|v| v * self.config.reporting_scale);
            }

            statement.values.insert(value.concept, value);
        }

        if self.config.derive_missing {
            self.apply_identities(&mut statement);
        }

        statement
    }

    fn apply_identities(&self, statement: &mut FinancialStatement) {
        for (target, left, right, op) in IDENTITIES {
            if statement.value(target).is_some() {
                continue;
            }

            if let (Some(a), Some(b)) = (statement.value(left), statement.value(right)) {
                let derived = op(a, b);
                debug!(
                    "FY{} derived {} = {} from {} and {}",
                    statement.fiscal_year, target, derived, left, right
                );
                statement.values.insert(
                    target,
                    ResolvedValue::derived(target, statement.fiscal_year, derived),
                );
            }
        }
    }
}

pub fn build_statement(
    config: &NormalizerConfig,
    fiscal_year: i32,
    resolved: impl IntoIterator<Item = ResolvedValue>,
) -> FinancialStatement {
    StatementNormalizer::new(config).build(fiscal_year, resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use CanonicalConcept::*;

    fn reported(concept: CanonicalConcept, value: f64) -> ResolvedValue {
        ResolvedValue {
            concept,
            value: Some(value),
            source_tag: Some(concept.aliases()[0].to_string()),
            fiscal_year: 2023,
            confidence: Confidence::Exact,
            unit_issue: None,
        }
    }

    #[test]
    fn test_every_slot_is_filled() {
        let config = NormalizerConfig::default();
        let statement = build_statement(&config, 2023, vec![reported(Revenue, 100.0)]);

        assert_eq!(statement.values.len(), CanonicalConcept::all().len());
        assert_eq!(statement.value(Revenue), Some(100.0));
        assert_eq!(statement.get(Goodwill).unwrap().confidence, Confidence::Missing);
        assert_eq!(statement.income().count(), 14);
        assert_eq!(statement.balance().count(), 17);
        assert_eq!(statement.cash_flow().count(), 7);
    }

    #[test]
    fn test_gross_profit_derived_from_revenue_and_cost() {
        let config = NormalizerConfig::default();
        let statement = build_statement(
            &config,
            2023,
            vec![
                reported(Revenue, 1_000.0),
                reported(CostOfRevenue, 600.0),
                reported(OperatingExpenses, 150.0),
            ],
        );

        let gross = statement.get(GrossProfit).unwrap();
        assert_eq!(gross.value, Some(400.0));
        assert_eq!(gross.confidence, Confidence::Derived);
        assert_eq!(gross.source_tag, None);

        // Chained through the derived gross profit.
        assert_eq!(statement.value(OperatingIncome), Some(250.0));
    }

    #[test]
    fn test_revenue_derived_before_gross_profit() {
        let config = NormalizerConfig::default();
        let statement = build_statement(
            &config,
            2023,
            vec![reported(GrossProfit, 300.0), reported(CostOfRevenue, 700.0)],
        );

        assert_eq!(statement.value(Revenue), Some(1_000.0));
        assert_eq!(statement.get(GrossProfit).unwrap().confidence, Confidence::Exact);
    }

    #[test]
    fn test_reported_values_are_not_overwritten() {
        let config = NormalizerConfig::default();
        let statement = build_statement(
            &config,
            2023,
            vec![
                reported(Revenue, 1_000.0),
                reported(CostOfRevenue, 600.0),
                reported(GrossProfit, 390.0),
            ],
        );
        assert_eq!(statement.value(GrossProfit), Some(390.0));
    }

    #[test]
    fn test_balance_identities() {
        let config = NormalizerConfig::default();
        let statement = build_statement(
            &config,
            2023,
            vec![
                reported(LiabilitiesAndEquity, 1_000.0),
                reported(StockholdersEquity, 300.0),
                reported(NetIncome, 80.0),
                reported(IncomeTaxExpense, 20.0),
            ],
        );

        assert_eq!(statement.value(TotalLiabilities), Some(700.0));
        assert_eq!(statement.value(IncomeBeforeTax), Some(100.0));
    }

    #[test]
    fn test_missing_operand_leaves_target_missing() {
        let config = NormalizerConfig::default();
        let statement = build_statement(&config, 2023, vec![reported(Revenue, 1_000.0)]);

        assert_eq!(statement.value(GrossProfit), None);
        assert_eq!(statement.get(GrossProfit).unwrap().confidence, Confidence::Missing);
    }

    #[test]
    fn test_derivation_can_be_disabled() {
        let config = NormalizerConfig {
            derive_missing: false,
            ..NormalizerConfig::default()
        };
        let statement = build_statement(
            &config,
            2023,
            vec![reported(Revenue, 1_000.0), reported(CostOfRevenue, 600.0)],
        );
        assert_eq!(statement.value(GrossProfit), None);
    }

    #[test]
    fn test_scale_applies_to_monetary_concepts_only() {
        let config = NormalizerConfig {
            reporting_scale: 0.001,
            ..NormalizerConfig::default()
        };
        let statement = build_statement(
            &config,
            2023,
            vec![
                reported(Revenue, 5_000.0),
                reported(EpsDiluted, 2.5),
                reported(SharesOutstanding, 1_000.0),
            ],
        );

        assert!((statement.value(Revenue).unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(statement.value(EpsDiluted), Some(2.5));
        assert_eq!(statement.value(SharesOutstanding), Some(1_000.0));
    }

    #[test]
    fn test_other_year_values_ignored() {
        let config = NormalizerConfig::default();
        let mut stray = reported(Revenue, 100.0);
        stray.fiscal_year = 2022;

        let statement = build_statement(&config, 2023, vec![stray]);
        assert_eq!(statement.value(Revenue), None);
    }

    #[test]
    fn test_completeness_and_unit_issues() {
        let config = NormalizerConfig::default();
        let mut flagged = reported(TotalAssets, 10.0);
        flagged.unit_issue = Some("no conversion rate from GBP to USD".to_string());

        let statement = build_statement(&config, 2023, vec![reported(Revenue, 1.0), flagged]);
        let expected = 2.0 / CanonicalConcept::all().len() as f64;
        assert!((statement.completeness() - expected).abs() < 1e-12);

        let issues: Vec<_> = statement.unit_issues().collect();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].0, TotalAssets);
        assert!(statement.is_reported(Revenue));
        assert!(!statement.is_reported(Goodwill));
    }
}

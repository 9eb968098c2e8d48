use crate::concepts::CanonicalConcept;
use crate::config::ValidationConfig;
use crate::metrics::{DerivedMetricSet, Metric};
use crate::normalizer::FinancialStatement;
use crate::utils::{mean, population_std_dev, quantile};
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Quality checks, declared in evaluation order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QualityCheck {
    BalanceSheetEquation,
    MarginPlausibility,
    CashFlowReasonableness,
    IncomeStatementArithmetic,
    SignConstraints,
    UnitConsistency,
    Completeness,
}

static ALL_CHECKS: [QualityCheck; 7] = [
    QualityCheck::BalanceSheetEquation,
    QualityCheck::MarginPlausibility,
    QualityCheck::CashFlowReasonableness,
    QualityCheck::IncomeStatementArithmetic,
    QualityCheck::SignConstraints,
    QualityCheck::UnitConsistency,
    QualityCheck::Completeness,
];

impl QualityCheck {
    pub fn all() -> &'static [QualityCheck] {
        &ALL_CHECKS
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BalanceSheetEquation => "balance_sheet_equation",
            Self::MarginPlausibility => "margin_plausibility",
            Self::CashFlowReasonableness => "cash_flow_reasonableness",
            Self::IncomeStatementArithmetic => "income_statement_arithmetic",
            Self::SignConstraints => "sign_constraints",
            Self::UnitConsistency => "unit_consistency",
            Self::Completeness => "completeness",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CheckOutcome {
    pub status: CheckStatus,
    /// In [0, 1]; not counted towards the overall score when skipped
    pub score: f64,
    pub absolute_deviation: Option<f64>,
    pub relative_deviation: Option<f64>,
}

impl CheckOutcome {
    fn pass() -> Self {
        Self::scored(CheckStatus::Pass, 1.0)
    }

    fn fail() -> Self {
        Self::scored(CheckStatus::Fail, 0.0)
    }

    fn skipped() -> Self {
        Self::scored(CheckStatus::Skipped, 0.0)
    }

    fn scored(status: CheckStatus, score: f64) -> Self {
        Self {
            status,
            score,
            absolute_deviation: None,
            relative_deviation: None,
        }
    }

    fn with_deviation(mut self, absolute: f64, relative: f64) -> Self {
        self.absolute_deviation = Some(absolute);
        self.relative_deviation = Some(relative);
        self
    }

    pub fn is_skipped(&self) -> bool {
        self.status == CheckStatus::Skipped
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QualityStatus {
    Ok,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QualityAssessment {
    pub fiscal_year: i32,
    pub completeness: f64,
    pub checks: BTreeMap<QualityCheck, CheckOutcome>,
    pub overall_score: f64,
    pub status: QualityStatus,
    /// Human-readable findings in check order
    pub issues: Vec<String>,
}

impl QualityAssessment {
    pub fn check(&self, check: QualityCheck) -> Option<&CheckOutcome> {
        self.checks.get(&check)
    }
}

/// Fewest values a metric series needs before outliers or year-on-year
/// anomalies are looked for.
const MIN_ANOMALY_SAMPLE: usize = 3;

/// Spread below this (relative to the values) is rounding noise, not dispersion.
const SPREAD_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Further from the series mean than `outlier_z_threshold` standard deviations
    ZScore,
    /// Outside the interquartile fences
    Iqr,
    /// Relative change from the prior fiscal year above `temporal_change_threshold`
    TemporalChange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricAnomaly {
    pub metric: Metric,
    pub fiscal_year: i32,
    pub value: f64,
    pub kind: AnomalyKind,
    /// The z-score, the distance past the nearest fence, or the relative change
    pub statistic: f64,
}

impl MetricAnomaly {
    pub fn describe(&self) -> String {
        match self.kind {
            AnomalyKind::ZScore => format!(
                "FY{} {} = {:.4} is an outlier (z = {:+.2})",
                self.fiscal_year, self.metric, self.value, self.statistic
            ),
            AnomalyKind::Iqr => format!(
                "FY{} {} = {:.4} lies {:.4} outside the interquartile fences",
                self.fiscal_year, self.metric, self.value, self.statistic
            ),
            AnomalyKind::TemporalChange => format!(
                "FY{} {} changed {:+.1}% from the prior year",
                self.fiscal_year,
                self.metric,
                self.statistic * 100.0
            ),
        }
    }
}

/// Continuity and volatility findings across a company's years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SeriesAssessment {
    pub years_covered: Vec<i32>,
    /// Years inside the covered span with no statement
    pub gap_years: Vec<i32>,
    /// Present years divided by the span length; 0 for an empty series
    pub continuity: f64,
    /// Outliers and extreme year-on-year changes, per metric in metric order
    pub anomalies: Vec<MetricAnomaly>,
    pub findings: Vec<String>,
}

pub struct ConsistencyValidator<'a> {
    config: &'a ValidationConfig,
}

impl<'a> ConsistencyValidator<'a> {
    pub fn new(config: &'a ValidationConfig) -> Self {
        Self { config }
    }

    pub fn assess(&self, statement: &FinancialStatement) -> QualityAssessment {
        let mut checks = BTreeMap::new();
        let mut issues = Vec::new();

        checks.insert(
            QualityCheck::BalanceSheetEquation,
            self.check_balance_sheet(statement, &mut issues),
        );
        checks.insert(
            QualityCheck::MarginPlausibility,
            self.check_margins(statement, &mut issues),
        );
        checks.insert(
            QualityCheck::CashFlowReasonableness,
            self.check_cash_flow(statement, &mut issues),
        );
        checks.insert(
            QualityCheck::IncomeStatementArithmetic,
            self.check_gross_profit(statement, &mut issues),
        );
        checks.insert(
            QualityCheck::SignConstraints,
            self.check_signs(statement, &mut issues),
        );
        checks.insert(
            QualityCheck::UnitConsistency,
            self.check_units(statement, &mut issues),
        );

        let completeness = statement.completeness();
        checks.insert(
            QualityCheck::Completeness,
            self.check_completeness(completeness, &mut issues),
        );

        let overall_score = self.overall_score(&checks);
        let status = if overall_score < self.config.warning_threshold {
            warn!(
                "FY{} quality score {:.3} below threshold {:.3}",
                statement.fiscal_year, overall_score, self.config.warning_threshold
            );
            QualityStatus::Warning
        } else {
            QualityStatus::Ok
        };

        debug!(
            "FY{} assessed: score {:.3}, completeness {:.3}, {} issue(s)",
            statement.fiscal_year,
            overall_score,
            completeness,
            issues.len()
        );

        QualityAssessment {
            fiscal_year: statement.fiscal_year,
            completeness,
            checks,
            overall_score,
            status,
            issues,
        }
    }

    fn overall_score(&self, checks: &BTreeMap<QualityCheck, CheckOutcome>) -> f64 {
        let (weighted, total) = checks
            .iter()
            .filter(|(_, outcome)| !outcome.is_skipped())
            .map(|(check, outcome)| {
                let weight = self.config.weights.weight_for(*check);
                (outcome.score * weight, weight)
            })
            .fold((0.0, 0.0), |(s, t), (ws, w)| (s + ws, t + w));

        if total > 0.0 {
            weighted / total
        } else {
            0.0
        }
    }

    fn check_balance_sheet(
        &self,
        statement: &FinancialStatement,
        issues: &mut Vec<String>,
    ) -> CheckOutcome {
        let (Some(assets), Some(liabilities), Some(equity)) = (
            statement.value(CanonicalConcept::TotalAssets),
            statement.value(CanonicalConcept::TotalLiabilities),
            statement.value(CanonicalConcept::StockholdersEquity),
        ) else {
            return CheckOutcome::skipped();
        };

        if assets == 0.0 {
            return CheckOutcome::skipped();
        }

        let discrepancy = (assets - (liabilities + equity)).abs();
        let relative = discrepancy / assets.abs();

        if relative <= self.config.balance_tolerance {
            CheckOutcome::pass().with_deviation(discrepancy, relative)
        } else {
            issues.push(format!(
                "Assets {} differ from liabilities {} + equity {} by {} ({:.2}%)",
                assets,
                liabilities,
                equity,
                discrepancy,
                relative * 100.0
            ));
            CheckOutcome::fail().with_deviation(discrepancy, relative)
        }
    }

    fn check_margins(&self, statement: &FinancialStatement, issues: &mut Vec<String>) -> CheckOutcome {
        let revenue = match statement.value(CanonicalConcept::Revenue) {
            Some(r) if r != 0.0 => r,
            _ => return CheckOutcome::skipped(),
        };

        let margins: Vec<(&str, f64)> = [
            ("gross", CanonicalConcept::GrossProfit),
            ("operating", CanonicalConcept::OperatingIncome),
            ("net", CanonicalConcept::NetIncome),
        ]
        .into_iter()
        .filter_map(|(name, concept)| statement.value(concept).map(|v| (name, v / revenue)))
        .collect();

        if margins.is_empty() {
            return CheckOutcome::skipped();
        }

        let bounds = self.config.margin_floor..=self.config.margin_ceiling;
        let mut in_bounds = 0;
        for (name, margin) in &margins {
            if bounds.contains(margin) {
                in_bounds += 1;
            } else {
                issues.push(format!(
                    "Implausible {} margin {:.2}% (allowed {:.0}% to {:.0}%)",
                    name,
                    margin * 100.0,
                    self.config.margin_floor * 100.0,
                    self.config.margin_ceiling * 100.0
                ));
            }
        }

        let score = in_bounds as f64 / margins.len() as f64;
        let status = if in_bounds == margins.len() {
            CheckStatus::Pass
        } else {
            CheckStatus::Fail
        };
        CheckOutcome::scored(status, score)
    }

    fn check_cash_flow(&self, statement: &FinancialStatement, issues: &mut Vec<String>) -> CheckOutcome {
        let (Some(ocf), Some(revenue)) = (
            statement.value(CanonicalConcept::OperatingCashFlow),
            statement.value(CanonicalConcept::Revenue),
        ) else {
            return CheckOutcome::skipped();
        };

        if revenue == 0.0 {
            return CheckOutcome::skipped();
        }

        let multiple = ocf.abs() / revenue.abs();
        if multiple <= self.config.max_cash_flow_to_revenue {
            CheckOutcome::pass()
        } else {
            issues.push(format!(
                "Operating cash flow {} is {:.1}x revenue {}",
                ocf, multiple, revenue
            ));
            CheckOutcome::fail()
        }
    }

    fn check_gross_profit(
        &self,
        statement: &FinancialStatement,
        issues: &mut Vec<String>,
    ) -> CheckOutcome {
        let reported = [
            CanonicalConcept::Revenue,
            CanonicalConcept::CostOfRevenue,
            CanonicalConcept::GrossProfit,
        ]
        .into_iter()
        .all(|c| statement.is_reported(c));

        let (true, Some(revenue), Some(cost), Some(gross)) = (
            reported,
            statement.value(CanonicalConcept::Revenue),
            statement.value(CanonicalConcept::CostOfRevenue),
            statement.value(CanonicalConcept::GrossProfit),
        ) else {
            return CheckOutcome::skipped();
        };

        if revenue == 0.0 {
            return CheckOutcome::skipped();
        }

        let discrepancy = (gross - (revenue - cost)).abs();
        let relative = discrepancy / revenue.abs();
        if relative <= self.config.gross_profit_tolerance {
            CheckOutcome::pass().with_deviation(discrepancy, relative)
        } else {
            issues.push(format!(
                "Reported gross profit {} differs from revenue - cost of revenue {} by {}",
                gross,
                revenue - cost,
                discrepancy
            ));
            CheckOutcome::fail().with_deviation(discrepancy, relative)
        }
    }

    fn check_signs(&self, statement: &FinancialStatement, issues: &mut Vec<String>) -> CheckOutcome {
        let present: Vec<(CanonicalConcept, f64)> = [
            CanonicalConcept::Revenue,
            CanonicalConcept::TotalAssets,
            CanonicalConcept::CashAndEquivalents,
        ]
        .into_iter()
        .filter_map(|c| statement.value(c).map(|v| (c, v)))
        .collect();

        if present.is_empty() {
            return CheckOutcome::skipped();
        }

        let negatives: Vec<_> = present.iter().filter(|(_, v)| *v < 0.0).collect();
        for (concept, value) in &negatives {
            issues.push(format!("Negative {}: {}", concept, value));
        }

        if negatives.is_empty() {
            CheckOutcome::pass()
        } else {
            let score = 1.0 - negatives.len() as f64 / present.len() as f64;
            CheckOutcome::scored(CheckStatus::Fail, score)
        }
    }

    fn check_units(&self, statement: &FinancialStatement, issues: &mut Vec<String>) -> CheckOutcome {
        let flagged: Vec<(CanonicalConcept, &str)> = statement.unit_issues().collect();
        if flagged.is_empty() {
            return CheckOutcome::pass();
        }

        for (concept, issue) in &flagged {
            issues.push(format!("Unit issue on {}: {}", concept, issue));
        }

        let present = statement.values.values().filter(|v| v.value.is_some()).count();
        let score = if present > 0 {
            (1.0 - flagged.len() as f64 / present as f64).max(0.0)
        } else {
            0.0
        };
        CheckOutcome::scored(CheckStatus::Fail, score)
    }

    fn check_completeness(&self, completeness: f64, issues: &mut Vec<String>) -> CheckOutcome {
        let status = if completeness >= self.config.min_completeness {
            CheckStatus::Pass
        } else {
            issues.push(format!(
                "Only {:.0}% of concepts available (minimum {:.0}%)",
                completeness * 100.0,
                self.config.min_completeness * 100.0
            ));
            CheckStatus::Fail
        };
        CheckOutcome::scored(status, completeness)
    }

    /// `statements` and `metric_sets` may be in any order; duplicates by year count once.
    pub fn assess_series(
        &self,
        statements: &[FinancialStatement],
        metric_sets: &[DerivedMetricSet],
    ) -> SeriesAssessment {
        let by_year: BTreeMap<i32, &FinancialStatement> =
            statements.iter().map(|s| (s.fiscal_year, s)).collect();

        let years_covered: Vec<i32> = by_year.keys().copied().collect();
        let (Some(&first), Some(&last)) = (years_covered.first(), years_covered.last()) else {
            return SeriesAssessment {
                years_covered,
                gap_years: Vec::new(),
                continuity: 0.0,
                anomalies: Vec::new(),
                findings: Vec::new(),
            };
        };

        // Fact validation ties fiscal years to period dates, which bounds the span.
        let gap_years: Vec<i32> = (first..=last).filter(|y| !by_year.contains_key(y)).collect();
        let span = (i64::from(last) - i64::from(first) + 1) as f64;
        let continuity = years_covered.len() as f64 / span;

        let mut findings = Vec::new();
        if !gap_years.is_empty() {
            findings.push(format!("Missing fiscal years: {:?}", gap_years));
        }

        for (year, statement) in &by_year {
            let Some(prior_year) = year.checked_sub(1) else {
                continue;
            };
            let Some(prior) = by_year.get(&prior_year) else {
                continue;
            };
            let (Some(curr), Some(prev)) = (
                statement.value(CanonicalConcept::Revenue),
                prior.value(CanonicalConcept::Revenue),
            ) else {
                continue;
            };
            if prev == 0.0 {
                continue;
            }

            let change = (curr - prev) / prev.abs();
            if change.abs() > self.config.revenue_swing_threshold {
                findings.push(format!(
                    "Revenue changed {:+.1}% from FY{} to FY{}",
                    change * 100.0,
                    prior_year,
                    year
                ));
            }
        }

        let anomalies = self.metric_anomalies(metric_sets);
        findings.extend(anomalies.iter().map(MetricAnomaly::describe));

        SeriesAssessment {
            years_covered,
            gap_years,
            continuity,
            anomalies,
            findings,
        }
    }

    fn metric_anomalies(&self, metric_sets: &[DerivedMetricSet]) -> Vec<MetricAnomaly> {
        let by_year: BTreeMap<i32, &DerivedMetricSet> =
            metric_sets.iter().map(|m| (m.fiscal_year, m)).collect();

        let mut anomalies = Vec::new();
        for &metric in Metric::all() {
            let series: Vec<(i32, f64)> = by_year
                .iter()
                .filter_map(|(year, set)| set.get(metric).map(|value| (*year, value)))
                .collect();
            if series.len() < MIN_ANOMALY_SAMPLE {
                continue;
            }

            anomalies.extend(self.z_score_outliers(metric, &series));
            anomalies.extend(self.iqr_outliers(metric, &series));
            anomalies.extend(self.temporal_changes(metric, &series));
        }

        if !anomalies.is_empty() {
            debug!("Found {} metric anomalies", anomalies.len());
        }
        anomalies
    }

    fn z_score_outliers(&self, metric: Metric, series: &[(i32, f64)]) -> Vec<MetricAnomaly> {
        let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
        let (Some(avg), Some(std_dev)) = (mean(&values), population_std_dev(&values)) else {
            return Vec::new();
        };
        if std_dev <= SPREAD_TOLERANCE * avg.abs().max(1.0) {
            return Vec::new();
        }

        series
            .iter()
            .filter_map(|&(fiscal_year, value)| {
                let z = (value - avg) / std_dev;
                (z.abs() > self.config.outlier_z_threshold).then_some(MetricAnomaly {
                    metric,
                    fiscal_year,
                    value,
                    kind: AnomalyKind::ZScore,
                    statistic: z,
                })
            })
            .collect()
    }

    fn iqr_outliers(&self, metric: Metric, series: &[(i32, f64)]) -> Vec<MetricAnomaly> {
        let mut sorted: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
        sorted.sort_by(f64::total_cmp);
        let (Some(q1), Some(q3)) = (quantile(&sorted, 0.25), quantile(&sorted, 0.75)) else {
            return Vec::new();
        };

        let reach = (q3 - q1) * self.config.outlier_iqr_multiplier;
        let (low, high) = (q1 - reach, q3 + reach);
        let tolerance = SPREAD_TOLERANCE * q1.abs().max(q3.abs()).max(1.0);

        series
            .iter()
            .filter_map(|&(fiscal_year, value)| {
                let beyond = (low - value).max(value - high);
                (beyond > tolerance).then_some(MetricAnomaly {
                    metric,
                    fiscal_year,
                    value,
                    kind: AnomalyKind::Iqr,
                    statistic: beyond,
                })
            })
            .collect()
    }

    /// Changes between consecutive fiscal years only; a gap breaks the comparison.
    fn temporal_changes(&self, metric: Metric, series: &[(i32, f64)]) -> Vec<MetricAnomaly> {
        series
            .windows(2)
            .filter_map(|pair| {
                let [(prior_year, prior), (fiscal_year, value)] = pair else {
                    return None;
                };
                if prior_year.checked_add(1) != Some(*fiscal_year) || *prior == 0.0 {
                    return None;
                }

                let change = (value - prior) / prior.abs();
                (change.abs() > self.config.temporal_change_threshold).then_some(MetricAnomaly {
                    metric,
                    fiscal_year: *fiscal_year,
                    value: *value,
                    kind: AnomalyKind::TemporalChange,
                    statistic: change,
                })
            })
            .collect()
    }
}

pub fn assess_statement(config: &ValidationConfig, statement: &FinancialStatement) -> QualityAssessment {
    ConsistencyValidator::new(config).assess(statement)
}

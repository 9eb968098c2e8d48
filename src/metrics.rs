//! Derived analytics per fiscal year: growth, profitability, liquidity,
//! leverage, cash-flow quality and rolling-window statistics.
//!
//! Every metric is always present in a [`DerivedMetricSet`]; an undefined value
//! (missing input, zero denominator, undefined root) is `None`, never zero or
//! infinite.

use crate::concepts::CanonicalConcept;
use crate::config::MetricsConfig;
use crate::normalizer::FinancialStatement;
use crate::utils::{cagr, finite, growth_rate, mean, positive_ratio, safe_ratio, sample_std_dev};
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    RevenueGrowthYoy,
    NetIncomeGrowthYoy,
    EpsGrowthYoy,
    OperatingCashFlowGrowthYoy,
    FreeCashFlowGrowthYoy,
    #[serde(rename = "revenue_cagr_3y")]
    RevenueCagr3y,
    #[serde(rename = "revenue_cagr_5y")]
    RevenueCagr5y,
    #[serde(rename = "net_income_cagr_3y")]
    NetIncomeCagr3y,
    GrossMargin,
    OperatingMargin,
    NetProfitMargin,
    Roe,
    Roa,
    Roic,
    CurrentRatio,
    QuickRatio,
    CashRatio,
    DebtToEquity,
    DebtToAssets,
    InterestCoverage,
    FreeCashFlow,
    FcfMargin,
    CashConversionRatio,
    CapexIntensity,
    AssetTurnover,
    WorkingCapital,
    WorkingCapitalTurnover,
    #[serde(rename = "revenue_growth_volatility_3y")]
    RevenueGrowthVolatility3y,
    #[serde(rename = "operating_margin_avg_3y")]
    OperatingMarginAvg3y,
}

static ALL_METRICS: [Metric; 29] = [
    Metric::RevenueGrowthYoy,
    Metric::NetIncomeGrowthYoy,
    Metric::EpsGrowthYoy,
    Metric::OperatingCashFlowGrowthYoy,
    Metric::FreeCashFlowGrowthYoy,
    Metric::RevenueCagr3y,
    Metric::RevenueCagr5y,
    Metric::NetIncomeCagr3y,
    Metric::GrossMargin,
    Metric::OperatingMargin,
    Metric::NetProfitMargin,
    Metric::Roe,
    Metric::Roa,
    Metric::Roic,
    Metric::CurrentRatio,
    Metric::QuickRatio,
    Metric::CashRatio,
    Metric::DebtToEquity,
    Metric::DebtToAssets,
    Metric::InterestCoverage,
    Metric::FreeCashFlow,
    Metric::FcfMargin,
    Metric::CashConversionRatio,
    Metric::CapexIntensity,
    Metric::AssetTurnover,
    Metric::WorkingCapital,
    Metric::WorkingCapitalTurnover,
    Metric::RevenueGrowthVolatility3y,
    Metric::OperatingMarginAvg3y,
];

impl Metric {
    pub fn all() -> &'static [Metric] {
        &ALL_METRICS
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RevenueGrowthYoy => "revenue_growth_yoy",
            Self::NetIncomeGrowthYoy => "net_income_growth_yoy",
            Self::EpsGrowthYoy => "eps_growth_yoy",
            Self::OperatingCashFlowGrowthYoy => "operating_cash_flow_growth_yoy",
            Self::FreeCashFlowGrowthYoy => "free_cash_flow_growth_yoy",
            Self::RevenueCagr3y => "revenue_cagr_3y",
            Self::RevenueCagr5y => "revenue_cagr_5y",
            Self::NetIncomeCagr3y => "net_income_cagr_3y",
            Self::GrossMargin => "gross_margin",
            Self::OperatingMargin => "operating_margin",
            Self::NetProfitMargin => "net_profit_margin",
            Self::Roe => "roe",
            Self::Roa => "roa",
            Self::Roic => "roic",
            Self::CurrentRatio => "current_ratio",
            Self::QuickRatio => "quick_ratio",
            Self::CashRatio => "cash_ratio",
            Self::DebtToEquity => "debt_to_equity",
            Self::DebtToAssets => "debt_to_assets",
            Self::InterestCoverage => "interest_coverage",
            Self::FreeCashFlow => "free_cash_flow",
            Self::FcfMargin => "fcf_margin",
            Self::CashConversionRatio => "cash_conversion_ratio",
            Self::CapexIntensity => "capex_intensity",
            Self::AssetTurnover => "asset_turnover",
            Self::WorkingCapital => "working_capital",
            Self::WorkingCapitalTurnover => "working_capital_turnover",
            Self::RevenueGrowthVolatility3y => "revenue_growth_volatility_3y",
            Self::OperatingMarginAvg3y => "operating_margin_avg_3y",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DerivedMetricSet {
    pub fiscal_year: i32,
    pub metrics: BTreeMap<Metric, Option<f64>>,
}

impl DerivedMetricSet {
    fn empty(fiscal_year: i32) -> Self {
        Self {
            fiscal_year,
            metrics: Metric::all().iter().map(|m| (*m, None)).collect(),
        }
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).copied().flatten()
    }

    fn set(&mut self, metric: Metric, value: Option<f64>) {
        self.metrics.insert(metric, value.and_then(finite));
    }
}

/// Statements keyed by fiscal year, so prior periods are found by year rather
/// than by position.
struct History<'s> {
    by_year: BTreeMap<i32, &'s FinancialStatement>,
}

impl<'s> History<'s> {
    fn value(&self, fiscal_year: i32, concept: CanonicalConcept) -> Option<f64> {
        self.by_year
            .get(&fiscal_year)
            .and_then(|s| s.value(concept))
    }

    fn eps(&self, fiscal_year: i32) -> Option<f64> {
        self.value(fiscal_year, CanonicalConcept::EpsDiluted)
            .or_else(|| self.value(fiscal_year, CanonicalConcept::EpsBasic))
    }

    fn free_cash_flow(&self, fiscal_year: i32) -> Option<f64> {
        let ocf = self.value(fiscal_year, CanonicalConcept::OperatingCashFlow)?;
        let capex = self.value(fiscal_year, CanonicalConcept::CapitalExpenditures)?;
        Some(ocf - capex.abs())
    }

    fn growth(&self, fiscal_year: i32, concept: CanonicalConcept) -> Option<f64> {
        let prior = fiscal_year.checked_sub(1)?;
        growth_rate(self.value(fiscal_year, concept), self.value(prior, concept))
    }

    fn compound_growth(&self, fiscal_year: i32, concept: CanonicalConcept, years: u32) -> Option<f64> {
        let start = i32::try_from(years)
            .ok()
            .and_then(|n| fiscal_year.checked_sub(n))?;
        cagr(
            self.value(fiscal_year, concept),
            self.value(start, concept),
            years,
        )
    }

    fn operating_margin(&self, fiscal_year: i32) -> Option<f64> {
        safe_ratio(
            self.value(fiscal_year, CanonicalConcept::OperatingIncome),
            self.value(fiscal_year, CanonicalConcept::Revenue),
        )
    }

    /// Values of `f` for the year and the `window - 1` years before it; `None`
    /// unless every year yields a value.
    fn window(&self, fiscal_year: i32, window: i32, f: impl Fn(i32) -> Option<f64>) -> Option<Vec<f64>> {
        let first = fiscal_year.checked_sub(window.checked_sub(1)?)?;
        (first..=fiscal_year).map(f).collect()
    }
}

pub struct MetricsEngine<'a> {
    config: &'a MetricsConfig,
}

impl<'a> MetricsEngine<'a> {
    pub fn new(config: &'a MetricsConfig) -> Self {
        Self { config }
    }

    /// One metric set per distinct fiscal year, ascending.
    pub fn compute(&self, statements: &[FinancialStatement]) -> Vec<DerivedMetricSet> {
        let mut by_year = BTreeMap::new();
        for statement in statements {
            if by_year.insert(statement.fiscal_year, statement).is_some() {
                warn!(
                    "Duplicate statement for FY{}; using the later one",
                    statement.fiscal_year
                );
            }
        }

        let history = History { by_year };
        history
            .by_year
            .keys()
            .map(|fy| self.compute_year(&history, *fy))
            .collect()
    }

    fn compute_year(&self, h: &History<'_>, fy: i32) -> DerivedMetricSet {
        use CanonicalConcept::*;

        let mut set = DerivedMetricSet::empty(fy);
        let v = |concept| h.value(fy, concept);

        let revenue = v(Revenue);
        let net_income = v(NetIncome);
        let equity = v(StockholdersEquity);
        let total_assets = v(TotalAssets);
        let total_liabilities = v(TotalLiabilities);
        let current_assets = v(CurrentAssets);
        let current_liabilities = v(CurrentLiabilities);
        let ocf = v(OperatingCashFlow);
        let capex = v(CapitalExpenditures);
        let fcf = h.free_cash_flow(fy);
        let prior = fy.checked_sub(1);

        // Growth
        set.set(Metric::RevenueGrowthYoy, h.growth(fy, Revenue));
        set.set(Metric::NetIncomeGrowthYoy, h.growth(fy, NetIncome));
        set.set(Metric::EpsGrowthYoy, growth_rate(h.eps(fy), prior.and_then(|p| h.eps(p))));
        set.set(Metric::OperatingCashFlowGrowthYoy, h.growth(fy, OperatingCashFlow));
        set.set(
            Metric::FreeCashFlowGrowthYoy,
            growth_rate(fcf, prior.and_then(|p| h.free_cash_flow(p))),
        );
        set.set(Metric::RevenueCagr3y, h.compound_growth(fy, Revenue, 3));
        set.set(Metric::RevenueCagr5y, h.compound_growth(fy, Revenue, 5));
        set.set(Metric::NetIncomeCagr3y, h.compound_growth(fy, NetIncome, 3));

        // Profitability
        set.set(Metric::GrossMargin, safe_ratio(v(GrossProfit), revenue));
        set.set(Metric::OperatingMargin, h.operating_margin(fy));
        set.set(Metric::NetProfitMargin, safe_ratio(net_income, revenue));
        set.set(Metric::Roe, positive_ratio(net_income, equity));
        set.set(Metric::Roa, positive_ratio(net_income, total_assets));
        set.set(Metric::Roic, self.roic(h, fy));

        // Liquidity and leverage
        set.set(Metric::CurrentRatio, safe_ratio(current_assets, current_liabilities));
        let quick_assets = match (current_assets, v(Inventory)) {
            (Some(ca), Some(inventory)) => Some(ca - inventory),
            _ => None,
        };
        set.set(Metric::QuickRatio, safe_ratio(quick_assets, current_liabilities));
        set.set(
            Metric::CashRatio,
            safe_ratio(v(CashAndEquivalents), current_liabilities),
        );
        set.set(Metric::DebtToEquity, safe_ratio(total_liabilities, equity));
        set.set(Metric::DebtToAssets, safe_ratio(total_liabilities, total_assets));
        set.set(
            Metric::InterestCoverage,
            safe_ratio(v(OperatingIncome), v(InterestExpense).map(f64::abs)),
        );

        // Cash flow
        set.set(Metric::FreeCashFlow, fcf);
        set.set(Metric::FcfMargin, safe_ratio(fcf, revenue));
        let cash_conversion = match net_income {
            Some(ni) if ni > 0.0 => safe_ratio(ocf, Some(ni)),
            _ => None,
        };
        set.set(Metric::CashConversionRatio, cash_conversion);
        set.set(
            Metric::CapexIntensity,
            safe_ratio(capex.map(f64::abs), revenue),
        );

        // Efficiency
        set.set(Metric::AssetTurnover, safe_ratio(revenue, total_assets));
        let working_capital = match (current_assets, current_liabilities) {
            (Some(ca), Some(cl)) => Some(ca - cl),
            _ => None,
        };
        set.set(Metric::WorkingCapital, working_capital);
        set.set(
            Metric::WorkingCapitalTurnover,
            safe_ratio(revenue, working_capital),
        );

        // Rolling windows
        let volatility = h
            .window(fy, 3, |year| h.growth(year, Revenue))
            .and_then(|growths| sample_std_dev(&growths));
        set.set(Metric::RevenueGrowthVolatility3y, volatility);
        let margin_avg = h
            .window(fy, 3, |year| h.operating_margin(year))
            .and_then(|margins| mean(&margins));
        set.set(Metric::OperatingMarginAvg3y, margin_avg);

        debug!(
            "FY{} metrics: {} of {} defined",
            fy,
            set.metrics.values().filter(|m| m.is_some()).count(),
            set.metrics.len()
        );

        set
    }

    /// NOPAT over equity plus short- and long-term debt.
    fn roic(&self, h: &History<'_>, fy: i32) -> Option<f64> {
        let operating_income = h.value(fy, CanonicalConcept::OperatingIncome)?;
        let equity = h.value(fy, CanonicalConcept::StockholdersEquity)?;

        let effective_rate = safe_ratio(
            h.value(fy, CanonicalConcept::IncomeTaxExpense),
            h.value(fy, CanonicalConcept::IncomeBeforeTax),
        )
        .filter(|rate| (0.0..=1.0).contains(rate));
        let tax_rate = effective_rate.unwrap_or(self.config.default_tax_rate);
        let nopat = operating_income * (1.0 - tax_rate);

        let debt = h.value(fy, CanonicalConcept::ShortTermDebt).unwrap_or(0.0)
            + h.value(fy, CanonicalConcept::LongTermDebt).unwrap_or(0.0);
        positive_ratio(Some(nopat), Some(equity + debt))
    }
}

pub fn compute_metrics(config: &MetricsConfig, statements: &[FinancialStatement]) -> Vec<DerivedMetricSet> {
    MetricsEngine::new(config).compute(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizerConfig;
    use crate::normalizer::build_statement;
    use crate::resolver::ResolvedValue;
    use crate::schema::Confidence;
    use CanonicalConcept::*;

    fn statement(fiscal_year: i32, values: &[(CanonicalConcept, f64)]) -> FinancialStatement {
        let resolved = values.iter().map(|(concept, value)| ResolvedValue {
            concept: *concept,
            value: Some(*value),
            source_tag: Some(concept.aliases()[0].to_string()),
            fiscal_year,
            confidence: Confidence::Exact,
            unit_issue: None,
        });
        build_statement(&NormalizerConfig::default(), fiscal_year, resolved)
    }

    fn close(actual: Option<f64>, expected: f64) -> bool {
        actual.map(|a| (a - expected).abs() < 1e-9).unwrap_or(false)
    }

    #[test]
    fn test_every_metric_key_present() {
        let sets = compute_metrics(&MetricsConfig::default(), &[statement(2023, &[])]);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].metrics.len(), Metric::all().len());
        assert!(sets[0].metrics.values().all(|m| m.is_none()));

        let json = serde_json::to_string(&sets[0]).unwrap();
        assert!(json.contains("\"revenue_cagr_3y\":null"));
        assert!(json.contains("\"roe\":null"));
    }

    #[test]
    fn test_growth_and_margin_scenario() {
        let sets = compute_metrics(
            &MetricsConfig::default(),
            &[
                statement(2023, &[(Revenue, 100.0), (NetIncome, 10.0)]),
                statement(2024, &[(Revenue, 110.0), (NetIncome, 11.0)]),
            ],
        );

        assert_eq!(sets[0].get(Metric::RevenueGrowthYoy), None);
        assert!(close(sets[1].get(Metric::RevenueGrowthYoy), 0.10));
        assert!(close(sets[1].get(Metric::NetIncomeGrowthYoy), 0.10));
        assert!(close(sets[1].get(Metric::NetProfitMargin), 0.10));
    }

    #[test]
    fn test_gap_year_breaks_yoy() {
        let sets = compute_metrics(
            &MetricsConfig::default(),
            &[
                statement(2021, &[(Revenue, 100.0)]),
                statement(2023, &[(Revenue, 130.0)]),
            ],
        );
        assert_eq!(sets[1].fiscal_year, 2023);
        assert_eq!(sets[1].get(Metric::RevenueGrowthYoy), None);
    }

    #[test]
    fn test_cagr_uses_year_n_back() {
        let sets = compute_metrics(
            &MetricsConfig::default(),
            &[
                statement(2020, &[(Revenue, 100.0)]),
                statement(2021, &[(Revenue, 110.0)]),
                statement(2022, &[(Revenue, 121.0)]),
                statement(2023, &[(Revenue, 133.1)]),
            ],
        );

        let latest = &sets[3];
        assert!(close(latest.get(Metric::RevenueCagr3y), 0.10));
        assert_eq!(latest.get(Metric::RevenueCagr5y), None);
        assert!(close(latest.get(Metric::RevenueGrowthVolatility3y), 0.0));
        assert_eq!(sets[2].get(Metric::RevenueCagr3y), None);
    }

    #[test]
    fn test_zero_denominators_yield_none() {
        let sets = compute_metrics(
            &MetricsConfig::default(),
            &[statement(
                2023,
                &[
                    (Revenue, 0.0),
                    (GrossProfit, 10.0),
                    (CurrentAssets, 50.0),
                    (CurrentLiabilities, 0.0),
                    (TotalAssets, 0.0),
                ],
            )],
        );

        let set = &sets[0];
        assert_eq!(set.get(Metric::GrossMargin), None);
        assert_eq!(set.get(Metric::CurrentRatio), None);
        assert_eq!(set.get(Metric::AssetTurnover), None);
        assert_eq!(set.get(Metric::DebtToAssets), None);
        assert!(close(set.get(Metric::WorkingCapital), 50.0));
    }

    #[test]
    fn test_eps_growth_falls_back_to_basic() {
        let sets = compute_metrics(
            &MetricsConfig::default(),
            &[
                statement(2023, &[(EpsBasic, 2.0)]),
                statement(2024, &[(EpsBasic, 2.6), (EpsDiluted, 2.5)]),
            ],
        );

        assert_eq!(sets[0].get(Metric::EpsGrowthYoy), None);
        // Diluted this year against basic last year.
        assert!(close(sets[1].get(Metric::EpsGrowthYoy), 0.25));
    }

    #[test]
    fn test_interest_coverage_uses_absolute_expense() {
        let sets = compute_metrics(
            &MetricsConfig::default(),
            &[
                statement(2023, &[(OperatingIncome, 120.0), (InterestExpense, -30.0)]),
                statement(2024, &[(OperatingIncome, 120.0), (InterestExpense, 40.0)]),
                statement(2025, &[(OperatingIncome, 120.0), (InterestExpense, 0.0)]),
            ],
        );

        assert!(close(sets[0].get(Metric::InterestCoverage), 4.0));
        assert!(close(sets[1].get(Metric::InterestCoverage), 3.0));
        assert_eq!(sets[2].get(Metric::InterestCoverage), None);
    }

    #[test]
    fn test_five_year_and_net_income_cagr() {
        let sets = compute_metrics(
            &MetricsConfig::default(),
            &[
                statement(2018, &[(Revenue, 100.0)]),
                statement(2020, &[(Revenue, 130.0), (NetIncome, 50.0)]),
                statement(2023, &[(Revenue, 161.051), (NetIncome, 400.0)]),
            ],
        );

        let latest = &sets[2];
        assert_eq!(latest.fiscal_year, 2023);
        assert!(close(latest.get(Metric::RevenueCagr5y), 0.10));
        assert!(close(latest.get(Metric::NetIncomeCagr3y), 1.0));
        assert_eq!(sets[1].get(Metric::RevenueCagr5y), None);
    }

    #[test]
    fn test_leverage_and_efficiency_ratios() {
        let sets = compute_metrics(
            &MetricsConfig::default(),
            &[statement(
                2023,
                &[
                    (Revenue, 600.0),
                    (TotalAssets, 1_200.0),
                    (TotalLiabilities, 300.0),
                    (CurrentAssets, 500.0),
                    (CurrentLiabilities, 300.0),
                ],
            )],
        );

        let set = &sets[0];
        assert!(close(set.get(Metric::DebtToAssets), 0.25));
        assert!(close(set.get(Metric::AssetTurnover), 0.5));
        assert!(close(set.get(Metric::WorkingCapital), 200.0));
        assert!(close(set.get(Metric::WorkingCapitalTurnover), 3.0));
    }

    #[test]
    fn test_cash_ratio_without_current_liabilities() {
        let sets = compute_metrics(
            &MetricsConfig::default(),
            &[statement(
                2023,
                &[(CashAndEquivalents, 50.0), (CurrentLiabilities, 0.0), (Revenue, 10.0)],
            )],
        );

        assert_eq!(sets[0].get(Metric::CashRatio), None);
        assert_eq!(sets[0].get(Metric::WorkingCapitalTurnover), None);
    }

    #[test]
    fn test_extreme_years_do_not_overflow() {
        let sets = compute_metrics(
            &MetricsConfig::default(),
            &[
                statement(i32::MIN, &[(Revenue, 100.0), (OperatingIncome, 10.0)]),
                statement(i32::MIN + 1, &[(Revenue, 110.0), (OperatingIncome, 11.0)]),
            ],
        );

        assert_eq!(sets[0].get(Metric::RevenueGrowthYoy), None);
        assert_eq!(sets[0].get(Metric::RevenueCagr3y), None);
        assert_eq!(sets[0].get(Metric::OperatingMarginAvg3y), None);
        assert!(close(sets[1].get(Metric::RevenueGrowthYoy), 0.10));
        assert_eq!(sets[1].get(Metric::OperatingMarginAvg3y), None);
    }

    #[test]
    fn test_returns_and_negative_equity() {
        let sets = compute_metrics(
            &MetricsConfig::default(),
            &[statement(
                2023,
                &[
                    (NetIncome, 20.0),
                    (StockholdersEquity, -50.0),
                    (TotalAssets, 400.0),
                    (TotalLiabilities, 450.0),
                ],
            )],
        );

        let set = &sets[0];
        assert_eq!(set.get(Metric::Roe), None);
        assert!(close(set.get(Metric::Roa), 0.05));
        assert!(close(set.get(Metric::DebtToEquity), -9.0));
    }

    #[test]
    fn test_liquidity_ratios() {
        let sets = compute_metrics(
            &MetricsConfig::default(),
            &[statement(
                2023,
                &[
                    (CurrentAssets, 300.0),
                    (Inventory, 100.0),
                    (CashAndEquivalents, 50.0),
                    (CurrentLiabilities, 200.0),
                ],
            )],
        );

        let set = &sets[0];
        assert!(close(set.get(Metric::CurrentRatio), 1.5));
        assert!(close(set.get(Metric::QuickRatio), 1.0));
        assert!(close(set.get(Metric::CashRatio), 0.25));

        let no_inventory = compute_metrics(
            &MetricsConfig::default(),
            &[statement(2023, &[(CurrentAssets, 300.0), (CurrentLiabilities, 200.0)])],
        );
        assert_eq!(no_inventory[0].get(Metric::QuickRatio), None);
    }

    #[test]
    fn test_free_cash_flow_metrics() {
        let sets = compute_metrics(
            &MetricsConfig::default(),
            &[
                statement(
                    2023,
                    &[
                        (Revenue, 1_000.0),
                        (NetIncome, 100.0),
                        (OperatingCashFlow, 150.0),
                        (CapitalExpenditures, 50.0),
                    ],
                ),
                statement(
                    2024,
                    &[
                        (Revenue, 1_000.0),
                        (NetIncome, -10.0),
                        (OperatingCashFlow, 180.0),
                        (CapitalExpenditures, -30.0),
                    ],
                ),
            ],
        );

        assert!(close(sets[0].get(Metric::FreeCashFlow), 100.0));
        assert!(close(sets[0].get(Metric::FcfMargin), 0.10));
        assert!(close(sets[0].get(Metric::CashConversionRatio), 1.5));
        assert!(close(sets[0].get(Metric::CapexIntensity), 0.05));

        assert!(close(sets[1].get(Metric::FreeCashFlow), 150.0));
        assert!(close(sets[1].get(Metric::FreeCashFlowGrowthYoy), 0.5));
        assert!(close(sets[1].get(Metric::OperatingCashFlowGrowthYoy), 0.2));
        assert_eq!(sets[1].get(Metric::CashConversionRatio), None);
    }

    #[test]
    fn test_roic_uses_effective_tax_rate() {
        let config = MetricsConfig::default();
        let sets = compute_metrics(
            &config,
            &[statement(
                2023,
                &[
                    (OperatingIncome, 100.0),
                    (IncomeBeforeTax, 100.0),
                    (IncomeTaxExpense, 25.0),
                    (StockholdersEquity, 500.0),
                    (ShortTermDebt, 50.0),
                    (LongTermDebt, 200.0),
                ],
            )],
        );
        assert!(close(sets[0].get(Metric::Roic), 0.10));

        // Without a computable effective rate the default applies.
        let sets = compute_metrics(
            &config,
            &[statement(2023, &[(OperatingIncome, 100.0), (StockholdersEquity, 790.0)])],
        );
        assert!(close(sets[0].get(Metric::Roic), 0.10));
    }

    #[test]
    fn test_operating_margin_average_needs_full_window() {
        let sets = compute_metrics(
            &MetricsConfig::default(),
            &[
                statement(2021, &[(Revenue, 100.0), (OperatingIncome, 10.0)]),
                statement(2022, &[(Revenue, 100.0), (OperatingIncome, 20.0)]),
                statement(2023, &[(Revenue, 100.0), (OperatingIncome, 30.0)]),
            ],
        );

        assert_eq!(sets[1].get(Metric::OperatingMarginAvg3y), None);
        assert!(close(sets[2].get(Metric::OperatingMarginAvg3y), 0.20));
    }

    #[test]
    fn test_duplicate_years_keep_later_statement() {
        let sets = compute_metrics(
            &MetricsConfig::default(),
            &[
                statement(2023, &[(Revenue, 100.0), (NetIncome, 5.0)]),
                statement(2023, &[(Revenue, 100.0), (NetIncome, 10.0)]),
            ],
        );
        assert_eq!(sets.len(), 1);
        assert!(close(sets[0].get(Metric::NetProfitMargin), 0.10));
    }
}

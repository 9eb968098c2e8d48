//! Multi-year performance summary over a company's derived metrics: averages,
//! direction of travel and a few plain-language observations on the latest year.

use crate::metrics::{DerivedMetricSet, Metric};
use crate::utils::{mean, sample_std_dev};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const STRONG_GROWTH: f64 = 0.10;
const HIGH_OPERATING_MARGIN: f64 = 0.20;
const LOW_OPERATING_MARGIN: f64 = 0.05;
const STRONG_CURRENT_RATIO: f64 = 2.0;
const WEAK_CURRENT_RATIO: f64 = 1.0;
const EXCELLENT_FCF_MARGIN: f64 = 0.15;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl Trend {
    /// Last defined value against the first; fewer than two values is `Stable`.
    fn of(values: &[f64]) -> Self {
        match (values.first(), values.last()) {
            (Some(first), Some(last)) if values.len() > 1 => {
                if last > first {
                    Trend::Improving
                } else if last < first {
                    Trend::Declining
                } else {
                    Trend::Stable
                }
            }
            _ => Trend::Stable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GrowthSummary {
    pub avg_revenue_growth: Option<f64>,
    /// Sample standard deviation of the defined YoY revenue growth rates
    pub revenue_growth_volatility: Option<f64>,
    pub avg_net_income_growth: Option<f64>,
    /// Share of years with a defined revenue growth rate that grew
    pub consistent_growth: Option<f64>,
    pub latest_revenue_cagr_3y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProfitabilitySummary {
    pub avg_gross_margin: Option<f64>,
    pub avg_operating_margin: Option<f64>,
    pub avg_net_margin: Option<f64>,
    pub avg_roe: Option<f64>,
    /// Direction of the operating margin
    pub margin_trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HealthSummary {
    pub avg_current_ratio: Option<f64>,
    pub avg_debt_to_equity: Option<f64>,
    /// Direction of the current ratio
    pub liquidity_trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CashFlowSummary {
    pub avg_fcf_margin: Option<f64>,
    pub avg_cash_conversion: Option<f64>,
    /// Direction of the free-cash-flow margin
    pub fcf_trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PerformanceSummary {
    pub years_analyzed: Vec<i32>,
    pub growth: GrowthSummary,
    pub profitability: ProfitabilitySummary,
    pub health: HealthSummary,
    pub cash_flow: CashFlowSummary,
    /// Observations on the latest year, in growth, margin, liquidity, cash order
    pub insights: Vec<String>,
}

impl PerformanceSummary {
    /// `metric_sets` may be in any order; a later set for the same year replaces an earlier one.
    pub fn from_metrics(metric_sets: &[DerivedMetricSet]) -> Self {
        let by_year: BTreeMap<i32, &DerivedMetricSet> =
            metric_sets.iter().map(|m| (m.fiscal_year, m)).collect();
        let sets: Vec<&DerivedMetricSet> = by_year.values().copied().collect();
        let series = |metric: Metric| -> Vec<f64> {
            sets.iter().filter_map(|set| set.get(metric)).collect()
        };

        let revenue_growth = series(Metric::RevenueGrowthYoy);
        let consistent_growth = (!revenue_growth.is_empty()).then(|| {
            revenue_growth.iter().filter(|g| **g > 0.0).count() as f64 / revenue_growth.len() as f64
        });
        let latest = sets.last().copied();

        let growth = GrowthSummary {
            avg_revenue_growth: mean(&revenue_growth),
            revenue_growth_volatility: sample_std_dev(&revenue_growth),
            avg_net_income_growth: mean(&series(Metric::NetIncomeGrowthYoy)),
            consistent_growth,
            latest_revenue_cagr_3y: latest.and_then(|set| set.get(Metric::RevenueCagr3y)),
        };

        let operating_margins = series(Metric::OperatingMargin);
        let profitability = ProfitabilitySummary {
            avg_gross_margin: mean(&series(Metric::GrossMargin)),
            avg_operating_margin: mean(&operating_margins),
            avg_net_margin: mean(&series(Metric::NetProfitMargin)),
            avg_roe: mean(&series(Metric::Roe)),
            margin_trend: Trend::of(&operating_margins),
        };

        let current_ratios = series(Metric::CurrentRatio);
        let health = HealthSummary {
            avg_current_ratio: mean(&current_ratios),
            avg_debt_to_equity: mean(&series(Metric::DebtToEquity)),
            liquidity_trend: Trend::of(&current_ratios),
        };

        let fcf_margins = series(Metric::FcfMargin);
        let cash_flow = CashFlowSummary {
            avg_fcf_margin: mean(&fcf_margins),
            avg_cash_conversion: mean(&series(Metric::CashConversionRatio)),
            fcf_trend: Trend::of(&fcf_margins),
        };

        let insights = latest.map(insights_for).unwrap_or_default();
        debug!(
            "Performance summary over {} year(s) with {} insight(s)",
            by_year.len(),
            insights.len()
        );

        Self {
            years_analyzed: by_year.keys().copied().collect(),
            growth,
            profitability,
            health,
            cash_flow,
            insights,
        }
    }
}

fn insights_for(latest: &DerivedMetricSet) -> Vec<String> {
    let mut insights = Vec::new();

    match latest.get(Metric::RevenueGrowthYoy) {
        Some(g) if g > STRONG_GROWTH => {
            insights.push(format!("Strong revenue growth of {:.1}% YoY", g * 100.0))
        }
        Some(g) if g < 0.0 => {
            insights.push(format!("Revenue declining {:.1}% YoY", g.abs() * 100.0))
        }
        _ => {}
    }

    match latest.get(Metric::OperatingMargin) {
        Some(m) if m > HIGH_OPERATING_MARGIN => {
            insights.push(format!("High operating margin of {:.1}%", m * 100.0))
        }
        Some(m) if m < LOW_OPERATING_MARGIN => {
            insights.push(format!("Low operating margin of {:.1}%", m * 100.0))
        }
        _ => {}
    }

    match latest.get(Metric::CurrentRatio) {
        Some(r) if r > STRONG_CURRENT_RATIO => {
            insights.push(format!("Strong liquidity with current ratio of {:.2}", r))
        }
        Some(r) if r < WEAK_CURRENT_RATIO => {
            insights.push(format!("Liquidity concern with current ratio of {:.2}", r))
        }
        _ => {}
    }

    match latest.get(Metric::FcfMargin) {
        Some(m) if m > EXCELLENT_FCF_MARGIN => insights.push(format!(
            "Excellent cash generation with FCF margin of {:.1}%",
            m * 100.0
        )),
        Some(m) if m < 0.0 => insights.push("Negative free cash flow".to_string()),
        _ => {}
    }

    insights
}

pub fn summarize_performance(metric_sets: &[DerivedMetricSet]) -> PerformanceSummary {
    PerformanceSummary::from_metrics(metric_sets)
}

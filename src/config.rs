use crate::error::{FinancialRecordError, Result};
use crate::validator::QualityCheck;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which filing wins when the same fact is reported more than once for a fiscal year.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RestatementPolicy {
    #[schemars(description = "Prefer the most recently filed value (restatements win)")]
    #[default]
    LatestFiled,

    #[schemars(description = "Prefer the value as originally filed")]
    EarliestFiled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct ResolverConfig {
    #[schemars(description = "ISO code of the currency all monetary values are reported in")]
    pub base_currency: String,

    #[schemars(
        description = "Conversion rates into the base currency, keyed by ISO code (units of base currency per unit of the keyed currency)"
    )]
    pub conversion_rates: BTreeMap<String, f64>,

    pub restatement_policy: RestatementPolicy,

    #[schemars(
        description = "Discard prior-year comparatives carried in an annual filing, keeping only facts with the latest period end"
    )]
    pub drop_comparatives: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_currency: "USD".to_string(),
            conversion_rates: BTreeMap::new(),
            restatement_policy: RestatementPolicy::LatestFiled,
            drop_comparatives: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct NormalizerConfig {
    #[schemars(
        description = "Multiplier applied to monetary concepts, e.g. 0.000001 to report in millions"
    )]
    pub reporting_scale: f64,

    #[schemars(description = "Fill missing concepts from accounting identities when operands are present")]
    pub derive_missing: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            reporting_scale: 1.0,
            derive_missing: true,
        }
    }
}

/// Relative weight of each check in the overall quality score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct CheckWeights {
    pub balance_sheet_equation: f64,
    pub margin_plausibility: f64,
    pub cash_flow_reasonableness: f64,
    pub income_statement_arithmetic: f64,
    pub sign_constraints: f64,
    pub unit_consistency: f64,
    pub completeness: f64,
}

impl Default for CheckWeights {
    fn default() -> Self {
        Self {
            balance_sheet_equation: 0.30,
            margin_plausibility: 0.15,
            cash_flow_reasonableness: 0.10,
            income_statement_arithmetic: 0.10,
            sign_constraints: 0.05,
            unit_consistency: 0.05,
            completeness: 0.25,
        }
    }
}

impl CheckWeights {
    pub fn weight_for(&self, check: QualityCheck) -> f64 {
        match check {
            QualityCheck::BalanceSheetEquation => self.balance_sheet_equation,
            QualityCheck::MarginPlausibility => self.margin_plausibility,
            QualityCheck::CashFlowReasonableness => self.cash_flow_reasonableness,
            QualityCheck::IncomeStatementArithmetic => self.income_statement_arithmetic,
            QualityCheck::SignConstraints => self.sign_constraints,
            QualityCheck::UnitConsistency => self.unit_consistency,
            QualityCheck::Completeness => self.completeness,
        }
    }

    fn total(&self) -> f64 {
        QualityCheck::all().iter().map(|c| self.weight_for(*c)).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct ValidationConfig {
    #[schemars(description = "Relative tolerance for Assets = Liabilities + Equity (0.005 = 0.5%)")]
    pub balance_tolerance: f64,

    #[schemars(description = "Lowest plausible margin (-3.0 = -300%)")]
    pub margin_floor: f64,

    #[schemars(description = "Highest plausible margin (1.0 = 100%)")]
    pub margin_ceiling: f64,

    #[schemars(description = "Largest plausible |operating cash flow| as a multiple of |revenue|")]
    pub max_cash_flow_to_revenue: f64,

    #[schemars(description = "Tolerance, relative to revenue, for reported vs computed gross profit")]
    pub gross_profit_tolerance: f64,

    #[schemars(description = "Completeness at or above which the completeness check passes")]
    pub min_completeness: f64,

    #[schemars(description = "Overall score below which a year is marked as a warning")]
    pub warning_threshold: f64,

    #[schemars(description = "Absolute YoY revenue change above which a series finding is raised")]
    pub revenue_swing_threshold: f64,

    #[schemars(description = "Absolute z-score above which a metric value is an outlier within its series")]
    pub outlier_z_threshold: f64,

    #[schemars(description = "Multiple of the interquartile range beyond the quartiles that marks an outlier")]
    pub outlier_iqr_multiplier: f64,

    #[schemars(description = "Absolute YoY relative change of any metric above which an anomaly is raised (2.0 = 200%)")]
    pub temporal_change_threshold: f64,

    pub weights: CheckWeights,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            balance_tolerance: 0.005,
            margin_floor: -3.0,
            margin_ceiling: 1.0,
            max_cash_flow_to_revenue: 5.0,
            gross_profit_tolerance: 0.01,
            min_completeness: 0.5,
            warning_threshold: 0.7,
            revenue_swing_threshold: 1.0,
            outlier_z_threshold: 3.0,
            outlier_iqr_multiplier: 1.5,
            temporal_change_threshold: 2.0,
            weights: CheckWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct MetricsConfig {
    #[schemars(description = "Tax rate used for NOPAT when no effective rate can be computed")]
    pub default_tax_rate: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            default_tax_rate: 0.21,
        }
    }
}

/// Everything a pipeline run needs besides the facts themselves.
///
/// Passed by reference into every stage so concurrent runs never share mutable state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub resolver: ResolverConfig,
    pub normalizer: NormalizerConfig,
    pub validation: ValidationConfig,
    pub metrics: MetricsConfig,

    #[schemars(description = "Keep only the most recent N fiscal years (all years when absent)")]
    pub max_years: Option<usize>,
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&schemars::schema_for!(PipelineConfig))
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(FinancialRecordError::InvalidConfig(msg));

        if self.resolver.base_currency.trim().is_empty() {
            return invalid("base_currency must not be empty".to_string());
        }
        for (code, rate) in &self.resolver.conversion_rates {
            if !rate.is_finite() || *rate <= 0.0 {
                return invalid(format!("conversion rate for {} must be positive, got {}", code, rate));
            }
        }

        let scale = self.normalizer.reporting_scale;
        if !scale.is_finite() || scale <= 0.0 {
            return invalid(format!("reporting_scale must be positive, got {}", scale));
        }

        let v = &self.validation;
        if !(v.balance_tolerance >= 0.0) {
            return invalid(format!("balance_tolerance must be >= 0, got {}", v.balance_tolerance));
        }
        if !(v.margin_floor < v.margin_ceiling) {
            return invalid(format!(
                "margin_floor ({}) must be below margin_ceiling ({})",
                v.margin_floor, v.margin_ceiling
            ));
        }
        if !(v.max_cash_flow_to_revenue > 0.0) {
            return invalid("max_cash_flow_to_revenue must be positive".to_string());
        }
        if !(v.gross_profit_tolerance >= 0.0) {
            return invalid("gross_profit_tolerance must be >= 0".to_string());
        }
        for (name, value) in [
            ("min_completeness", v.min_completeness),
            ("warning_threshold", v.warning_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{} must be within [0, 1], got {}", name, value));
            }
        }
        for (name, value) in [
            ("revenue_swing_threshold", v.revenue_swing_threshold),
            ("outlier_z_threshold", v.outlier_z_threshold),
            ("outlier_iqr_multiplier", v.outlier_iqr_multiplier),
            ("temporal_change_threshold", v.temporal_change_threshold),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return invalid(format!("{} must be positive, got {}", name, value));
            }
        }

        let bad_weight = QualityCheck::all()
            .iter()
            .map(|c| (*c, v.weights.weight_for(*c)))
            .find(|(_, w)| !w.is_finite() || *w < 0.0);
        if let Some((check, w)) = bad_weight {
            return invalid(format!("weight for {} must be >= 0, got {}", check.as_str(), w));
        }
        if v.weights.total() <= 0.0 {
            return invalid("check weights must not all be zero".to_string());
        }

        if !(0.0..1.0).contains(&self.metrics.default_tax_rate) {
            return invalid(format!(
                "default_tax_rate must be within [0, 1), got {}",
                self.metrics.default_tax_rate
            ));
        }

        if self.max_years == Some(0) {
            return invalid("max_years must be at least 1".to_string());
        }

        Ok(())
    }
}

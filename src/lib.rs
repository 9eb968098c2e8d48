//! # Financial Record Builder
//!
//! A library for turning the raw XBRL facts a company reports to the SEC into a
//! clean, validated, per-fiscal-year financial record with derived analytics.
//!
//! ## Core Concepts
//!
//! - **Canonical Concepts**: A fixed dictionary of statement lines (Revenue, TotalAssets, ...)
//!   each reachable through an ordered list of reporting tags
//! - **Resolution**: One value per concept and fiscal year, chosen from competing facts
//!   (aliases, restatements, comparatives, currencies)
//! - **Statements**: Every concept has a slot; gaps are filled from accounting identities
//!   where possible and otherwise stay explicitly missing
//! - **Quality**: Each year is scored by consistency checks and annotated, never dropped
//! - **Metrics**: Growth, profitability, liquidity, leverage and cash-flow analytics where
//!   undefined values are `None` rather than zero
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_record_builder::*;
//!
//! let json = std::fs::read_to_string("CIK0000320193.json")?;
//! let ingested = parse_company_facts(&json)?;
//!
//! let config = PipelineConfig::default();
//! let history = FinancialRecordProcessor::process_ingested(&ingested, &config)?;
//!
//! for record in &history.records {
//!     println!(
//!         "FY{}: revenue growth {:?}, quality {:.2}",
//!         record.fiscal_year,
//!         record.metrics.get(Metric::RevenueGrowthYoy),
//!         record.quality.overall_score
//!     );
//! }
//!
//! for insight in &history.performance.insights {
//!     println!("{}", insight);
//! }
//! ```

pub mod concepts;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod metrics;
pub mod normalizer;
pub mod performance;
pub mod resolver;
pub mod schema;
pub mod utils;
pub mod validator;

pub use concepts::{CanonicalConcept, StatementKind, UnitKind};
pub use config::*;
pub use error::{FinancialRecordError, Result};
pub use ingestion::{parse_company_facts, IngestedFacts};
pub use metrics::{compute_metrics, DerivedMetricSet, Metric, MetricsEngine};
pub use normalizer::{build_statement, FinancialStatement, StatementNormalizer};
pub use performance::{
    summarize_performance, CashFlowSummary, GrowthSummary, HealthSummary, PerformanceSummary,
    ProfitabilitySummary, Trend,
};
pub use resolver::{fiscal_years, resolve, FactIndex, FactResolver, ResolvedValue};
pub use schema::*;
pub use validator::{
    assess_statement, AnomalyKind, CheckOutcome, CheckStatus, ConsistencyValidator,
    MetricAnomaly, QualityAssessment, QualityCheck, QualityStatus, SeriesAssessment,
};

use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything produced for one fiscal year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnnualRecord {
    pub fiscal_year: i32,
    pub statement: FinancialStatement,
    pub quality: QualityAssessment,
    pub metrics: DerivedMetricSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompanyHistory {
    pub company: String,
    /// Ascending by fiscal year
    pub records: Vec<AnnualRecord>,
    pub series: SeriesAssessment,
    /// Averages, trends and insights over the emitted years
    pub performance: PerformanceSummary,
    /// Facts rejected as malformed, at ingestion or by validation
    pub skipped_facts: usize,
}

impl CompanyHistory {
    pub fn record(&self, fiscal_year: i32) -> Option<&AnnualRecord> {
        self.records.iter().find(|r| r.fiscal_year == fiscal_year)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&schemars::schema_for!(CompanyHistory))
    }
}

pub struct FinancialRecordProcessor;

impl FinancialRecordProcessor {
    pub fn process(
        company: &str,
        facts: &[RawFact],
        config: &PipelineConfig,
    ) -> Result<CompanyHistory> {
        config.validate()?;

        info!("Processing financial record for company: {}", company);

        let mut skipped_facts = 0;
        let valid_facts = facts.iter().filter(|fact| match fact.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!("Skipping fact for {}: {}", company, e);
                skipped_facts += 1;
                false
            }
        });
        let index = FactIndex::from_facts(valid_facts);

        let years = index.fiscal_years();
        debug!(
            "Found {} fiscal year(s) with annual facts: {:?}",
            years.len(),
            years
        );

        let resolver = FactResolver::new(&config.resolver);
        let normalizer = StatementNormalizer::new(&config.normalizer);
        let validator = ConsistencyValidator::new(&config.validation);

        let statements: Vec<FinancialStatement> = years
            .iter()
            .map(|&fy| normalizer.build(fy, resolver.resolve_year(&index, fy)))
            .collect();

        // Metrics see every year so the earliest kept year still has its priors.
        let metric_sets = MetricsEngine::new(&config.metrics).compute(&statements);

        let keep_from = config
            .max_years
            .map(|n| statements.len().saturating_sub(n))
            .unwrap_or(0);

        let records: Vec<AnnualRecord> = statements
            .into_iter()
            .zip(metric_sets)
            .skip(keep_from)
            .map(|(statement, metrics)| {
                let quality = validator.assess(&statement);
                AnnualRecord {
                    fiscal_year: statement.fiscal_year,
                    statement,
                    quality,
                    metrics,
                }
            })
            .collect();

        let kept: Vec<FinancialStatement> =
            records.iter().map(|r| r.statement.clone()).collect();
        let kept_metrics: Vec<DerivedMetricSet> =
            records.iter().map(|r| r.metrics.clone()).collect();
        let series = validator.assess_series(&kept, &kept_metrics);
        for finding in &series.findings {
            debug!("Series finding for {}: {}", company, finding);
        }
        let performance = PerformanceSummary::from_metrics(&kept_metrics);

        let warnings = records
            .iter()
            .filter(|r| r.quality.status == QualityStatus::Warning)
            .count();
        info!(
            "Built {} annual record(s) for {} ({} with quality warnings, {} fact(s) skipped)",
            records.len(),
            company,
            warnings,
            skipped_facts
        );

        Ok(CompanyHistory {
            company: company.to_string(),
            records,
            series,
            performance,
            skipped_facts,
        })
    }

    pub fn process_payload(payload: &FactsPayload, config: &PipelineConfig) -> Result<CompanyHistory> {
        Self::process(&payload.company, &payload.facts, config)
    }

    /// Like [`process`](Self::process), also counting the entries dropped while ingesting.
    pub fn process_ingested(ingested: &IngestedFacts, config: &PipelineConfig) -> Result<CompanyHistory> {
        let mut history = Self::process(&ingested.company, &ingested.facts, config)?;
        history.skipped_facts += ingested.skipped;
        Ok(history)
    }
}

pub fn process_company(
    company: &str,
    facts: &[RawFact],
    config: &PipelineConfig,
) -> Result<CompanyHistory> {
    FinancialRecordProcessor::process(company, facts, config)
}

/// Runs each company independently; one company's failure does not affect the others.
#[cfg(feature = "parallel")]
pub fn process_companies(
    companies: &BTreeMap<String, Vec<RawFact>>,
    config: &PipelineConfig,
) -> BTreeMap<String, Result<CompanyHistory>> {
    use rayon::prelude::*;

    companies
        .par_iter()
        .map(|(company, facts)| (company.clone(), process_company(company, facts, config)))
        .collect()
}

/// Runs each company independently; one company's failure does not affect the others.
#[cfg(not(feature = "parallel"))]
pub fn process_companies(
    companies: &BTreeMap<String, Vec<RawFact>>,
    config: &PipelineConfig,
) -> BTreeMap<String, Result<CompanyHistory>> {
    companies
        .iter()
        .map(|(company, facts)| (company.clone(), process_company(company, facts, config)))
        .collect()
}

//! Canonical statement-line concepts and the ordered tag aliases that may report them.
//!
//! Alias order is preference order: when a filer reports the same period under two
//! aliases of one concept, the earlier alias wins.

use crate::error::{FinancialRecordError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Income,
    Balance,
    CashFlow,
}

/// What kind of unit a concept is expected to be reported in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Monetary,
    PerShare,
    Shares,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalConcept {
    // Income statement
    Revenue,
    CostOfRevenue,
    GrossProfit,
    ResearchAndDevelopment,
    SellingGeneralAdministrative,
    OperatingExpenses,
    OperatingIncome,
    InterestExpense,
    IncomeBeforeTax,
    IncomeTaxExpense,
    NetIncome,
    EpsBasic,
    EpsDiluted,
    WeightedAverageDilutedShares,

    // Balance sheet
    CashAndEquivalents,
    ShortTermInvestments,
    AccountsReceivable,
    Inventory,
    CurrentAssets,
    PropertyPlantEquipment,
    Goodwill,
    TotalAssets,
    AccountsPayable,
    CurrentLiabilities,
    ShortTermDebt,
    LongTermDebt,
    TotalLiabilities,
    StockholdersEquity,
    RetainedEarnings,
    LiabilitiesAndEquity,
    SharesOutstanding,

    // Cash flow statement
    OperatingCashFlow,
    InvestingCashFlow,
    FinancingCashFlow,
    CapitalExpenditures,
    DepreciationAmortization,
    DividendsPaid,
    ShareRepurchases,
}

use CanonicalConcept::*;

static ALL_CONCEPTS: [CanonicalConcept; 38] = [
    Revenue,
    CostOfRevenue,
    GrossProfit,
    ResearchAndDevelopment,
    SellingGeneralAdministrative,
    OperatingExpenses,
    OperatingIncome,
    InterestExpense,
    IncomeBeforeTax,
    IncomeTaxExpense,
    NetIncome,
    EpsBasic,
    EpsDiluted,
    WeightedAverageDilutedShares,
    CashAndEquivalents,
    ShortTermInvestments,
    AccountsReceivable,
    Inventory,
    CurrentAssets,
    PropertyPlantEquipment,
    Goodwill,
    TotalAssets,
    AccountsPayable,
    CurrentLiabilities,
    ShortTermDebt,
    LongTermDebt,
    TotalLiabilities,
    StockholdersEquity,
    RetainedEarnings,
    LiabilitiesAndEquity,
    SharesOutstanding,
    OperatingCashFlow,
    InvestingCashFlow,
    FinancingCashFlow,
    CapitalExpenditures,
    DepreciationAmortization,
    DividendsPaid,
    ShareRepurchases,
];

impl CanonicalConcept {
    pub fn all() -> &'static [CanonicalConcept] {
        &ALL_CONCEPTS
    }

    pub fn by_statement(kind: StatementKind) -> impl Iterator<Item = CanonicalConcept> {
        ALL_CONCEPTS.iter().copied().filter(move |c| c.statement() == kind)
    }

    /// Reporting tags for this concept, most preferred first.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            // Specific "net sales" tags reflect how the filer structures its statement,
            // so the generic `Revenues` total comes last.
            Revenue => &[
                "SalesRevenueNet",
                "RevenueFromContractWithCustomerExcludingAssessedTax",
                "RevenueFromContractWithCustomerIncludingAssessedTax",
                "SalesRevenueGoodsNet",
                "SalesRevenueServicesNet",
                "Revenues",
            ],
            CostOfRevenue => &[
                "CostOfGoodsAndServicesSold",
                "CostOfRevenue",
                "CostOfGoodsSold",
                "CostOfServices",
            ],
            GrossProfit => &["GrossProfit"],
            ResearchAndDevelopment => &[
                "ResearchAndDevelopmentExpense",
                "ResearchAndDevelopmentExpenseExcludingAcquiredInProcessCost",
            ],
            SellingGeneralAdministrative => &[
                "SellingGeneralAndAdministrativeExpense",
                "SellingAndMarketingExpense",
                "GeneralAndAdministrativeExpense",
            ],
            OperatingExpenses => &["OperatingExpenses"],
            OperatingIncome => &["OperatingIncomeLoss"],
            InterestExpense => &[
                "InterestExpense",
                "InterestExpenseDebt",
                "InterestExpenseNonoperating",
            ],
            IncomeBeforeTax => &[
                "IncomeLossFromContinuingOperationsBeforeIncomeTaxesExtraordinaryItemsNoncontrollingInterest",
                "IncomeLossFromContinuingOperationsBeforeIncomeTaxesMinorityInterestAndIncomeLossFromEquityMethodInvestments",
            ],
            IncomeTaxExpense => &["IncomeTaxExpenseBenefit"],
            NetIncome => &[
                "NetIncomeLoss",
                "ProfitLoss",
                "NetIncomeLossAvailableToCommonStockholdersBasic",
            ],
            EpsBasic => &["EarningsPerShareBasic"],
            EpsDiluted => &["EarningsPerShareDiluted", "EarningsPerShareBasicAndDiluted"],
            WeightedAverageDilutedShares => &["WeightedAverageNumberOfDilutedSharesOutstanding"],

            CashAndEquivalents => &[
                "CashAndCashEquivalentsAtCarryingValue",
                "CashCashEquivalentsRestrictedCashAndRestrictedCashEquivalents",
                "Cash",
            ],
            ShortTermInvestments => &[
                "ShortTermInvestments",
                "MarketableSecuritiesCurrent",
                "AvailableForSaleSecuritiesDebtSecuritiesCurrent",
            ],
            AccountsReceivable => &["AccountsReceivableNetCurrent", "ReceivablesNetCurrent"],
            Inventory => &["InventoryNet", "Inventory"],
            CurrentAssets => &["AssetsCurrent"],
            PropertyPlantEquipment => &["PropertyPlantAndEquipmentNet"],
            Goodwill => &["Goodwill"],
            TotalAssets => &["Assets"],
            AccountsPayable => &[
                "AccountsPayableCurrent",
                "AccountsPayableAndAccruedLiabilitiesCurrent",
            ],
            CurrentLiabilities => &["LiabilitiesCurrent"],
            ShortTermDebt => &["DebtCurrent", "LongTermDebtCurrent", "ShortTermBorrowings"],
            LongTermDebt => &["LongTermDebtNoncurrent", "LongTermDebt"],
            TotalLiabilities => &["Liabilities"],
            StockholdersEquity => &[
                "StockholdersEquity",
                "StockholdersEquityIncludingPortionAttributableToNoncontrollingInterest",
            ],
            RetainedEarnings => &["RetainedEarningsAccumulatedDeficit"],
            LiabilitiesAndEquity => &["LiabilitiesAndStockholdersEquity"],
            SharesOutstanding => &[
                "CommonStockSharesOutstanding",
                "EntityCommonStockSharesOutstanding",
            ],

            OperatingCashFlow => &[
                "NetCashProvidedByUsedInOperatingActivities",
                "NetCashProvidedByUsedInOperatingActivitiesContinuingOperations",
            ],
            InvestingCashFlow => &[
                "NetCashProvidedByUsedInInvestingActivities",
                "NetCashProvidedByUsedInInvestingActivitiesContinuingOperations",
            ],
            FinancingCashFlow => &[
                "NetCashProvidedByUsedInFinancingActivities",
                "NetCashProvidedByUsedInFinancingActivitiesContinuingOperations",
            ],
            CapitalExpenditures => &[
                "PaymentsToAcquirePropertyPlantAndEquipment",
                "PaymentsToAcquireProductiveAssets",
                "CapitalExpenditures",
            ],
            DepreciationAmortization => &[
                "DepreciationDepletionAndAmortization",
                "DepreciationAndAmortization",
                "Depreciation",
            ],
            DividendsPaid => &["PaymentsOfDividendsCommonStock", "PaymentsOfDividends"],
            ShareRepurchases => &["PaymentsForRepurchaseOfCommonStock"],
        }
    }

    pub fn statement(self) -> StatementKind {
        match self {
            Revenue
            | CostOfRevenue
            | GrossProfit
            | ResearchAndDevelopment
            | SellingGeneralAdministrative
            | OperatingExpenses
            | OperatingIncome
            | InterestExpense
            | IncomeBeforeTax
            | IncomeTaxExpense
            | NetIncome
            | EpsBasic
            | EpsDiluted
            | WeightedAverageDilutedShares => StatementKind::Income,

            OperatingCashFlow
            | InvestingCashFlow
            | FinancingCashFlow
            | CapitalExpenditures
            | DepreciationAmortization
            | DividendsPaid
            | ShareRepurchases => StatementKind::CashFlow,

            _ => StatementKind::Balance,
        }
    }

    pub fn unit_kind(self) -> UnitKind {
        match self {
            EpsBasic | EpsDiluted => UnitKind::PerShare,
            WeightedAverageDilutedShares | SharesOutstanding => UnitKind::Shares,
            _ => UnitKind::Monetary,
        }
    }

    /// Reverse lookup from a reporting tag (with or without taxonomy prefix).
    pub fn for_tag(tag: &str) -> Option<CanonicalConcept> {
        let local = tag.rsplit_once(':').map(|(_, l)| l).unwrap_or(tag);
        ALL_CONCEPTS
            .iter()
            .copied()
            .find(|c| c.aliases().contains(&local))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Revenue => "revenue",
            CostOfRevenue => "cost_of_revenue",
            GrossProfit => "gross_profit",
            ResearchAndDevelopment => "research_and_development",
            SellingGeneralAdministrative => "selling_general_administrative",
            OperatingExpenses => "operating_expenses",
            OperatingIncome => "operating_income",
            InterestExpense => "interest_expense",
            IncomeBeforeTax => "income_before_tax",
            IncomeTaxExpense => "income_tax_expense",
            NetIncome => "net_income",
            EpsBasic => "eps_basic",
            EpsDiluted => "eps_diluted",
            WeightedAverageDilutedShares => "weighted_average_diluted_shares",
            CashAndEquivalents => "cash_and_equivalents",
            ShortTermInvestments => "short_term_investments",
            AccountsReceivable => "accounts_receivable",
            Inventory => "inventory",
            CurrentAssets => "current_assets",
            PropertyPlantEquipment => "property_plant_equipment",
            Goodwill => "goodwill",
            TotalAssets => "total_assets",
            AccountsPayable => "accounts_payable",
            CurrentLiabilities => "current_liabilities",
            ShortTermDebt => "short_term_debt",
            LongTermDebt => "long_term_debt",
            TotalLiabilities => "total_liabilities",
            StockholdersEquity => "stockholders_equity",
            RetainedEarnings => "retained_earnings",
            LiabilitiesAndEquity => "liabilities_and_equity",
            SharesOutstanding => "shares_outstanding",
            OperatingCashFlow => "operating_cash_flow",
            InvestingCashFlow => "investing_cash_flow",
            FinancingCashFlow => "financing_cash_flow",
            CapitalExpenditures => "capital_expenditures",
            DepreciationAmortization => "depreciation_amortization",
            DividendsPaid => "dividends_paid",
            ShareRepurchases => "share_repurchases",
        }
    }
}

impl fmt::Display for CanonicalConcept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalConcept {
    type Err = FinancialRecordError;

    fn from_str(name: &str) -> Result<Self> {
        ALL_CONCEPTS
            .iter()
            .copied()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| FinancialRecordError::UnknownConcept(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_concept_has_aliases() {
        assert_eq!(CanonicalConcept::all().len(), 38);
        for concept in CanonicalConcept::all() {
            assert!(
                !concept.aliases().is_empty(),
                "{} has no aliases",
                concept
            );
        }
    }

    #[test]
    fn test_aliases_are_unique_across_concepts() {
        let mut seen = HashSet::new();
        for concept in CanonicalConcept::all() {
            for alias in concept.aliases() {
                assert!(seen.insert(*alias), "alias {} listed twice", alias);
            }
        }
    }

    #[test]
    fn test_revenue_prefers_net_sales() {
        let aliases = Revenue.aliases();
        let net_sales = aliases.iter().position(|a| *a == "SalesRevenueNet").unwrap();
        let generic = aliases.iter().position(|a| *a == "Revenues").unwrap();
        assert!(net_sales < generic);
    }

    #[test]
    fn test_statement_partition() {
        let income = CanonicalConcept::by_statement(StatementKind::Income).count();
        let balance = CanonicalConcept::by_statement(StatementKind::Balance).count();
        let cash_flow = CanonicalConcept::by_statement(StatementKind::CashFlow).count();
        assert_eq!(income, 14);
        assert_eq!(balance, 17);
        assert_eq!(cash_flow, 7);
        assert_eq!(TotalAssets.statement(), StatementKind::Balance);
        assert_eq!(CapitalExpenditures.statement(), StatementKind::CashFlow);
    }

    #[test]
    fn test_reverse_lookup() {
        assert_eq!(CanonicalConcept::for_tag("us-gaap:Assets"), Some(TotalAssets));
        assert_eq!(CanonicalConcept::for_tag("Revenues"), Some(Revenue));
        assert_eq!(CanonicalConcept::for_tag("NotARealTag"), None);
    }

    #[test]
    fn test_name_round_trip_and_unknown() {
        for concept in CanonicalConcept::all() {
            assert_eq!(concept.as_str().parse::<CanonicalConcept>().unwrap(), *concept);
            let json = serde_json::to_string(concept).unwrap();
            assert_eq!(json, format!("\"{}\"", concept.as_str()));
        }
        assert!(matches!(
            "ebitdax".parse::<CanonicalConcept>(),
            Err(FinancialRecordError::UnknownConcept(_))
        ));
    }
}

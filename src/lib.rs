//! # Statement Analyzer
//!
//! Exploratory financial-statement analysis for a single company across a
//! handful of fiscal years. Three wide-format statements (balance sheet,
//! income statement, cash-flow statement) are reshaped into cleaned
//! long-format line items, categorized into standard accounting buckets,
//! and fed through a ratio engine that derives growth, profitability,
//! return, efficiency, liquidity, and cash-generation indicators.
//!
//! ## Pipeline
//!
//! 1. **Normalizer** ([`normalize_statement`]): unpivot wide tables into
//!    `(Metric, Year, Value)` records, filter blank/sentinel/header rows,
//!    parse values, canonicalize labels, assign categories, and resolve the
//!    statement's sign convention so that outflows are negative internally.
//! 2. **Ratio engine** ([`RatioEngine`]): aggregate records by metric group
//!    and year, derive the summary tables, and mark every cell that cannot
//!    be computed as undefined rather than zero.
//!
//! The run is a single-threaded, deterministic batch transform: identical
//! input files produce byte-identical outputs.
//!
//! ## Example
//!
//! ```rust,ignore
//! use statement_analyzer::*;
//!
//! let analyzer = StatementAnalyzer::with_defaults();
//! let report = analyzer.analyze_files(
//!     "balance_sheet.csv",
//!     "income_statement.csv",
//!     "cash_flow.csv",
//! )?;
//! println!("{}", report.render_console());
//! report.write_outputs("out")?;
//! ```

pub mod categorize;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod normalize;
pub mod ratios;
pub mod schema;
pub mod summary;
pub mod utils;

pub use categorize::{balance_category_map, income_category};
pub use config::{AnalysisConfig, BalanceLayout, CategoryOverrides, SignConvention};
pub use error::{AnalysisError, Result};
pub use ingestion::{year_from_header, WideTable};
pub use normalize::{normalize_statement, CleanReport, DuplicateRow, ParseIssue};
pub use ratios::{aggregate, cagr, series, yoy_change, CagrReport, DerivedTables, RatioEngine, Selector};
pub use schema::{Category, CleanedStatement, LineItemRecord, StatementKind};
pub use summary::{Cell, SummaryTable};

use log::info;
use std::path::Path;

/// Runs the full pipeline: normalization of the three statements followed by
/// ratio derivation.
pub struct StatementAnalyzer {
    config: AnalysisConfig,
}

impl StatementAnalyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: AnalysisConfig::default(),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn analyze_files(
        &self,
        balance_path: impl AsRef<Path>,
        income_path: impl AsRef<Path>,
        cashflow_path: impl AsRef<Path>,
    ) -> Result<AnalysisReport> {
        let balance = WideTable::from_csv_path(balance_path, StatementKind::Balance)?;
        let income = WideTable::from_csv_path(income_path, StatementKind::Income)?;
        let cashflow = WideTable::from_csv_path(cashflow_path, StatementKind::CashFlow)?;
        self.analyze(&balance, &income, &cashflow)
    }

    pub fn analyze(
        &self,
        balance: &WideTable,
        income: &WideTable,
        cashflow: &WideTable,
    ) -> Result<AnalysisReport> {
        info!("Starting statement analysis");

        let (balance, balance_report) = normalize_statement(balance, &self.config)?;
        let (income, income_report) = normalize_statement(income, &self.config)?;
        let (cashflow, cashflow_report) = normalize_statement(cashflow, &self.config)?;

        let tables = RatioEngine::new(&balance, &income, &cashflow, &self.config).run_all();

        Ok(AnalysisReport {
            balance,
            income,
            cashflow,
            balance_report,
            income_report,
            cashflow_report,
            tables,
        })
    }
}

/// Everything one analysis run produces: the cleaned long tables, the
/// per-statement data-quality reports, and the derived summary tables.
pub struct AnalysisReport {
    pub balance: CleanedStatement,
    pub income: CleanedStatement,
    pub cashflow: CleanedStatement,
    pub balance_report: CleanReport,
    pub income_report: CleanReport,
    pub cashflow_report: CleanReport,
    pub tables: DerivedTables,
}

impl AnalysisReport {
    /// Writes the cleaned long tables and every summary table as delimited
    /// text under `dir`. Re-running simply overwrites them.
    pub fn write_outputs(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        std::fs::write(dir.join("cleaned_balance_sheet.csv"), self.balance.to_csv()?)?;
        std::fs::write(dir.join("cleaned_income_statement.csv"), self.income.to_csv()?)?;
        std::fs::write(dir.join("cleaned_cash_flow.csv"), self.cashflow.to_csv()?)?;

        let summaries = [
            ("summary_growth.csv", &self.tables.growth),
            ("summary_yoy.csv", &self.tables.yoy),
            ("summary_profitability.csv", &self.tables.profitability),
            ("summary_returns.csv", &self.tables.returns),
            ("summary_efficiency.csv", &self.tables.efficiency),
            ("summary_liquidity.csv", &self.tables.liquidity),
            ("summary_cash.csv", &self.tables.cash),
        ];
        for (name, table) in summaries {
            std::fs::write(dir.join(name), table.to_csv()?)?;
        }
        std::fs::write(dir.join("cagr.txt"), self.tables.cagr.render())?;

        info!("Wrote analysis outputs to {}", dir.display());
        Ok(())
    }

    /// Console-style rendering of every computed table.
    pub fn render_console(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.tables.growth.render("Key Metrics by Year"));
        out.push('\n');
        out.push_str(&self.tables.yoy.render("Year-over-Year % Change"));
        out.push('\n');
        out.push_str(&self.tables.cagr.render());
        out.push('\n');
        out.push_str(&self.tables.profitability.render("Profitability"));
        out.push('\n');
        out.push_str(&self.tables.returns.render("Returns"));
        out.push('\n');
        out.push_str(&self.tables.efficiency.render("Efficiency & Risk"));
        out.push('\n');
        out.push_str(&self.tables.liquidity.render("Liquidity & Leverage"));
        out.push('\n');
        out.push_str(&self.tables.cash.render("Cash Generation"));
        out
    }

    /// True when any statement surfaced a data-quality finding worth a look.
    pub fn has_quality_findings(&self) -> bool {
        self.balance_report.has_findings()
            || self.income_report.has_findings()
            || self.cashflow_report.has_findings()
    }
}

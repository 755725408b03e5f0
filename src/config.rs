use crate::error::{AnalysisError, Result};
use crate::schema::Category;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// How a source statement stores cost/expense/outflow lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum SignConvention {
    /// Accounting convention: outflows are stored as negative numbers.
    /// Values pass through unchanged.
    #[default]
    NegativeOutflows,

    /// Presentation convention: outflows are stored as positive magnitudes
    /// meant to be subtracted. Outflow lines are negated at normalization
    /// time so that internally outflows are always negative.
    PositiveOutflows,
}

/// Positional split of the balance sheet: the first `assets` distinct metrics
/// (in source row order) are Assets, the next `liabilities` are Liabilities,
/// the next `equity` are Equity. Tied to one source layout and brittle by
/// nature, which is why [`CategoryOverrides`] takes precedence when present.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BalanceLayout {
    pub assets: usize,
    pub liabilities: usize,
    pub equity: usize,
}

impl Default for BalanceLayout {
    fn default() -> Self {
        Self {
            assets: 13,
            liabilities: 9,
            equity: 7,
        }
    }
}

impl BalanceLayout {
    pub fn total(&self) -> usize {
        self.assets + self.liabilities + self.equity
    }
}

/// Explicit, versioned metric -> category mapping for the balance sheet.
/// Preferred over positional inference because it survives source layout
/// changes. Metric names are matched against canonical (title-cased) labels.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CategoryOverrides {
    pub version: u32,
    pub entries: BTreeMap<String, Category>,
}

impl CategoryOverrides {
    /// Checks the mapping against the metric set actually present in the
    /// cleaned statement. Every override must name a real metric and every
    /// metric must be covered, otherwise the mapping is stale.
    pub fn validate(&self, metrics: &[String]) -> Result<()> {
        let unknown: Vec<&String> = self
            .entries
            .keys()
            .filter(|name| !metrics.contains(name))
            .collect();
        let uncovered: Vec<&String> = metrics
            .iter()
            .filter(|name| !self.entries.contains_key(*name))
            .collect();

        if unknown.is_empty() && uncovered.is_empty() {
            return Ok(());
        }

        Err(AnalysisError::OverrideMismatch {
            details: format!(
                "version {}: {} override(s) name unknown metrics {:?}, {} metric(s) uncovered {:?}",
                self.version,
                unknown.len(),
                unknown,
                uncovered.len(),
                uncovered
            ),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Placeholder the source uses for missing figures (an en dash in the
    /// reference statements). Cells equal to it are dropped during cleaning.
    pub missing_sentinel: String,

    /// Income-statement rows that are section headers, not measurable facts.
    /// Compared case-insensitively after trimming.
    pub income_denylist: Vec<String>,

    pub balance_layout: BalanceLayout,

    /// When present and valid, replaces positional balance-sheet inference.
    pub balance_overrides: Option<CategoryOverrides>,

    pub income_signs: SignConvention,
    pub cashflow_signs: SignConvention,

    /// Metric substrings (matched case-insensitively) that represent cash
    /// outflows in the cash-flow statement. Only consulted when
    /// `cashflow_signs` is `PositiveOutflows`.
    pub cashflow_outflow_metrics: Vec<String>,

    /// Exact canonical metric names making up current assets / liabilities.
    pub current_asset_metrics: Vec<String>,
    pub current_liability_metrics: Vec<String>,

    /// Exact canonical metric names of interest-bearing borrowings and
    /// equivalent instruments.
    pub debt_metrics: Vec<String>,

    /// Metric substrings identifying capital additions (CapEx).
    pub capex_metrics: Vec<String>,

    /// Fatal threshold: fraction of surviving value cells that may fail to
    /// parse before the run is considered unusable.
    pub max_parse_failure_ratio: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            missing_sentinel: "\u{2013}".to_string(),
            income_denylist: vec![
                "ATTRIBUTABLE TO:".to_string(),
                "Earnings per share attributable to the owners of the Company:".to_string(),
            ],
            balance_layout: BalanceLayout::default(),
            balance_overrides: None,
            income_signs: SignConvention::default(),
            cashflow_signs: SignConvention::default(),
            cashflow_outflow_metrics: vec![
                "Amounts Incurred On Property, Plant And Equipment".to_string(),
                "Amounts Incurred On Investment Properties".to_string(),
            ],
            current_asset_metrics: vec![
                "Bank Balances And Cash".to_string(),
                "Trade And Unbilled Receivables".to_string(),
                "Other Assets, Receivables, Deposits And Prepayments".to_string(),
                "Development Properties".to_string(),
            ],
            current_liability_metrics: vec![
                "Trade And Other Payables".to_string(),
                "Advances From Customers".to_string(),
                "Retentions Payable".to_string(),
            ],
            debt_metrics: vec![
                "Interest-Bearing Loans And Borrowings".to_string(),
                "Sukuk".to_string(),
            ],
            capex_metrics: vec![
                "Amounts Incurred On Property, Plant And Equipment".to_string(),
                "Amounts Incurred On Investment Properties".to_string(),
            ],
            max_parse_failure_ratio: 0.2,
        }
    }
}

impl AnalysisConfig {
    pub fn load_from_json(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.balance_layout.total() == 0 {
            return Err(AnalysisError::InvalidConfig(
                "balance layout maps zero metrics".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_parse_failure_ratio) {
            return Err(AnalysisError::InvalidConfig(format!(
                "max_parse_failure_ratio {} must be within [0.0, 1.0]",
                self.max_parse_failure_ratio
            )));
        }
        if self.missing_sentinel.trim().is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "missing value sentinel must be non-blank".to_string(),
            ));
        }
        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalysisConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.balance_layout.total(), 29);
        assert_eq!(config.missing_sentinel, "–");
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let config = AnalysisConfig {
            max_parse_failure_ratio: 1.5,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_round_trip() {
        let config = AnalysisConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let back: AnalysisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.balance_layout.assets, 13);
        assert_eq!(back.income_signs, SignConvention::NegativeOutflows);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"income_signs": "PositiveOutflows"}"#).unwrap();
        assert_eq!(config.income_signs, SignConvention::PositiveOutflows);
        assert_eq!(config.balance_layout.liabilities, 9);
    }

    #[test]
    fn test_overrides_validation_reports_both_directions() {
        let mut entries = BTreeMap::new();
        entries.insert("Cash".to_string(), Category::Assets);
        entries.insert("Ghost Metric".to_string(), Category::Equity);
        let overrides = CategoryOverrides {
            version: 2,
            entries,
        };

        let metrics = vec!["Cash".to_string(), "Inventory".to_string()];
        let err = overrides.validate(&metrics).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("Ghost Metric"));
        assert!(text.contains("Inventory"));
    }

    #[test]
    fn test_schema_generation() {
        let schema = AnalysisConfig::schema_as_json().unwrap();
        assert!(schema.contains("balance_layout"));
        assert!(schema.contains("max_parse_failure_ratio"));
    }
}

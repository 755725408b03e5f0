use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum StatementKind {
    Balance,
    Income,
    CashFlow,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementKind::Balance => write!(f, "balance-sheet"),
            StatementKind::Income => write!(f, "income"),
            StatementKind::CashFlow => write!(f, "cash-flow"),
        }
    }
}

/// Macro-category a line item belongs to. One enum spans both statements:
/// the first three variants are balance-sheet buckets, the rest are
/// income-statement buckets. Cash-flow records carry no category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum Category {
    Assets,
    Liabilities,
    Equity,
    Revenue,
    Cogs,
    GrossProfit,
    OperatingExpenses,
    OperatingIncome,
    FinanceCosts,
    FinanceIncome,
    NonOperating,
    PretaxIncome,
    Tax,
    NetIncome,
    EpsShareholders,
    Other,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Assets => "Assets",
            Category::Liabilities => "Liabilities",
            Category::Equity => "Equity",
            Category::Revenue => "Revenue",
            Category::Cogs => "COGS",
            Category::GrossProfit => "Gross Profit",
            Category::OperatingExpenses => "Operating Expenses",
            Category::OperatingIncome => "Operating Income",
            Category::FinanceCosts => "Finance Costs",
            Category::FinanceIncome => "Finance Income",
            Category::NonOperating => "Non-Operating Items",
            Category::PretaxIncome => "Pretax Income",
            Category::Tax => "Tax",
            Category::NetIncome => "Net Income",
            Category::EpsShareholders => "EPS & Shareholders",
            Category::Other => "Other",
        }
    }

    /// Whether values in this category represent money flowing out of the
    /// business. Used when translating a statement stored under the
    /// positive-magnitude convention into the internal one (outflows
    /// negative).
    pub fn is_outflow(&self) -> bool {
        matches!(
            self,
            Category::Cogs
                | Category::OperatingExpenses
                | Category::FinanceCosts
                | Category::Tax
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One cleaned fact: a metric observed in one fiscal year.
///
/// `value` is stored in the internal sign convention (outflows negative)
/// once normalization has run. Records are immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemRecord {
    pub metric: String,
    pub year: i32,
    pub value: f64,
    pub category: Option<Category>,
}

/// An ordered collection of cleaned records for one statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanedStatement {
    pub kind: StatementKind,
    pub records: Vec<LineItemRecord>,
}

impl CleanedStatement {
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.records.iter().map(|r| r.year).collect();
        years.sort_unstable();
        years.dedup();
        years
    }

    pub fn distinct_metrics(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for record in &self.records {
            if !seen.contains(&record.metric) {
                seen.push(record.metric.clone());
            }
        }
        seen
    }

    /// Serializes the long table as `Metric,Year,Value[,Category]`.
    pub fn to_csv(&self) -> crate::error::Result<String> {
        let with_category = self.kind != StatementKind::CashFlow;
        let mut writer = csv::Writer::from_writer(Vec::new());

        if with_category {
            writer.write_record(["Metric", "Year", "Value", "Category"])?;
        } else {
            writer.write_record(["Metric", "Year", "Value"])?;
        }

        for record in &self.records {
            let year = record.year.to_string();
            let value = format_value(record.value);
            if with_category {
                let category = record
                    .category
                    .map(|c| c.label().to_string())
                    .unwrap_or_default();
                writer.write_record([&record.metric, &year, &value, &category])?;
            } else {
                writer.write_record([&record.metric, &year, &value])?;
            }
        }

        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8(bytes).expect("csv output is valid utf-8"))
    }
}

fn format_value(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels_round_trip_display() {
        assert_eq!(Category::Cogs.to_string(), "COGS");
        assert_eq!(Category::NonOperating.to_string(), "Non-Operating Items");
        assert_eq!(Category::EpsShareholders.to_string(), "EPS & Shareholders");
    }

    #[test]
    fn test_outflow_categories() {
        assert!(Category::Cogs.is_outflow());
        assert!(Category::OperatingExpenses.is_outflow());
        assert!(Category::FinanceCosts.is_outflow());
        assert!(!Category::Revenue.is_outflow());
        assert!(!Category::Assets.is_outflow());
    }

    #[test]
    fn test_cleaned_statement_csv_includes_category() {
        let statement = CleanedStatement {
            kind: StatementKind::Income,
            records: vec![LineItemRecord {
                metric: "Revenue".to_string(),
                year: 2024,
                value: 35500.0,
                category: Some(Category::Revenue),
            }],
        };

        let csv = statement.to_csv().unwrap();
        assert!(csv.starts_with("Metric,Year,Value,Category\n"));
        assert!(csv.contains("Revenue,2024,35500.0,Revenue"));
    }

    #[test]
    fn test_cash_flow_csv_has_no_category_column() {
        let statement = CleanedStatement {
            kind: StatementKind::CashFlow,
            records: vec![LineItemRecord {
                metric: "Net Cash Flows From Operating Activities".to_string(),
                year: 2023,
                value: 1200.5,
                category: None,
            }],
        };

        let csv = statement.to_csv().unwrap();
        assert!(csv.starts_with("Metric,Year,Value\n"));
        assert!(!csv.contains("Category"));
    }

    #[test]
    fn test_distinct_metrics_preserve_first_seen_order() {
        let statement = CleanedStatement {
            kind: StatementKind::Balance,
            records: vec![
                LineItemRecord {
                    metric: "Cash".to_string(),
                    year: 2021,
                    value: 1.0,
                    category: None,
                },
                LineItemRecord {
                    metric: "Inventory".to_string(),
                    year: 2021,
                    value: 2.0,
                    category: None,
                },
                LineItemRecord {
                    metric: "Cash".to_string(),
                    year: 2022,
                    value: 3.0,
                    category: None,
                },
            ],
        };

        assert_eq!(statement.distinct_metrics(), vec!["Cash", "Inventory"]);
        assert_eq!(statement.years(), vec![2021, 2022]);
    }
}

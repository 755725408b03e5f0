use crate::config::{BalanceLayout, CategoryOverrides};
use crate::schema::Category;
use log::warn;
use std::collections::BTreeMap;

/// Classifies an income-statement metric by keyword cascade. The order of
/// the rules is load-bearing: "cost of revenue" must pre-empt the generic
/// "revenue" rule, and the specific profit rules must come before "tax".
pub fn income_category(metric: &str) -> Category {
    let m = metric.to_lowercase();
    let contains_any = |needles: &[&str]| needles.iter().any(|n| m.contains(n));

    if m.contains("cost of revenue") {
        Category::Cogs
    } else if m.contains("revenue") {
        Category::Revenue
    } else if m.contains("gross profit") {
        Category::GrossProfit
    } else if contains_any(&[
        "selling",
        "general",
        "admin",
        "marketing",
        "depreciation",
        "operating expense",
    ]) {
        Category::OperatingExpenses
    } else if m.contains("operating income") || m.contains("ebit") {
        Category::OperatingIncome
    } else if m.contains("finance costs") {
        Category::FinanceCosts
    } else if m.contains("finance income") {
        Category::FinanceIncome
    } else if contains_any(&[
        "non operating",
        "unusual",
        "write off",
        "other income",
        "share of results of associates and joint ventures",
        "impairment",
    ]) {
        Category::NonOperating
    } else if m.contains("profit before tax") {
        Category::PretaxIncome
    } else if m.contains("tax") {
        Category::Tax
    } else if contains_any(&[
        "interest",
        "normalized income",
        "profit for the year",
        "owners of the company",
    ]) {
        Category::NetIncome
    } else if m.contains("basic and diluted earnings per share (aed)") {
        Category::EpsShareholders
    } else {
        Category::Other
    }
}

/// Builds the metric -> category map for the balance sheet.
///
/// An explicit override map is used when it matches the metric set exactly;
/// otherwise the positional layout is applied to the distinct metrics in
/// source row order. Returned alongside the map is a list of data-quality
/// findings (override fallback, layout shortfall, unmapped extras).
pub fn balance_category_map(
    metrics: &[String],
    layout: &BalanceLayout,
    overrides: Option<&CategoryOverrides>,
) -> (BTreeMap<String, Category>, Vec<String>) {
    let mut findings = Vec::new();

    if let Some(overrides) = overrides {
        match overrides.validate(metrics) {
            Ok(()) => return (overrides.entries.clone(), findings),
            Err(e) => {
                warn!("Balance category overrides rejected, falling back to positional inference: {e}");
                findings.push(format!("override fallback: {e}"));
            }
        }
    }

    let mut map = BTreeMap::new();
    for (index, metric) in metrics.iter().enumerate() {
        let category = if index < layout.assets {
            Some(Category::Assets)
        } else if index < layout.assets + layout.liabilities {
            Some(Category::Liabilities)
        } else if index < layout.total() {
            Some(Category::Equity)
        } else {
            None
        };

        match category {
            Some(category) => {
                map.insert(metric.clone(), category);
            }
            None => {
                findings.push(format!(
                    "metric '{}' at position {} exceeds the positional layout ({} metrics)",
                    metric,
                    index + 1,
                    layout.total()
                ));
            }
        }
    }

    if metrics.len() < layout.total() {
        let missing = shortfall_categories(metrics.len(), layout);
        findings.push(format!(
            "only {} distinct metrics for a {}-metric layout; {} left empty or truncated",
            metrics.len(),
            layout.total(),
            missing.join(", ")
        ));
    }

    for finding in &findings {
        warn!("Balance categorization: {finding}");
    }

    (map, findings)
}

fn shortfall_categories(present: usize, layout: &BalanceLayout) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if present < layout.assets {
        missing.push("Assets");
    }
    if present < layout.assets + layout.liabilities {
        missing.push("Liabilities");
    }
    if present < layout.total() {
        missing.push("Equity");
    }
    missing
}

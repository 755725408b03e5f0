use crate::categorize::{balance_category_map, income_category};
use crate::config::{AnalysisConfig, SignConvention};
use crate::error::{AnalysisError, Result};
use crate::ingestion::WideTable;
use crate::schema::{CleanedStatement, LineItemRecord, StatementKind};
use crate::utils::{normalize_metric, parse_value};
use log::{info, warn};
use std::collections::HashMap;

/// A value cell that survived filtering but did not parse as a number.
#[derive(Debug, Clone)]
pub struct ParseIssue {
    pub metric: String,
    pub year: i32,
    pub raw: String,
}

/// An exact (metric, year, value) repeat found after normalization.
#[derive(Debug, Clone)]
pub struct DuplicateRow {
    pub metric: String,
    pub year: i32,
    pub value: f64,
    pub occurrences: usize,
}

/// Data-quality findings accumulated while cleaning one statement.
/// Per-row problems are collected here and reported together so that one
/// bad row never hides the next one.
#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    pub rows_unpivoted: usize,
    pub rows_kept: usize,
    pub parse_issues: Vec<ParseIssue>,
    pub duplicates: Vec<DuplicateRow>,
    pub category_findings: Vec<String>,
}

impl CleanReport {
    pub fn has_findings(&self) -> bool {
        !self.parse_issues.is_empty()
            || !self.duplicates.is_empty()
            || !self.category_findings.is_empty()
    }
}

/// Transforms one wide statement into a cleaned long table.
///
/// Unpivots every metric x year combination, drops blank/sentinel/denylisted
/// rows, parses values, canonicalizes metric labels, assigns categories, and
/// applies the statement's sign convention so that outflows are negative in
/// every record that leaves this function.
pub fn normalize_statement(
    table: &WideTable,
    config: &AnalysisConfig,
) -> Result<(CleanedStatement, CleanReport)> {
    let kind = table.kind;
    let mut report = CleanReport {
        rows_unpivoted: table.rows.len() * table.years.len(),
        ..CleanReport::default()
    };

    let denylist: Vec<String> = config
        .income_denylist
        .iter()
        .map(|m| m.trim().to_lowercase())
        .collect();

    let mut records = Vec::new();
    let mut candidate_cells = 0usize;

    for row in &table.rows {
        let metric_trimmed = row.metric.trim();
        if metric_trimmed.is_empty() {
            continue;
        }
        if kind == StatementKind::Income
            && denylist.contains(&metric_trimmed.to_lowercase())
        {
            continue;
        }

        let metric = normalize_metric(&row.metric);

        for (column, raw) in row.values.iter().enumerate() {
            let year = table.years[column];
            let cell = raw.trim();
            if cell.is_empty() || cell == config.missing_sentinel {
                continue;
            }

            candidate_cells += 1;
            match parse_value(cell) {
                Some(value) => records.push(LineItemRecord {
                    metric: metric.clone(),
                    year,
                    value,
                    category: None,
                }),
                None => report.parse_issues.push(ParseIssue {
                    metric: metric.clone(),
                    year,
                    raw: cell.to_string(),
                }),
            }
        }
    }

    if candidate_cells > 0 {
        let failure_ratio = report.parse_issues.len() as f64 / candidate_cells as f64;
        if failure_ratio > config.max_parse_failure_ratio {
            return Err(AnalysisError::ExcessiveParseFailures {
                statement: kind,
                failed: report.parse_issues.len(),
                total: candidate_cells,
                threshold: config.max_parse_failure_ratio,
            });
        }
    }

    if records.is_empty() {
        return Err(AnalysisError::EmptyStatement { statement: kind });
    }

    detect_duplicates(&records, &mut report);

    let mut statement = CleanedStatement { kind, records };
    assign_categories(&mut statement, config, &mut report);
    apply_sign_convention(&mut statement, config);

    report.rows_kept = statement.records.len();
    info!(
        "Cleaned {} statement: {} of {} unpivoted rows kept, {} parse issue(s), {} duplicate group(s)",
        kind,
        report.rows_kept,
        report.rows_unpivoted,
        report.parse_issues.len(),
        report.duplicates.len()
    );
    for issue in &report.parse_issues {
        warn!(
            "{kind} statement: unparseable value '{}' for '{}' in {}",
            issue.raw, issue.metric, issue.year
        );
    }
    for duplicate in &report.duplicates {
        warn!(
            "{kind} statement: '{}' {} = {} appears {} times",
            duplicate.metric, duplicate.year, duplicate.value, duplicate.occurrences
        );
    }

    Ok((statement, report))
}

fn detect_duplicates(records: &[LineItemRecord], report: &mut CleanReport) {
    let mut counts: HashMap<(String, i32, u64), usize> = HashMap::new();
    for record in records {
        *counts
            .entry((record.metric.clone(), record.year, record.value.to_bits()))
            .or_insert(0) += 1;
    }

    let mut repeats: Vec<DuplicateRow> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|((metric, year, bits), occurrences)| DuplicateRow {
            metric,
            year,
            value: f64::from_bits(bits),
            occurrences,
        })
        .collect();
    repeats.sort_by(|a, b| (&a.metric, a.year).cmp(&(&b.metric, b.year)));
    report.duplicates = repeats;
}

fn assign_categories(
    statement: &mut CleanedStatement,
    config: &AnalysisConfig,
    report: &mut CleanReport,
) {
    match statement.kind {
        StatementKind::Income => {
            for record in &mut statement.records {
                record.category = Some(income_category(&record.metric));
            }
        }
        StatementKind::Balance => {
            let metrics = statement.distinct_metrics();
            let (map, findings) = balance_category_map(
                &metrics,
                &config.balance_layout,
                config.balance_overrides.as_ref(),
            );
            report.category_findings = findings;
            for record in &mut statement.records {
                record.category = map.get(&record.metric).copied();
            }
        }
        StatementKind::CashFlow => {}
    }
}

fn apply_sign_convention(statement: &mut CleanedStatement, config: &AnalysisConfig) {
    match statement.kind {
        StatementKind::Income => {
            if config.income_signs == SignConvention::PositiveOutflows {
                for record in &mut statement.records {
                    if record.category.is_some_and(|c| c.is_outflow()) {
                        record.value = -record.value;
                    }
                }
            }
        }
        StatementKind::CashFlow => {
            if config.cashflow_signs == SignConvention::PositiveOutflows {
                let outflows: Vec<String> = config
                    .cashflow_outflow_metrics
                    .iter()
                    .map(|m| m.to_lowercase())
                    .collect();
                for record in &mut statement.records {
                    let metric = record.metric.to_lowercase();
                    if outflows.iter().any(|needle| metric.contains(needle)) {
                        record.value = -record.value;
                    }
                }
            }
        }
        StatementKind::Balance => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::WideTable;
    use crate::schema::Category;

    fn income_table(data: &str) -> WideTable {
        WideTable::from_csv_str(data, StatementKind::Income).unwrap()
    }

    #[test]
    fn test_unpivot_preserves_all_combinations_before_filtering() {
        let data = "Metric,2024,2023\nRevenue,10,20\nCosts,–,5\n";
        let table = income_table(data);
        let (statement, report) =
            normalize_statement(&table, &AnalysisConfig::default()).unwrap();

        assert_eq!(report.rows_unpivoted, 4);
        // One sentinel cell dropped, the rest kept.
        assert_eq!(statement.records.len(), 3);
        assert_eq!(report.rows_kept, 3);
    }

    #[test]
    fn test_blank_metric_and_sentinel_rows_dropped() {
        let data = "Metric,2024\n  ,99\nRevenue,10\nCosts,–\n";
        let table = income_table(data);
        let (statement, _) =
            normalize_statement(&table, &AnalysisConfig::default()).unwrap();

        assert_eq!(statement.records.len(), 1);
        assert_eq!(statement.records[0].metric, "Revenue");
    }

    #[test]
    fn test_income_denylist_is_case_insensitive() {
        let data = "Metric,2024\nattributable to:,1\nRevenue,10\n";
        let table = income_table(data);
        let (statement, _) =
            normalize_statement(&table, &AnalysisConfig::default()).unwrap();

        assert_eq!(statement.records.len(), 1);
        assert_eq!(statement.records[0].metric, "Revenue");
    }

    #[test]
    fn test_metric_labels_are_title_cased() {
        let data = "Metric,2024\nTOTAL revenue,10\n";
        let table = income_table(data);
        let (statement, _) =
            normalize_statement(&table, &AnalysisConfig::default()).unwrap();

        assert_eq!(statement.records[0].metric, "Total Revenue");
        assert_eq!(statement.records[0].category, Some(Category::Revenue));
    }

    #[test]
    fn test_parse_issue_reported_and_excluded() {
        let data = "Metric,2024,2023\nRevenue,ten,20\n";
        let table = income_table(data);
        let config = AnalysisConfig {
            max_parse_failure_ratio: 0.6,
            ..AnalysisConfig::default()
        };
        let (statement, report) = normalize_statement(&table, &config).unwrap();

        assert_eq!(statement.records.len(), 1);
        assert_eq!(report.parse_issues.len(), 1);
        assert_eq!(report.parse_issues[0].raw, "ten");
        assert_eq!(report.parse_issues[0].year, 2024);
    }

    #[test]
    fn test_excessive_parse_failures_abort() {
        let data = "Metric,2024,2023\nRevenue,ten,twenty\nCosts,5,x\n";
        let table = income_table(data);
        let err = normalize_statement(&table, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::ExcessiveParseFailures { .. }));
    }

    #[test]
    fn test_duplicates_reported_not_dropped() {
        // Same label in different casings collapses to one canonical metric,
        // producing an exact duplicate fact.
        let data = "Metric,2024\nRevenue,10\nREVENUE,10\n";
        let table = income_table(data);
        let (statement, report) =
            normalize_statement(&table, &AnalysisConfig::default()).unwrap();

        assert_eq!(statement.records.len(), 2);
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].occurrences, 2);
        assert_eq!(report.duplicates[0].metric, "Revenue");
    }

    #[test]
    fn test_positive_convention_negates_outflows() {
        let data = "Metric,2024\nRevenue,1000\nCost Of Revenue,400\n";
        let table = income_table(data);
        let config = AnalysisConfig {
            income_signs: SignConvention::PositiveOutflows,
            ..AnalysisConfig::default()
        };
        let (statement, _) = normalize_statement(&table, &config).unwrap();

        let cogs = statement
            .records
            .iter()
            .find(|r| r.metric == "Cost Of Revenue")
            .unwrap();
        assert_eq!(cogs.value, -400.0);
        let revenue = statement
            .records
            .iter()
            .find(|r| r.metric == "Revenue")
            .unwrap();
        assert_eq!(revenue.value, 1000.0);
    }

    #[test]
    fn test_negative_convention_passes_values_through() {
        let data = "Metric,2024\nRevenue,1000\nCost Of Revenue,-400\n";
        let table = income_table(data);
        let (statement, _) =
            normalize_statement(&table, &AnalysisConfig::default()).unwrap();

        let cogs = statement
            .records
            .iter()
            .find(|r| r.metric == "Cost Of Revenue")
            .unwrap();
        assert_eq!(cogs.value, -400.0);
    }

    #[test]
    fn test_cashflow_positive_convention_negates_capex() {
        let data = "Metric,2024\nNet Cash Flows From Operating Activities,500\n\"Amounts Incurred On Property, Plant And Equipment\",120\n";
        let table = WideTable::from_csv_str(data, StatementKind::CashFlow).unwrap();
        let config = AnalysisConfig {
            cashflow_signs: SignConvention::PositiveOutflows,
            ..AnalysisConfig::default()
        };
        let (statement, _) = normalize_statement(&table, &config).unwrap();

        let capex = statement
            .records
            .iter()
            .find(|r| r.metric.contains("Property"))
            .unwrap();
        assert_eq!(capex.value, -120.0);
    }

    #[test]
    fn test_idempotence_same_input_same_output() {
        let data = "Metric,31/12/2024,31/12/2023\nRevenue,\"35,500\",\"26,749\"\nCost Of Revenue,\"-17,200\",\"-12,011\"\n";
        let table = income_table(data);
        let config = AnalysisConfig::default();

        let (first, _) = normalize_statement(&table, &config).unwrap();
        let (second, _) = normalize_statement(&table, &config).unwrap();
        assert_eq!(first.to_csv().unwrap(), second.to_csv().unwrap());
    }

    #[test]
    fn test_empty_statement_is_fatal() {
        let data = "Metric,2024\n,–\n";
        let table = income_table(data);
        let err = normalize_statement(&table, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyStatement { .. }));
    }
}

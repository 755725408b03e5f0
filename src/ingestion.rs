use crate::error::{AnalysisError, Result};
use crate::schema::StatementKind;
use chrono::{Datelike, NaiveDate};
use log::debug;
use std::io::Read;
use std::path::Path;

/// One raw row of a wide statement: the metric label as printed plus one
/// unparsed value cell per year column.
#[derive(Debug, Clone)]
pub struct WideRow {
    pub metric: String,
    pub values: Vec<String>,
}

/// A wide-format statement as loaded: rows are line items, columns are
/// fiscal-year snapshots. Values stay as raw text until normalization.
#[derive(Debug, Clone)]
pub struct WideTable {
    pub kind: StatementKind,
    /// Resolved 4-digit year per value column, in source column order.
    pub years: Vec<i32>,
    pub rows: Vec<WideRow>,
}

impl WideTable {
    pub fn from_csv_path(path: impl AsRef<Path>, kind: StatementKind) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, kind)
    }

    pub fn from_csv_str(data: &str, kind: StatementKind) -> Result<Self> {
        Self::from_reader(data.as_bytes(), kind)
    }

    pub fn from_reader<R: Read>(reader: R, kind: StatementKind) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        if headers.len() < 2 {
            return Err(AnalysisError::NoYearColumns { statement: kind });
        }

        // The label column is expected first. A year-shaped first header
        // means the source dropped it entirely.
        let first = headers.get(0).unwrap_or_default();
        if year_from_header(first).is_some() {
            return Err(AnalysisError::MissingMetricColumn { statement: kind });
        }

        let mut years = Vec::with_capacity(headers.len() - 1);
        for header in headers.iter().skip(1) {
            let year = year_from_header(header).ok_or_else(|| AnalysisError::InvalidYearHeader {
                statement: kind,
                header: header.to_string(),
            })?;
            years.push(year);
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let metric = record.get(0).unwrap_or_default().to_string();
            let values = (0..years.len())
                .map(|i| record.get(i + 1).unwrap_or_default().to_string())
                .collect();
            rows.push(WideRow { metric, values });
        }

        debug!(
            "Loaded {} statement: {} rows x {} year columns {:?}",
            kind,
            rows.len(),
            years.len(),
            years
        );

        Ok(Self { kind, years, rows })
    }
}

const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%m/%d/%Y"];

/// Reduces a year-column header to a bare 4-digit year. Accepts either the
/// year itself or a date token such as `31/12/2024`.
pub fn year_from_header(header: &str) -> Option<i32> {
    let trimmed = header.trim();

    if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.parse().ok();
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date.year());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_from_header_variants() {
        assert_eq!(year_from_header("2024"), Some(2024));
        assert_eq!(year_from_header(" 31/12/2023 "), Some(2023));
        assert_eq!(year_from_header("2022-12-31"), Some(2022));
        assert_eq!(year_from_header("FY24"), None);
        assert_eq!(year_from_header(""), None);
    }

    #[test]
    fn test_load_wide_table() {
        let data = "\
Metric,31/12/2024,31/12/2023
Revenue,\"35,500\",\"26,749\"
Cost Of Revenue,\"-17,200\",\"-12,011\"
";
        let table = WideTable::from_csv_str(data, StatementKind::Income).unwrap();
        assert_eq!(table.years, vec![2024, 2023]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].metric, "Revenue");
        assert_eq!(table.rows[0].values, vec!["35,500", "26,749"]);
    }

    #[test]
    fn test_blank_label_header_is_accepted() {
        // pandas exports the label column as an unnamed index column.
        let data = ",2024,2023\nRevenue,10,20\n";
        let table = WideTable::from_csv_str(data, StatementKind::Income).unwrap();
        assert_eq!(table.years, vec![2024, 2023]);
    }

    #[test]
    fn test_unparsable_year_header_is_fatal() {
        let data = "Metric,FY-twenty-four\nRevenue,10\n";
        let err = WideTable::from_csv_str(data, StatementKind::Income).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidYearHeader { .. }));
    }

    #[test]
    fn test_missing_metric_column_is_fatal() {
        let data = "2024,2023\n10,20\n";
        let err = WideTable::from_csv_str(data, StatementKind::Balance).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingMetricColumn { .. }));
    }

    #[test]
    fn test_short_rows_yield_empty_cells() {
        let data = "Metric,2024,2023\nRevenue,10\n";
        let table = WideTable::from_csv_str(data, StatementKind::Income).unwrap();
        assert_eq!(table.rows[0].values, vec!["10", ""]);
    }
}

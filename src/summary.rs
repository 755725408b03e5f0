use serde::Serialize;
use std::collections::BTreeMap;

/// One summary cell. `None` means undefined (missing operand or division by
/// zero) and is rendered as the literal `undefined`, never as 0 or blank.
pub type Cell = Option<f64>;

/// A year-keyed table of named derived aggregates. Columns are only ever
/// appended; rows cover the union of the years seen by any column.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SummaryTable {
    columns: Vec<String>,
    rows: BTreeMap<i32, Vec<Cell>>,
}

impl SummaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn years(&self) -> Vec<i32> {
        self.rows.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Appends a column. Years not yet present are added with earlier
    /// columns left undefined; years the column does not cover stay
    /// undefined in the new column.
    pub fn push_column(&mut self, name: &str, series: &BTreeMap<i32, Cell>) {
        let index = self.columns.len();
        self.columns.push(name.to_string());

        for year in series.keys() {
            self.rows.entry(*year).or_insert_with(|| vec![None; index]);
        }
        for row in self.rows.values_mut() {
            row.push(None);
        }
        for (year, cell) in series {
            if let Some(row) = self.rows.get_mut(year) {
                row[index] = *cell;
            }
        }
    }

    /// Appends a column of plain (always-defined) values.
    pub fn push_values(&mut self, name: &str, series: &BTreeMap<i32, f64>) {
        let wrapped: BTreeMap<i32, Cell> =
            series.iter().map(|(y, v)| (*y, Some(*v))).collect();
        self.push_column(name, &wrapped);
    }

    pub fn get(&self, year: i32, column: &str) -> Cell {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(&year).and_then(|row| row[index])
    }

    pub fn column(&self, name: &str) -> Option<BTreeMap<i32, Cell>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(
            self.rows
                .iter()
                .map(|(year, row)| (*year, row[index]))
                .collect(),
        )
    }

    pub fn to_csv(&self) -> crate::error::Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec!["Year".to_string()];
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header)?;

        for (year, row) in &self.rows {
            let mut record = vec![year.to_string()];
            record.extend(row.iter().map(|cell| format_cell(*cell)));
            writer.write_record(&record)?;
        }

        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8(bytes).expect("csv output is valid utf-8"))
    }

    /// Fixed-width console rendering with `undefined` markers.
    pub fn render(&self, title: &str) -> String {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.len()).collect();
        let formatted: BTreeMap<i32, Vec<String>> = self
            .rows
            .iter()
            .map(|(year, row)| {
                let cells: Vec<String> = row.iter().map(|cell| format_cell(*cell)).collect();
                (*year, cells)
            })
            .collect();
        for cells in formatted.values() {
            for (i, cell) in cells.iter().enumerate() {
                widths[i] = widths[i].max(cell.len());
            }
        }

        let mut out = String::new();
        out.push_str(title);
        out.push('\n');

        out.push_str("Year");
        for (column, width) in self.columns.iter().zip(&widths) {
            out.push_str(&format!("  {:>w$}", column, w = *width));
        }
        out.push('\n');

        for (year, cells) in &formatted {
            out.push_str(&year.to_string());
            for (cell, width) in cells.iter().zip(&widths) {
                out.push_str(&format!("  {:>w$}", cell, w = *width));
            }
            out.push('\n');
        }

        out
    }
}

fn format_cell(cell: Cell) -> String {
    match cell {
        Some(value) => format!("{value:.2}"),
        None => "undefined".to_string(),
    }
}

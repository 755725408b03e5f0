use thiserror::Error;

use crate::schema::StatementKind;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("{statement} statement has no metric column (expected it as the first column)")]
    MissingMetricColumn { statement: StatementKind },

    #[error("{statement} statement header '{header}' cannot be reduced to a 4-digit fiscal year")]
    InvalidYearHeader {
        statement: StatementKind,
        header: String,
    },

    #[error("{statement} statement has no year columns")]
    NoYearColumns { statement: StatementKind },

    #[error("{statement} statement: {failed} of {total} value cells failed to parse (threshold {threshold})")]
    ExcessiveParseFailures {
        statement: StatementKind,
        failed: usize,
        total: usize,
        threshold: f64,
    },

    #[error("{statement} statement produced no records after cleaning")]
    EmptyStatement { statement: StatementKind },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Category overrides do not match the statement: {details}")]
    OverrideMismatch { details: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

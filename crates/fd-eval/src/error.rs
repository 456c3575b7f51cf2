//! Error types for factor evaluation.

use thiserror::Error;

/// Result type for evaluation operations.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors that abort an evaluation batch.
///
/// Data-quality problems inside a single factor/period unit (mostly invalid
/// values, constant factors, singular regressions) are not errors: the unit
/// simply produces no rows.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Missing required column in the observation table
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Configuration value failed a precondition check
    #[error("Invalid configuration `{field}`: {reason}")]
    InvalidConfig {
        /// Name of the offending configuration key
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Timestamp value that could not be interpreted
    #[error("Invalid timestamp in row {row}: {value}")]
    InvalidTimestamp {
        /// Row index in the observation table
        row: usize,
        /// Raw value as text
        value: String,
    },

    /// Null in a column that must be fully populated
    #[error("Null value in column {column} at row {row}")]
    NullValue {
        /// Column name
        column: String,
        /// Row index in the observation table
        row: usize,
    },

    /// Batch column whose length differs from the number of rows
    #[error("Column {column} has {actual} values, expected {expected}")]
    ColumnLength {
        /// Column name
        column: String,
        /// Number of rows of the batch
        expected: usize,
        /// Number of values in the column
        actual: usize,
    },

    /// Polars DataFrame error
    #[error("DataFrame error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Configuration could not be deserialized
    #[error("Configuration error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error while reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl EvalError {
    /// Shorthand for an [`EvalError::InvalidConfig`].
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

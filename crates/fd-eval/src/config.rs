//! Evaluation configuration.
//!
//! The configuration mirrors the keys of the JSON config files used by the
//! evaluation jobs (`returnIntervals`, `callBackPeriod`, `quantile`, ...).
//! Keys without a default are required; a file missing one of them fails to
//! deserialize with a message naming the key. [`EvaluationConfig::validate`]
//! runs the remaining precondition checks before any computation starts.

use crate::{EvalError, Result};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default entity column name.
pub const DEFAULT_SYMBOL_COL: &str = "symbol";
/// Default timestamp column name.
pub const DEFAULT_DATE_COL: &str = "tradeDate";
/// Default number of rows per result insertion batch.
pub const DEFAULT_INSERT_BATCH_SIZE: usize = 1_000_000;

/// Granularity the regression statistics are aggregated at.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    /// One analysis period per distinct timestamp
    #[display("native")]
    Native,
    /// One analysis period per calendar date
    #[display("daily")]
    Daily,
}

/// Configuration for a single evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationConfig {
    /// Factor columns to evaluate.
    pub factors: Vec<String>,
    /// Forward return horizons, in periods.
    pub return_intervals: Vec<u32>,
    /// Forward return column per entry of `return_intervals`.
    pub fut_ret_label_names: Vec<String>,
    /// Single-bar return column used by the quantile backtest.
    pub bar_ret_label_name: String,
    /// Entity identifier column.
    #[serde(default = "default_symbol_col")]
    pub symbol_col: String,
    /// Timestamp column.
    #[serde(default = "default_date_col")]
    pub date_col: String,
    /// Number of trailing analysis periods in a regression sample.
    #[serde(default = "default_call_back_period")]
    pub call_back_period: u32,
    /// Number of quantile buckets.
    #[serde(default = "default_quantile")]
    pub quantile: usize,
    /// Symmetric clip applied to bar returns of daily factors.
    #[serde(default)]
    pub daily_pnl_limit: Option<f64>,
    /// Whether the factors are daily. `false` means sub-daily factors.
    #[serde(default = "default_daily_freq")]
    pub daily_freq: bool,
    /// For sub-daily factors, aggregate regression statistics at the native
    /// frequency instead of per calendar date.
    #[serde(default)]
    pub use_min_freq_period: bool,
    /// Worker threads for the per-period fan-out. `None` uses the global pool.
    #[serde(default)]
    pub threads: Option<usize>,
    /// Rows per batch when handing result tables to a sink.
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,
}

fn default_symbol_col() -> String {
    DEFAULT_SYMBOL_COL.to_string()
}

fn default_date_col() -> String {
    DEFAULT_DATE_COL.to_string()
}

const fn default_call_back_period() -> u32 {
    1
}

const fn default_quantile() -> usize {
    5
}

const fn default_daily_freq() -> bool {
    true
}

const fn default_insert_batch_size() -> usize {
    DEFAULT_INSERT_BATCH_SIZE
}

impl EvaluationConfig {
    /// Create a configuration with defaults for everything but the column
    /// mapping.
    pub fn new(
        factors: Vec<String>,
        return_intervals: Vec<u32>,
        fut_ret_label_names: Vec<String>,
        bar_ret_label_name: impl Into<String>,
    ) -> Self {
        Self {
            factors,
            return_intervals,
            fut_ret_label_names,
            bar_ret_label_name: bar_ret_label_name.into(),
            symbol_col: default_symbol_col(),
            date_col: default_date_col(),
            call_back_period: default_call_back_period(),
            quantile: default_quantile(),
            daily_pnl_limit: None,
            daily_freq: default_daily_freq(),
            use_min_freq_period: false,
            threads: None,
            insert_batch_size: default_insert_batch_size(),
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Granularity of the analysis period space.
    pub const fn analysis_frequency(&self) -> Frequency {
        if self.daily_freq || self.use_min_freq_period {
            Frequency::Native
        } else {
            Frequency::Daily
        }
    }

    /// Bar return clip bound, if it applies to this run.
    pub const fn pnl_limit(&self) -> Option<f64> {
        if self.daily_freq {
            self.daily_pnl_limit
        } else {
            None
        }
    }

    /// Check every precondition of an evaluation run.
    pub fn validate(&self) -> Result<()> {
        if self.return_intervals.is_empty() {
            return Err(EvalError::config(
                "returnIntervals",
                "at least one return interval is required",
            ));
        }
        if let Some(bad) = self.return_intervals.iter().find(|&&i| i == 0) {
            return Err(EvalError::config(
                "returnIntervals",
                format!("return intervals must be positive, got {bad}"),
            ));
        }
        if self.fut_ret_label_names.len() != self.return_intervals.len() {
            return Err(EvalError::config(
                "futRetLabelNames",
                format!(
                    "expected {} forward return columns, got {}",
                    self.return_intervals.len(),
                    self.fut_ret_label_names.len()
                ),
            ));
        }
        if self.bar_ret_label_name.is_empty() {
            return Err(EvalError::config("barRetLabelName", "must not be empty"));
        }
        if self.symbol_col.is_empty() {
            return Err(EvalError::config("symbolCol", "must not be empty"));
        }
        if self.date_col.is_empty() {
            return Err(EvalError::config("dateCol", "must not be empty"));
        }
        if self.call_back_period == 0 {
            return Err(EvalError::config("callBackPeriod", "must be at least 1"));
        }
        if self.quantile < 2 {
            return Err(EvalError::config(
                "quantile",
                format!("must be at least 2, got {}", self.quantile),
            ));
        }
        if let Some(limit) = self.daily_pnl_limit
            && !(limit.is_finite() && limit > 0.0)
        {
            return Err(EvalError::config(
                "dailyPnlLimit",
                format!("must be a positive number, got {limit}"),
            ));
        }
        if self.threads == Some(0) {
            return Err(EvalError::config("threads", "must be at least 1"));
        }
        if self.insert_batch_size == 0 {
            return Err(EvalError::config("insertBatchSize", "must be at least 1"));
        }
        Ok(())
    }
}

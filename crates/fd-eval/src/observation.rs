//! Observation batch: the typed, columnar view of the input table.

use crate::{EvalError, EvaluationConfig, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use polars::prelude::*;

/// Timestamp formats accepted in string timestamp columns.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y.%m.%d %H:%M:%S%.f",
    "%Y.%m.%dT%H:%M:%S%.f",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y.%m.%d", "%Y%m%d"];

/// A named numeric column of the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedColumn {
    /// Column name in the source table
    pub name: String,
    /// Values, NaN for nulls
    pub values: Vec<f64>,
}

/// Forward return column for one return interval.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardReturn {
    /// Horizon in periods
    pub interval: u32,
    /// Values, NaN for nulls
    pub values: Vec<f64>,
}

/// Closed historical batch of observations, one row per (entity, timestamp).
///
/// Rows are kept in chronological order (stable with respect to the source
/// table for equal timestamps). Numeric nulls become NaN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationBatch {
    /// Entity identifier per row
    pub entities: Vec<String>,
    /// Timestamp per row
    pub timestamps: Vec<NaiveDateTime>,
    /// Single-bar return per row
    pub bar_returns: Vec<f64>,
    /// One column per evaluated factor
    pub factors: Vec<NamedColumn>,
    /// One column per return interval
    pub forward_returns: Vec<ForwardReturn>,
}

impl ObservationBatch {
    /// Extract the configured columns from an observation table.
    ///
    /// An empty table yields an empty batch without checking its schema.
    /// Otherwise every configured column must be present. Bar returns are
    /// clipped when the configuration asks for it.
    pub fn from_frame(df: &DataFrame, config: &EvaluationConfig) -> Result<Self> {
        if df.height() == 0 {
            return Ok(Self {
                factors: config
                    .factors
                    .iter()
                    .map(|name| NamedColumn {
                        name: name.clone(),
                        values: Vec::new(),
                    })
                    .collect(),
                forward_returns: config
                    .return_intervals
                    .iter()
                    .map(|&interval| ForwardReturn {
                        interval,
                        values: Vec::new(),
                    })
                    .collect(),
                ..Self::default()
            });
        }

        let entities = string_column(df, &config.symbol_col)?;
        let timestamps = timestamp_column(df, &config.date_col)?;
        let mut bar_returns = float_column(df, &config.bar_ret_label_name)?;
        if let Some(limit) = config.pnl_limit() {
            for r in bar_returns.iter_mut() {
                *r = r.clamp(-limit, limit);
            }
        }

        let factors = config
            .factors
            .iter()
            .map(|name| {
                Ok(NamedColumn {
                    name: name.clone(),
                    values: float_column(df, name)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let forward_returns = config
            .return_intervals
            .iter()
            .zip(&config.fut_ret_label_names)
            .map(|(&interval, name)| {
                Ok(ForwardReturn {
                    interval,
                    values: float_column(df, name)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let batch = Self {
            entities,
            timestamps,
            bar_returns,
            factors,
            forward_returns,
        };
        Ok(batch.sorted_by_time())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the batch has no rows.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Check that every column has one value per row.
    pub fn validate(&self) -> Result<()> {
        let expected = self.len();
        let columns = [
            ("entities", self.entities.len()),
            ("bar returns", self.bar_returns.len()),
        ]
        .into_iter()
        .map(|(name, len)| (name.to_string(), len))
        .chain(self.factors.iter().map(|f| (f.name.clone(), f.values.len())))
        .chain(
            self.forward_returns
                .iter()
                .map(|f| (format!("forward return {}", f.interval), f.values.len())),
        );
        for (column, actual) in columns {
            if actual != expected {
                return Err(EvalError::ColumnLength {
                    column,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Forward return column for an interval.
    pub fn forward_return(&self, interval: u32) -> Option<&[f64]> {
        self.forward_returns
            .iter()
            .find(|f| f.interval == interval)
            .map(|f| f.values.as_slice())
    }

    /// Reorder rows by timestamp, keeping source order for ties.
    fn sorted_by_time(self) -> Self {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by_key(|&i| self.timestamps[i]);
        if order.iter().enumerate().all(|(pos, &i)| pos == i) {
            return self;
        }

        let take_f64 = |values: &[f64]| order.iter().map(|&i| values[i]).collect::<Vec<_>>();
        Self {
            entities: order.iter().map(|&i| self.entities[i].clone()).collect(),
            timestamps: order.iter().map(|&i| self.timestamps[i]).collect(),
            bar_returns: take_f64(&self.bar_returns),
            factors: self
                .factors
                .iter()
                .map(|f| NamedColumn {
                    name: f.name.clone(),
                    values: take_f64(&f.values),
                })
                .collect(),
            forward_returns: self
                .forward_returns
                .iter()
                .map(|f| ForwardReturn {
                    interval: f.interval,
                    values: take_f64(&f.values),
                })
                .collect(),
        }
    }
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| EvalError::MissingColumn(name.to_string()))
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = column(df, name)?.cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = column(df, name)?.cast(&DataType::String)?;
    series
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.map(str::to_string).ok_or_else(|| EvalError::NullValue {
                column: name.to_string(),
                row,
            })
        })
        .collect()
}

fn timestamp_column(df: &DataFrame, name: &str) -> Result<Vec<NaiveDateTime>> {
    let series = column(df, name)?;
    match series.dtype() {
        DataType::String => series
            .str()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                let raw = v.unwrap_or_default();
                parse_timestamp(raw).ok_or_else(|| EvalError::InvalidTimestamp {
                    row,
                    value: raw.to_string(),
                })
            })
            .collect(),
        _ => {
            let millis = series
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
                .cast(&DataType::Int64)?;
            millis
                .i64()?
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    v.and_then(DateTime::<Utc>::from_timestamp_millis)
                        .map(|dt| dt.naive_utc())
                        .ok_or_else(|| EvalError::InvalidTimestamp {
                            row,
                            value: format!("{v:?}"),
                        })
                })
                .collect()
        }
    }
}

/// Parse a date or date-time string. Plain dates map to midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

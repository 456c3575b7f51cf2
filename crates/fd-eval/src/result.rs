//! Result rows and their table form.

use crate::{Result, period::Period};
use chrono::NaiveDateTime;
use derive_more::Display;
use polars::prelude::*;
use serde::Serialize;

/// Statistic reported in the regression table.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Indicator {
    /// OLS intercept
    #[display("Alpha_OLS")]
    #[serde(rename = "Alpha_OLS")]
    AlphaOls,
    /// OLS slope (factor return)
    #[display("R_OLS")]
    #[serde(rename = "R_OLS")]
    ROls,
    /// t-statistic of the intercept
    #[display("Alpha_tstat")]
    #[serde(rename = "Alpha_tstat")]
    AlphaTstat,
    /// t-statistic of the slope
    #[display("R_tstat")]
    #[serde(rename = "R_tstat")]
    RTstat,
    /// R²
    #[display("R_square")]
    #[serde(rename = "R_square")]
    RSquare,
    /// Adjusted R²
    #[display("Adj_square")]
    #[serde(rename = "Adj_square")]
    AdjSquare,
    /// Residual standard error
    #[display("Std_Error")]
    #[serde(rename = "Std_Error")]
    StdError,
    /// Number of observations in the fit
    #[display("Obs")]
    #[serde(rename = "Obs")]
    Obs,
    /// Information coefficient
    #[display("IC")]
    #[serde(rename = "IC")]
    Ic,
    /// Rank information coefficient
    #[display("RankIC")]
    #[serde(rename = "RankIC")]
    RankIc,
}

impl Indicator {
    /// Every indicator, in emission order.
    pub const ALL: [Self; 10] = [
        Self::RSquare,
        Self::AdjSquare,
        Self::StdError,
        Self::Obs,
        Self::AlphaOls,
        Self::ROls,
        Self::AlphaTstat,
        Self::RTstat,
        Self::Ic,
        Self::RankIc,
    ];
}

/// One row of the regression table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionStat {
    /// Factor name
    pub factor: String,
    /// Forward return horizon
    pub return_interval: u32,
    /// Analysis period
    pub period: Period,
    /// Reported statistic
    pub indicator: Indicator,
    /// Value of the statistic
    pub value: f64,
    /// Timestamp of the analysis period
    pub trade_time: NaiveDateTime,
}

/// One row of the quantile table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantileStat {
    /// Factor name
    pub factor: String,
    /// Forward return horizon (rebalancing interval)
    pub return_interval: u32,
    /// Quantile period
    pub period: Period,
    /// Average bar return per bucket, lowest factor bucket first
    pub quantile_returns: Vec<f64>,
    /// Timestamp of the quantile period
    pub trade_time: NaiveDateTime,
}

/// Output of an evaluation run, both tables sorted by
/// (timestamp, factor, period).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationResult {
    /// Number of quantile buckets
    pub quantiles: usize,
    /// Regression and IC rows
    pub regression: Vec<RegressionStat>,
    /// Quantile backtest rows
    pub quantile: Vec<QuantileStat>,
}

impl EvaluationResult {
    /// Regression table with columns `factor`, `returnInterval`, `period`,
    /// `indicator`, `value`, `tradeTime`.
    pub fn regression_frame(&self) -> Result<DataFrame> {
        let rows = &self.regression;
        let columns = vec![
            Column::new(
                "factor".into(),
                rows.iter().map(|r| r.factor.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                "returnInterval".into(),
                rows.iter().map(|r| r.return_interval).collect::<Vec<_>>(),
            ),
            Column::new(
                "period".into(),
                rows.iter().map(|r| r.period).collect::<Vec<_>>(),
            ),
            Column::new(
                "indicator".into(),
                rows.iter()
                    .map(|r| r.indicator.to_string())
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "value".into(),
                rows.iter().map(|r| r.value).collect::<Vec<_>>(),
            ),
            trade_time_column(rows.iter().map(|r| r.trade_time))?,
        ];
        Ok(DataFrame::new(columns)?)
    }

    /// Quantile table with columns `factor`, `returnInterval`, `period`,
    /// `quantileReturn1..=quantileReturnQ`, `tradeTime`.
    pub fn quantile_frame(&self) -> Result<DataFrame> {
        let rows = &self.quantile;
        let mut columns = vec![
            Column::new(
                "factor".into(),
                rows.iter().map(|r| r.factor.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                "returnInterval".into(),
                rows.iter().map(|r| r.return_interval).collect::<Vec<_>>(),
            ),
            Column::new(
                "period".into(),
                rows.iter().map(|r| r.period).collect::<Vec<_>>(),
            ),
        ];
        for bucket in 0..self.quantiles {
            columns.push(Column::new(
                quantile_column_name(bucket + 1).into(),
                rows.iter()
                    .map(|r| r.quantile_returns.get(bucket).copied().unwrap_or(0.0))
                    .collect::<Vec<_>>(),
            ));
        }
        columns.push(trade_time_column(rows.iter().map(|r| r.trade_time))?);
        Ok(DataFrame::new(columns)?)
    }
}

/// Name of the column holding bucket `bucket` (1-based).
pub fn quantile_column_name(bucket: usize) -> String {
    format!("quantileReturn{bucket}")
}

fn trade_time_column(times: impl Iterator<Item = NaiveDateTime>) -> Result<Column> {
    let millis: Vec<i64> = times.map(|t| t.and_utc().timestamp_millis()).collect();
    let series = Series::new("tradeTime".into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    Ok(series.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_indicator_names() {
        let names: Vec<String> = Indicator::ALL.iter().map(|i| i.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "R_square",
                "Adj_square",
                "Std_Error",
                "Obs",
                "Alpha_OLS",
                "R_OLS",
                "Alpha_tstat",
                "R_tstat",
                "IC",
                "RankIC"
            ]
        );
    }

    #[test]
    fn test_regression_frame_schema() {
        let result = EvaluationResult {
            quantiles: 2,
            regression: vec![RegressionStat {
                factor: "alpha".to_string(),
                return_interval: 5,
                period: 3,
                indicator: Indicator::Ic,
                value: 0.12,
                trade_time: day(3),
            }],
            quantile: Vec::new(),
        };

        let df = result.regression_frame().unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(
            df.get_column_names_str(),
            vec!["factor", "returnInterval", "period", "indicator", "value", "tradeTime"]
        );
        assert_eq!(
            df.column("indicator").unwrap().str().unwrap().get(0),
            Some("IC")
        );
        assert!(matches!(
            df.column("tradeTime").unwrap().dtype(),
            DataType::Datetime(TimeUnit::Milliseconds, _)
        ));
    }

    #[test]
    fn test_quantile_frame_has_one_column_per_bucket() {
        let result = EvaluationResult {
            quantiles: 3,
            regression: Vec::new(),
            quantile: vec![QuantileStat {
                factor: "alpha".to_string(),
                return_interval: 1,
                period: 1,
                quantile_returns: vec![0.01, 0.0, -0.02],
                trade_time: day(1),
            }],
        };

        let df = result.quantile_frame().unwrap();
        assert_eq!(df.width(), 3 + 3 + 1);
        let q3 = df.column("quantileReturn3").unwrap().f64().unwrap().get(0);
        assert_eq!(q3, Some(-0.02));
    }

    #[test]
    fn test_empty_frames() {
        let result = EvaluationResult {
            quantiles: 5,
            ..Default::default()
        };
        assert_eq!(result.regression_frame().unwrap().height(), 0);
        let quantile = result.quantile_frame().unwrap();
        assert_eq!(quantile.height(), 0);
        assert_eq!(quantile.width(), 3 + 5 + 1);
    }
}

//! Per-period regression and information coefficient statistics.

use crate::{
    ObservationBatch,
    ols::{self, OlsFit},
    period::{Period, PeriodMap},
    result::{Indicator, RegressionStat},
    screen::screen,
    stats,
};
use tracing::trace;

/// Regression/IC work for one return interval.
///
/// Holds only borrowed views of the batch; one instance is shared by all
/// per-period tasks of the interval.
#[derive(Debug, Clone, Copy)]
pub struct RegressionTask<'a> {
    /// Observation batch
    pub batch: &'a ObservationBatch,
    /// Forward return column of the interval
    pub returns: &'a [f64],
    /// Forward return horizon
    pub interval: u32,
    /// Row indices per analysis period, slot 0 is period 1
    pub rows_by_period: &'a [Vec<usize>],
    /// Analysis period space, for timestamps
    pub periods: &'a PeriodMap,
    /// Number of trailing analysis periods per sample
    pub call_back_period: u32,
}

impl RegressionTask<'_> {
    /// Rows of the sample window ending at `period`: analysis periods in
    /// `(period - call_back_period, period]`.
    pub fn sample_rows(&self, period: Period) -> Vec<usize> {
        let first = period
            .saturating_sub(self.call_back_period.saturating_sub(1))
            .max(1);
        (first..=period)
            .filter_map(|p| self.rows_by_period.get(p as usize - 1))
            .flatten()
            .copied()
            .collect()
    }

    /// All regression rows for one analysis period.
    ///
    /// Factors failing screening or without a valid fit contribute nothing.
    pub fn run(&self, period: Period) -> Vec<RegressionStat> {
        let Some(trade_time) = self.periods.timestamp(period) else {
            return Vec::new();
        };
        let rows = self.sample_rows(period);

        let mut out = Vec::new();
        for factor in &self.batch.factors {
            let values: Vec<f64> = rows.iter().map(|&i| factor.values[i]).collect();
            let screening = screen(&values);
            if !screening.is_usable() {
                trace!(factor = %factor.name, period, interval = self.interval, %screening, "skipping factor");
                continue;
            }

            let (x, y): (Vec<f64>, Vec<f64>) = rows
                .iter()
                .map(|&i| (factor.values[i], self.returns[i]))
                .filter(|(f, r)| f.is_finite() && r.is_finite())
                .unzip();
            let Some(fit) = ols::fit(&x, &y) else {
                trace!(factor = %factor.name, period, interval = self.interval, "no valid regression");
                continue;
            };
            let ic = stats::information_coefficient(&x, &y);
            let rank_ic = stats::spearman(&x, &y);

            out.extend(Indicator::ALL.iter().map(|&indicator| RegressionStat {
                factor: factor.name.clone(),
                return_interval: self.interval,
                period,
                indicator,
                value: indicator_value(indicator, &fit, ic, rank_ic),
                trade_time,
            }));
        }
        out
    }
}

const fn indicator_value(indicator: Indicator, fit: &OlsFit, ic: f64, rank_ic: f64) -> f64 {
    match indicator {
        Indicator::AlphaOls => fit.alpha,
        Indicator::ROls => fit.beta,
        Indicator::AlphaTstat => fit.alpha_tstat,
        Indicator::RTstat => fit.beta_tstat,
        Indicator::RSquare => fit.r_squared,
        Indicator::AdjSquare => fit.adj_r_squared,
        Indicator::StdError => fit.std_error,
        Indicator::Obs => fit.observations as f64,
        Indicator::Ic => ic,
        Indicator::RankIc => rank_ic,
    }
}

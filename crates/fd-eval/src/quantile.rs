//! Quantile bucket backtest.
//!
//! At every rebalancing boundary (quantile periods that are multiples of the
//! return interval) entities are sorted into `Q` buckets by factor value. The
//! assignment holds until the next boundary; for every quantile period the
//! average bar return of each bucket is reported.

use crate::{
    ObservationBatch,
    period::{Period, PeriodMap},
    result::QuantileStat,
};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Breakpoints splitting `sorted` into `quantiles` buckets.
///
/// Uses midpoint interpolation: the `i/Q` quantile is the average of the two
/// order statistics around position `i/Q * (n - 1)`.
pub fn midpoint_breakpoints(sorted: &[f64], quantiles: usize) -> Vec<f64> {
    if sorted.is_empty() {
        return Vec::new();
    }
    let last = (sorted.len() - 1) as f64;
    (1..quantiles)
        .map(|i| {
            let pos = i as f64 / quantiles as f64 * last;
            (sorted[pos.floor() as usize] + sorted[pos.ceil() as usize]) / 2.0
        })
        .collect()
}

/// 1-based bucket of `value`; a value equal to a breakpoint falls in the
/// lower bucket.
pub fn digitize(value: f64, breakpoints: &[f64]) -> usize {
    1 + breakpoints.iter().filter(|&&b| b < value).count()
}

/// Bucket assignment of every entity present at one boundary, per factor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryBuckets<'a> {
    /// Boundary quantile period
    pub boundary: Period,
    /// Entity -> bucket, aligned with the batch factors. `None` when the
    /// factor has no finite value at the boundary.
    pub per_factor: Vec<Option<HashMap<&'a str, usize>>>,
}

/// Quantile backtest work for one return interval.
#[derive(Debug, Clone, Copy)]
pub struct QuantileTask<'a> {
    /// Observation batch
    pub batch: &'a ObservationBatch,
    /// Rebalancing interval, in quantile periods
    pub interval: u32,
    /// Number of buckets
    pub quantiles: usize,
    /// Row indices per quantile period, slot 0 is period 1
    pub rows_by_period: &'a [Vec<usize>],
    /// Quantile period space, for timestamps
    pub periods: &'a PeriodMap,
}

impl<'a> QuantileTask<'a> {
    /// Boundary whose bucket assignment applies to `period`.
    pub const fn boundary(&self, period: Period) -> Period {
        period - period % self.interval
    }

    /// Every boundary of the batch, ascending.
    pub fn boundaries(&self) -> Vec<Period> {
        let last = self.periods.len() as Period;
        (1..=last / self.interval).map(|k| k * self.interval).collect()
    }

    fn period_rows(&self, period: Period) -> &'a [usize] {
        (period as usize)
            .checked_sub(1)
            .and_then(|i| self.rows_by_period.get(i))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Assign entities to buckets at `boundary`.
    ///
    /// Each entity keeps the first of its rows at the boundary. Rows are in
    /// chronological order, stable with respect to the input table, so only
    /// exact duplicate (entity, timestamp) rows depend on input order.
    pub fn buckets_at(&self, boundary: Period) -> BoundaryBuckets<'a> {
        let mut seen = HashSet::new();
        let first_rows: Vec<usize> = self
            .period_rows(boundary)
            .iter()
            .copied()
            .filter(|&i| seen.insert(self.batch.entities[i].as_str()))
            .collect();

        let per_factor = self
            .batch
            .factors
            .iter()
            .map(|factor| {
                let entries: Vec<(&'a str, f64)> = first_rows
                    .iter()
                    .map(|&i| (self.batch.entities[i].as_str(), factor.values[i]))
                    .filter(|(_, v)| v.is_finite())
                    .collect();
                if entries.is_empty() {
                    return None;
                }

                let mut sorted: Vec<f64> = entries.iter().map(|(_, v)| *v).collect();
                sorted.sort_by(f64::total_cmp);
                let breakpoints = midpoint_breakpoints(&sorted, self.quantiles);
                Some(
                    entries
                        .into_iter()
                        .map(|(entity, v)| (entity, digitize(v, &breakpoints)))
                        .collect(),
                )
            })
            .collect();

        BoundaryBuckets {
            boundary,
            per_factor,
        }
    }

    /// Bucket returns of every factor for one quantile period.
    ///
    /// Every factor gets one row. Rows whose entity was not bucketed at the
    /// boundary are ignored; bar returns that are not finite are left out of
    /// the mean; a bucket without any return reports 0.0. Without an
    /// assignment (before the first boundary, or no finite factor value at
    /// the boundary) all buckets report 0.0.
    pub fn run(&self, period: Period, buckets: Option<&BoundaryBuckets<'_>>) -> Vec<QuantileStat> {
        let Some(trade_time) = self.periods.timestamp(period) else {
            return Vec::new();
        };
        let rows = self.period_rows(period);

        let mut out = Vec::with_capacity(self.batch.factors.len());
        for (idx, factor) in self.batch.factors.iter().enumerate() {
            let mut sums = vec![0.0; self.quantiles];
            let mut counts = vec![0usize; self.quantiles];
            match buckets.and_then(|b| b.per_factor.get(idx)).and_then(Option::as_ref) {
                Some(assignment) => {
                    for &i in rows {
                        let ret = self.batch.bar_returns[i];
                        if !ret.is_finite() {
                            continue;
                        }
                        if let Some(&bucket) = assignment.get(self.batch.entities[i].as_str()) {
                            sums[bucket - 1] += ret;
                            counts[bucket - 1] += 1;
                        }
                    }
                }
                None => {
                    trace!(factor = %factor.name, period, boundary = self.boundary(period), "no bucket assignment");
                }
            }

            let quantile_returns = sums
                .iter()
                .zip(&counts)
                .map(|(&s, &c)| if c == 0 { 0.0 } else { s / c as f64 })
                .collect();
            out.push(QuantileStat {
                factor: factor.name.clone(),
                return_interval: self.interval,
                period,
                quantile_returns,
                trade_time,
            });
        }
        out
    }
}

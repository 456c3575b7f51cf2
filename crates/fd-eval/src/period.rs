//! Period indexing.
//!
//! Every distinct timestamp of a batch is assigned an ordinal period starting
//! at 1, in ascending time order. Two period spaces are derived:
//!
//! - the *analysis period*, used to group regression and IC samples. It runs
//!   at the native timestamp granularity, or per calendar date when sub-daily
//!   factors are evaluated daily;
//! - the *quantile period*, used by the quantile backtest, always at native
//!   granularity.

use crate::config::Frequency;
use chrono::{NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;

/// Ordinal period, starting at 1.
pub type Period = u32;

/// Bijection between a set of timestamps and the periods `1..=len`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodMap {
    forward: BTreeMap<NaiveDateTime, Period>,
    inverse: Vec<NaiveDateTime>,
}

impl PeriodMap {
    /// Build the map over the distinct values of `timestamps`.
    pub fn from_timestamps<I>(timestamps: I) -> Self
    where
        I: IntoIterator<Item = NaiveDateTime>,
    {
        let mut forward: BTreeMap<NaiveDateTime, Period> =
            timestamps.into_iter().map(|t| (t, 0)).collect();
        let inverse: Vec<NaiveDateTime> = forward.keys().copied().collect();
        for (period, slot) in (1..).zip(forward.values_mut()) {
            *slot = period;
        }
        Self { forward, inverse }
    }

    /// Period of a timestamp.
    pub fn period(&self, timestamp: &NaiveDateTime) -> Option<Period> {
        self.forward.get(timestamp).copied()
    }

    /// Timestamp of a period.
    pub fn timestamp(&self, period: Period) -> Option<NaiveDateTime> {
        let idx = usize::try_from(period).ok()?.checked_sub(1)?;
        self.inverse.get(idx).copied()
    }

    /// Number of periods.
    pub fn len(&self) -> usize {
        self.inverse.len()
    }

    /// Whether there are no periods.
    pub fn is_empty(&self) -> bool {
        self.inverse.is_empty()
    }

    /// All periods in ascending order.
    pub fn periods(&self) -> impl Iterator<Item = Period> + '_ {
        (1..).take(self.inverse.len())
    }
}

/// Analysis and quantile period spaces of a batch, plus the per-row periods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodIndex {
    /// Analysis period space
    pub analysis: PeriodMap,
    /// Quantile period space
    pub quantile: PeriodMap,
    /// Analysis period of every row
    pub row_analysis: Vec<Period>,
    /// Quantile period of every row
    pub row_quantile: Vec<Period>,
}

impl PeriodIndex {
    /// Index the timestamps of a batch.
    ///
    /// With [`Frequency::Native`] both spaces are identical. With
    /// [`Frequency::Daily`] analysis periods are assigned over the distinct
    /// calendar dates, while quantile periods keep the native timestamps.
    pub fn build(timestamps: &[NaiveDateTime], analysis: Frequency) -> Self {
        let quantile = PeriodMap::from_timestamps(timestamps.iter().copied());
        let row_quantile = assign(&quantile, timestamps.iter().copied());

        match analysis {
            Frequency::Native => Self {
                analysis: quantile.clone(),
                row_analysis: row_quantile.clone(),
                quantile,
                row_quantile,
            },
            Frequency::Daily => {
                let days = timestamps.iter().map(truncate_to_date);
                let analysis = PeriodMap::from_timestamps(days.clone());
                let row_analysis = assign(&analysis, days);
                Self {
                    analysis,
                    quantile,
                    row_analysis,
                    row_quantile,
                }
            }
        }
    }

    /// Row indices grouped by analysis period; slot 0 is period 1.
    pub fn rows_by_analysis_period(&self) -> Vec<Vec<usize>> {
        group_rows(&self.row_analysis, self.analysis.len())
    }

    /// Row indices grouped by quantile period; slot 0 is period 1.
    pub fn rows_by_quantile_period(&self) -> Vec<Vec<usize>> {
        group_rows(&self.row_quantile, self.quantile.len())
    }
}

/// Midnight of the timestamp's calendar date.
pub fn truncate_to_date(timestamp: &NaiveDateTime) -> NaiveDateTime {
    timestamp.date().and_time(NaiveTime::MIN)
}

fn assign<I>(map: &PeriodMap, timestamps: I) -> Vec<Period>
where
    I: IntoIterator<Item = NaiveDateTime>,
{
    // Total over the timestamps the map was built from.
    timestamps
        .into_iter()
        .map(|t| map.period(&t).unwrap_or_default())
        .collect()
}

fn group_rows(row_periods: &[Period], n_periods: usize) -> Vec<Vec<usize>> {
    let mut groups = vec![Vec::new(); n_periods];
    for (row, &period) in row_periods.iter().enumerate() {
        if let Some(slot) = (period as usize).checked_sub(1).and_then(|i| groups.get_mut(i)) {
            slot.push(row);
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_periods_ascending_from_one() {
        let map = PeriodMap::from_timestamps([ts(3, 0, 0), ts(1, 0, 0), ts(2, 0, 0), ts(1, 0, 0)]);

        assert_eq!(map.len(), 3);
        assert_eq!(map.period(&ts(1, 0, 0)), Some(1));
        assert_eq!(map.period(&ts(2, 0, 0)), Some(2));
        assert_eq!(map.period(&ts(3, 0, 0)), Some(3));
        assert_eq!(map.periods().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_maps_are_mutual_inverses() {
        let timestamps = [ts(5, 9, 30), ts(2, 14, 0), ts(2, 9, 31), ts(9, 10, 0), ts(5, 9, 30)];
        let map = PeriodMap::from_timestamps(timestamps);

        for t in &timestamps {
            let p = map.period(t).unwrap();
            assert_eq!(map.timestamp(p), Some(*t));
        }
        for p in map.periods() {
            assert_eq!(map.period(&map.timestamp(p).unwrap()), Some(p));
        }
        assert_eq!(map.timestamp(0), None);
        assert_eq!(map.timestamp(5), None);
    }

    #[test]
    fn test_empty_input() {
        let index = PeriodIndex::build(&[], Frequency::Daily);
        assert!(index.analysis.is_empty());
        assert!(index.quantile.is_empty());
        assert!(index.rows_by_analysis_period().is_empty());
    }

    #[test]
    fn test_native_spaces_coincide() {
        let timestamps = vec![ts(1, 9, 30), ts(1, 9, 31), ts(2, 9, 30)];
        let index = PeriodIndex::build(&timestamps, Frequency::Native);

        assert_eq!(index.analysis, index.quantile);
        assert_eq!(index.row_analysis, vec![1, 2, 3]);
        assert_eq!(index.row_quantile, vec![1, 2, 3]);
    }

    #[test]
    fn test_daily_analysis_for_intraday_rows() {
        let timestamps = vec![
            ts(1, 9, 30),
            ts(1, 9, 31),
            ts(1, 9, 31),
            ts(2, 9, 30),
            ts(2, 14, 0),
        ];
        let index = PeriodIndex::build(&timestamps, Frequency::Daily);

        assert_eq!(index.quantile.len(), 4);
        assert_eq!(index.analysis.len(), 2);
        assert_eq!(index.row_quantile, vec![1, 2, 2, 3, 4]);
        assert_eq!(index.row_analysis, vec![1, 1, 1, 2, 2]);
        assert_eq!(index.analysis.timestamp(2), Some(ts(2, 0, 0)));
        assert_eq!(
            index.rows_by_analysis_period(),
            vec![vec![0, 1, 2], vec![3, 4]]
        );
        assert_eq!(
            index.rows_by_quantile_period(),
            vec![vec![0], vec![1, 2], vec![3], vec![4]]
        );
    }
}

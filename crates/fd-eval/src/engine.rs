//! Evaluation engine: fans the per-period work out over a rayon pool and
//! merges the results.

use crate::{
    EvalError, EvaluationConfig, ObservationBatch, Result,
    io::{ObservationSource, ResultSink, insert_batched},
    period::{Period, PeriodIndex},
    quantile::{BoundaryBuckets, QuantileTask},
    regression::RegressionTask,
    result::{EvaluationResult, QuantileStat, RegressionStat},
};
use polars::prelude::DataFrame;
use rayon::prelude::*;
use tracing::{debug, info, info_span};

/// Runs factor evaluations for one configuration.
#[derive(Debug)]
pub struct Evaluator {
    config: EvaluationConfig,
    pool: Option<rayon::ThreadPool>,
}

impl Evaluator {
    /// Validate the configuration and set up the worker pool.
    pub fn new(config: EvaluationConfig) -> Result<Self> {
        config.validate()?;
        let pool = config
            .threads
            .map(|n| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("fd-eval-{i}"))
                    .build()
            })
            .transpose()?;
        Ok(Self { config, pool })
    }

    /// The configuration of this evaluator.
    pub const fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Evaluate an observation table.
    pub fn evaluate_frame(&self, df: &DataFrame) -> Result<EvaluationResult> {
        let batch = ObservationBatch::from_frame(df, &self.config)?;
        self.evaluate(&batch)
    }

    /// Load observations from `source` and evaluate them.
    pub fn evaluate_source<S>(&self, source: &S) -> Result<EvaluationResult>
    where
        S: ObservationSource + ?Sized,
    {
        let df = source.observations(&self.config)?;
        self.evaluate_frame(&df)
    }

    /// Evaluate a batch.
    ///
    /// Fails if a batch column does not have one value per row.
    ///
    /// Both result tables are sorted by (timestamp, factor, period); the order
    /// does not depend on how the work was scheduled.
    pub fn evaluate(&self, batch: &ObservationBatch) -> Result<EvaluationResult> {
        batch.validate()?;
        for (interval, name) in self
            .config
            .return_intervals
            .iter()
            .zip(&self.config.fut_ret_label_names)
        {
            if batch.forward_return(*interval).is_none() {
                return Err(EvalError::MissingColumn(name.clone()));
            }
        }

        match &self.pool {
            Some(pool) => Ok(pool.install(|| self.run(batch))),
            None => Ok(self.run(batch)),
        }
    }

    /// Hand both result tables to their sinks in insertion batches.
    pub fn write_results(
        &self,
        result: &EvaluationResult,
        regression_sink: &mut dyn ResultSink,
        quantile_sink: &mut dyn ResultSink,
    ) -> Result<()> {
        let batch_size = self.config.insert_batch_size;
        let batches = insert_batched(regression_sink, &result.regression_frame()?, batch_size)?;
        info!(rows = result.regression.len(), batches, "regression results written");
        let batches = insert_batched(quantile_sink, &result.quantile_frame()?, batch_size)?;
        info!(rows = result.quantile.len(), batches, "quantile results written");
        Ok(())
    }

    fn run(&self, batch: &ObservationBatch) -> EvaluationResult {
        let _span = info_span!("evaluate", rows = batch.len(), factors = batch.factors.len()).entered();
        let mut result = EvaluationResult {
            quantiles: self.config.quantile,
            ..Default::default()
        };
        if batch.is_empty() || batch.factors.is_empty() {
            info!("nothing to evaluate");
            return result;
        }

        let index = PeriodIndex::build(&batch.timestamps, self.config.analysis_frequency());
        let rows_by_analysis = index.rows_by_analysis_period();
        let rows_by_quantile = index.rows_by_quantile_period();
        info!(
            analysis_periods = index.analysis.len(),
            quantile_periods = index.quantile.len(),
            frequency = %self.config.analysis_frequency(),
            "periods indexed"
        );

        for fwd in &batch.forward_returns {
            if !self.config.return_intervals.contains(&fwd.interval) {
                continue;
            }
            info!(interval = fwd.interval, "processing return interval");

            let quantile_task = QuantileTask {
                batch,
                interval: fwd.interval,
                quantiles: self.config.quantile,
                rows_by_period: &rows_by_quantile,
                periods: &index.quantile,
            };
            let quantile_rows = quantile_stats(&quantile_task);

            let regression_task = RegressionTask {
                batch,
                returns: &fwd.values,
                interval: fwd.interval,
                rows_by_period: &rows_by_analysis,
                periods: &index.analysis,
                call_back_period: self.config.call_back_period,
            };
            let regression_rows = regression_stats(&regression_task);

            debug!(
                interval = fwd.interval,
                regression_rows = regression_rows.len(),
                quantile_rows = quantile_rows.len(),
                "return interval done"
            );
            result.regression.extend(regression_rows);
            result.quantile.extend(quantile_rows);
        }

        // Stable sorts: rows tied on the key keep interval, then indicator order.
        result.regression.sort_by(|a, b| {
            (a.trade_time, &a.factor, a.period).cmp(&(b.trade_time, &b.factor, b.period))
        });
        result.quantile.sort_by(|a, b| {
            (a.trade_time, &a.factor, a.period).cmp(&(b.trade_time, &b.factor, b.period))
        });
        info!(
            regression_rows = result.regression.len(),
            quantile_rows = result.quantile.len(),
            "evaluation finished"
        );
        result
    }
}

/// One task per analysis period.
fn regression_stats(task: &RegressionTask<'_>) -> Vec<RegressionStat> {
    task.periods
        .periods()
        .collect::<Vec<_>>()
        .into_par_iter()
        .flat_map_iter(|period| task.run(period))
        .collect()
}

/// Breakpoints once per boundary, then one task per quantile period.
///
/// Periods before the first boundary still get (zero-filled) rows.
fn quantile_stats(task: &QuantileTask<'_>) -> Vec<QuantileStat> {
    let buckets: Vec<BoundaryBuckets<'_>> = task
        .boundaries()
        .into_par_iter()
        .map(|boundary| task.buckets_at(boundary))
        .collect();
    let buckets_for = |period: Period| {
        let boundary = task.boundary(period);
        (boundary / task.interval)
            .checked_sub(1)
            .and_then(|k| buckets.get(k as usize))
    };

    task.periods
        .periods()
        .collect::<Vec<_>>()
        .into_par_iter()
        .flat_map_iter(|period| task.run(period, buckets_for(period)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemorySink;
    use polars::prelude::*;

    fn config() -> EvaluationConfig {
        let mut config = EvaluationConfig::new(
            vec!["alpha".to_string()],
            vec![1],
            vec!["ret1".to_string()],
            "bar_ret",
        );
        config.quantile = 2;
        config
    }

    fn frame() -> DataFrame {
        df![
            "symbol" => ["A", "B", "C", "A", "B", "C"],
            "tradeDate" => ["2024-01-01", "2024-01-01", "2024-01-01", "2024-01-02", "2024-01-02", "2024-01-02"],
            "alpha" => [1.0, 2.0, 4.0, 3.0, 1.0, 2.0],
            "ret1" => [0.01, 0.03, 0.02, 0.02, 0.00, 0.015],
            "bar_ret" => [0.00, 0.01, 0.02, 0.01, -0.01, 0.03],
        ]
        .unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = config();
        config.quantile = 1;
        assert!(matches!(
            Evaluator::new(config),
            Err(EvalError::InvalidConfig { field: "quantile", .. })
        ));
    }

    #[test]
    fn test_evaluate_frame() {
        let evaluator = Evaluator::new(config()).unwrap();
        let result = evaluator.evaluate_frame(&frame()).unwrap();

        // 2 analysis periods x 10 indicators
        assert_eq!(result.regression.len(), 20);
        // interval 1: every period is a boundary
        assert_eq!(result.quantile.len(), 2);
        assert!(result.quantile.iter().all(|q| q.quantile_returns.len() == 2));
    }

    #[test]
    fn test_dedicated_pool_matches_global_pool() {
        let global = Evaluator::new(config()).unwrap();
        let mut config = config();
        config.threads = Some(2);
        let pooled = Evaluator::new(config).unwrap();

        let a = global.evaluate_frame(&frame()).unwrap();
        let b = pooled.evaluate_frame(&frame()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_forward_return() {
        let evaluator = Evaluator::new(config()).unwrap();
        let batch = ObservationBatch::default();
        assert!(matches!(
            evaluator.evaluate(&batch),
            Err(EvalError::MissingColumn(ref c)) if c == "ret1"
        ));
    }

    #[test]
    fn test_short_factor_column_is_rejected() {
        let evaluator = Evaluator::new(config()).unwrap();
        let mut batch = ObservationBatch::from_frame(&frame(), evaluator.config()).unwrap();
        batch.factors[0].values.truncate(4);

        assert!(matches!(
            evaluator.evaluate(&batch),
            Err(EvalError::ColumnLength { ref column, expected: 6, actual: 4 }) if column == "alpha"
        ));
    }

    #[test]
    fn test_write_results_batches() {
        let mut config = config();
        config.insert_batch_size = 8;
        let evaluator = Evaluator::new(config).unwrap();
        let result = evaluator.evaluate_frame(&frame()).unwrap();

        let mut regression = MemorySink::new();
        let mut quantile = MemorySink::new();
        evaluator
            .write_results(&result, &mut regression, &mut quantile)
            .unwrap();

        assert_eq!(regression.batches(), 3);
        assert_eq!(regression.frame().unwrap().height(), 20);
        assert_eq!(quantile.batches(), 1);
        assert_eq!(quantile.frame().unwrap().height(), 2);
    }
}

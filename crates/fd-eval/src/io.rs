//! Boundaries to the data-retrieval and persistence collaborators.

use crate::{EvaluationConfig, Result};
use polars::prelude::*;
use tracing::debug;

/// Supplies the observation table of an evaluation run.
pub trait ObservationSource {
    /// Load the observation table for the configured factors and returns.
    fn observations(&self, config: &EvaluationConfig) -> Result<DataFrame>;
}

/// Observation source backed by an in-memory table.
#[derive(Debug, Clone)]
pub struct FrameSource {
    frame: DataFrame,
}

impl FrameSource {
    /// Wrap an observation table.
    pub const fn new(frame: DataFrame) -> Self {
        Self { frame }
    }
}

impl ObservationSource for FrameSource {
    fn observations(&self, _config: &EvaluationConfig) -> Result<DataFrame> {
        Ok(self.frame.clone())
    }
}

/// Receives result tables, one batch at a time.
pub trait ResultSink {
    /// Append a batch of result rows.
    fn append(&mut self, batch: &DataFrame) -> Result<()>;
}

/// Hand `frame` to `sink` in slices of at most `batch_size` rows.
///
/// Returns the number of batches written. An empty frame writes nothing.
pub fn insert_batched<S>(sink: &mut S, frame: &DataFrame, batch_size: usize) -> Result<usize>
where
    S: ResultSink + ?Sized,
{
    let batch_size = batch_size.max(1);
    let mut written = 0;
    let mut offset = 0;
    while offset < frame.height() {
        let len = batch_size.min(frame.height() - offset);
        sink.append(&frame.slice(offset as i64, len))?;
        debug!(offset, rows = len, "inserted result batch");
        offset += len;
        written += 1;
    }
    Ok(written)
}

/// Sink that concatenates everything it receives.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    frame: Option<DataFrame>,
    batches: usize,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows received so far, if any.
    pub const fn frame(&self) -> Option<&DataFrame> {
        self.frame.as_ref()
    }

    /// Number of batches received.
    pub const fn batches(&self) -> usize {
        self.batches
    }
}

impl ResultSink for MemorySink {
    fn append(&mut self, batch: &DataFrame) -> Result<()> {
        match &mut self.frame {
            Some(frame) => {
                frame.vstack_mut(batch)?;
            }
            None => self.frame = Some(batch.clone()),
        }
        self.batches += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_batched_slices() {
        let df = df![
            "factor" => ["a", "b", "c", "d", "e"],
            "value" => [1.0, 2.0, 3.0, 4.0, 5.0],
        ]
        .unwrap();
        let mut sink = MemorySink::new();

        let written = insert_batched(&mut sink, &df, 2).unwrap();

        assert_eq!(written, 3);
        assert_eq!(sink.batches(), 3);
        let stored = sink.frame().unwrap();
        assert_eq!(stored.height(), 5);
        assert!(stored.equals(&df));
    }

    #[test]
    fn test_insert_batched_empty_frame() {
        let df = df!["value" => Vec::<f64>::new()].unwrap();
        let mut sink = MemorySink::new();

        assert_eq!(insert_batched(&mut sink, &df, 10).unwrap(), 0);
        assert!(sink.frame().is_none());
    }

    #[test]
    fn test_frame_source_returns_table() {
        let df = df!["symbol" => ["A"]].unwrap();
        let config = EvaluationConfig::new(Vec::new(), vec![1], vec!["ret1".into()], "bar");
        let source = FrameSource::new(df.clone());
        assert!(source.observations(&config).unwrap().equals(&df));
    }
}

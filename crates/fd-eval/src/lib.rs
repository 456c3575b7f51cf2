#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/fd-eval/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod observation;
pub mod ols;
pub mod period;
pub mod quantile;
pub mod regression;
pub mod result;
pub mod screen;
pub mod stats;

// Re-export core types
pub use config::{EvaluationConfig, Frequency};
pub use engine::Evaluator;
pub use error::{EvalError, Result};
pub use io::{FrameSource, MemorySink, ObservationSource, ResultSink, insert_batched};
pub use observation::ObservationBatch;
pub use period::{Period, PeriodIndex, PeriodMap};
pub use result::{EvaluationResult, Indicator, QuantileStat, RegressionStat};
pub use screen::{Screening, screen};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

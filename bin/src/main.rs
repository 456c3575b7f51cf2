//! CLI for the fd-eval factor evaluation engine.
//!
//! Reads an observation table from CSV, evaluates it against a JSON
//! configuration and writes the regression and quantile tables as CSV.

mod report;

use clap::{Parser, Subcommand};
use fd_eval::{EvaluationConfig, Evaluator, FrameSource, Indicator, Result, ResultSink};
use polars::prelude::*;
use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "fd-eval")]
#[command(about = "Factor evaluation: per-period regression, IC and quantile backtests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate factors in a CSV observation table
    Evaluate {
        /// Observation table (CSV with header)
        #[arg(long)]
        data: PathBuf,
        /// Evaluation configuration (JSON)
        #[arg(long)]
        config: PathBuf,
        /// Output directory for regression.csv and quantile.csv
        #[arg(long, default_value = "fd-eval-out")]
        out: PathBuf,
    },
    /// Validate a configuration file
    CheckConfig {
        /// Evaluation configuration (JSON)
        config: PathBuf,
    },
    /// List the regression indicators
    Indicators,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Evaluate { data, config, out } => evaluate(&data, &config, &out),
        Commands::CheckConfig { config } => check_config(&config),
        Commands::Indicators => {
            list_indicators();
            Ok(())
        }
    };

    if let Err(err) = outcome {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

/// Run a full evaluation and print the IC summary.
fn evaluate(data: &Path, config: &Path, out: &Path) -> Result<()> {
    let config = EvaluationConfig::from_json_file(config)?;
    let source = FrameSource::new(read_observations(data, &config)?);
    let evaluator = Evaluator::new(config)?;
    let result = evaluator.evaluate_source(&source)?;

    fs::create_dir_all(out)?;
    let mut regression_sink = CsvSink::new(out.join("regression.csv"));
    let mut quantile_sink = CsvSink::new(out.join("quantile.csv"));
    evaluator.write_results(&result, &mut regression_sink, &mut quantile_sink)?;
    info!(out = %out.display(), "results written");

    let summary = report::ic_summary(&result.regression_frame()?)?;
    println!("{summary}");
    Ok(())
}

fn check_config(path: &Path) -> Result<()> {
    let config = EvaluationConfig::from_json_file(path)?;
    println!("Configuration OK");
    println!("  Factors: {}", config.factors.join(", "));
    println!("  Return intervals: {:?}", config.return_intervals);
    println!("  Lookback: {} periods", config.call_back_period);
    println!("  Quantiles: {}", config.quantile);
    println!("  Analysis frequency: {}", config.analysis_frequency());
    Ok(())
}

fn list_indicators() {
    println!("Regression indicators ({} total)\n", Indicator::ALL.len());
    for indicator in Indicator::ALL {
        println!("  {indicator}");
    }
}

/// Load the observation table; entity and timestamp columns stay textual.
fn read_observations(path: &Path, config: &EvaluationConfig) -> Result<DataFrame> {
    let mut text_columns = Schema::with_capacity(2);
    text_columns.with_column(config.symbol_col.as_str().into(), DataType::String);
    text_columns.with_column(config.date_col.as_str().into(), DataType::String);
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_schema_overwrite(Some(Arc::new(text_columns)))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    info!(rows = df.height(), path = %path.display(), "observations loaded");
    Ok(df)
}

/// Sink writing every batch to one CSV file, header on the first batch only.
struct CsvSink {
    path: PathBuf,
    started: bool,
}

impl CsvSink {
    const fn new(path: PathBuf) -> Self {
        Self {
            path,
            started: false,
        }
    }
}

impl ResultSink for CsvSink {
    fn append(&mut self, batch: &DataFrame) -> Result<()> {
        let file = if self.started {
            OpenOptions::new().append(true).open(&self.path)?
        } else {
            File::create(&self.path)?
        };
        CsvWriter::new(file)
            .include_header(!self.started)
            .finish(&mut batch.clone())?;
        self.started = true;
        Ok(())
    }
}

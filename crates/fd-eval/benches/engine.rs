//! Benchmarks for the evaluation engine.

use chrono::{Duration, NaiveDate};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use fd_eval::{EvaluationConfig, Evaluator, ObservationBatch};
use polars::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng};

const FACTORS: [&str; 3] = ["momentum", "value", "noise"];

/// Synthetic daily panel with forward returns for intervals 1 and 5.
fn panel(entities: usize, days: usize) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(42);
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let rows = entities * days;

    let mut symbol = Vec::with_capacity(rows);
    let mut date = Vec::with_capacity(rows);
    let mut factors: Vec<Vec<f64>> = vec![Vec::with_capacity(rows); FACTORS.len()];
    let mut bar = Vec::with_capacity(rows);
    let mut ret1 = Vec::with_capacity(rows);
    let mut ret5 = Vec::with_capacity(rows);

    for d in 0..days {
        let day = (start + Duration::days(d as i64)).format("%Y-%m-%d").to_string();
        for e in 0..entities {
            symbol.push(format!("S{e:04}"));
            date.push(day.clone());
            let signal: f64 = rng.gen_range(-1.0..1.0);
            factors[0].push(signal);
            factors[1].push(rng.gen_range(0.0..2.0));
            factors[2].push(rng.gen_range(-1.0..1.0));
            let r = 0.002 * signal + rng.gen_range(-0.02..0.02);
            bar.push(r);
            ret1.push(r);
            ret5.push(5.0 * r + rng.gen_range(-0.03..0.03));
        }
    }

    let mut columns = vec![
        Column::new("symbol".into(), symbol),
        Column::new("tradeDate".into(), date),
    ];
    for (name, values) in FACTORS.iter().zip(factors) {
        columns.push(Column::new((*name).into(), values));
    }
    columns.push(Column::new("bar_ret".into(), bar));
    columns.push(Column::new("ret1".into(), ret1));
    columns.push(Column::new("ret5".into(), ret5));
    DataFrame::new(columns).unwrap()
}

fn config() -> EvaluationConfig {
    let mut config = EvaluationConfig::new(
        FACTORS.iter().map(|f| f.to_string()).collect(),
        vec![1, 5],
        vec!["ret1".to_string(), "ret5".to_string()],
        "bar_ret",
    );
    config.call_back_period = 5;
    config
}

fn bench_evaluate(c: &mut Criterion) {
    let evaluator = Evaluator::new(config()).unwrap();
    let mut group = c.benchmark_group("evaluate");
    group.sample_size(10);

    for &(entities, days) in &[(100, 60), (500, 250)] {
        let df = panel(entities, days);
        let batch = ObservationBatch::from_frame(&df, evaluator.config()).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{entities}x{days}")),
            &batch,
            |b, batch| b.iter(|| evaluator.evaluate(black_box(batch)).unwrap()),
        );
    }
    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let config = config();
    let df = panel(500, 250);
    c.bench_function("from_frame_500x250", |b| {
        b.iter(|| ObservationBatch::from_frame(black_box(&df), &config).unwrap())
    });
}

criterion_group!(benches, bench_evaluate, bench_load);
criterion_main!(benches);

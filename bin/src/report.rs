//! Summaries of evaluation output.

use fd_eval::{Indicator, Result};
use polars::prelude::*;

/// Mean, standard deviation and ratio (ICIR) of the IC and RankIC series,
/// one row per (factor, returnInterval, indicator).
pub(crate) fn ic_summary(regression: &DataFrame) -> Result<DataFrame> {
    let ic = Indicator::Ic.to_string();
    let rank_ic = Indicator::RankIc.to_string();

    let summary = regression
        .clone()
        .lazy()
        .filter(
            col("indicator")
                .eq(lit(ic.as_str()))
                .or(col("indicator").eq(lit(rank_ic.as_str()))),
        )
        .group_by([col("factor"), col("returnInterval"), col("indicator")])
        .agg([
            col("value").count().alias("periods"),
            col("value").mean().alias("mean"),
            col("value").std(1).alias("std"),
        ])
        .with_column((col("mean") / col("std")).alias("icir"))
        .sort(["factor", "returnInterval", "indicator"], Default::default())
        .collect()?;

    Ok(summary)
}

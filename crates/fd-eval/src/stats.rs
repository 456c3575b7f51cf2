//! Cross-sectional statistics: z-scores, Pearson and Spearman correlation.
//!
//! All functions expect finite inputs; callers drop NaN/infinite pairs first.

use std::cmp::Ordering;

/// Arithmetic mean. NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (ddof = 1). NaN below two values.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Z-score standardization: `(x - mean) / std`.
///
/// Same transform as the cross-sectional standardization of factor
/// exposures, applied to one sample.
pub fn zscore(values: &[f64]) -> Vec<f64> {
    let m = mean(values);
    let s = std_dev(values);
    values.iter().map(|v| (v - m) / s).collect()
}

/// Pearson correlation. NaN when either side has no variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mx = mean(x);
    let my = mean(y);

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let denominator = (sxx * syy).sqrt();
    if denominator == 0.0 {
        f64::NAN
    } else {
        sxy / denominator
    }
}

/// 1-based ranks; ties share the average of the ranks they span.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(Ordering::Equal)
    });

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

/// Spearman rank correlation: Pearson correlation of average ranks.
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    pearson(&average_ranks(x), &average_ranks(y))
}

/// Information coefficient: Pearson correlation of the z-scored sides.
pub fn information_coefficient(factor: &[f64], returns: &[f64]) -> f64 {
    pearson(&zscore(factor), &zscore(returns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zscore() {
        // Mean of [1,2,3] = 2, std = 1. So z-scores should be [-1, 0, 1]
        let z = zscore(&[1.0, 2.0, 3.0]);
        assert_relative_eq!(z[0], -1.0, epsilon = 1e-12);
        assert_relative_eq!(z[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(z[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_perfect() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [0.01, 0.02, 0.03, 0.04];
        assert_relative_eq!(pearson(&x, &y), 1.0, epsilon = 1e-12);

        let y_neg: Vec<f64> = y.iter().map(|v| -v).collect();
        assert_relative_eq!(pearson(&x, &y_neg), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_degenerate() {
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
        assert!(pearson(&[1.0], &[1.0]).is_nan());
    }

    #[test]
    fn test_ic_matches_pearson() {
        let factor = [0.3, -1.2, 2.5, 0.7, 1.1];
        let returns = [0.01, -0.02, 0.015, 0.0, 0.03];
        assert_relative_eq!(
            information_coefficient(&factor, &returns),
            pearson(&factor, &returns),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_average_ranks_with_ties() {
        let ranks = average_ranks(&[10.0, 20.0, 10.0, 30.0]);
        assert_eq!(ranks, vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn test_spearman_monotone() {
        // Monotone but non-linear: rank correlation is exactly 1
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 4.0, 9.0, 16.0, 100.0];
        assert_relative_eq!(spearman(&x, &y), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_spearman_known_value() {
        // d = [0, -1, 1, 0] -> 1 - 6*2 / (4*15) = 0.8
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 3.0, 2.0, 4.0];
        assert_relative_eq!(spearman(&x, &y), 0.8, epsilon = 1e-12);
    }
}

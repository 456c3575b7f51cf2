//! Ordinary least squares with an intercept.

use ndarray::{Array1, ArrayView1};

/// Statistics of a single-regressor OLS fit `y = alpha + beta * x + e`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OlsFit {
    /// Intercept
    pub alpha: f64,
    /// Slope
    pub beta: f64,
    /// t-statistic of the intercept
    pub alpha_tstat: f64,
    /// t-statistic of the slope
    pub beta_tstat: f64,
    /// Coefficient of determination
    pub r_squared: f64,
    /// R² adjusted for the single regressor
    pub adj_r_squared: f64,
    /// Residual standard error, `sqrt(SSE / (n - 2))`
    pub std_error: f64,
    /// Number of observations
    pub observations: usize,
}

/// Fit `y` on `x` with an intercept.
///
/// The regressor is centered before solving, so a factor with a large level
/// and a small spread keeps its precision. Returns `None` when the fit has no
/// valid statistics: fewer than three observations (no residual degrees of
/// freedom), mismatched lengths, or a regressor whose spread is zero or below
/// the rounding noise of its values.
pub fn fit(x: &[f64], y: &[f64]) -> Option<OlsFit> {
    let n = x.len();
    if n != y.len() || n < 3 {
        return None;
    }

    // Shifting by the first value keeps a constant regressor exactly zero.
    let origin = x[0];
    let shifted = Array1::from_iter(x.iter().map(|v| v - origin));
    let shifted_mean = shifted.mean()?;
    let dx = shifted.mapv(|v| v - shifted_mean);
    let x_mean = origin + shifted_mean;

    let target = ArrayView1::from(y);
    let y_mean = target.mean()?;
    let dy = target.mapv(|v| v - y_mean);

    let sxx = dx.dot(&dx);
    let sum_sq: f64 = x.iter().map(|v| v * v).sum();
    if !sxx.is_finite() || sxx == 0.0 || sxx <= f64::EPSILON * f64::EPSILON * sum_sq {
        return None;
    }

    let beta = dx.dot(&dy) / sxx;
    let alpha = y_mean - beta * x_mean;
    let residuals = &dy - &(&dx * beta);

    let nf = n as f64;
    let dof = (n - 2) as f64;
    let sse = residuals.dot(&residuals);
    let sst = dy.dot(&dy);

    let sigma2 = sse / dof;
    let se_beta = (sigma2 / sxx).sqrt();
    let se_alpha = (sigma2 * (1.0 / nf + x_mean * x_mean / sxx)).sqrt();
    let r_squared = 1.0 - sse / sst;

    Some(OlsFit {
        alpha,
        beta,
        alpha_tstat: alpha / se_alpha,
        beta_tstat: beta / se_beta,
        r_squared,
        adj_r_squared: 1.0 - (1.0 - r_squared) * (nf - 1.0) / dof,
        std_error: sigma2.sqrt(),
        observations: n,
    })
}

//! Numeric-outcome metrics

use crate::error::{Result, TabflowError};
use tracing::warn;

fn check(truth: &[f64], estimate: &[f64]) -> Result<bool> {
    if truth.len() != estimate.len() {
        return Err(TabflowError::ShapeError {
            expected: format!("{} estimates", truth.len()),
            actual: format!("{} estimates", estimate.len()),
        });
    }
    Ok(!truth.is_empty())
}

/// Root mean squared error
pub fn rmse(truth: &[f64], estimate: &[f64]) -> Result<f64> {
    if !check(truth, estimate)? {
        warn!(metric = "rmse", "Metric is undefined for no rows");
        return Ok(f64::NAN);
    }
    let mse = truth
        .iter()
        .zip(estimate)
        .map(|(t, e)| (t - e).powi(2))
        .sum::<f64>()
        / truth.len() as f64;
    Ok(mse.sqrt())
}

/// Mean absolute error
pub fn mae(truth: &[f64], estimate: &[f64]) -> Result<f64> {
    if !check(truth, estimate)? {
        warn!(metric = "mae", "Metric is undefined for no rows");
        return Ok(f64::NAN);
    }
    Ok(truth.iter().zip(estimate).map(|(t, e)| (t - e).abs()).sum::<f64>() / truth.len() as f64)
}

/// Squared Pearson correlation between truth and estimate
pub fn rsq(truth: &[f64], estimate: &[f64]) -> Result<f64> {
    if !check(truth, estimate)? {
        warn!(metric = "rsq", "Metric is undefined for no rows");
        return Ok(f64::NAN);
    }
    let n = truth.len() as f64;
    let mt = truth.iter().sum::<f64>() / n;
    let me = estimate.iter().sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (t, e) in truth.iter().zip(estimate) {
        sxy += (t - mt) * (e - me);
        sxx += (t - mt).powi(2);
        syy += (e - me).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        warn!(metric = "rsq", "A constant truth or estimate leaves rsq undefined");
        return Ok(f64::NAN);
    }
    Ok(sxy * sxy / (sxx * syy))
}

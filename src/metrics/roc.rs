//! ROC curves and probability metrics

use crate::data::{self, DataSaver};
use crate::error::{Result, TabflowError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// One operating point: rows scoring at or above `threshold` are called events
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub specificity: f64,
    pub sensitivity: f64,
}

fn check_lengths(truth: &[String], probs: &[f64]) -> Result<()> {
    if truth.len() != probs.len() {
        return Err(TabflowError::ShapeError {
            expected: format!("{} probabilities", truth.len()),
            actual: format!("{} probabilities", probs.len()),
        });
    }
    if probs.iter().any(|p| p.is_nan()) {
        return Err(TabflowError::MetricError("probabilities contain NaN".to_string()));
    }
    Ok(())
}

/// ROC curve for `event` scored by `event_probs`, ordered by increasing threshold.
///
/// The curve starts at `(-inf, 0, 1)` and ends at `(+inf, 1, 0)`. Rows with
/// equal scores share a single point. With no events (or no non-events) in
/// `truth` the corresponding rate is NaN.
pub fn roc_curve(truth: &[String], event_probs: &[f64], event: &str) -> Result<Vec<RocPoint>> {
    check_lengths(truth, event_probs)?;

    let mut scored: Vec<(f64, bool)> = event_probs
        .iter()
        .zip(truth.iter())
        .map(|(&p, t)| (p, t == event))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));

    let positives = scored.iter().filter(|(_, e)| *e).count() as f64;
    let negatives = scored.len() as f64 - positives;
    let rate = |num: f64, den: f64| if den == 0.0 { f64::NAN } else { num / den };

    let mut points = Vec::with_capacity(scored.len() + 2);
    points.push(RocPoint {
        threshold: f64::NEG_INFINITY,
        specificity: 0.0,
        sensitivity: 1.0,
    });

    // Counts of rows strictly below the current threshold
    let mut events_below = 0.0;
    let mut non_events_below = 0.0;
    let mut i = 0;
    while i < scored.len() {
        let threshold = scored[i].0;
        points.push(RocPoint {
            threshold,
            specificity: rate(non_events_below, negatives),
            sensitivity: rate(positives - events_below, positives),
        });
        while i < scored.len() && scored[i].0 == threshold {
            if scored[i].1 {
                events_below += 1.0;
            } else {
                non_events_below += 1.0;
            }
            i += 1;
        }
    }

    points.push(RocPoint {
        threshold: f64::INFINITY,
        specificity: 1.0,
        sensitivity: 0.0,
    });
    Ok(points)
}

/// Trapezoidal area under a ROC curve
pub fn auc(points: &[RocPoint]) -> f64 {
    if points
        .iter()
        .any(|p| p.sensitivity.is_nan() || p.specificity.is_nan())
    {
        warn!("ROC AUC is undefined when only one outcome class is present");
        return f64::NAN;
    }
    points
        .windows(2)
        .map(|w| {
            let dx = (w[0].specificity - w[1].specificity).abs();
            dx * (w[0].sensitivity + w[1].sensitivity) / 2.0
        })
        .sum()
}

/// Binary ROC AUC with `event` as the positive class
pub fn roc_auc_binary(truth: &[String], event_probs: &[f64], event: &str) -> Result<f64> {
    Ok(auc(&roc_curve(truth, event_probs, event)?))
}

/// Hand-Till multiclass AUC: the mean over level pairs of the averaged
/// pairwise AUCs. `probs[j]` holds the probabilities of `levels[j]`.
pub fn roc_auc_hand_till(truth: &[String], probs: &[Vec<f64>], levels: &[String]) -> Result<f64> {
    if probs.len() != levels.len() {
        return Err(TabflowError::ShapeError {
            expected: format!("{} probability columns", levels.len()),
            actual: format!("{} probability columns", probs.len()),
        });
    }
    for column in probs {
        check_lengths(truth, column)?;
    }

    let present: Vec<usize> = (0..levels.len())
        .filter(|&j| truth.iter().any(|t| *t == levels[j]))
        .collect();
    if present.len() < levels.len() {
        warn!(
            missing = levels.len() - present.len(),
            "Levels absent from truth are left out of the Hand-Till AUC"
        );
    }
    if present.len() < 2 {
        warn!("ROC AUC is undefined when only one outcome class is present");
        return Ok(f64::NAN);
    }

    let pairwise = |a: usize, b: usize| -> Result<f64> {
        let rows: Vec<usize> = (0..truth.len())
            .filter(|&r| truth[r] == levels[a] || truth[r] == levels[b])
            .collect();
        let sub_truth: Vec<String> = rows.iter().map(|&r| truth[r].clone()).collect();
        let sub_probs: Vec<f64> = rows.iter().map(|&r| probs[a][r]).collect();
        roc_auc_binary(&sub_truth, &sub_probs, &levels[a])
    };

    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, &a) in present.iter().enumerate() {
        for &b in &present[i + 1..] {
            total += (pairwise(a, b)? + pairwise(b, a)?) / 2.0;
            pairs += 1;
        }
    }
    Ok(total / pairs as f64)
}

/// Mean negative log-likelihood of the true level.
/// `probs[j]` holds the probabilities of `levels[j]`.
pub fn mn_log_loss(truth: &[String], probs: &[Vec<f64>], levels: &[String]) -> Result<f64> {
    let eps = 1e-15;
    if truth.is_empty() {
        warn!("mn_log_loss is undefined for no rows");
        return Ok(f64::NAN);
    }
    let mut total = 0.0;
    for (r, t) in truth.iter().enumerate() {
        let j = levels.iter().position(|l| l == t).ok_or_else(|| {
            TabflowError::MetricError(format!("'{}' is not an outcome level", t))
        })?;
        let p = probs
            .get(j)
            .and_then(|column| column.get(r))
            .copied()
            .ok_or_else(|| TabflowError::MetricError("probability column is too short".to_string()))?;
        total -= p.clamp(eps, 1.0 - eps).ln();
    }
    Ok(total / truth.len() as f64)
}

/// ROC curves for a prediction frame; one curve for binary outcomes,
/// one-vs-all curves per level otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub curves: Vec<(String, Vec<RocPoint>)>,
}

impl RocCurve {
    /// Build curves from the truth column and `.pred_<level>` columns of `df`
    pub fn from_frame(df: &DataFrame, truth: &str, levels: &[String]) -> Result<Self> {
        if levels.len() < 2 {
            return Err(TabflowError::MetricError(
                "ROC curves need at least two outcome levels".to_string(),
            ));
        }
        let truth_values = super::truth_labels(df, truth, levels)?;
        let events: &[String] = if levels.len() == 2 { &levels[..1] } else { levels };

        let curves = events
            .iter()
            .map(|level| {
                let probs = super::prob_values(df, level)?;
                Ok((level.clone(), roc_curve(&truth_values, &probs, level)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { curves })
    }

    /// Long-format frame; `.level` is present only for one-vs-all curves
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut level = Vec::new();
        let mut threshold = Vec::new();
        let mut specificity = Vec::new();
        let mut sensitivity = Vec::new();
        for (name, points) in &self.curves {
            for p in points {
                level.push(Some(name.clone()));
                threshold.push(Some(p.threshold));
                specificity.push(Some(p.specificity));
                sensitivity.push(Some(p.sensitivity));
            }
        }
        let mut columns: Vec<Column> = Vec::new();
        if self.curves.len() > 1 {
            columns.push(data::string_series(".level", level).into());
        }
        columns.push(data::float_series(".threshold", threshold).into());
        columns.push(data::float_series("specificity", specificity).into());
        columns.push(data::float_series("sensitivity", sensitivity).into());
        Ok(DataFrame::new(columns)?)
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        DataSaver::write_csv(&self.to_frame()?, path)
    }

    /// Area under each curve, in curve order
    pub fn areas(&self) -> Vec<(String, f64)> {
        self.curves
            .iter()
            .map(|(level, points)| (level.clone(), auc(points)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_curve_endpoints_and_order() {
        let truth = labels(&["yes", "no", "yes", "no"]);
        let probs = [0.9, 0.1, 0.6, 0.6];
        let curve = roc_curve(&truth, &probs, "yes").unwrap();

        let first = curve.first().unwrap();
        assert_eq!(first.threshold, f64::NEG_INFINITY);
        assert_eq!((first.specificity, first.sensitivity), (0.0, 1.0));
        let last = curve.last().unwrap();
        assert_eq!(last.threshold, f64::INFINITY);
        assert_eq!((last.specificity, last.sensitivity), (1.0, 0.0));

        // Tied scores at 0.6 collapse: thresholds -inf, 0.1, 0.6, 0.9, +inf
        assert_eq!(curve.len(), 5);
        assert!(curve.windows(2).all(|w| w[0].threshold < w[1].threshold));
        let at_06 = curve[2];
        assert_eq!(at_06.sensitivity, 1.0);
        assert_eq!(at_06.specificity, 0.5);
    }

    #[test]
    fn test_perfect_and_reversed_auc() {
        let truth = labels(&["a", "a", "b", "b"]);
        let perfect = roc_auc_binary(&truth, &[0.9, 0.8, 0.2, 0.1], "a").unwrap();
        assert!((perfect - 1.0).abs() < 1e-12);
        let reversed = roc_auc_binary(&truth, &[0.1, 0.2, 0.8, 0.9], "a").unwrap();
        assert!(reversed.abs() < 1e-12);
    }

    #[test]
    fn test_auc_with_ties_is_half() {
        let truth = labels(&["a", "b"]);
        let value = roc_auc_binary(&truth, &[0.5, 0.5], "a").unwrap();
        assert!((value - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_auc_single_class_is_nan() {
        let truth = labels(&["a", "a"]);
        assert!(roc_auc_binary(&truth, &[0.2, 0.7], "a").unwrap().is_nan());
    }

    #[test]
    fn test_hand_till_perfect() {
        let truth = labels(&["a", "b", "c"]);
        let levels = labels(&["a", "b", "c"]);
        let probs = vec![
            vec![0.8, 0.1, 0.1],
            vec![0.1, 0.8, 0.1],
            vec![0.1, 0.1, 0.8],
        ];
        let value = roc_auc_hand_till(&truth, &probs, &levels).unwrap();
        assert!((value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_log_loss() {
        let truth = labels(&["a", "b"]);
        let levels = labels(&["a", "b"]);
        let probs = vec![vec![0.8, 0.4], vec![0.2, 0.6]];
        let expected = -(0.8f64.ln() + 0.6f64.ln()) / 2.0;
        assert!((mn_log_loss(&truth, &probs, &levels).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_curve_from_frame_multiclass() {
        let df = df!(
            "y" => &["a", "b", "c"],
            ".pred_a" => &[0.8, 0.1, 0.1],
            ".pred_b" => &[0.1, 0.8, 0.1],
            ".pred_c" => &[0.1, 0.1, 0.8],
        )
        .unwrap();
        let levels = labels(&["a", "b", "c"]);
        let curves = RocCurve::from_frame(&df, "y", &levels).unwrap();
        assert_eq!(curves.curves.len(), 3);
        let frame = curves.to_frame().unwrap();
        assert!(frame.column(".level").is_ok());

        let tmp = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
        curves.write_csv(tmp.path()).unwrap();
    }
}

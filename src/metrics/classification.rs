//! Hard-class metrics computed from a confusion matrix

use crate::error::{Result, TabflowError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Counts of truth (rows) against estimate (columns), in level order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    levels: Vec<String>,
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Tabulate truth and estimate labels; every label must be one of `levels`
    pub fn new(truth: &[String], estimate: &[String], levels: &[String]) -> Result<Self> {
        if truth.len() != estimate.len() {
            return Err(TabflowError::ShapeError {
                expected: format!("{} estimates", truth.len()),
                actual: format!("{} estimates", estimate.len()),
            });
        }
        if levels.is_empty() {
            return Err(TabflowError::MetricError("no outcome levels".to_string()));
        }
        let code = |label: &String| {
            levels.iter().position(|l| l == label).ok_or_else(|| {
                TabflowError::MetricError(format!("'{}' is not an outcome level", label))
            })
        };

        let k = levels.len();
        let mut counts = vec![vec![0usize; k]; k];
        for (t, e) in truth.iter().zip(estimate.iter()) {
            counts[code(t)?][code(e)?] += 1;
        }
        Ok(Self {
            levels: levels.to_vec(),
            counts,
        })
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Count of rows with truth `t` predicted as `e`
    pub fn get(&self, t: usize, e: usize) -> usize {
        self.counts[t][e]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    fn true_positives(&self, class: usize) -> f64 {
        self.counts[class][class] as f64
    }

    fn false_positives(&self, class: usize) -> f64 {
        (0..self.levels.len())
            .filter(|&t| t != class)
            .map(|t| self.counts[t][class])
            .sum::<usize>() as f64
    }

    fn false_negatives(&self, class: usize) -> f64 {
        (0..self.levels.len())
            .filter(|&e| e != class)
            .map(|e| self.counts[class][e])
            .sum::<usize>() as f64
    }

    fn true_negatives(&self, class: usize) -> f64 {
        self.total() as f64
            - self.true_positives(class)
            - self.false_positives(class)
            - self.false_negatives(class)
    }

    /// Long-format table with `truth`, `estimate` and `n`
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut truth = Vec::new();
        let mut estimate = Vec::new();
        let mut n = Vec::new();
        for (t, row) in self.counts.iter().enumerate() {
            for (e, &count) in row.iter().enumerate() {
                truth.push(self.levels[t].clone());
                estimate.push(self.levels[e].clone());
                n.push(count as u32);
            }
        }
        Ok(df!(
            "truth" => truth,
            "estimate" => estimate,
            "n" => n,
        )?)
    }
}

impl std::fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self
            .levels
            .iter()
            .map(|l| l.len())
            .max()
            .unwrap_or(0)
            .max(self.total().to_string().len())
            .max("Truth".len());
        write!(f, "{:>width$}", "Pred")?;
        for level in &self.levels {
            write!(f, " {:>width$}", level)?;
        }
        writeln!(f)?;
        for (e, level) in self.levels.iter().enumerate() {
            write!(f, "{:>width$}", level)?;
            for t in 0..self.levels.len() {
                write!(f, " {:>width$}", self.counts[t][e])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn ratio(num: f64, den: f64, metric: &str) -> f64 {
    if den == 0.0 {
        warn!(metric, "Metric is undefined for these predictions");
        f64::NAN
    } else {
        num / den
    }
}

/// Binary statistic on the first level, macro average over levels otherwise
fn by_event(cm: &ConfusionMatrix, per_class: impl Fn(usize) -> f64) -> f64 {
    if cm.levels.len() == 2 {
        per_class(0)
    } else {
        let values: Vec<f64> = (0..cm.levels.len()).map(per_class).collect();
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Fraction of rows predicted correctly
pub fn accuracy(cm: &ConfusionMatrix) -> f64 {
    let correct: usize = (0..cm.levels.len()).map(|i| cm.counts[i][i]).sum();
    ratio(correct as f64, cm.total() as f64, "accuracy")
}

/// Cohen's kappa
pub fn kap(cm: &ConfusionMatrix) -> f64 {
    let n = cm.total() as f64;
    if n == 0.0 {
        return ratio(0.0, 0.0, "kap");
    }
    let k = cm.levels.len();
    let observed = (0..k).map(|i| cm.counts[i][i]).sum::<usize>() as f64 / n;
    let expected: f64 = (0..k)
        .map(|i| {
            let row: usize = cm.counts[i].iter().sum();
            let col: usize = (0..k).map(|t| cm.counts[t][i]).sum();
            (row as f64 / n) * (col as f64 / n)
        })
        .sum();
    ratio(observed - expected, 1.0 - expected, "kap")
}

/// Sensitivity (true positive rate) of the event level
pub fn sens(cm: &ConfusionMatrix) -> f64 {
    by_event(cm, |c| {
        ratio(cm.true_positives(c), cm.true_positives(c) + cm.false_negatives(c), "sens")
    })
}

/// Specificity (true negative rate) of the event level
pub fn spec(cm: &ConfusionMatrix) -> f64 {
    by_event(cm, |c| {
        ratio(cm.true_negatives(c), cm.true_negatives(c) + cm.false_positives(c), "spec")
    })
}

pub fn precision(cm: &ConfusionMatrix) -> f64 {
    by_event(cm, |c| {
        ratio(cm.true_positives(c), cm.true_positives(c) + cm.false_positives(c), "precision")
    })
}

/// Same as [`sens`]
pub fn recall(cm: &ConfusionMatrix) -> f64 {
    sens(cm)
}

/// Harmonic mean of precision and recall
pub fn f_meas(cm: &ConfusionMatrix) -> f64 {
    by_event(cm, |c| {
        let tp = cm.true_positives(c);
        let p = ratio(tp, tp + cm.false_positives(c), "f_meas");
        let r = ratio(tp, tp + cm.false_negatives(c), "f_meas");
        if p.is_nan() || r.is_nan() {
            f64::NAN
        } else if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn binary() -> ConfusionMatrix {
        // truth:    a a a a b b b b b b
        // estimate: a a a b a b b b b b
        let truth = labels(&["a", "a", "a", "a", "b", "b", "b", "b", "b", "b"]);
        let est = labels(&["a", "a", "a", "b", "a", "b", "b", "b", "b", "b"]);
        ConfusionMatrix::new(&truth, &est, &labels(&["a", "b"])).unwrap()
    }

    #[test]
    fn test_binary_metrics_use_first_level_as_event() {
        let cm = binary();
        assert_eq!(cm.get(0, 0), 3);
        assert_eq!(cm.get(0, 1), 1);
        assert_eq!(cm.get(1, 0), 1);
        assert!((accuracy(&cm) - 0.8).abs() < 1e-12);
        assert!((sens(&cm) - 0.75).abs() < 1e-12);
        assert!((spec(&cm) - 5.0 / 6.0).abs() < 1e-12);
        assert!((precision(&cm) - 0.75).abs() < 1e-12);
        assert_eq!(recall(&cm), sens(&cm));
        assert!((f_meas(&cm) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_kappa() {
        let cm = binary();
        // po = 0.8, pe = 0.4 * 0.4 + 0.6 * 0.6 = 0.52
        assert!((kap(&cm) - (0.8 - 0.52) / 0.48).abs() < 1e-12);
    }

    #[test]
    fn test_kappa_undefined_with_single_class() {
        let truth = labels(&["a", "a"]);
        let cm = ConfusionMatrix::new(&truth, &truth, &labels(&["a", "b"])).unwrap();
        assert!(kap(&cm).is_nan());
    }

    #[test]
    fn test_precision_without_predicted_events() {
        let truth = labels(&["a", "b", "b"]);
        let est = labels(&["b", "b", "b"]);
        let cm = ConfusionMatrix::new(&truth, &est, &labels(&["a", "b"])).unwrap();
        assert!(precision(&cm).is_nan());
        assert_eq!(sens(&cm), 0.0);
    }

    #[test]
    fn test_multiclass_macro() {
        let truth = labels(&["a", "b", "c", "c"]);
        let est = labels(&["a", "b", "c", "a"]);
        let cm = ConfusionMatrix::new(&truth, &est, &labels(&["a", "b", "c"])).unwrap();
        // recall per class: 1, 1, 0.5
        assert!((sens(&cm) - 2.5 / 3.0).abs() < 1e-12);
        // precision per class: 0.5, 1, 1
        assert!((precision(&cm) - 2.5 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_label_errors() {
        let truth = labels(&["a"]);
        let est = labels(&["z"]);
        assert!(ConfusionMatrix::new(&truth, &est, &labels(&["a", "b"])).is_err());
    }

    #[test]
    fn test_to_frame() {
        let frame = binary().to_frame().unwrap();
        assert_eq!(frame.height(), 4);
        assert_eq!(frame.width(), 3);
    }
}

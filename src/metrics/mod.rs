//! Performance metrics over prediction tables
//!
//! Metrics read an augmented prediction frame: the truth column plus
//! `.pred_class`, one `.pred_<level>` probability column per outcome level, or
//! `.pred` for regression. Binary metrics treat the first level as the event.

pub mod classification;
pub mod regression;
pub mod roc;

pub use classification::ConfusionMatrix;
pub use roc::{roc_curve, RocCurve, RocPoint};

use crate::data;
use crate::error::{Result, TabflowError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Column holding hard class predictions
pub const PRED_CLASS: &str = ".pred_class";
/// Column holding numeric predictions
pub const PRED_NUMERIC: &str = ".pred";

/// Column holding the probability of `level`
pub fn prob_column(level: &str) -> String {
    format!(".pred_{}", level)
}

/// Whether larger or smaller values are better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Maximize,
    Minimize,
}

/// What a metric consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Class,
    Probability,
    Numeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Accuracy,
    Kap,
    Sens,
    Spec,
    Precision,
    Recall,
    FMeas,
    RocAuc,
    MnLogLoss,
    Rmse,
    Rsq,
    Mae,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::Kap => "kap",
            Metric::Sens => "sens",
            Metric::Spec => "spec",
            Metric::Precision => "precision",
            Metric::Recall => "recall",
            Metric::FMeas => "f_meas",
            Metric::RocAuc => "roc_auc",
            Metric::MnLogLoss => "mn_log_loss",
            Metric::Rmse => "rmse",
            Metric::Rsq => "rsq",
            Metric::Mae => "mae",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Metric::MnLogLoss | Metric::Rmse | Metric::Mae => Direction::Minimize,
            _ => Direction::Maximize,
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::RocAuc | Metric::MnLogLoss => MetricKind::Probability,
            Metric::Rmse | Metric::Rsq | Metric::Mae => MetricKind::Numeric,
            _ => MetricKind::Class,
        }
    }

    /// `true` when `a` is a better value than `b`; NaN is never better
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        if a.is_nan() {
            return false;
        }
        if b.is_nan() {
            return true;
        }
        match self.direction() {
            Direction::Maximize => a > b,
            Direction::Minimize => a < b,
        }
    }

    fn estimator(&self, n_levels: usize) -> &'static str {
        match (self.kind(), n_levels) {
            (MetricKind::Numeric, _) => "standard",
            (_, 2) => "binary",
            (_, _) => match self {
                Metric::RocAuc => "hand_till",
                Metric::Accuracy | Metric::Kap | Metric::MnLogLoss => "multiclass",
                _ => "macro",
            },
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Metric {
    type Err = TabflowError;

    fn from_str(s: &str) -> Result<Self> {
        let metric = match s.to_ascii_lowercase().as_str() {
            "accuracy" => Metric::Accuracy,
            "kap" | "kappa" => Metric::Kap,
            "sens" | "sensitivity" => Metric::Sens,
            "spec" | "specificity" => Metric::Spec,
            "precision" => Metric::Precision,
            "recall" => Metric::Recall,
            "f_meas" | "f1" => Metric::FMeas,
            "roc_auc" | "auc" => Metric::RocAuc,
            "mn_log_loss" | "log_loss" => Metric::MnLogLoss,
            "rmse" => Metric::Rmse,
            "rsq" | "r2" => Metric::Rsq,
            "mae" => Metric::Mae,
            other => {
                return Err(TabflowError::invalid_parameter("metric", other, "unknown metric"))
            }
        };
        Ok(metric)
    }
}

/// One metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEstimate {
    pub metric: Metric,
    pub estimator: String,
    pub estimate: f64,
}

/// Metrics evaluated together on one prediction frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    metrics: Vec<Metric>,
}

impl MetricSet {
    /// Build a set; duplicates are dropped, first occurrence wins
    pub fn new(metrics: &[Metric]) -> Self {
        let mut unique = Vec::with_capacity(metrics.len());
        for m in metrics {
            if !unique.contains(m) {
                unique.push(*m);
            }
        }
        Self { metrics: unique }
    }

    /// Accuracy and ROC AUC
    pub fn classification_default() -> Self {
        Self::new(&[Metric::Accuracy, Metric::RocAuc])
    }

    /// RMSE, R squared and MAE
    pub fn regression_default() -> Self {
        Self::new(&[Metric::Rmse, Metric::Rsq, Metric::Mae])
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Evaluate on an augmented frame. `levels` are the outcome levels for
    /// classification and `None` for regression.
    pub fn evaluate(
        &self,
        frame: &DataFrame,
        truth: &str,
        levels: Option<&[String]>,
    ) -> Result<Vec<MetricEstimate>> {
        let first_of = |kind: MetricKind| self.metrics.iter().copied().find(|m| m.kind() == kind);

        let cm = match first_of(MetricKind::Class) {
            Some(metric) => {
                let levels = require_levels(metric, levels)?;
                let truth_values = truth_labels(frame, truth, levels)?;
                Some(ConfusionMatrix::new(&truth_values, &class_values(frame)?, levels)?)
            }
            None => None,
        };
        let probs = match first_of(MetricKind::Probability) {
            Some(metric) => {
                let levels = require_levels(metric, levels)?;
                let columns = levels
                    .iter()
                    .map(|l| prob_values(frame, l))
                    .collect::<Result<Vec<_>>>()?;
                Some((truth_labels(frame, truth, levels)?, columns, levels))
            }
            None => None,
        };
        let numeric = match first_of(MetricKind::Numeric) {
            Some(_) => Some((finite_values(frame, truth)?, finite_values(frame, PRED_NUMERIC)?)),
            None => None,
        };

        let n_levels = levels.map_or(0, |l| l.len());
        let mut out = Vec::with_capacity(self.metrics.len());
        for &metric in &self.metrics {
            let estimate = match (metric.kind(), &cm, &probs, &numeric) {
                (MetricKind::Class, Some(cm), _, _) => match metric {
                    Metric::Accuracy => classification::accuracy(cm),
                    Metric::Kap => classification::kap(cm),
                    Metric::Sens => classification::sens(cm),
                    Metric::Spec => classification::spec(cm),
                    Metric::Precision => classification::precision(cm),
                    Metric::Recall => classification::recall(cm),
                    _ => classification::f_meas(cm),
                },
                (MetricKind::Probability, _, Some((t, columns, levels)), _) => match metric {
                    Metric::MnLogLoss => roc::mn_log_loss(t, columns, levels)?,
                    _ if levels.len() == 2 => roc::roc_auc_binary(t, &columns[0], &levels[0])?,
                    _ => roc::roc_auc_hand_till(t, columns, levels)?,
                },
                (MetricKind::Numeric, _, _, Some((t, e))) => match metric {
                    Metric::Rmse => regression::rmse(t, e)?,
                    Metric::Rsq => regression::rsq(t, e)?,
                    _ => regression::mae(t, e)?,
                },
                _ => {
                    return Err(TabflowError::MetricError(format!(
                        "{} could not be evaluated",
                        metric
                    )))
                }
            };
            out.push(MetricEstimate {
                metric,
                estimator: metric.estimator(n_levels).to_string(),
                estimate,
            });
        }
        Ok(out)
    }
}

impl Default for MetricSet {
    fn default() -> Self {
        Self::classification_default()
    }
}

/// Render estimates as a `.metric` / `.estimator` / `.estimate` frame
pub fn estimates_to_frame(estimates: &[MetricEstimate]) -> Result<DataFrame> {
    let metric: Vec<&str> = estimates.iter().map(|e| e.metric.name()).collect();
    let estimator: Vec<&str> = estimates.iter().map(|e| e.estimator.as_str()).collect();
    let estimate: Vec<f64> = estimates.iter().map(|e| e.estimate).collect();
    Ok(df!(
        ".metric" => metric,
        ".estimator" => estimator,
        ".estimate" => estimate,
    )?)
}

fn require_levels(metric: Metric, levels: Option<&[String]>) -> Result<&[String]> {
    match levels {
        Some(l) if l.len() >= 2 => Ok(l),
        Some(_) => Err(TabflowError::MetricError(format!(
            "{} needs at least two outcome levels",
            metric
        ))),
        None => Err(TabflowError::MetricError(format!(
            "{} is a classification metric but the outcome is numeric",
            metric
        ))),
    }
}

fn require_column(frame: &DataFrame, name: &str) -> Result<()> {
    if data::has_column(frame, name) {
        Ok(())
    } else {
        Err(TabflowError::MetricError(format!(
            "prediction frame has no column '{}'",
            name
        )))
    }
}

/// Truth labels, checked against `levels`
pub(crate) fn truth_labels(frame: &DataFrame, truth: &str, levels: &[String]) -> Result<Vec<String>> {
    require_column(frame, truth)?;
    data::string_values(frame, truth)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            let v = v.ok_or_else(|| {
                TabflowError::MetricError(format!("truth '{}' is missing at row {}", truth, row))
            })?;
            if levels.contains(&v) {
                Ok(v)
            } else {
                Err(TabflowError::MetricError(format!(
                    "truth value '{}' is not one of the outcome levels",
                    v
                )))
            }
        })
        .collect()
}

fn class_values(frame: &DataFrame) -> Result<Vec<String>> {
    require_column(frame, PRED_CLASS)?;
    data::string_values(frame, PRED_CLASS)?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| TabflowError::MetricError("missing class prediction".to_string()))
        })
        .collect()
}

/// Probabilities of `level` from its `.pred_<level>` column
pub(crate) fn prob_values(frame: &DataFrame, level: &str) -> Result<Vec<f64>> {
    finite_values(frame, &prob_column(level))
}

fn finite_values(frame: &DataFrame, column: &str) -> Result<Vec<f64>> {
    require_column(frame, column)?;
    data::numeric_values(frame, column)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.filter(|x| !x.is_nan()).ok_or_else(|| {
                TabflowError::MetricError(format!("'{}' is missing at row {}", column, row))
            })
        })
        .collect()
}

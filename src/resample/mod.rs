//! Resampling: fit and evaluate a workflow on every fold
//!
//! Each fold fits the workflow on its analysis rows and evaluates on its
//! assessment rows. A fold that fails is recorded with a note and the run
//! continues; only a run where every fold fails is an error.

pub mod compare;

pub use compare::{compare_workflows, ComparisonEntry, ModelComparison};

use crate::data;
use crate::error::{Result, TabflowError};
use crate::metrics::{Metric, MetricEstimate, MetricSet};
use crate::split::{Fold, Resamples};
use crate::workflow::Workflow;
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Options for [`fit_resamples`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResampleControl {
    /// Keep assessment-set predictions for [`ResampleResults::collect_predictions`]
    pub save_pred: bool,
    /// Evaluate folds concurrently on the rayon pool
    pub parallel: bool,
}

impl Default for ResampleControl {
    fn default() -> Self {
        Self {
            save_pred: false,
            parallel: true,
        }
    }
}

impl ResampleControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_save_pred(mut self, save_pred: bool) -> Self {
        self.save_pred = save_pred;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Outcome of one fold
#[derive(Debug, Clone)]
pub struct FoldResult {
    pub id: String,
    /// Empty when the fold failed
    pub metrics: Vec<MetricEstimate>,
    pub predictions: Option<DataFrame>,
    /// Error message of a failed fold
    pub note: Option<String>,
    pub elapsed_secs: f64,
}

impl FoldResult {
    pub fn failed(&self) -> bool {
        self.note.is_some()
    }
}

/// Mean of one metric across folds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric: Metric,
    pub estimator: String,
    pub mean: f64,
    /// Folds with a finite estimate
    pub n: usize,
    pub std_err: f64,
}

/// Per-fold results of [`fit_resamples`]
#[derive(Debug, Clone)]
pub struct ResampleResults {
    folds: Vec<FoldResult>,
    elapsed_secs: f64,
}

impl ResampleResults {
    pub fn folds(&self) -> &[FoldResult] {
        &self.folds
    }

    /// Wall time of the whole run
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    /// Notes of failed folds as `(id, message)`
    pub fn notes(&self) -> Vec<(&str, &str)> {
        self.folds
            .iter()
            .filter_map(|f| f.note.as_deref().map(|n| (f.id.as_str(), n)))
            .collect()
    }

    pub fn n_failed(&self) -> usize {
        self.folds.iter().filter(|f| f.failed()).count()
    }

    /// Estimates of every fold as `(fold id, estimate)`
    pub fn fold_metrics(&self) -> Vec<(&str, &MetricEstimate)> {
        self.folds
            .iter()
            .flat_map(|f| f.metrics.iter().map(move |m| (f.id.as_str(), m)))
            .collect()
    }

    /// Average each metric over the folds where it is finite
    pub fn collect_metrics(&self) -> Vec<MetricSummary> {
        let mut keys: Vec<(Metric, String)> = Vec::new();
        for (_, m) in self.fold_metrics() {
            let key = (m.metric, m.estimator.clone());
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        keys.into_iter()
            .map(|(metric, estimator)| {
                let values: Vec<f64> = self
                    .fold_metrics()
                    .into_iter()
                    .filter(|(_, m)| m.metric == metric && m.estimator == estimator)
                    .map(|(_, m)| m.estimate)
                    .filter(|v| v.is_finite())
                    .collect();
                let n = values.len();
                let (mean, sd) = data::mean_sd(&values);
                MetricSummary {
                    metric,
                    estimator,
                    mean,
                    n,
                    std_err: sd / (n as f64).sqrt(),
                }
            })
            .collect()
    }

    /// Summary for one metric
    pub fn summary_for(&self, metric: Metric) -> Option<MetricSummary> {
        self.collect_metrics().into_iter().find(|s| s.metric == metric)
    }

    /// Assessment-set predictions of all folds with `id` and `.row` columns
    pub fn collect_predictions(&self) -> Result<DataFrame> {
        let mut frames = self.folds.iter().filter_map(|f| f.predictions.as_ref());
        let mut out = frames.next().cloned().ok_or_else(|| {
            TabflowError::ValidationError(
                "no predictions were saved; set save_pred in the resample control".to_string(),
            )
        })?;
        for frame in frames {
            out.vstack_mut(frame)?;
        }
        Ok(out)
    }
}

/// Render summaries as a `.metric` / `.estimator` / `mean` / `n` / `std_err` frame
pub fn summaries_to_frame(summaries: &[MetricSummary]) -> Result<DataFrame> {
    let metric: Vec<&str> = summaries.iter().map(|s| s.metric.name()).collect();
    let estimator: Vec<&str> = summaries.iter().map(|s| s.estimator.as_str()).collect();
    let mean: Vec<f64> = summaries.iter().map(|s| s.mean).collect();
    let n: Vec<u32> = summaries.iter().map(|s| s.n as u32).collect();
    let std_err: Vec<f64> = summaries.iter().map(|s| s.std_err).collect();
    Ok(df!(
        ".metric" => metric,
        ".estimator" => estimator,
        "mean" => mean,
        "n" => n,
        "std_err" => std_err,
    )?)
}

fn evaluate_fold(
    workflow: &Workflow,
    fold: &Fold,
    data: &DataFrame,
    levels: Option<&[String]>,
    metrics: &MetricSet,
    save_pred: bool,
) -> Result<(Vec<MetricEstimate>, Option<DataFrame>)> {
    let analysis = fold.analysis(data)?;
    let assessment = fold.assessment(data)?;

    let fitted = workflow.fit_with_levels(&analysis, levels)?;
    let augmented = fitted.augment(&assessment)?;
    let estimates = metrics.evaluate(&augmented, fitted.outcome(), fitted.levels())?;

    let predictions = if save_pred {
        let mut keep: Vec<String> = data::column_names(&augmented)
            .into_iter()
            .filter(|c| c.starts_with(".pred"))
            .collect();
        keep.push(fitted.outcome().to_string());
        let mut frame = augmented.select(keep)?;
        let ids = vec![Some(fold.id.clone()); frame.height()];
        let rows: Vec<u32> = fold.assessment.iter().map(|&i| i as u32).collect();
        frame.insert_column(0, data::string_series("id", ids))?;
        data::replace_column(&mut frame, Series::new(".row".into(), rows))?;
        Some(frame)
    } else {
        None
    };
    Ok((estimates, predictions))
}

/// Fit `workflow` on the analysis set of each fold and evaluate on its assessment set
pub fn fit_resamples(
    workflow: &Workflow,
    resamples: &Resamples,
    data: &DataFrame,
    metrics: &MetricSet,
    control: &ResampleControl,
) -> Result<ResampleResults> {
    let start = Instant::now();
    if resamples.is_empty() {
        return Err(TabflowError::ValidationError("resamples contain no folds".to_string()));
    }
    if resamples.n != data.height() {
        return Err(TabflowError::ShapeError {
            expected: format!("{} rows", resamples.n),
            actual: format!("{} rows", data.height()),
        });
    }
    // Surface configuration errors once rather than per fold
    workflow.outcome()?;
    if workflow.model().is_none() {
        return Err(TabflowError::ValidationError("workflow has no model; call add_model".to_string()));
    }
    // Classes missing from an analysis set still get a probability column
    let levels = workflow.outcome_levels(data)?;

    info!(
        folds = resamples.len(),
        rows = data.height(),
        parallel = control.parallel,
        "Resampling started"
    );

    let run = |fold: &Fold| -> FoldResult {
        let fold_start = Instant::now();
        match evaluate_fold(workflow, fold, data, levels.as_deref(), metrics, control.save_pred) {
            Ok((estimates, predictions)) => {
                debug!(fold = %fold.id, metrics = estimates.len(), "Evaluated fold");
                FoldResult {
                    id: fold.id.clone(),
                    metrics: estimates,
                    predictions,
                    note: None,
                    elapsed_secs: fold_start.elapsed().as_secs_f64(),
                }
            }
            Err(e) => {
                warn!(fold = %fold.id, error = %e, "Fold failed");
                FoldResult {
                    id: fold.id.clone(),
                    metrics: Vec::new(),
                    predictions: None,
                    note: Some(e.to_string()),
                    elapsed_secs: fold_start.elapsed().as_secs_f64(),
                }
            }
        }
    };

    let folds: Vec<FoldResult> = if control.parallel {
        resamples.folds.par_iter().map(run).collect()
    } else {
        resamples.folds.iter().map(run).collect()
    };

    let results = ResampleResults {
        folds,
        elapsed_secs: start.elapsed().as_secs_f64(),
    };
    if results.n_failed() == results.folds.len() {
        let first = results.notes().first().map(|(_, n)| n.to_string()).unwrap_or_default();
        return Err(TabflowError::TrainingError(format!(
            "all {} folds failed; first error: {}",
            results.folds.len(),
            first
        )));
    }

    info!(
        folds = results.folds.len(),
        failed = results.n_failed(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Resampling finished"
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{linear_reg, logistic_reg};
    use crate::recipe::{all_numeric_predictors, Recipe};
    use crate::split::{vfold_cv, VfoldConfig};

    fn frame() -> DataFrame {
        let n = 30;
        let x: Vec<f64> = (0..n).map(|i| (i as f64 * 0.37).sin() * 3.0 + i as f64 * 0.1).collect();
        let y: Vec<&str> = x
            .iter()
            .enumerate()
            .map(|(i, v)| if *v + if i % 4 == 0 { 2.0 } else { 0.0 } > 1.5 { "b" } else { "a" })
            .collect();
        df!("x" => x, "y" => y).unwrap()
    }

    fn workflow() -> Workflow {
        Workflow::new()
            .add_recipe(Recipe::new("y").step_normalize(all_numeric_predictors()))
            .add_model(logistic_reg())
    }

    #[test]
    fn test_collect_metrics_over_folds() {
        let df = frame();
        let folds = vfold_cv(&df, &VfoldConfig::new(3).with_seed(5)).unwrap();
        let res = fit_resamples(
            &workflow(),
            &folds,
            &df,
            &MetricSet::classification_default(),
            &ResampleControl::new(),
        )
        .unwrap();

        assert_eq!(res.folds().len(), 3);
        assert_eq!(res.fold_metrics().len(), 6);
        let summary = res.collect_metrics();
        assert_eq!(summary.len(), 2);
        let acc = &summary[0];
        assert_eq!(acc.metric, Metric::Accuracy);
        assert_eq!(acc.n, 3);
        assert!(acc.mean > 0.0 && acc.mean <= 1.0);
        assert!(acc.std_err >= 0.0);
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let df = frame();
        let folds = vfold_cv(&df, &VfoldConfig::new(3).with_seed(9)).unwrap();
        let metrics = MetricSet::classification_default();
        let par = fit_resamples(&workflow(), &folds, &df, &metrics, &ResampleControl::new()).unwrap();
        let seq = fit_resamples(
            &workflow(),
            &folds,
            &df,
            &metrics,
            &ResampleControl::new().with_parallel(false),
        )
        .unwrap();
        assert_eq!(par.collect_metrics(), seq.collect_metrics());
    }

    #[test]
    fn test_collect_predictions() {
        let df = frame();
        let folds = vfold_cv(&df, &VfoldConfig::new(3).with_seed(1)).unwrap();
        let metrics = MetricSet::classification_default();

        let without = fit_resamples(&workflow(), &folds, &df, &metrics, &ResampleControl::new()).unwrap();
        assert!(without.collect_predictions().is_err());

        let control = ResampleControl::new().with_save_pred(true);
        let res = fit_resamples(&workflow(), &folds, &df, &metrics, &control).unwrap();
        let preds = res.collect_predictions().unwrap();
        assert_eq!(preds.height(), df.height());
        let mut rows: Vec<u32> = preds
            .column(".row")
            .unwrap()
            .as_materialized_series()
            .u32()
            .unwrap()
            .into_no_null_iter()
            .collect();
        rows.sort_unstable();
        assert_eq!(rows, (0..30).collect::<Vec<u32>>());
        assert!(preds.column("id").is_ok());
    }

    #[test]
    fn test_all_folds_failing_is_error() {
        // Linear regression cannot fit a nominal outcome
        let df = frame();
        let folds = vfold_cv(&df, &VfoldConfig::new(3).with_seed(2)).unwrap();
        let wf = workflow().update_model(linear_reg());
        let result = fit_resamples(
            &wf,
            &folds,
            &df,
            &MetricSet::classification_default(),
            &ResampleControl::new(),
        );
        assert!(matches!(result, Err(TabflowError::TrainingError(_))));
    }

    #[test]
    fn test_row_count_mismatch() {
        let df = frame();
        let folds = vfold_cv(&df, &VfoldConfig::new(3)).unwrap();
        let smaller = df.head(Some(10));
        let result = fit_resamples(
            &workflow(),
            &folds,
            &smaller,
            &MetricSet::classification_default(),
            &ResampleControl::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_summaries_frame() {
        let frame = summaries_to_frame(&[MetricSummary {
            metric: Metric::RocAuc,
            estimator: "binary".to_string(),
            mean: 0.8,
            n: 10,
            std_err: 0.01,
        }])
        .unwrap();
        assert_eq!(frame.width(), 5);
    }
}

//! Ranking several workflows on the same resamples

use super::{fit_resamples, MetricSummary, ResampleControl};
use crate::error::{Result, TabflowError};
use crate::metrics::{Metric, MetricSet};
use crate::split::Resamples;
use crate::workflow::Workflow;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Resampled performance of one workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonEntry {
    pub name: String,
    /// 1 is best
    pub rank: usize,
    pub metrics: Vec<MetricSummary>,
    /// Time spent resampling this workflow
    pub fit_time_secs: f64,
    pub failed_folds: usize,
    /// Set when the workflow could not be resampled at all
    pub error: Option<String>,
}

impl ComparisonEntry {
    pub fn summary_for(&self, metric: Metric) -> Option<&MetricSummary> {
        self.metrics.iter().find(|s| s.metric == metric)
    }

    fn score(&self, metric: Metric) -> f64 {
        self.summary_for(metric).map_or(f64::NAN, |s| s.mean)
    }
}

/// Workflows ranked by the mean of one metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparison {
    pub rank_metric: Metric,
    /// Sorted by rank
    pub entries: Vec<ComparisonEntry>,
}

impl ModelComparison {
    pub fn best(&self) -> Option<&ComparisonEntry> {
        self.entries.first().filter(|e| e.error.is_none())
    }

    /// One row per workflow: `rank`, `model`, `mean`, `std_err`, `fit_time_secs`
    pub fn to_frame(&self) -> Result<DataFrame> {
        let rank: Vec<u32> = self.entries.iter().map(|e| e.rank as u32).collect();
        let model: Vec<&str> = self.entries.iter().map(|e| e.name.as_str()).collect();
        let mean: Vec<f64> = self.entries.iter().map(|e| e.score(self.rank_metric)).collect();
        let std_err: Vec<f64> = self
            .entries
            .iter()
            .map(|e| e.summary_for(self.rank_metric).map_or(f64::NAN, |s| s.std_err))
            .collect();
        let time: Vec<f64> = self.entries.iter().map(|e| e.fit_time_secs).collect();
        Ok(df!(
            "rank" => rank,
            "model" => model,
            "mean" => mean,
            "std_err" => std_err,
            "fit_time_secs" => time,
        )?)
    }
}

/// Resample every workflow on the same folds and rank them by `rank_metric`
pub fn compare_workflows(
    workflows: &[(String, Workflow)],
    resamples: &Resamples,
    data: &DataFrame,
    metrics: &MetricSet,
    control: &ResampleControl,
    rank_metric: Metric,
) -> Result<ModelComparison> {
    if workflows.is_empty() {
        return Err(TabflowError::ValidationError("no workflows to compare".to_string()));
    }
    if !metrics.metrics().contains(&rank_metric) {
        return Err(TabflowError::invalid_parameter(
            "rank_metric",
            rank_metric,
            "is not in the metric set",
        ));
    }

    let mut entries = Vec::with_capacity(workflows.len());
    for (name, workflow) in workflows {
        let start = Instant::now();
        let entry = match fit_resamples(workflow, resamples, data, metrics, control) {
            Ok(results) => ComparisonEntry {
                name: name.clone(),
                rank: 0,
                metrics: results.collect_metrics(),
                fit_time_secs: start.elapsed().as_secs_f64(),
                failed_folds: results.n_failed(),
                error: None,
            },
            Err(e) => {
                warn!(model = %name, error = %e, "Workflow could not be resampled");
                ComparisonEntry {
                    name: name.clone(),
                    rank: 0,
                    metrics: Vec::new(),
                    fit_time_secs: start.elapsed().as_secs_f64(),
                    failed_folds: resamples.len(),
                    error: Some(e.to_string()),
                }
            }
        };
        info!(
            model = %name,
            metric = %rank_metric,
            mean = entry.score(rank_metric),
            elapsed_ms = (entry.fit_time_secs * 1000.0) as u64,
            "Resampled workflow"
        );
        entries.push(entry);
    }

    // Stable: equal scores keep input order; NaN ranks last
    entries.sort_by(|a, b| {
        let (sa, sb) = (a.score(rank_metric), b.score(rank_metric));
        if rank_metric.is_better(sa, sb) {
            std::cmp::Ordering::Less
        } else if rank_metric.is_better(sb, sa) {
            std::cmp::Ordering::Greater
        } else {
            std::cmp::Ordering::Equal
        }
    });
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }

    Ok(ModelComparison {
        rank_metric,
        entries,
    })
}

//! Whole-pipeline configuration, stored as JSON

use crate::error::{Result, TabflowError};
use crate::metrics::{Metric, MetricSet};
use crate::model::{logistic_reg, rand_forest, ModelSpec};
use crate::recipe::{all_nominal_predictors, all_numeric_predictors, all_predictors, Recipe, Role, Step};
use crate::split::{SplitConfig, VfoldConfig};
use crate::workflow::Workflow;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// A model specification with a display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedModel {
    pub name: String,
    pub spec: ModelSpec,
}

/// Everything needed to split, preprocess, fit, resample and evaluate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Outcome column
    pub outcome: String,
    /// Columns kept through preprocessing but not used as predictors
    #[serde(default)]
    pub id_columns: Vec<String>,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub resampling: VfoldConfig,
    #[serde(default)]
    pub steps: Vec<Step>,
    pub models: Vec<NamedModel>,
    #[serde(default)]
    pub metrics: MetricSet,
    /// Metric used to rank models; the first of `metrics` when absent
    #[serde(default)]
    pub rank_metric: Option<Metric>,
}

impl PipelineConfig {
    /// Stratified 3/4 split, dummy encoding, correlation filter at 0.9,
    /// normalization and zero-variance removal, then logistic regression
    /// against a 100-tree random forest over 10-fold cross-validation,
    /// scored by accuracy and ROC AUC
    pub fn classification_default(outcome: impl Into<String>) -> Self {
        let outcome = outcome.into();
        Self {
            split: SplitConfig::new().with_strata(outcome.clone()),
            resampling: VfoldConfig::new(10),
            id_columns: Vec::new(),
            steps: vec![
                Step::dummy(all_nominal_predictors()),
                Step::corr(all_numeric_predictors()),
                Step::Normalize {
                    selector: all_numeric_predictors(),
                },
                Step::Zv {
                    selector: all_predictors(),
                },
            ],
            models: vec![
                NamedModel {
                    name: "logistic_reg".to_string(),
                    spec: logistic_reg(),
                },
                NamedModel {
                    name: "rand_forest".to_string(),
                    spec: rand_forest().with_trees(100).with_num_threads(4),
                },
            ],
            metrics: MetricSet::classification_default(),
            rank_metric: Some(Metric::RocAuc),
            outcome,
        }
    }

    /// Use `seed` for the split, the folds and every model engine
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.split.seed = Some(seed);
        self.resampling.seed = Some(seed);
        for model in &mut self.models {
            model.spec.args.seed = Some(seed);
        }
        self
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| TabflowError::ConfigError(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| TabflowError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        debug!(path = %path.display(), models = config.models.len(), "Loaded pipeline config");
        Ok(config)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check settings that deserialization cannot
    pub fn validate(&self) -> Result<()> {
        if self.outcome.is_empty() {
            return Err(TabflowError::ConfigError("outcome must be set".to_string()));
        }
        if self.models.is_empty() {
            return Err(TabflowError::ConfigError("at least one model is required".to_string()));
        }
        if self.metrics.is_empty() {
            return Err(TabflowError::ConfigError("at least one metric is required".to_string()));
        }
        let mut names: Vec<&str> = self.models.iter().map(|m| m.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return Err(TabflowError::ConfigError("model names must be unique".to_string()));
        }
        if !(self.split.prop > 0.0 && self.split.prop < 1.0) {
            return Err(TabflowError::ConfigError(format!(
                "split prop must be in (0, 1), got {}",
                self.split.prop
            )));
        }
        if self.resampling.v < 2 {
            return Err(TabflowError::ConfigError("resampling needs at least 2 folds".to_string()));
        }
        if let Some(metric) = self.rank_metric {
            if !self.metrics.metrics().contains(&metric) {
                return Err(TabflowError::ConfigError(format!(
                    "rank metric {} is not in the metric set",
                    metric
                )));
            }
        }
        for model in &self.models {
            model
                .spec
                .validate()
                .map_err(|e| TabflowError::ConfigError(format!("model '{}': {}", model.name, e)))?;
        }
        Ok(())
    }

    /// Metric used to rank models
    pub fn rank_metric(&self) -> Result<Metric> {
        self.rank_metric
            .or_else(|| self.metrics.metrics().first().copied())
            .ok_or_else(|| TabflowError::ConfigError("no metric to rank by".to_string()))
    }

    /// The recipe described by `outcome`, `id_columns` and `steps`
    pub fn recipe(&self) -> Recipe {
        let recipe = Recipe::new(self.outcome.clone()).update_role(&self.id_columns, Role::Id);
        self.steps
            .iter()
            .cloned()
            .fold(recipe, |recipe, step| recipe.add_step(step))
    }

    /// One workflow per configured model, sharing the recipe
    pub fn workflows(&self) -> Vec<(String, Workflow)> {
        let base = Workflow::new().add_recipe(self.recipe());
        self.models
            .iter()
            .map(|m| (m.name.clone(), base.update_model(m.spec.clone())))
            .collect()
    }
}

//! Workflows: a recipe and a model fit and predicted together
//!
//! Fitting a [`Workflow`] prepares its recipe on the training data, fits the
//! model on the processed predictors, and keeps both so that new data is
//! always baked with the training statistics before prediction.

use crate::data::{self, ColumnType};
use crate::error::{Result, TabflowError};
use crate::metrics::{self, MetricEstimate, MetricSet};
use crate::model::{FittedModel, Mode, ModelSpec, Outcome};
use crate::recipe::{PreparedRecipe, Recipe};
use crate::split::InitialSplit;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;
use tracing::{info, warn};

/// Kind of prediction to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictType {
    /// `.pred_class`
    Class,
    /// `.pred_<level>` for every level
    Prob,
    /// `.pred`
    Numeric,
}

impl FromStr for PredictType {
    type Err = TabflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "class" => Ok(PredictType::Class),
            "prob" => Ok(PredictType::Prob),
            "numeric" => Ok(PredictType::Numeric),
            other => Err(TabflowError::invalid_parameter(
                "type",
                other,
                "expected class, prob or numeric",
            )),
        }
    }
}

/// An unfitted pairing of a recipe and a model specification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    recipe: Option<Recipe>,
    model: Option<ModelSpec>,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_recipe(mut self, recipe: Recipe) -> Self {
        if self.recipe.is_some() {
            warn!("Workflow already has a recipe; replacing it");
        }
        self.recipe = Some(recipe);
        self
    }

    /// Use `outcome` against every other column with no preprocessing
    pub fn add_variables(self, outcome: impl Into<String>) -> Self {
        self.add_recipe(Recipe::new(outcome))
    }

    pub fn add_model(mut self, spec: ModelSpec) -> Self {
        if self.model.is_some() {
            warn!("Workflow already has a model; replacing it");
        }
        self.model = Some(spec);
        self
    }

    /// Copy of this workflow with a different model
    pub fn update_model(&self, spec: ModelSpec) -> Self {
        Self {
            recipe: self.recipe.clone(),
            model: Some(spec),
        }
    }

    /// Copy of this workflow with a different recipe
    pub fn update_recipe(&self, recipe: Recipe) -> Self {
        Self {
            recipe: Some(recipe),
            model: self.model.clone(),
        }
    }

    pub fn recipe(&self) -> Option<&Recipe> {
        self.recipe.as_ref()
    }

    pub fn model(&self) -> Option<&ModelSpec> {
        self.model.as_ref()
    }

    /// The single outcome column
    pub fn outcome(&self) -> Result<&str> {
        let recipe = self.require_recipe()?;
        match recipe.outcomes() {
            [single] => Ok(single.as_str()),
            [] => Err(TabflowError::ValidationError("recipe has no outcome".to_string())),
            many => Err(TabflowError::ValidationError(format!(
                "workflows fit a single outcome, recipe has {}",
                many.len()
            ))),
        }
    }

    fn require_recipe(&self) -> Result<&Recipe> {
        self.recipe.as_ref().ok_or_else(|| {
            TabflowError::ValidationError(
                "workflow has no preprocessor; call add_recipe or add_variables".to_string(),
            )
        })
    }

    fn require_model(&self) -> Result<&ModelSpec> {
        self.model.as_ref().ok_or_else(|| {
            TabflowError::ValidationError("workflow has no model; call add_model".to_string())
        })
    }

    /// Prepare the recipe and fit the model on `training`
    pub fn fit(&self, training: &DataFrame) -> Result<FittedWorkflow> {
        self.fit_with_levels(training, None)
    }

    /// Outcome levels of `data` when this workflow fits a nominal outcome
    pub fn outcome_levels(&self, data: &DataFrame) -> Result<Option<Vec<String>>> {
        let outcome = self.outcome()?;
        let mode = self.require_model()?.mode;
        if mode == Mode::Regression || data::column_type(data, outcome)? != ColumnType::Nominal {
            return Ok(None);
        }
        Ok(Some(data::levels(data, outcome)?))
    }

    /// Fit with a fixed outcome level set. Levels absent from `training`
    /// keep their probability column and are predicted with probability 0.
    pub fn fit_with_levels(
        &self,
        training: &DataFrame,
        levels: Option<&[String]>,
    ) -> Result<FittedWorkflow> {
        let start = Instant::now();
        let recipe = self.require_recipe()?;
        let spec = self.require_model()?;
        let outcome = self.outcome()?.to_string();

        let prepared = recipe.prep(training)?;
        let processed = prepared.juice()?;

        let predictors = prepared.predictors();
        if predictors.is_empty() {
            return Err(TabflowError::ValidationError(
                "no predictors remain after preprocessing".to_string(),
            ));
        }
        for var in prepared.summary() {
            if predictors.contains(&var.variable) && var.column_type != ColumnType::Numeric {
                return Err(TabflowError::ValidationError(format!(
                    "predictor '{}' is not numeric; add step_dummy for nominal predictors",
                    var.variable
                )));
            }
        }

        let y = outcome_values(&processed, &outcome, spec.mode, levels)?;
        let x = data::columns_to_array2(&processed, &predictors)?;
        let model = spec.fit_xy(&x, &y)?;

        info!(
            model = %spec.describe(),
            rows = x.nrows(),
            predictors = x.ncols(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Workflow fitted"
        );

        Ok(FittedWorkflow {
            recipe: prepared,
            model,
            outcome,
            predictors,
        })
    }
}

fn outcome_values(
    df: &DataFrame,
    outcome: &str,
    mode: Mode,
    levels: Option<&[String]>,
) -> Result<Outcome> {
    let classes = || match levels {
        Some(levels) => Outcome::classes_with_levels(df, outcome, levels.to_vec()),
        None => Outcome::classes_from(df, outcome),
    };
    match mode {
        Mode::Classification => classes(),
        Mode::Regression => Outcome::numeric_from(df, outcome),
        Mode::Unknown => match data::column_type(df, outcome)? {
            ColumnType::Numeric => Outcome::numeric_from(df, outcome),
            ColumnType::Nominal => classes(),
            ColumnType::Other => Err(TabflowError::DataError(format!(
                "outcome '{}' is neither numeric nor nominal",
                outcome
            ))),
        },
    }
}

/// A workflow with a prepared recipe and a fitted model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedWorkflow {
    recipe: PreparedRecipe,
    model: FittedModel,
    outcome: String,
    predictors: Vec<String>,
}

impl FittedWorkflow {
    pub fn extract_recipe(&self) -> &PreparedRecipe {
        &self.recipe
    }

    pub fn extract_fit(&self) -> &FittedModel {
        &self.model
    }

    /// Outcome levels in prediction-column order (classification only)
    pub fn levels(&self) -> Option<&[String]> {
        self.model.levels()
    }

    pub fn outcome(&self) -> &str {
        &self.outcome
    }

    /// Processed predictor columns the model was fit on
    pub fn predictors(&self) -> &[String] {
        &self.predictors
    }

    pub fn mode(&self) -> Mode {
        self.model.mode()
    }

    fn design(&self, new_data: &DataFrame) -> Result<ndarray::Array2<f64>> {
        let baked = self.recipe.bake(new_data)?;
        data::columns_to_array2(&baked, &self.predictors)
    }

    /// Predictions as a frame with one row per row of `new_data`
    pub fn predict(&self, new_data: &DataFrame, kind: PredictType) -> Result<DataFrame> {
        let x = self.design(new_data)?;
        let columns: Vec<Column> = match kind {
            PredictType::Class => {
                let classes = self.model.predict_class(&x)?;
                vec![data::string_series(metrics::PRED_CLASS, classes.into_iter().map(Some).collect()).into()]
            }
            PredictType::Prob => {
                let proba = self.model.predict_proba(&x)?;
                let levels = self.levels().ok_or(TabflowError::ModelNotFitted)?;
                levels
                    .iter()
                    .enumerate()
                    .map(|(j, level)| {
                        let values = proba.column(j).iter().map(|&p| Some(p)).collect();
                        data::float_series(&metrics::prob_column(level), values).into()
                    })
                    .collect()
            }
            PredictType::Numeric => {
                let pred = self.model.predict_numeric(&x)?;
                vec![data::float_series(metrics::PRED_NUMERIC, pred.iter().map(|&v| Some(v)).collect()).into()]
            }
        };
        Ok(DataFrame::new(columns)?)
    }

    /// `new_data` with every prediction column appended: `.pred_class` and the
    /// `.pred_<level>` probabilities for classification, `.pred` for regression
    pub fn augment(&self, new_data: &DataFrame) -> Result<DataFrame> {
        let kinds: &[PredictType] = match self.mode() {
            Mode::Regression => &[PredictType::Numeric],
            _ => &[PredictType::Class, PredictType::Prob],
        };
        let mut out = new_data.clone();
        for &kind in kinds {
            let predictions = self.predict(new_data, kind)?;
            for column in predictions.get_columns() {
                data::replace_column(&mut out, column.as_materialized_series().clone())?;
            }
        }
        Ok(out)
    }

    /// Metrics on `new_data`, which must contain the outcome column
    pub fn evaluate(&self, new_data: &DataFrame, metrics: &MetricSet) -> Result<Vec<MetricEstimate>> {
        if !data::has_column(new_data, &self.outcome) {
            return Err(TabflowError::FeatureNotFound(self.outcome.clone()));
        }
        let augmented = self.augment(new_data)?;
        metrics.evaluate(&augmented, &self.outcome, self.levels())
    }

    /// Write the fitted workflow as JSON. The processed training data is not saved.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let workflow: Self = serde_json::from_str(&json)?;
        Ok(workflow)
    }
}

/// Result of fitting on the training set and evaluating on the test set
#[derive(Debug, Clone)]
pub struct LastFit {
    pub metrics: Vec<MetricEstimate>,
    /// Test rows with prediction columns and `.row`, the row position in the full data
    pub predictions: DataFrame,
    pub workflow: FittedWorkflow,
}

impl LastFit {
    pub fn collect_metrics(&self) -> &[MetricEstimate] {
        &self.metrics
    }

    pub fn collect_predictions(&self) -> &DataFrame {
        &self.predictions
    }

    pub fn extract_workflow(&self) -> &FittedWorkflow {
        &self.workflow
    }
}

/// Fit `workflow` on the training part of `split` and evaluate it on the testing part
pub fn last_fit(
    workflow: &Workflow,
    split: &InitialSplit,
    data: &DataFrame,
    metrics: &MetricSet,
) -> Result<LastFit> {
    let training = split.training(data)?;
    let testing = split.testing(data)?;

    let levels = workflow.outcome_levels(data)?;
    let fitted = workflow.fit_with_levels(&training, levels.as_deref())?;
    let mut predictions = fitted.augment(&testing)?;
    let estimates = metrics.evaluate(&predictions, fitted.outcome(), fitted.levels())?;

    let rows: Vec<u32> = split.test_indices().iter().map(|&i| i as u32).collect();
    data::replace_column(&mut predictions, Series::new(".row".into(), rows))?;

    info!(
        train = training.height(),
        test = testing.height(),
        metrics = estimates.len(),
        "Last fit evaluated on the test set"
    );

    Ok(LastFit {
        metrics: estimates,
        predictions,
        workflow: fitted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{decision_tree, linear_reg, logistic_reg, rand_forest};
    use crate::recipe::{all_nominal_predictors, all_numeric_predictors};

    fn frame() -> DataFrame {
        let n = 40;
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let g: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "u" } else { "v" }).collect();
        let y: Vec<&str> = (0..n)
            .map(|i| if (i < 20) ^ (i % 7 == 0) { "lo" } else { "hi" })
            .collect();
        df!("x" => x, "g" => g, "y" => y).unwrap()
    }

    fn workflow() -> Workflow {
        let recipe = Recipe::new("y")
            .step_dummy(all_nominal_predictors())
            .step_normalize(all_numeric_predictors());
        Workflow::new().add_recipe(recipe).add_model(logistic_reg())
    }

    #[test]
    fn test_fit_and_predict_columns() {
        let df = frame();
        let fitted = workflow().fit(&df).unwrap();
        assert_eq!(fitted.levels().unwrap(), &["hi".to_string(), "lo".to_string()]);

        let classes = fitted.predict(&df, PredictType::Class).unwrap();
        assert_eq!(data::column_names(&classes), vec![".pred_class"]);
        let probs = fitted.predict(&df, PredictType::Prob).unwrap();
        assert_eq!(data::column_names(&probs), vec![".pred_hi", ".pred_lo"]);
        assert!(fitted.predict(&df, PredictType::Numeric).is_err());
    }

    #[test]
    fn test_augment_keeps_input_columns() {
        let df = frame();
        let fitted = workflow().fit(&df).unwrap();
        let augmented = fitted.augment(&df).unwrap();
        assert_eq!(
            data::column_names(&augmented),
            vec!["x", "g", "y", ".pred_class", ".pred_hi", ".pred_lo"]
        );
        assert_eq!(augmented.height(), df.height());
    }

    #[test]
    fn test_nominal_predictor_without_dummy_errors() {
        let wf = Workflow::new().add_variables("y").add_model(logistic_reg());
        let err = wf.fit(&frame()).unwrap_err();
        assert!(err.to_string().contains("step_dummy"));
    }

    #[test]
    fn test_missing_model_or_recipe() {
        assert!(Workflow::new().add_variables("y").fit(&frame()).is_err());
        assert!(Workflow::new().add_model(logistic_reg()).fit(&frame()).is_err());
    }

    #[test]
    fn test_update_model_keeps_recipe() {
        let wf = workflow();
        let other = wf.update_model(rand_forest().with_trees(5).with_seed(3));
        assert_eq!(other.recipe(), wf.recipe());
        assert_ne!(other.model(), wf.model());
        let fitted = other.fit(&frame()).unwrap();
        assert_eq!(fitted.mode(), Mode::Classification);
    }

    #[test]
    fn test_regression_workflow() {
        let df = df!(
            "x" => &[1.0, 2.0, 3.0, 4.0, 5.0],
            "y" => &[2.0, 4.1, 5.9, 8.0, 10.1],
        )
        .unwrap();
        let fitted = Workflow::new().add_variables("y").add_model(linear_reg()).fit(&df).unwrap();
        let augmented = fitted.augment(&df).unwrap();
        assert!(augmented.column(".pred").is_ok());
        let est = fitted.evaluate(&df, &MetricSet::regression_default()).unwrap();
        assert!(est[0].estimate < 0.2);
    }

    #[test]
    fn test_save_and_load() {
        let df = frame();
        let fitted = workflow().fit(&df).unwrap();
        let tmp = tempfile::NamedTempFile::with_suffix(".json").unwrap();
        fitted.save(tmp.path()).unwrap();
        let loaded = FittedWorkflow::load(tmp.path()).unwrap();

        let a = data::numeric_values(&fitted.predict(&df, PredictType::Prob).unwrap(), ".pred_hi").unwrap();
        let b = data::numeric_values(&loaded.predict(&df, PredictType::Prob).unwrap(), ".pred_hi").unwrap();
        for (pa, pb) in a.iter().zip(b.iter()) {
            assert!((pa.unwrap() - pb.unwrap()).abs() < 1e-9);
        }
        assert!(loaded.extract_recipe().juice().is_err());
    }

    #[test]
    fn test_last_fit() {
        let df = frame();
        let split = crate::split::initial_split(
            &df,
            &crate::split::SplitConfig::new().with_strata("y").with_seed(11),
        )
        .unwrap();
        let result = last_fit(&workflow(), &split, &df, &MetricSet::classification_default()).unwrap();
        assert_eq!(result.collect_metrics().len(), 2);
        let preds = result.collect_predictions();
        assert_eq!(preds.height(), split.test_indices().len());
        assert!(preds.column(".row").is_ok());
    }

    #[test]
    fn test_fit_with_levels_keeps_absent_class() {
        let df = frame().drop("g").unwrap();
        let tree = Workflow::new().add_variables("y").add_model(decision_tree());
        assert_eq!(
            tree.outcome_levels(&df).unwrap(),
            Some(vec!["hi".to_string(), "lo".to_string()])
        );

        let levels = vec!["hi".to_string(), "lo".to_string(), "mid".to_string()];
        let fitted = tree.fit_with_levels(&df, Some(&levels)).unwrap();
        assert_eq!(fitted.levels().unwrap(), levels.as_slice());

        let probs = fitted.predict(&df, PredictType::Prob).unwrap();
        assert_eq!(data::column_names(&probs), vec![".pred_hi", ".pred_lo", ".pred_mid"]);
        let mid = data::numeric_values(&probs, ".pred_mid").unwrap();
        assert!(mid.iter().all(|p| *p == Some(0.0)));

        let regression = Workflow::new().add_variables("x").add_model(linear_reg());
        assert_eq!(regression.outcome_levels(&df).unwrap(), None);
    }

    #[test]
    fn test_predict_type_from_str() {
        assert_eq!("prob".parse::<PredictType>().unwrap(), PredictType::Prob);
        assert!("raw".parse::<PredictType>().is_err());
    }
}

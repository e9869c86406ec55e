//! Preprocessing recipes
//!
//! A [`Recipe`] is a declarative, ordered list of column-wise steps. Preparing
//! it on training data estimates every step's statistics and yields a
//! [`PreparedRecipe`] that can bake any frame with the same columns, so the
//! training and testing data always receive identical transformations.
//!
//! ```ignore
//! let recipe = Recipe::new("class")
//!     .step_dummy(all_nominal_predictors())
//!     .step_corr(all_numeric_predictors(), 0.9)
//!     .step_normalize(all_numeric_predictors())
//!     .step_zv(all_predictors());
//! let prepared = recipe.prep(&train)?;
//! let test_processed = prepared.bake(&test)?;
//! ```

pub mod encoding;
pub mod filters;
pub mod imputation;
pub mod scaling;
pub mod selector;
pub mod step;
pub mod transforms;

pub use selector::{
    all_nominal, all_nominal_predictors, all_numeric, all_numeric_predictors, all_outcomes,
    all_predictors, columns, Selector,
};
pub use step::{Step, TrainedStep};

use crate::data::{self, ColumnType};
use crate::error::{Result, TabflowError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

/// Role a column plays in modeling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Outcome,
    Predictor,
    /// Carried through processing but never used to fit
    Id,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Outcome => write!(f, "outcome"),
            Role::Predictor => write!(f, "predictor"),
            Role::Id => write!(f, "id"),
        }
    }
}

/// Whether a column came from the input or was created by a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Original,
    Derived,
}

/// One row of a recipe summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableInfo {
    pub variable: String,
    pub column_type: ColumnType,
    pub role: Role,
    pub source: Source,
}

/// Declarative preprocessing specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    outcomes: Vec<String>,
    roles: BTreeMap<String, Role>,
    steps: Vec<Step>,
}

impl Recipe {
    /// Recipe with `outcome` as the outcome and every other column a predictor
    pub fn new(outcome: impl Into<String>) -> Self {
        Self {
            outcomes: vec![outcome.into()],
            roles: BTreeMap::new(),
            steps: Vec::new(),
        }
    }

    /// Assign a role to named columns
    pub fn update_role<S: AsRef<str>>(mut self, columns: &[S], role: Role) -> Self {
        for c in columns {
            let name = c.as_ref().to_string();
            if role == Role::Outcome {
                if !self.outcomes.contains(&name) {
                    self.outcomes.push(name.clone());
                }
                self.roles.remove(&name);
            } else {
                self.outcomes.retain(|o| o != &name);
                self.roles.insert(name, role);
            }
        }
        self
    }

    pub fn add_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Indicator columns with the first level as reference
    pub fn step_dummy(self, selector: Selector) -> Self {
        self.add_step(Step::dummy(selector))
    }

    /// Indicator columns for every level
    pub fn step_dummy_one_hot(self, selector: Selector) -> Self {
        self.add_step(Step::Dummy { selector, one_hot: true })
    }

    pub fn step_corr(self, selector: Selector, threshold: f64) -> Self {
        self.add_step(Step::Corr { selector, threshold })
    }

    /// Natural log
    pub fn step_log(self, selector: Selector) -> Self {
        self.add_step(Step::log(selector))
    }

    pub fn step_log_base(self, selector: Selector, base: f64, offset: f64) -> Self {
        self.add_step(Step::Log { selector, base, offset, signed: false })
    }

    pub fn step_center(self, selector: Selector) -> Self {
        self.add_step(Step::Center { selector })
    }

    pub fn step_scale(self, selector: Selector) -> Self {
        self.add_step(Step::Scale { selector })
    }

    pub fn step_normalize(self, selector: Selector) -> Self {
        self.add_step(Step::Normalize { selector })
    }

    pub fn step_zv(self, selector: Selector) -> Self {
        self.add_step(Step::Zv { selector })
    }

    pub fn step_nzv(self, selector: Selector) -> Self {
        self.add_step(Step::nzv(selector))
    }

    pub fn step_impute_mean(self, selector: Selector) -> Self {
        self.add_step(Step::ImputeMean { selector })
    }

    pub fn step_impute_mode(self, selector: Selector) -> Self {
        self.add_step(Step::ImputeMode { selector })
    }

    pub fn outcomes(&self) -> &[String] {
        &self.outcomes
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    fn role_of(&self, name: &str) -> Role {
        if self.outcomes.iter().any(|o| o == name) {
            Role::Outcome
        } else {
            self.roles.get(name).copied().unwrap_or(Role::Predictor)
        }
    }

    fn variables(&self, df: &DataFrame, original: &[String]) -> Result<Vec<VariableInfo>> {
        data::column_names(df)
            .into_iter()
            .map(|name| {
                Ok(VariableInfo {
                    column_type: data::column_type(df, &name)?,
                    role: self.role_of(&name),
                    source: if original.contains(&name) { Source::Original } else { Source::Derived },
                    variable: name,
                })
            })
            .collect()
    }

    /// Variables, types and roles of `df` as this recipe sees them
    pub fn summary(&self, df: &DataFrame) -> Result<Vec<VariableInfo>> {
        self.check_columns(df)?;
        self.variables(df, &data::column_names(df))
    }

    fn check_columns(&self, df: &DataFrame) -> Result<()> {
        for name in self.outcomes.iter().chain(self.roles.keys()) {
            if !data::has_column(df, name) {
                return Err(TabflowError::RecipeError(format!(
                    "column '{}' named in the recipe is not in the data",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Estimate every step on `training`, in order
    pub fn prep(&self, training: &DataFrame) -> Result<PreparedRecipe> {
        let start = Instant::now();
        self.check_columns(training)?;

        let original_names = data::column_names(training);
        let original = self.variables(training, &original_names)?;

        let mut current = training.clone();
        let mut trained = Vec::with_capacity(self.steps.len());
        for (i, step) in self.steps.iter().enumerate() {
            let vars = self.variables(&current, &original_names)?;
            let fitted = step.prep(&current, &vars).map_err(|e| match e {
                TabflowError::RecipeError(msg) => {
                    TabflowError::RecipeError(format!("step {} ({}): {}", i + 1, step.name(), msg))
                }
                other => other,
            })?;
            current = fitted.apply(&current)?;
            debug!(
                step = i + 1,
                name = step.name(),
                columns = current.width(),
                "Prepared recipe step"
            );
            trained.push(fitted);
        }

        let output = self.variables(&current, &original_names)?;
        info!(
            steps = self.steps.len(),
            rows = current.height(),
            columns = current.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Recipe prepared"
        );

        Ok(PreparedRecipe {
            recipe: self.clone(),
            original,
            trained,
            output,
            training: Some(current),
        })
    }
}

/// A recipe whose steps have been estimated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedRecipe {
    recipe: Recipe,
    original: Vec<VariableInfo>,
    trained: Vec<TrainedStep>,
    output: Vec<VariableInfo>,
    #[serde(skip)]
    training: Option<DataFrame>,
}

impl PreparedRecipe {
    /// Apply the trained steps to new data.
    ///
    /// Every original predictor and id column must be present; outcome
    /// columns are optional. Columns unknown to the recipe are dropped.
    pub fn bake(&self, new_data: &DataFrame) -> Result<DataFrame> {
        let missing: Vec<&str> = self
            .original
            .iter()
            .filter(|v| v.role != Role::Outcome && !data::has_column(new_data, &v.variable))
            .map(|v| v.variable.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(TabflowError::RecipeError(format!(
                "new data is missing required columns: {}",
                missing.join(", ")
            )));
        }

        let keep: Vec<&str> = self
            .original
            .iter()
            .map(|v| v.variable.as_str())
            .filter(|name| data::has_column(new_data, name))
            .collect();
        let mut current = new_data.select(keep)?;

        for step in &self.trained {
            current = step.apply(&current)?;
        }
        Ok(current)
    }

    /// The processed training data
    pub fn juice(&self) -> Result<DataFrame> {
        self.training.clone().ok_or_else(|| {
            TabflowError::RecipeError("processed training data is not retained after loading".to_string())
        })
    }

    /// Learned statistics of the step at `index` (0-based)
    pub fn tidy(&self, index: usize) -> Result<DataFrame> {
        let step = self.trained.get(index).ok_or_else(|| {
            TabflowError::invalid_parameter(
                "index",
                index,
                format!("recipe has {} steps", self.trained.len()),
            )
        })?;
        step.tidy()
    }

    /// Variables after processing
    pub fn summary(&self) -> &[VariableInfo] {
        &self.output
    }

    /// Variables of the training data before processing
    pub fn original_summary(&self) -> &[VariableInfo] {
        &self.original
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn outcomes(&self) -> &[String] {
        self.recipe.outcomes()
    }

    /// Processed predictor columns, in output order
    pub fn predictors(&self) -> Vec<String> {
        self.output
            .iter()
            .filter(|v| v.role == Role::Predictor)
            .map(|v| v.variable.clone())
            .collect()
    }

    /// Processed columns with the given role
    pub fn columns_with_role(&self, role: Role) -> Vec<String> {
        self.output
            .iter()
            .filter(|v| v.role == role)
            .map(|v| v.variable.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train() -> DataFrame {
        df!(
            "id" => &[1i64, 2, 3, 4, 5, 6],
            "x" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            "k" => &[3.0, 3.0, 3.0, 3.0, 3.0, 3.0],
            "g" => &["a", "b", "a", "c", "b", "a"],
            "y" => &["no", "yes", "no", "yes", "no", "yes"],
        )
        .unwrap()
    }

    fn recipe() -> Recipe {
        Recipe::new("y")
            .update_role(&["id"], Role::Id)
            .step_dummy(all_nominal_predictors())
            .step_zv(all_predictors())
            .step_normalize(all_numeric_predictors())
    }

    #[test]
    fn test_summary_roles() {
        let summary = recipe().summary(&train()).unwrap();
        let role = |n: &str| summary.iter().find(|v| v.variable == n).unwrap().role;
        assert_eq!(role("id"), Role::Id);
        assert_eq!(role("x"), Role::Predictor);
        assert_eq!(role("y"), Role::Outcome);
    }

    #[test]
    fn test_prep_and_juice() {
        let prepared = recipe().prep(&train()).unwrap();
        let juiced = prepared.juice().unwrap();
        let names = data::column_names(&juiced);
        assert!(names.contains(&"g_b".to_string()));
        assert!(names.contains(&"g_c".to_string()));
        assert!(!names.contains(&"g".to_string()));
        assert!(!names.contains(&"k".to_string()));
        // id column passes through unscaled
        assert_eq!(data::numeric_values(&juiced, "id").unwrap()[0], Some(1.0));
        assert_eq!(prepared.predictors(), vec!["x", "g_b", "g_c"]);
    }

    #[test]
    fn test_bake_without_outcome() {
        let prepared = recipe().prep(&train()).unwrap();
        let new = df!(
            "id" => &[7i64],
            "x" => &[3.5],
            "k" => &[3.0],
            "g" => &["c"],
            "extra" => &[0.0],
        )
        .unwrap();
        let baked = prepared.bake(&new).unwrap();
        assert!(!data::has_column(&baked, "y"));
        assert!(!data::has_column(&baked, "extra"));
        assert!(data::numeric_values(&baked, "x").unwrap()[0].unwrap().abs() < 1e-12);

        // Baked with the training statistics: matches the juiced "c" row
        let juiced = prepared.juice().unwrap();
        assert_eq!(
            data::numeric_values(&baked, "g_c").unwrap()[0],
            data::numeric_values(&juiced, "g_c").unwrap()[3]
        );
    }

    #[test]
    fn test_restored_recipe_bakes_but_cannot_juice() {
        let prepared = recipe().prep(&train()).unwrap();
        let json = serde_json::to_string(&prepared).unwrap();
        let restored: PreparedRecipe = serde_json::from_str(&json).unwrap();

        assert!(matches!(restored.juice(), Err(TabflowError::RecipeError(_))));
        let baked = restored.bake(&train()).unwrap();
        assert_eq!(baked.height(), 6);
        assert_eq!(
            data::column_names(&baked),
            data::column_names(&prepared.juice().unwrap())
        );
    }

    #[test]
    fn test_bake_missing_predictor() {
        let prepared = recipe().prep(&train()).unwrap();
        let new = df!("id" => &[7i64], "x" => &[3.5]).unwrap();
        assert!(matches!(prepared.bake(&new), Err(TabflowError::RecipeError(_))));
    }

    #[test]
    fn test_missing_outcome_column() {
        let df = df!("x" => &[1.0, 2.0]).unwrap();
        assert!(Recipe::new("y").prep(&df).is_err());
    }

    #[test]
    fn test_tidy_out_of_range() {
        let prepared = recipe().prep(&train()).unwrap();
        assert!(prepared.tidy(0).is_ok());
        assert!(prepared.tidy(3).is_err());
    }

    #[test]
    fn test_recipe_serde() {
        let json = serde_json::to_string(&recipe()).unwrap();
        let back: Recipe = serde_json::from_str(&json).unwrap();
        assert_eq!(back, recipe());
    }
}

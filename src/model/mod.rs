//! Model specifications and fitting engines
//!
//! A [`ModelSpec`] names a model family with its main arguments, a mode and
//! the engine that fits it. Fitting produces a [`FittedModel`] with a uniform
//! prediction interface regardless of engine.

pub mod forest;
pub mod linalg;
pub mod linear;
pub mod logistic;
pub mod tree;

use crate::data;
use crate::error::{Result, TabflowError};
use forest::RandomForest;
use linear::LinearRegression;
use logistic::{LogisticRegression, LogisticSolver};
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};
use tree::{DecisionTree, TreeTarget};

/// Prediction task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Classification,
    Regression,
    /// Resolved from the outcome type at fit time
    Unknown,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Classification => write!(f, "classification"),
            Mode::Regression => write!(f, "regression"),
            Mode::Unknown => write!(f, "unknown"),
        }
    }
}

/// Fitting backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Engine {
    Irls,
    GradientDescent,
    Forest,
    Cart,
    LeastSquares,
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Engine::Irls => write!(f, "irls"),
            Engine::GradientDescent => write!(f, "gradient_descent"),
            Engine::Forest => write!(f, "forest"),
            Engine::Cart => write!(f, "cart"),
            Engine::LeastSquares => write!(f, "least_squares"),
        }
    }
}

impl std::str::FromStr for Engine {
    type Err = TabflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "irls" | "glm" => Ok(Engine::Irls),
            "gradient_descent" | "gd" => Ok(Engine::GradientDescent),
            "forest" | "ranger" => Ok(Engine::Forest),
            "cart" | "rpart" => Ok(Engine::Cart),
            "least_squares" | "lm" => Ok(Engine::LeastSquares),
            other => Err(TabflowError::invalid_parameter("engine", other, "unknown engine")),
        }
    }
}

/// Model family with its main arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelFamily {
    LogisticReg {
        penalty: f64,
    },
    RandForest {
        /// Predictors drawn at each split
        mtry: Option<usize>,
        trees: usize,
        /// Smallest node that may be split
        min_n: Option<usize>,
    },
    DecisionTree {
        tree_depth: usize,
        min_n: usize,
    },
    LinearReg {
        penalty: f64,
    },
}

impl ModelFamily {
    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::LogisticReg { .. } => "logistic_reg",
            ModelFamily::RandForest { .. } => "rand_forest",
            ModelFamily::DecisionTree { .. } => "decision_tree",
            ModelFamily::LinearReg { .. } => "linear_reg",
        }
    }

    fn engines(&self) -> &'static [Engine] {
        match self {
            ModelFamily::LogisticReg { .. } => &[Engine::Irls, Engine::GradientDescent],
            ModelFamily::RandForest { .. } => &[Engine::Forest],
            ModelFamily::DecisionTree { .. } => &[Engine::Cart],
            ModelFamily::LinearReg { .. } => &[Engine::LeastSquares],
        }
    }

    fn modes(&self) -> &'static [Mode] {
        match self {
            ModelFamily::LogisticReg { .. } => &[Mode::Classification],
            ModelFamily::LinearReg { .. } => &[Mode::Regression],
            ModelFamily::RandForest { .. } | ModelFamily::DecisionTree { .. } => {
                &[Mode::Classification, Mode::Regression, Mode::Unknown]
            }
        }
    }
}

/// Engine-level arguments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineArgs {
    pub seed: Option<u64>,
    pub num_threads: Option<usize>,
    pub max_iter: Option<usize>,
    pub learning_rate: Option<f64>,
}

/// A model family bound to a mode and an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub family: ModelFamily,
    pub mode: Mode,
    pub engine: Engine,
    #[serde(default)]
    pub args: EngineArgs,
}

/// Logistic regression, fit by IRLS by default
pub fn logistic_reg() -> ModelSpec {
    ModelSpec {
        family: ModelFamily::LogisticReg { penalty: 0.0 },
        mode: Mode::Classification,
        engine: Engine::Irls,
        args: EngineArgs::default(),
    }
}

/// Random forest with 500 trees; mode is taken from the outcome unless set
pub fn rand_forest() -> ModelSpec {
    ModelSpec {
        family: ModelFamily::RandForest {
            mtry: None,
            trees: 500,
            min_n: None,
        },
        mode: Mode::Unknown,
        engine: Engine::Forest,
        args: EngineArgs::default(),
    }
}

pub fn decision_tree() -> ModelSpec {
    ModelSpec {
        family: ModelFamily::DecisionTree {
            tree_depth: 30,
            min_n: 2,
        },
        mode: Mode::Unknown,
        engine: Engine::Cart,
        args: EngineArgs::default(),
    }
}

pub fn linear_reg() -> ModelSpec {
    ModelSpec {
        family: ModelFamily::LinearReg { penalty: 0.0 },
        mode: Mode::Regression,
        engine: Engine::LeastSquares,
        args: EngineArgs::default(),
    }
}

impl ModelSpec {
    /// Choose the fitting engine; it must belong to the family
    pub fn set_engine(mut self, engine: Engine) -> Result<Self> {
        if !self.family.engines().contains(&engine) {
            return Err(TabflowError::invalid_parameter(
                "engine",
                engine,
                format!("not available for {}", self.family.name()),
            ));
        }
        self.engine = engine;
        Ok(self)
    }

    /// Choose the mode; it must be one the family can fit
    pub fn set_mode(mut self, mode: Mode) -> Result<Self> {
        if !self.family.modes().contains(&mode) {
            return Err(TabflowError::invalid_parameter(
                "mode",
                mode,
                format!("not supported by {}", self.family.name()),
            ));
        }
        self.mode = mode;
        Ok(self)
    }

    /// Check that the engine and mode belong to the family
    pub fn validate(&self) -> Result<()> {
        if !self.family.engines().contains(&self.engine) {
            return Err(TabflowError::invalid_parameter(
                "engine",
                self.engine,
                format!("not available for {}", self.family.name()),
            ));
        }
        if !self.family.modes().contains(&self.mode) {
            return Err(TabflowError::invalid_parameter(
                "mode",
                self.mode,
                format!("not supported by {}", self.family.name()),
            ));
        }
        Ok(())
    }

    pub fn with_penalty(mut self, value: f64) -> Self {
        match &mut self.family {
            ModelFamily::LogisticReg { penalty } | ModelFamily::LinearReg { penalty } => {
                *penalty = value
            }
            other => warn!(family = other.name(), "penalty is ignored by this model"),
        }
        self
    }

    pub fn with_trees(mut self, value: usize) -> Self {
        match &mut self.family {
            ModelFamily::RandForest { trees, .. } => *trees = value,
            other => warn!(family = other.name(), "trees is ignored by this model"),
        }
        self
    }

    pub fn with_mtry(mut self, value: usize) -> Self {
        match &mut self.family {
            ModelFamily::RandForest { mtry, .. } => *mtry = Some(value),
            other => warn!(family = other.name(), "mtry is ignored by this model"),
        }
        self
    }

    pub fn with_min_n(mut self, value: usize) -> Self {
        match &mut self.family {
            ModelFamily::RandForest { min_n, .. } => *min_n = Some(value),
            ModelFamily::DecisionTree { min_n, .. } => *min_n = value,
            other => warn!(family = other.name(), "min_n is ignored by this model"),
        }
        self
    }

    pub fn with_tree_depth(mut self, value: usize) -> Self {
        match &mut self.family {
            ModelFamily::DecisionTree { tree_depth, .. } => *tree_depth = value,
            other => warn!(family = other.name(), "tree_depth is ignored by this model"),
        }
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.args.seed = Some(seed);
        self
    }

    pub fn with_num_threads(mut self, n: usize) -> Self {
        self.args.num_threads = Some(n);
        self
    }

    pub fn with_max_iter(mut self, n: usize) -> Self {
        self.args.max_iter = Some(n);
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.args.learning_rate = Some(lr);
        self
    }

    /// Short description, e.g. `rand_forest (classification, forest)`
    pub fn describe(&self) -> String {
        format!("{} ({}, {})", self.family.name(), self.mode, self.engine)
    }

    fn resolve_mode(&self, y: &Outcome) -> Result<Mode> {
        let wanted = match y {
            Outcome::Classes { .. } => Mode::Classification,
            Outcome::Numeric(_) => Mode::Regression,
        };
        match self.mode {
            Mode::Unknown => Ok(wanted),
            mode if mode == wanted => Ok(mode),
            mode => Err(TabflowError::ValidationError(format!(
                "{} in {} mode needs a {} outcome",
                self.family.name(),
                mode,
                if mode == Mode::Classification { "nominal" } else { "numeric" }
            ))),
        }
    }

    /// Fit on a numeric design matrix
    pub fn fit_xy(&self, x: &Array2<f64>, y: &Outcome) -> Result<FittedModel> {
        let start = Instant::now();
        if x.nrows() != y.len() {
            return Err(TabflowError::ShapeError {
                expected: format!("{} outcome values", x.nrows()),
                actual: format!("{} outcome values", y.len()),
            });
        }
        if x.nrows() == 0 {
            return Err(TabflowError::TrainingError("no training rows".to_string()));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(TabflowError::TrainingError(
                "predictors contain non-finite values".to_string(),
            ));
        }
        let mode = self.resolve_mode(y)?;
        let p = x.ncols();

        let fit = match (&self.family, y) {
            (ModelFamily::LogisticReg { penalty }, Outcome::Classes { levels, codes }) => {
                if levels.len() != 2 {
                    return Err(TabflowError::ValidationError(format!(
                        "logistic regression needs exactly 2 outcome levels, got {}",
                        levels.len()
                    )));
                }
                let solver = match self.engine {
                    Engine::GradientDescent => LogisticSolver::GradientDescent,
                    _ => LogisticSolver::Irls,
                };
                let mut model = LogisticRegression::new(solver).with_alpha(*penalty);
                if let Some(n) = self.args.max_iter {
                    model = model.with_max_iter(n);
                }
                if let Some(lr) = self.args.learning_rate {
                    model = model.with_learning_rate(lr);
                }
                let target = Array1::from_iter(codes.iter().map(|&c| c as f64));
                model.fit(x, &target)?;
                EngineFit::Logistic(model)
            }
            (ModelFamily::LinearReg { penalty }, Outcome::Numeric(values)) => {
                let mut model = LinearRegression::new().with_alpha(*penalty);
                model.fit(x, &Array1::from_vec(values.clone()))?;
                EngineFit::Linear(model)
            }
            (ModelFamily::RandForest { mtry, trees, min_n }, _) => {
                let classification = mode == Mode::Classification;
                let default_mtry = if classification {
                    ((p as f64).sqrt().floor() as usize).max(1)
                } else {
                    (p / 3).max(1)
                };
                let default_min_n = if classification { 1 } else { 5 };
                let mtry = mtry.unwrap_or(default_mtry);
                if mtry > p {
                    warn!(mtry, predictors = p, "mtry exceeds the number of predictors, using all");
                }

                let mut model = if classification {
                    RandomForest::new_classifier(*trees)
                } else {
                    RandomForest::new_regressor(*trees)
                };
                model = model
                    .with_max_features(mtry.min(p))
                    .with_min_samples_split(min_n.unwrap_or(default_min_n));
                if let Some(seed) = self.args.seed {
                    model = model.with_random_state(seed);
                }
                if let Some(n) = self.args.num_threads {
                    model = model.with_num_threads(n);
                }
                model.fit(x, y.tree_target())?;
                EngineFit::Forest(model)
            }
            (ModelFamily::DecisionTree { tree_depth, min_n }, _) => {
                let mut model = if mode == Mode::Classification {
                    DecisionTree::new_classifier()
                } else {
                    DecisionTree::new_regressor()
                };
                model = model.with_max_depth(*tree_depth).with_min_samples_split(*min_n);
                if let Some(seed) = self.args.seed {
                    model = model.with_random_state(seed);
                }
                model.fit(x, y.tree_target())?;
                EngineFit::Tree(model)
            }
            (family, _) => {
                return Err(TabflowError::ValidationError(format!(
                    "{} cannot fit this outcome type",
                    family.name()
                )))
            }
        };

        debug!(
            model = %self.describe(),
            rows = x.nrows(),
            predictors = p,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fitted model"
        );

        Ok(FittedModel {
            spec: ModelSpec { mode, ..self.clone() },
            levels: y.levels().map(|l| l.to_vec()),
            n_features: p,
            fit,
        })
    }
}

/// Outcome values for fitting
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Class codes indexing into `levels`
    Classes { levels: Vec<String>, codes: Vec<usize> },
    Numeric(Vec<f64>),
}

impl Outcome {
    /// Nominal outcome from a column; levels are its sorted distinct values
    pub fn classes_from(df: &DataFrame, column: &str) -> Result<Self> {
        let levels = data::levels(df, column)?;
        Self::classes_with_levels(df, column, levels)
    }

    /// Nominal outcome with a fixed level set
    pub fn classes_with_levels(df: &DataFrame, column: &str, levels: Vec<String>) -> Result<Self> {
        let codes = data::string_values(df, column)?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                let v = v.ok_or_else(|| {
                    TabflowError::DataError(format!("outcome '{}' is missing at row {}", column, row))
                })?;
                levels.iter().position(|l| *l == v).ok_or_else(|| {
                    TabflowError::DataError(format!("outcome '{}' has unknown level '{}'", column, v))
                })
            })
            .collect::<Result<Vec<usize>>>()?;
        Ok(Outcome::Classes { levels, codes })
    }

    /// Numeric outcome from a column
    pub fn numeric_from(df: &DataFrame, column: &str) -> Result<Self> {
        let values = data::numeric_values(df, column)?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.filter(|x| x.is_finite()).ok_or_else(|| {
                    TabflowError::DataError(format!("outcome '{}' is missing at row {}", column, row))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(Outcome::Numeric(values))
    }

    pub fn len(&self) -> usize {
        match self {
            Outcome::Classes { codes, .. } => codes.len(),
            Outcome::Numeric(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn levels(&self) -> Option<&[String]> {
        match self {
            Outcome::Classes { levels, .. } => Some(levels),
            Outcome::Numeric(_) => None,
        }
    }

    fn tree_target(&self) -> TreeTarget<'_> {
        match self {
            Outcome::Classes { levels, codes } => TreeTarget::Classes {
                codes,
                n_classes: levels.len(),
            },
            Outcome::Numeric(v) => TreeTarget::Numeric(v),
        }
    }
}

/// Engine state of a fitted model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "engine", content = "state", rename_all = "snake_case")]
pub enum EngineFit {
    Logistic(LogisticRegression),
    Linear(LinearRegression),
    Tree(DecisionTree),
    Forest(RandomForest),
}

/// Intercept and per-predictor weights of a linear model
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficients {
    pub intercept: f64,
    pub weights: Array1<f64>,
}

/// A fitted model with a uniform prediction interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    spec: ModelSpec,
    levels: Option<Vec<String>>,
    n_features: usize,
    fit: EngineFit,
}

impl FittedModel {
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn mode(&self) -> Mode {
        self.spec.mode
    }

    /// Outcome levels (classification only)
    pub fn levels(&self) -> Option<&[String]> {
        self.levels.as_deref()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn engine_fit(&self) -> &EngineFit {
        &self.fit
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.n_features {
            return Err(TabflowError::ShapeError {
                expected: format!("{} predictors", self.n_features),
                actual: format!("{} predictors", x.ncols()),
            });
        }
        Ok(())
    }

    /// Class probabilities, one column per level in level order
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x)?;
        if self.spec.mode != Mode::Classification {
            return Err(TabflowError::ValidationError(
                "class probabilities need a classification model".to_string(),
            ));
        }
        match &self.fit {
            EngineFit::Logistic(m) => {
                let p = m.predict_proba(x)?;
                let mut proba = Array2::<f64>::zeros((x.nrows(), 2));
                for (i, &pi) in p.iter().enumerate() {
                    proba[[i, 0]] = 1.0 - pi;
                    proba[[i, 1]] = pi;
                }
                Ok(proba)
            }
            EngineFit::Tree(m) => m.predict_proba(x),
            EngineFit::Forest(m) => m.predict_proba(x),
            EngineFit::Linear(_) => Err(TabflowError::ValidationError(
                "linear regression has no class probabilities".to_string(),
            )),
        }
    }

    /// Most probable level per row; ties go to the earlier level
    pub fn predict_class(&self, x: &Array2<f64>) -> Result<Vec<String>> {
        let proba = self.predict_proba(x)?;
        let levels = self.levels.as_deref().ok_or(TabflowError::ModelNotFitted)?;
        Ok(proba
            .outer_iter()
            .map(|row| {
                let mut best = 0;
                for (j, &p) in row.iter().enumerate() {
                    if p > row[best] {
                        best = j;
                    }
                }
                levels[best].clone()
            })
            .collect())
    }

    /// Numeric predictions (regression only)
    pub fn predict_numeric(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_width(x)?;
        if self.spec.mode != Mode::Regression {
            return Err(TabflowError::ValidationError(
                "numeric predictions need a regression model".to_string(),
            ));
        }
        match &self.fit {
            EngineFit::Linear(m) => m.predict(x),
            EngineFit::Tree(m) => m.predict_numeric(x),
            EngineFit::Forest(m) => m.predict_numeric(x),
            EngineFit::Logistic(_) => Err(TabflowError::ValidationError(
                "logistic regression has no numeric predictions".to_string(),
            )),
        }
    }

    /// Impurity-based importances of tree models
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        match &self.fit {
            EngineFit::Tree(m) => m.feature_importances().cloned(),
            EngineFit::Forest(m) => m.feature_importances().cloned(),
            _ => None,
        }
    }

    /// Coefficients of linear models
    pub fn coefficients(&self) -> Option<Coefficients> {
        let (intercept, weights) = match &self.fit {
            EngineFit::Logistic(m) => (m.intercept?, m.coefficients.clone()?),
            EngineFit::Linear(m) => (m.intercept?, m.coefficients.clone()?),
            _ => return None,
        };
        Some(Coefficients { intercept, weights })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use polars::prelude::*;

    fn binary() -> (Array2<f64>, Outcome) {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0]];
        let y = Outcome::Classes {
            levels: vec!["no".to_string(), "yes".to_string()],
            codes: vec![0, 0, 1, 0, 1, 0, 1, 1],
        };
        (x, y)
    }

    #[test]
    fn test_set_engine_and_mode_validation() {
        assert!(logistic_reg().set_engine(Engine::GradientDescent).is_ok());
        assert!(logistic_reg().set_engine(Engine::Forest).is_err());
        assert!(logistic_reg().set_mode(Mode::Regression).is_err());
        assert!(rand_forest().set_mode(Mode::Regression).is_ok());
        assert!(linear_reg().set_mode(Mode::Classification).is_err());
    }

    #[test]
    fn test_logistic_probabilities() {
        let (x, y) = binary();
        let fit = logistic_reg().fit_xy(&x, &y).unwrap();
        let proba = fit.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 2);
        for row in proba.outer_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        // Positive slope: the second level becomes more likely with x
        assert!(proba[[7, 1]] > proba[[0, 1]]);
        assert!(fit.coefficients().unwrap().weights[0] > 0.0);
        assert!(fit.feature_importances().is_none());
    }

    #[test]
    fn test_logistic_rejects_multiclass() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = Outcome::Classes {
            levels: vec!["a".into(), "b".into(), "c".into()],
            codes: vec![0, 1, 2],
        };
        assert!(logistic_reg().fit_xy(&x, &y).is_err());
    }

    #[test]
    fn test_forest_mode_resolved_from_outcome() {
        let (x, y) = binary();
        let fit = rand_forest().with_trees(10).with_seed(1).fit_xy(&x, &y).unwrap();
        assert_eq!(fit.mode(), Mode::Classification);
        assert_eq!(fit.predict_class(&x).unwrap().len(), 8);
        assert!(fit.predict_numeric(&x).is_err());
    }

    #[test]
    fn test_mode_mismatch() {
        let (x, _) = binary();
        let y = Outcome::Numeric(vec![0.0; 8]);
        assert!(logistic_reg().fit_xy(&x, &y).is_err());
        let spec = rand_forest().set_mode(Mode::Classification).unwrap();
        assert!(spec.fit_xy(&x, &y).is_err());
    }

    #[test]
    fn test_tree_regression() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = Outcome::Numeric(vec![1.0, 1.0, 5.0, 5.0]);
        let fit = decision_tree().fit_xy(&x, &y).unwrap();
        assert_eq!(fit.predict_numeric(&x).unwrap()[3], 5.0);
    }

    #[test]
    fn test_non_finite_predictors_rejected() {
        let x = array![[f64::NAN], [1.0]];
        let y = Outcome::Numeric(vec![1.0, 2.0]);
        assert!(linear_reg().fit_xy(&x, &y).is_err());
    }

    #[test]
    fn test_width_checked_at_predict() {
        let (x, y) = binary();
        let fit = logistic_reg().fit_xy(&x, &y).unwrap();
        assert!(fit.predict_proba(&array![[1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_predict_class_tie_goes_to_first_level() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = Outcome::Classes {
            levels: vec!["a".into(), "b".into()],
            codes: vec![0, 1, 0, 1],
        };
        let fit = decision_tree().with_tree_depth(0).fit_xy(&x, &y).unwrap();
        assert_eq!(fit.predict_class(&array![[1.5]]).unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_outcome_from_frame() {
        let df = df!("y" => &["b", "a", "b"]).unwrap();
        let y = Outcome::classes_from(&df, "y").unwrap();
        assert_eq!(y, Outcome::Classes {
            levels: vec!["a".into(), "b".into()],
            codes: vec![1, 0, 1],
        });
        let df = df!("y" => &[Some("a"), None]).unwrap();
        assert!(Outcome::classes_from(&df, "y").is_err());
    }

    #[test]
    fn test_engine_from_str() {
        assert_eq!("ranger".parse::<Engine>().unwrap(), Engine::Forest);
        assert!("xgboost".parse::<Engine>().is_err());
    }

    #[test]
    fn test_spec_serde() {
        let spec = rand_forest().with_trees(100).with_num_threads(4);
        let json = serde_json::to_string(&spec).unwrap();
        let back: ModelSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}

//! tabflow - tabular modeling pipelines
//!
//! Split a data frame, describe preprocessing as a recipe, pair it with a
//! model specification in a workflow, then fit, predict and evaluate. The
//! same workflow can be resampled with v-fold cross-validation and compared
//! against others.
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - CSV loading, column access and summaries
//! - [`split`] - Initial train/test splits and v-fold resampling
//!
//! ## Modeling
//! - [`recipe`] - Declarative preprocessing steps with a prep/bake lifecycle
//! - [`model`] - Model specifications and their fitting engines
//! - [`workflow`] - Recipe plus model, fitted and used as one object
//!
//! ## Evaluation
//! - [`metrics`] - Classification, probability and regression metrics
//! - [`resample`] - Resampled performance and model comparison
//!
//! ## Interfaces
//! - [`config`] - JSON pipeline configuration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod data;
pub mod split;

// Modeling
pub mod recipe;
pub mod model;
pub mod workflow;

// Evaluation
pub mod metrics;
pub mod resample;

// Interfaces
pub mod config;
pub mod cli;

pub use error::{Result, TabflowError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, TabflowError};

    // Data
    pub use crate::data::{DataLoader, DataSaver, DatasetSummary};
    pub use crate::split::{initial_split, vfold_cv, InitialSplit, Resamples, SplitConfig, VfoldConfig};

    // Recipes
    pub use crate::recipe::{
        all_nominal, all_nominal_predictors, all_numeric, all_numeric_predictors, all_outcomes,
        all_predictors, columns, PreparedRecipe, Recipe, Role, Selector, Step,
    };

    // Models
    pub use crate::model::{
        decision_tree, linear_reg, logistic_reg, rand_forest, Engine, FittedModel, Mode, ModelSpec,
    };

    // Workflows
    pub use crate::workflow::{last_fit, FittedWorkflow, LastFit, PredictType, Workflow};

    // Metrics
    pub use crate::metrics::{ConfusionMatrix, Metric, MetricEstimate, MetricSet, RocCurve};

    // Resampling
    pub use crate::resample::{
        compare_workflows, fit_resamples, MetricSummary, ModelComparison, ResampleControl,
        ResampleResults,
    };

    // Configuration
    pub use crate::config::{NamedModel, PipelineConfig};
}

//! Data splitting
//!
//! Provides:
//! - An initial train/test split, optionally stratified
//! - V-fold cross-validation resamples, optionally stratified and repeated
//! - The index-level `CrossValidator` both are built on

pub mod cross_validation;
pub mod strata;

pub use cross_validation::{CVSplit, CVStrategy, CrossValidator};
pub use strata::make_strata;

use crate::data;
use crate::error::{Result, TabflowError};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for the initial train/test split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Proportion of rows assigned to training
    pub prop: f64,
    /// Column to stratify on
    pub strata: Option<String>,
    /// Quantile bins for a numeric strata column
    pub breaks: usize,
    /// Strata smaller than this share of rows are pooled
    pub pool: f64,
    /// Random seed
    pub seed: Option<u64>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            prop: 0.75,
            strata: None,
            breaks: 4,
            pool: 0.1,
            seed: None,
        }
    }
}

impl SplitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prop(mut self, prop: f64) -> Self {
        self.prop = prop;
        self
    }

    pub fn with_strata(mut self, column: impl Into<String>) -> Self {
        self.strata = Some(column.into());
        self
    }

    pub fn with_breaks(mut self, breaks: usize) -> Self {
        self.breaks = breaks;
        self
    }

    pub fn with_pool(mut self, pool: f64) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

fn make_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

fn row_groups(
    df: &DataFrame,
    strata: Option<&str>,
    breaks: usize,
    pool: f64,
) -> Result<Option<Vec<usize>>> {
    match strata {
        Some(column) => Ok(Some(make_strata(df, column, breaks, pool)?)),
        None => Ok(None),
    }
}

/// Disjoint training and testing row indices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialSplit {
    train: Vec<usize>,
    test: Vec<usize>,
    n: usize,
}

impl InitialSplit {
    /// Training rows of `df`
    pub fn training(&self, df: &DataFrame) -> Result<DataFrame> {
        self.check_height(df)?;
        data::take_rows(df, &self.train)
    }

    /// Testing rows of `df`
    pub fn testing(&self, df: &DataFrame) -> Result<DataFrame> {
        self.check_height(df)?;
        data::take_rows(df, &self.test)
    }

    pub fn train_indices(&self) -> &[usize] {
        &self.train
    }

    pub fn test_indices(&self) -> &[usize] {
        &self.test
    }

    /// Number of rows in the split data
    pub fn n(&self) -> usize {
        self.n
    }

    fn check_height(&self, df: &DataFrame) -> Result<()> {
        if df.height() != self.n {
            return Err(TabflowError::ShapeError {
                expected: format!("{} rows", self.n),
                actual: format!("{} rows", df.height()),
            });
        }
        Ok(())
    }
}

/// Split rows into training and testing sets.
///
/// Each stratum (or the whole frame when unstratified) is shuffled and its
/// first `floor(len * prop)` rows go to training.
pub fn initial_split(df: &DataFrame, config: &SplitConfig) -> Result<InitialSplit> {
    if !(config.prop > 0.0 && config.prop < 1.0) {
        return Err(TabflowError::invalid_parameter("prop", config.prop, "must be in (0, 1)"));
    }
    let n = df.height();
    if n < 2 {
        return Err(TabflowError::ValidationError(format!(
            "at least 2 rows are required to split, got {}",
            n
        )));
    }

    let groups = match row_groups(df, config.strata.as_deref(), config.breaks, config.pool)? {
        Some(codes) => strata::group_by_stratum(&codes),
        None => vec![(0..n).collect()],
    };

    let mut rng = make_rng(config.seed);
    let mut train = Vec::with_capacity(n);
    let mut test = Vec::with_capacity(n);

    for mut group in groups {
        group.shuffle(&mut rng);
        let n_train = (group.len() as f64 * config.prop).floor() as usize;
        train.extend_from_slice(&group[..n_train]);
        test.extend_from_slice(&group[n_train..]);
    }

    if train.is_empty() || test.is_empty() {
        return Err(TabflowError::ValidationError(format!(
            "split of {} rows with prop {} leaves an empty {} set",
            n,
            config.prop,
            if train.is_empty() { "training" } else { "testing" }
        )));
    }

    train.sort_unstable();
    test.sort_unstable();

    debug!(train = train.len(), test = test.len(), "Initial split");
    Ok(InitialSplit { train, test, n })
}

/// Configuration for v-fold cross-validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VfoldConfig {
    pub v: usize,
    pub repeats: usize,
    pub strata: Option<String>,
    pub breaks: usize,
    pub pool: f64,
    pub seed: Option<u64>,
}

impl Default for VfoldConfig {
    fn default() -> Self {
        Self {
            v: 10,
            repeats: 1,
            strata: None,
            breaks: 4,
            pool: 0.1,
            seed: None,
        }
    }
}

impl VfoldConfig {
    pub fn new(v: usize) -> Self {
        Self {
            v,
            ..Self::default()
        }
    }

    pub fn with_repeats(mut self, repeats: usize) -> Self {
        self.repeats = repeats;
        self
    }

    pub fn with_strata(mut self, column: impl Into<String>) -> Self {
        self.strata = Some(column.into());
        self
    }

    pub fn with_breaks(mut self, breaks: usize) -> Self {
        self.breaks = breaks;
        self
    }

    pub fn with_pool(mut self, pool: f64) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// One resample: analysis rows for fitting, assessment rows for evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fold {
    pub id: String,
    pub analysis: Vec<usize>,
    pub assessment: Vec<usize>,
}

impl Fold {
    pub fn analysis(&self, df: &DataFrame) -> Result<DataFrame> {
        data::take_rows(df, &self.analysis)
    }

    pub fn assessment(&self, df: &DataFrame) -> Result<DataFrame> {
        data::take_rows(df, &self.assessment)
    }
}

/// A set of folds over a frame of `n` rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resamples {
    pub folds: Vec<Fold>,
    pub n: usize,
}

impl Resamples {
    pub fn len(&self) -> usize {
        self.folds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.folds.iter().map(|f| f.id.as_str()).collect()
    }
}

/// Zero-padded label: `padded_label("Fold", 3, 10)` is `Fold03`
fn padded_label(prefix: &str, i: usize, total: usize) -> String {
    let width = total.to_string().len();
    format!("{}{:0width$}", prefix, i, width = width)
}

/// Create v-fold cross-validation resamples
pub fn vfold_cv(df: &DataFrame, config: &VfoldConfig) -> Result<Resamples> {
    if config.repeats == 0 {
        return Err(TabflowError::invalid_parameter("repeats", config.repeats, "must be at least 1"));
    }
    let n = df.height();
    let strata = row_groups(df, config.strata.as_deref(), config.breaks, config.pool)?;

    let mut cv = CrossValidator::new(CVStrategy::RepeatedKFold {
        n_splits: config.v,
        n_repeats: config.repeats,
        shuffle: true,
    });
    if let Some(seed) = config.seed {
        cv = cv.with_random_state(seed);
    }

    let folds: Vec<Fold> = cv
        .split(n, strata.as_deref())?
        .into_iter()
        .map(|split| {
            let repeat = split.fold_idx / config.v;
            let fold_label = padded_label("Fold", split.fold_idx % config.v + 1, config.v);
            let id = if config.repeats > 1 {
                format!("{}_{}", padded_label("Repeat", repeat + 1, config.repeats), fold_label)
            } else {
                fold_label
            };
            Fold {
                id,
                analysis: split.train_indices,
                assessment: split.test_indices,
            }
        })
        .collect();

    debug!(folds = folds.len(), rows = n, "Created v-fold resamples");
    Ok(Resamples { folds, n })
}

//! Random forest over bootstrap CART trees

use super::tree::{DecisionTree, TreeTarget};
use crate::error::{Result, TabflowError};
use ndarray::{Array1, Array2};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    /// Features drawn at each split
    pub max_features: usize,
    pub min_samples_split: usize,
    pub max_depth: Option<usize>,
    pub bootstrap: bool,
    pub random_state: Option<u64>,
    /// Size of a dedicated rayon pool; the global pool when `None`
    pub num_threads: Option<usize>,
    is_classification: bool,
    n_features: usize,
    n_classes: usize,
    feature_importances: Option<Array1<f64>>,
}

impl RandomForest {
    pub fn new_classifier(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_features: 1,
            min_samples_split: 2,
            max_depth: None,
            bootstrap: true,
            random_state: None,
            num_threads: None,
            is_classification: true,
            n_features: 0,
            n_classes: 0,
            feature_importances: None,
        }
    }

    pub fn new_regressor(n_estimators: usize) -> Self {
        Self {
            is_classification: false,
            min_samples_split: 5,
            ..Self::new_classifier(n_estimators)
        }
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = max_features.max(1);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n.max(1));
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Grow `n_estimators` trees in parallel, each on its own bootstrap sample
    pub fn fit(&mut self, x: &Array2<f64>, target: TreeTarget) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(TabflowError::TrainingError("no training rows".to_string()));
        }
        if self.n_estimators == 0 {
            return Err(TabflowError::invalid_parameter("trees", 0, "must be at least 1"));
        }
        match (&target, self.is_classification) {
            (TreeTarget::Classes { n_classes, .. }, true) => self.n_classes = *n_classes,
            (TreeTarget::Numeric(_), false) => self.n_classes = 0,
            _ => {
                return Err(TabflowError::ValidationError(
                    "forest mode does not match the target type".to_string(),
                ))
            }
        }
        self.n_features = x.ncols();
        let max_features = self.max_features.min(self.n_features).max(1);

        let base_seed = match self.random_state {
            Some(seed) => seed,
            None => ChaCha8Rng::from_entropy().next_u64(),
        };

        let grow = || -> Result<Vec<DecisionTree>> {
            (0..self.n_estimators)
                .into_par_iter()
                .map(|tree_idx| -> Result<DecisionTree> {
                    let seed = base_seed.wrapping_add(tree_idx as u64);
                    let mut rng = ChaCha8Rng::seed_from_u64(seed);

                    let sample: Vec<usize> = if self.bootstrap {
                        (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                    } else {
                        (0..n_samples).collect()
                    };

                    let base = if self.is_classification {
                        DecisionTree::new_classifier()
                    } else {
                        DecisionTree::new_regressor()
                    };
                    let mut tree = base
                        .with_min_samples_split(self.min_samples_split)
                        .with_max_features(max_features)
                        .with_random_state(rng.next_u64());
                    if let Some(d) = self.max_depth {
                        tree = tree.with_max_depth(d);
                    }

                    tree.fit_on(x, target, &sample)?;
                    Ok(tree)
                })
                .collect()
        };

        let trees = match self.num_threads {
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()?
                .install(grow)?,
            None => grow()?,
        };

        debug!(trees = trees.len(), max_features, "Grew random forest");
        self.trees = trees;
        self.compute_feature_importances();
        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        let mut total = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (t, v) in total.iter_mut().zip(imp.iter()) {
                    *t += v;
                }
            }
        }
        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            for t in &mut total {
                *t /= sum;
            }
        }
        self.feature_importances = Some(Array1::from_vec(total));
    }

    /// Mean over trees of the leaf class proportions
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(TabflowError::ModelNotFitted);
        }
        if !self.is_classification {
            return Err(TabflowError::ValidationError(
                "class probabilities require a classification forest".to_string(),
            ));
        }

        let per_tree: Vec<Array2<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<Vec<_>>>()?;

        let mut proba = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for p in &per_tree {
            proba += p;
        }
        proba /= per_tree.len() as f64;
        Ok(proba)
    }

    /// Mean over trees of the leaf means
    pub fn predict_numeric(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(TabflowError::ModelNotFitted);
        }
        if self.is_classification {
            return Err(TabflowError::ValidationError(
                "numeric predictions require a regression forest".to_string(),
            ));
        }

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_numeric(x))
            .collect::<Result<Vec<_>>>()?;

        let mut pred = Array1::<f64>::zeros(x.nrows());
        for p in &per_tree {
            pred += p;
        }
        pred /= per_tree.len() as f64;
        Ok(pred)
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }
}

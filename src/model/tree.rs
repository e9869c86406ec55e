//! CART decision trees

use crate::error::{Result, TabflowError};
use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Class proportions (classification) or a one-element mean (regression)
    Leaf { value: Vec<f64>, n_samples: usize },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    Gini,
    /// Variance, for regression
    Mse,
}

/// Training target of a tree
#[derive(Debug, Clone, Copy)]
pub enum TreeTarget<'a> {
    Classes { codes: &'a [usize], n_classes: usize },
    Numeric(&'a [f64]),
}

impl TreeTarget<'_> {
    fn len(&self) -> usize {
        match self {
            TreeTarget::Classes { codes, .. } => codes.len(),
            TreeTarget::Numeric(y) => y.len(),
        }
    }
}

/// Running sufficient statistics of a node
#[derive(Debug, Clone)]
struct NodeStats {
    count: usize,
    class_counts: Vec<usize>,
    sum: f64,
    sq_sum: f64,
}

impl NodeStats {
    fn new(n_classes: usize) -> Self {
        Self {
            count: 0,
            class_counts: vec![0; n_classes],
            sum: 0.0,
            sq_sum: 0.0,
        }
    }

    fn add(&mut self, target: &TreeTarget, i: usize, sign: i64) {
        match target {
            TreeTarget::Classes { codes, .. } => {
                let c = &mut self.class_counts[codes[i]];
                *c = (*c as i64 + sign) as usize;
            }
            TreeTarget::Numeric(y) => {
                self.sum += sign as f64 * y[i];
                self.sq_sum += sign as f64 * y[i] * y[i];
            }
        }
        self.count = (self.count as i64 + sign) as usize;
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        match criterion {
            Criterion::Gini => 1.0 - self.class_counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>(),
            Criterion::Mse => (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0),
        }
    }

    fn leaf_value(&self, criterion: Criterion) -> Vec<f64> {
        let n = self.count.max(1) as f64;
        match criterion {
            Criterion::Gini => self.class_counts.iter().map(|&c| c as f64 / n).collect(),
            Criterion::Mse => vec![self.sum / n],
        }
    }
}

/// CART tree with optional random feature subsets per split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Candidate features drawn at each split; all features when `None`
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    pub random_state: Option<u64>,
    n_features: usize,
    n_classes: usize,
    feature_importances: Option<Array1<f64>>,
}

impl DecisionTree {
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            n_classes: 0,
            feature_importances: None,
        }
    }

    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::Mse,
            ..Self::new_classifier()
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Grow the tree on all rows of `x`
    pub fn fit(&mut self, x: &Array2<f64>, target: TreeTarget) -> Result<&mut Self> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_on(x, target, &indices)
    }

    /// Grow the tree on the given rows (duplicates allowed, as in a bootstrap sample)
    pub fn fit_on(&mut self, x: &Array2<f64>, target: TreeTarget, indices: &[usize]) -> Result<&mut Self> {
        if x.nrows() != target.len() {
            return Err(TabflowError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", target.len()),
            });
        }
        if indices.is_empty() {
            return Err(TabflowError::TrainingError("no training rows".to_string()));
        }
        match (&target, self.criterion) {
            (TreeTarget::Classes { n_classes, codes }, Criterion::Gini) => {
                if codes.iter().any(|&c| c >= *n_classes) {
                    return Err(TabflowError::ValidationError("class code out of range".to_string()));
                }
                self.n_classes = *n_classes;
            }
            (TreeTarget::Numeric(_), Criterion::Mse) => self.n_classes = 0,
            _ => {
                return Err(TabflowError::ValidationError(
                    "tree criterion does not match the target type".to_string(),
                ))
            }
        }

        self.n_features = x.ncols();
        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let mut importances = vec![0.0; self.n_features];
        let root = self.build(x, &target, indices.to_vec(), 0, &mut importances, &mut rng);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(self)
    }

    fn stats(&self, target: &TreeTarget, indices: &[usize]) -> NodeStats {
        let mut stats = NodeStats::new(self.n_classes);
        for &i in indices {
            stats.add(target, i, 1);
        }
        stats
    }

    fn build(
        &self,
        x: &Array2<f64>,
        target: &TreeTarget,
        indices: Vec<usize>,
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let stats = self.stats(target, &indices);
        let n_samples = indices.len();
        let impurity = stats.impurity(self.criterion);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;
        if should_stop {
            return TreeNode::Leaf {
                value: stats.leaf_value(self.criterion),
                n_samples,
            };
        }

        let features: Vec<usize> = match self.max_features {
            Some(m) if m < self.n_features => sample(rng, self.n_features, m).into_vec(),
            _ => (0..self.n_features).collect(),
        };

        match self.best_split(x, target, &indices, &features, &stats) {
            Some((feature_idx, threshold, gain)) => {
                let (left, right): (Vec<usize>, Vec<usize>) =
                    indices.iter().partition(|&&i| x[[i, feature_idx]] <= threshold);

                importances[feature_idx] += n_samples as f64 * gain;

                let left = Box::new(self.build(x, target, left, depth + 1, importances, rng));
                let right = Box::new(self.build(x, target, right, depth + 1, importances, rng));
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    n_samples,
                }
            }
            None => TreeNode::Leaf {
                value: stats.leaf_value(self.criterion),
                n_samples,
            },
        }
    }

    /// Best (feature, threshold, impurity decrease) by a sorted sweep per feature
    fn best_split(
        &self,
        x: &Array2<f64>,
        target: &TreeTarget,
        indices: &[usize],
        features: &[usize],
        parent: &NodeStats,
    ) -> Option<(usize, f64, f64)> {
        let n = indices.len() as f64;
        let parent_impurity = parent.impurity(self.criterion);

        let candidates: Vec<(usize, f64, f64)> = features
            .par_iter()
            .filter_map(|&feature_idx| {
                let mut order: Vec<usize> = indices.to_vec();
                order.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

                let mut left = NodeStats::new(self.n_classes);
                let mut right = parent.clone();
                let mut best: Option<(f64, f64)> = None;

                for pos in 0..order.len() - 1 {
                    let i = order[pos];
                    left.add(target, i, 1);
                    right.add(target, i, -1);

                    let here = x[[i, feature_idx]];
                    let next = x[[order[pos + 1], feature_idx]];
                    if here == next {
                        continue;
                    }
                    if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                        continue;
                    }

                    let weighted = (left.count as f64 * left.impurity(self.criterion)
                        + right.count as f64 * right.impurity(self.criterion))
                        / n;
                    let gain = parent_impurity - weighted;
                    if gain > 1e-12 && best.map_or(true, |(g, _)| gain > g) {
                        best = Some((gain, (here + next) / 2.0));
                    }
                }

                best.map(|(gain, threshold)| (feature_idx, threshold, gain))
            })
            .collect();

        // Ties go to the lowest feature index for reproducibility
        candidates.into_iter().fold(None, |best, c| match best {
            Some(b) if b.2 > c.2 || (b.2 == c.2 && b.0 < c.0) => Some(b),
            _ => Some(c),
        })
    }

    fn leaf<'a>(&'a self, row: ndarray::ArrayView1<f64>) -> Result<&'a [f64]> {
        let mut node = self.root.as_ref().ok_or(TabflowError::ModelNotFitted)?;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return Ok(value.as_slice()),
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn check_features(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.n_features {
            return Err(TabflowError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    /// Leaf class proportions for each row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.criterion != Criterion::Gini {
            return Err(TabflowError::ValidationError(
                "class probabilities require a classification tree".to_string(),
            ));
        }
        self.check_features(x)?;
        let mut proba = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for (r, row) in x.outer_iter().enumerate() {
            for (c, &p) in self.leaf(row)?.iter().enumerate() {
                proba[[r, c]] = p;
            }
        }
        Ok(proba)
    }

    /// Leaf means for each row
    pub fn predict_numeric(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.criterion != Criterion::Mse {
            return Err(TabflowError::ValidationError(
                "numeric predictions require a regression tree".to_string(),
            ));
        }
        self.check_features(x)?;
        x.outer_iter()
            .map(|row| self.leaf(row).map(|v| v.first().copied().unwrap_or(f64::NAN)))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from_vec)
    }

    /// Normalised total impurity decrease per feature
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn depth(&self) -> usize {
        fn depth_of(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth_of(left).max(depth_of(right)),
            }
        }
        self.root.as_ref().map_or(0, depth_of)
    }

    pub fn n_leaves(&self) -> usize {
        fn leaves_of(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves_of(left) + leaves_of(right),
            }
        }
        self.root.as_ref().map_or(0, leaves_of)
    }
}

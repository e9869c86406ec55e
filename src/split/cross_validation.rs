//! Index-level cross-validation splitters

use crate::error::{Result, TabflowError};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains stratum proportions per fold)
    StratifiedKFold { n_splits: usize, shuffle: bool },
    /// K-Fold repeated `n_repeats` times; repeat `r` is seeded with `seed + r`.
    /// Stratified when strata are given.
    RepeatedKFold { n_splits: usize, n_repeats: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::KFold { n_splits: 10, shuffle: true }
    }
}

/// A single train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Generate train/test splits. `strata` assigns each sample to a group and
    /// is required for stratified strategies.
    pub fn split(&self, n_samples: usize, strata: Option<&[usize]>) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => {
                self.k_fold_split(n_samples, *n_splits, *shuffle)
            }
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                let strata = strata.ok_or_else(|| TabflowError::ValidationError(
                    "StratifiedKFold requires strata".to_string()
                ))?;
                if strata.len() != n_samples {
                    return Err(TabflowError::ShapeError {
                        expected: format!("strata length = {}", n_samples),
                        actual: format!("strata length = {}", strata.len()),
                    });
                }
                self.stratified_k_fold_split(strata, *n_splits, *shuffle)
            }
            CVStrategy::RepeatedKFold { n_splits, n_repeats, shuffle } => {
                self.repeated_k_fold_split(n_samples, strata, *n_splits, *n_repeats, *shuffle)
            }
        }
    }

    fn check_sizes(n_samples: usize, n_splits: usize) -> Result<()> {
        if n_splits < 2 {
            return Err(TabflowError::ValidationError(
                "n_splits must be at least 2".to_string()
            ));
        }
        if n_samples < n_splits {
            return Err(TabflowError::ValidationError(
                format!("n_samples ({}) must be >= n_splits ({})", n_samples, n_splits)
            ));
        }
        Ok(())
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        Self::check_sizes(n_samples, n_splits)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;

        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let mut test_indices: Vec<usize> = indices[current..current + fold_size].to_vec();
            let mut train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();
            test_indices.sort_unstable();
            train_indices.sort_unstable();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });

            current += fold_size;
        }

        Ok(splits)
    }

    fn stratified_k_fold_split(
        &self,
        strata: &[usize],
        n_splits: usize,
        shuffle: bool,
    ) -> Result<Vec<CVSplit>> {
        Self::check_sizes(strata.len(), n_splits)?;

        // Ordered map keeps fold assignment reproducible for a given seed
        let mut stratum_indices: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (idx, &s) in strata.iter().enumerate() {
            stratum_indices.entry(s).or_default().push(idx);
        }

        if shuffle {
            let mut rng = self.rng();
            for indices in stratum_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Round-robin continues across strata so fold sizes stay within one
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut next_fold = 0;
        for indices in stratum_indices.values() {
            for &idx in indices {
                folds[next_fold].push(idx);
                next_fold = (next_fold + 1) % n_splits;
            }
        }

        let mut splits = Vec::with_capacity(n_splits);
        for fold_idx in 0..n_splits {
            let mut test_indices = folds[fold_idx].clone();
            let mut train_indices: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != fold_idx)
                .flat_map(|(_, f)| f.iter().copied())
                .collect();
            test_indices.sort_unstable();
            train_indices.sort_unstable();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
        }

        Ok(splits)
    }

    fn repeated_k_fold_split(
        &self,
        n_samples: usize,
        strata: Option<&[usize]>,
        n_splits: usize,
        n_repeats: usize,
        shuffle: bool,
    ) -> Result<Vec<CVSplit>> {
        if n_repeats == 0 {
            return Err(TabflowError::ValidationError(
                "n_repeats must be at least 1".to_string()
            ));
        }

        let inner = match strata {
            Some(_) => CVStrategy::StratifiedKFold { n_splits, shuffle },
            None => CVStrategy::KFold { n_splits, shuffle },
        };
        let mut all_splits = Vec::with_capacity(n_splits * n_repeats);
        for repeat in 0..n_repeats {
            let cv = CrossValidator {
                strategy: inner.clone(),
                random_state: self.random_state.map(|s| s.wrapping_add(repeat as u64)),
            };
            let mut splits = cv.split(n_samples, strata)?;
            for split in &mut splits {
                split.fold_idx += repeat * n_splits;
            }
            all_splits.extend(splits);
        }

        Ok(all_splits)
    }
}

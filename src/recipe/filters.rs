//! Column filters: correlation, zero variance and near-zero variance

use crate::data::{self, ColumnType};
use crate::error::{Result, TabflowError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trained filter holding the columns to remove
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnFilter {
    removed: Vec<String>,
}

impl ColumnFilter {
    /// Remove highly correlated numeric columns.
    ///
    /// Columns are visited in decreasing order of mean absolute correlation.
    /// For each pair above `threshold`, the member with the larger mean
    /// absolute correlation to the columns still kept is removed.
    pub fn fit_corr(df: &DataFrame, columns: &[String], threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(TabflowError::invalid_parameter("threshold", threshold, "must be in [0, 1]"));
        }
        let mut values = Vec::with_capacity(columns.len());
        for name in columns {
            if data::column_type(df, name)? != ColumnType::Numeric {
                return Err(TabflowError::RecipeError(format!(
                    "correlation filter requires a numeric column, '{}' is not",
                    name
                )));
            }
            values.push(data::numeric_values(df, name)?);
        }

        let p = columns.len();
        if p < 2 {
            return Ok(Self { removed: Vec::new() });
        }

        let mut corr = vec![vec![0.0; p]; p];
        for i in 0..p {
            for j in (i + 1)..p {
                let r = pearson_pairwise(&values[i], &values[j]).abs();
                let r = if r.is_finite() { r } else { 0.0 };
                corr[i][j] = r;
                corr[j][i] = r;
            }
        }

        let mean_abs = |i: usize, keep: &[bool]| -> f64 {
            let others: Vec<f64> = (0..p).filter(|&j| j != i && keep[j]).map(|j| corr[i][j]).collect();
            if others.is_empty() {
                0.0
            } else {
                others.iter().sum::<f64>() / others.len() as f64
            }
        };

        let all = vec![true; p];
        let mut order: Vec<usize> = (0..p).collect();
        order.sort_by(|&a, &b| mean_abs(b, &all).total_cmp(&mean_abs(a, &all)));

        let mut keep = vec![true; p];
        for (oi, &i) in order.iter().enumerate() {
            if !keep[i] {
                continue;
            }
            for &j in &order[oi + 1..] {
                if !keep[i] || !keep[j] || corr[i][j] <= threshold {
                    continue;
                }
                if mean_abs(i, &keep) > mean_abs(j, &keep) {
                    keep[i] = false;
                } else {
                    keep[j] = false;
                }
            }
        }

        let removed = (0..p).filter(|&i| !keep[i]).map(|i| columns[i].clone()).collect();
        Ok(Self { removed })
    }

    /// Remove columns with at most one distinct non-null value
    pub fn fit_zv(df: &DataFrame, columns: &[String]) -> Result<Self> {
        let mut removed = Vec::new();
        for name in columns {
            if level_counts(df, name)?.len() <= 1 {
                removed.push(name.clone());
            }
        }
        Ok(Self { removed })
    }

    /// Remove near-zero-variance columns: frequency ratio of the two most common
    /// values above `freq_cut` and percent unique at most `unique_cut`, or zero variance
    pub fn fit_nzv(df: &DataFrame, columns: &[String], freq_cut: f64, unique_cut: f64) -> Result<Self> {
        let mut removed = Vec::new();
        let n = df.height();
        for name in columns {
            let counts = level_counts(df, name)?;
            if counts.len() <= 1 {
                removed.push(name.clone());
                continue;
            }
            let mut freqs: Vec<usize> = counts.values().copied().collect();
            freqs.sort_unstable_by(|a, b| b.cmp(a));
            let freq_ratio = freqs[0] as f64 / freqs[1] as f64;
            let percent_unique = 100.0 * counts.len() as f64 / n as f64;
            if freq_ratio > freq_cut && percent_unique <= unique_cut {
                removed.push(name.clone());
            }
        }
        Ok(Self { removed })
    }

    pub fn removed(&self) -> &[String] {
        &self.removed
    }

    /// Drop the removed columns that are present
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();
        for name in &self.removed {
            if data::has_column(&result, name) {
                result = result.drop(name)?;
            }
        }
        Ok(result)
    }

    pub fn tidy(&self) -> Result<DataFrame> {
        Ok(df!("terms" => self.removed.clone())?)
    }
}

fn level_counts(df: &DataFrame, name: &str) -> Result<BTreeMap<String, usize>> {
    let mut counts = BTreeMap::new();
    for value in data::string_values(df, name)?.into_iter().flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }
    Ok(counts)
}

/// Pearson correlation over rows where both values are present and finite
pub(crate) fn pearson_pairwise(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((*x, *y)),
            _ => None,
        })
        .collect();
    let n = pairs.len();
    if n < 2 {
        return f64::NAN;
    }
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n as f64;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    sxy / (sxx * syy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_corr_removes_one_of_pair() {
        let df = df!(
            "a" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            "b" => &[2.0, 4.1, 6.0, 8.2, 10.0, 12.1],
            "c" => &[3.0, 1.0, 4.0, 1.0, 5.0, 9.0],
        )
        .unwrap();
        let filter = ColumnFilter::fit_corr(&df, &names(&["a", "b", "c"]), 0.9).unwrap();
        assert_eq!(filter.removed().len(), 1);
        assert!(filter.removed()[0] == "a" || filter.removed()[0] == "b");

        let out = filter.transform(&df).unwrap();
        assert_eq!(out.width(), 2);
    }

    #[test]
    fn test_corr_constant_column_kept() {
        let df = df!(
            "a" => &[1.0, 2.0, 3.0],
            "k" => &[1.0, 1.0, 1.0],
        )
        .unwrap();
        let filter = ColumnFilter::fit_corr(&df, &names(&["a", "k"]), 0.5).unwrap();
        assert!(filter.removed().is_empty());
    }

    #[test]
    fn test_zv() {
        let df = df!(
            "a" => &[1.0, 2.0, 3.0],
            "k" => &[Some(1.0), None, Some(1.0)],
            "g" => &["x", "x", "x"],
        )
        .unwrap();
        let filter = ColumnFilter::fit_zv(&df, &names(&["a", "k", "g"])).unwrap();
        assert_eq!(filter.removed(), &["k".to_string(), "g".to_string()]);
    }

    #[test]
    fn test_nzv() {
        let mut rare = vec![0.0; 99];
        rare.push(1.0);
        let common: Vec<f64> = (0..100).map(|i| (i % 2) as f64).collect();
        let df = df!("rare" => &rare, "common" => &common).unwrap();
        let filter = ColumnFilter::fit_nzv(&df, &names(&["rare", "common"]), 95.0 / 5.0, 10.0).unwrap();
        assert_eq!(filter.removed(), &["rare".to_string()]);
    }

    #[test]
    fn test_pearson() {
        let a = vec![Some(1.0), Some(2.0), Some(3.0), None];
        let b = vec![Some(2.0), Some(4.0), Some(6.0), Some(100.0)];
        assert!((pearson_pairwise(&a, &b) - 1.0).abs() < 1e-12);
    }
}

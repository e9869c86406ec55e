//! Stratification variables for splits and folds

use crate::data::{self, ColumnType};
use crate::error::{Result, TabflowError};
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::warn;

/// Assign every row of `df` to a stratum derived from `column`.
///
/// Nominal columns use their levels. Numeric columns are cut at the
/// `breaks`-quantiles of the non-null values. Nulls get their own stratum.
/// Strata with fewer than `pool * n` rows are merged, and the returned codes
/// are compacted to `0..k`.
pub fn make_strata(df: &DataFrame, column: &str, breaks: usize, pool: f64) -> Result<Vec<usize>> {
    if !(0.0..1.0).contains(&pool) {
        return Err(TabflowError::invalid_parameter("pool", pool, "must be in [0, 1)"));
    }

    let raw = match data::column_type(df, column)? {
        ColumnType::Nominal => nominal_strata(df, column)?,
        ColumnType::Numeric => numeric_strata(df, column, breaks)?,
        ColumnType::Other => {
            return Err(TabflowError::ValidationError(format!(
                "strata column '{}' must be numeric or nominal",
                column
            )))
        }
    };

    Ok(pool_small_strata(raw, pool, column))
}

fn nominal_strata(df: &DataFrame, column: &str) -> Result<Vec<usize>> {
    let levels = data::levels(df, column)?;
    let index: BTreeMap<&str, usize> = levels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();
    let null_code = levels.len();

    let values = data::string_values(df, column)?;
    Ok(values
        .iter()
        .map(|v| match v {
            Some(s) => index.get(s.as_str()).copied().unwrap_or(null_code),
            None => null_code,
        })
        .collect())
}

fn numeric_strata(df: &DataFrame, column: &str, breaks: usize) -> Result<Vec<usize>> {
    if breaks < 2 {
        return Err(TabflowError::invalid_parameter("breaks", breaks, "must be at least 2"));
    }
    let values = data::numeric_values(df, column)?;
    let mut present: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
    present.sort_by(|a, b| a.total_cmp(b));

    let mut cuts: Vec<f64> = (1..breaks)
        .map(|k| quantile_sorted(&present, k as f64 / breaks as f64))
        .collect();
    cuts.dedup();
    let null_code = cuts.len() + 1;

    Ok(values
        .iter()
        .map(|v| match v {
            Some(x) if !x.is_nan() => cuts.iter().filter(|&&c| *x > c).count(),
            _ => null_code,
        })
        .collect())
}

/// Linear-interpolation quantile of an ascending slice
pub(crate) fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

fn pool_small_strata(mut codes: Vec<usize>, pool: f64, column: &str) -> Vec<usize> {
    let n = codes.len();
    let min_size = pool * n as f64;

    loop {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for &c in &codes {
            *counts.entry(c).or_default() += 1;
        }
        if counts.len() <= 1 {
            break;
        }

        let small = counts
            .iter()
            .filter(|(_, &count)| (count as f64) < min_size)
            .min_by_key(|(_, &count)| count)
            .map(|(&code, &count)| (code, count));
        let Some((small_code, small_count)) = small else {
            break;
        };

        // Merge into the nearest code, which for quantile bins is the adjacent bin
        let target = counts
            .keys()
            .copied()
            .filter(|&c| c != small_code)
            .min_by_key(|&c| (c as i64 - small_code as i64).abs())
            .unwrap_or(small_code);

        warn!(
            column,
            stratum = small_code,
            rows = small_count,
            "Stratum below pooling threshold, merging with neighbour"
        );
        for c in codes.iter_mut() {
            if *c == small_code {
                *c = target;
            }
        }
    }

    let mut remap: BTreeMap<usize, usize> = BTreeMap::new();
    for &c in &codes {
        let next = remap.len();
        remap.entry(c).or_insert(next);
    }
    codes.into_iter().map(|c| remap[&c]).collect()
}

/// Group row indices by stratum code
pub(crate) fn group_by_stratum(codes: &[usize]) -> Vec<Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (row, &code) in codes.iter().enumerate() {
        groups.entry(code).or_default().push(row);
    }
    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nominal_strata() {
        let df = df!("g" => &[Some("b"), Some("a"), None, Some("b")]).unwrap();
        let strata = make_strata(&df, "g", 4, 0.0).unwrap();
        assert_eq!(strata[0], strata[3]);
        assert_ne!(strata[0], strata[1]);
        assert_ne!(strata[2], strata[0]);
        assert_ne!(strata[2], strata[1]);
    }

    #[test]
    fn test_numeric_quartiles() {
        let values: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        let df = df!("x" => &values).unwrap();
        let strata = make_strata(&df, "x", 4, 0.1).unwrap();
        let groups = group_by_stratum(&strata);
        assert_eq!(groups.len(), 4);
        for g in &groups {
            assert_eq!(g.len(), 25);
        }
    }

    #[test]
    fn test_small_strata_are_pooled() {
        let mut g = vec!["a"; 48];
        g.extend(vec!["b"; 50]);
        g.extend(vec!["c"; 2]);
        let df = df!("g" => &g).unwrap();
        let strata = make_strata(&df, "g", 4, 0.1).unwrap();
        assert_eq!(group_by_stratum(&strata).len(), 2);
        assert_eq!(strata[99], strata[50]);
    }

    #[test]
    fn test_quantile_sorted() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&v, 0.0), 1.0);
        assert_eq!(quantile_sorted(&v, 1.0), 4.0);
        assert!((quantile_sorted(&v, 0.5) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_missing_column() {
        let df = df!("g" => &["a"]).unwrap();
        assert!(make_strata(&df, "nope", 4, 0.1).is_err());
    }
}

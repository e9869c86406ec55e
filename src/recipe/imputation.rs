//! Missing value imputation

use crate::data::{self, ColumnType};
use crate::error::{Result, TabflowError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum ImputeValue {
    Numeric(f64),
    Level(String),
}

/// Trained imputer holding one fill value per column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    fill_values: Vec<(String, ImputeValue)>,
}

impl Imputer {
    /// Fill numeric nulls with the training mean
    pub fn fit_mean(df: &DataFrame, columns: &[String]) -> Result<Self> {
        let mut fill_values = Vec::with_capacity(columns.len());
        for name in columns {
            if data::column_type(df, name)? != ColumnType::Numeric {
                return Err(TabflowError::RecipeError(format!(
                    "mean imputation requires a numeric column, '{}' is not",
                    name
                )));
            }
            let values: Vec<f64> = data::numeric_values(df, name)?.into_iter().flatten().collect();
            let (mean, _) = data::mean_sd(&values);
            if !mean.is_finite() {
                return Err(TabflowError::RecipeError(format!(
                    "column '{}' has no finite training values to impute from",
                    name
                )));
            }
            fill_values.push((name.clone(), ImputeValue::Numeric(mean)));
        }
        Ok(Self { fill_values })
    }

    /// Fill nominal nulls with the most frequent training level; ties go to the first level
    pub fn fit_mode(df: &DataFrame, columns: &[String]) -> Result<Self> {
        let mut fill_values = Vec::with_capacity(columns.len());
        for name in columns {
            if data::column_type(df, name)? != ColumnType::Nominal {
                return Err(TabflowError::RecipeError(format!(
                    "mode imputation requires a nominal column, '{}' is not",
                    name
                )));
            }
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for value in data::string_values(df, name)?.into_iter().flatten() {
                *counts.entry(value).or_insert(0) += 1;
            }
            // BTreeMap iterates in level order, so the first maximum wins
            let mut mode: Option<(&String, usize)> = None;
            for (level, &count) in &counts {
                if mode.map_or(true, |(_, best)| count > best) {
                    mode = Some((level, count));
                }
            }
            let (level, _) = mode.ok_or_else(|| {
                TabflowError::RecipeError(format!("column '{}' has no training values to impute from", name))
            })?;
            fill_values.push((name.clone(), ImputeValue::Level(level.clone())));
        }
        Ok(Self { fill_values })
    }

    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();
        for (name, value) in &self.fill_values {
            if !data::has_column(&result, name) {
                continue;
            }
            let filled = match value {
                ImputeValue::Numeric(fill) => {
                    let values = data::numeric_values(&result, name)?
                        .into_iter()
                        .map(|v| Some(v.unwrap_or(*fill)))
                        .collect();
                    data::float_series(name, values)
                }
                ImputeValue::Level(fill) => {
                    let values: Vec<Option<String>> = data::string_values(&result, name)?
                        .into_iter()
                        .map(|v| Some(v.unwrap_or_else(|| fill.clone())))
                        .collect();
                    let series = data::string_series(name, values);
                    if result.column(name)?.dtype() == &DataType::Boolean {
                        bool_from_levels(name, &series)?
                    } else {
                        series
                    }
                }
            };
            data::replace_column(&mut result, filled)?;
        }
        Ok(result)
    }

    pub fn tidy(&self) -> Result<DataFrame> {
        let terms: Vec<String> = self.fill_values.iter().map(|(n, _)| n.clone()).collect();
        let values: Vec<String> = self
            .fill_values
            .iter()
            .map(|(_, v)| match v {
                ImputeValue::Numeric(x) => format!("{}", x),
                ImputeValue::Level(l) => l.clone(),
            })
            .collect();
        Ok(df!("terms" => terms, "value" => values)?)
    }
}

fn bool_from_levels(name: &str, series: &Series) -> Result<Series> {
    let ca: BooleanChunked = series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s == "TRUE"))
        .collect();
    Ok(ca.with_name(name.into()).into_series())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_imputation() {
        let df = df!("x" => &[Some(1.0), None, Some(3.0)]).unwrap();
        let imp = Imputer::fit_mean(&df, &["x".to_string()]).unwrap();
        let out = imp.transform(&df).unwrap();
        assert_eq!(data::numeric_values(&out, "x").unwrap(), vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_mode_imputation_tie_goes_to_first_level() {
        let df = df!("g" => &[Some("b"), Some("a"), None, Some("b"), Some("a")]).unwrap();
        let imp = Imputer::fit_mode(&df, &["g".to_string()]).unwrap();
        let out = imp.transform(&df).unwrap();
        assert_eq!(data::string_values(&out, "g").unwrap()[2], Some("a".to_string()));
    }

    #[test]
    fn test_mode_imputation_keeps_boolean_type() {
        let df = df!("f" => &[Some(true), Some(true), None]).unwrap();
        let imp = Imputer::fit_mode(&df, &["f".to_string()]).unwrap();
        let out = imp.transform(&df).unwrap();
        assert_eq!(out.column("f").unwrap().dtype(), &DataType::Boolean);
        assert_eq!(out.column("f").unwrap().null_count(), 0);
    }

    #[test]
    fn test_type_checks() {
        let df = df!("x" => &[1.0], "g" => &["a"]).unwrap();
        assert!(Imputer::fit_mean(&df, &["g".to_string()]).is_err());
        assert!(Imputer::fit_mode(&df, &["x".to_string()]).is_err());
    }
}

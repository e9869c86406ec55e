//! Indicator (dummy) encoding of nominal columns

use crate::data::{self, ColumnType};
use crate::error::{Result, TabflowError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// Learned levels for one source column
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DummyColumn {
    name: String,
    levels: Vec<String>,
    /// Indicator column names, one per encoded level
    names: Vec<String>,
}

/// Trained dummy encoder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DummyEncoder {
    columns: Vec<DummyColumn>,
    one_hot: bool,
}

/// Replace characters outside `[A-Za-z0-9_.]` with `_`
pub fn sanitize_level(level: &str) -> String {
    level
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

fn unique_name(taken: &mut HashSet<String>, column: &str, level: &str) -> String {
    let base = format!("{}_{}", column, sanitize_level(level));
    let mut name = base.clone();
    let mut k = 2;
    while taken.contains(&name) {
        name = format!("{}_{}", base, k);
        k += 1;
    }
    if name != base {
        warn!(column = %column, level = %level, name = %name, "Indicator name already in use, renamed");
    }
    taken.insert(name.clone());
    name
}

impl DummyEncoder {
    /// Learn the level set of each nominal column.
    ///
    /// Indicator names are `column_level` with the level sanitised. A name that
    /// collides with another indicator or an existing column gets a `_2`, `_3`, ...
    /// suffix.
    pub fn fit(df: &DataFrame, columns: &[String], one_hot: bool) -> Result<Self> {
        let mut taken: HashSet<String> = data::column_names(df)
            .into_iter()
            .filter(|c| !columns.contains(c))
            .collect();

        let mut fitted = Vec::with_capacity(columns.len());
        for name in columns {
            if data::column_type(df, name)? != ColumnType::Nominal {
                return Err(TabflowError::RecipeError(format!(
                    "dummy encoding requires a nominal column, '{}' is not",
                    name
                )));
            }
            let levels = data::levels(df, name)?;
            let encoded = if one_hot || levels.is_empty() { &levels[..] } else { &levels[1..] };
            let names = encoded
                .iter()
                .map(|level| unique_name(&mut taken, name, level))
                .collect();
            fitted.push(DummyColumn {
                name: name.clone(),
                levels,
                names,
            });
        }
        Ok(Self { columns: fitted, one_hot })
    }

    /// Names of the indicator columns produced for each source column
    pub fn output_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(|c| c.names.iter().cloned())
            .collect()
    }

    /// Replace each source column with its indicator columns
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();
        let mut indicators: Vec<Column> = Vec::new();

        for column in &self.columns {
            if !data::has_column(&result, &column.name) {
                continue;
            }
            let values = data::string_values(&result, &column.name)?;

            let unseen = values
                .iter()
                .flatten()
                .filter(|v| !column.levels.contains(v))
                .count();
            if unseen > 0 {
                warn!(
                    column = %column.name,
                    rows = unseen,
                    "Levels not seen in training, encoding as all zeros"
                );
            }

            for (level, name) in self.encoded_levels(column).iter().zip(&column.names) {
                let encoded: Vec<Option<f64>> = values
                    .iter()
                    .map(|v| v.as_ref().map(|s| if s == level { 1.0 } else { 0.0 }))
                    .collect();
                indicators.push(data::float_series(name, encoded).into());
            }

            result = result.drop(&column.name)?;
        }

        if indicators.is_empty() {
            return Ok(result);
        }
        Ok(result.hstack(&indicators)?)
    }

    /// One row per produced indicator: source column and level
    pub fn tidy(&self) -> Result<DataFrame> {
        let mut terms = Vec::new();
        let mut levels = Vec::new();
        let mut names = Vec::new();
        for column in &self.columns {
            for (level, name) in self.encoded_levels(column).iter().zip(&column.names) {
                terms.push(column.name.clone());
                levels.push(level.clone());
                names.push(name.clone());
            }
        }
        Ok(df!(
            "terms" => terms,
            "level" => levels,
            "columns" => names,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train() -> DataFrame {
        df!(
            "color" => &[Some("red"), Some("blue"), Some("green"), Some("red"), None],
            "x" => &[1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap()
    }

    #[test]
    fn test_dummy_reference_level_dropped() {
        let enc = DummyEncoder::fit(&train(), &["color".to_string()], false).unwrap();
        assert_eq!(enc.output_names(), vec!["color_green", "color_red"]);

        let out = enc.transform(&train()).unwrap();
        assert!(!data::has_column(&out, "color"));
        assert_eq!(
            data::numeric_values(&out, "color_red").unwrap(),
            vec![Some(1.0), Some(0.0), Some(0.0), Some(1.0), None]
        );
    }

    #[test]
    fn test_one_hot_keeps_all_levels() {
        let enc = DummyEncoder::fit(&train(), &["color".to_string()], true).unwrap();
        assert_eq!(enc.output_names().len(), 3);
    }

    #[test]
    fn test_unseen_level_is_all_zero() {
        let enc = DummyEncoder::fit(&train(), &["color".to_string()], false).unwrap();
        let new = df!("color" => &["purple"], "x" => &[1.0]).unwrap();
        let out = enc.transform(&new).unwrap();
        assert_eq!(data::numeric_values(&out, "color_green").unwrap(), vec![Some(0.0)]);
        assert_eq!(data::numeric_values(&out, "color_red").unwrap(), vec![Some(0.0)]);
    }

    #[test]
    fn test_colliding_level_names_made_unique() {
        let df = df!("g" => &["a", "x y", "x-y", "a"], "g_x_y_2" => &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let enc = DummyEncoder::fit(&df, &["g".to_string()], false).unwrap();
        assert_eq!(enc.output_names(), vec!["g_x_y", "g_x_y_3"]);

        let out = enc.transform(&df).unwrap();
        assert_eq!(out.width(), 3);
        assert_eq!(
            data::numeric_values(&out, "g_x_y").unwrap(),
            vec![Some(0.0), Some(1.0), Some(0.0), Some(0.0)]
        );
        assert_eq!(
            data::numeric_values(&out, "g_x_y_3").unwrap(),
            vec![Some(0.0), Some(0.0), Some(1.0), Some(0.0)]
        );
    }

    #[test]
    fn test_level_names_sanitized() {
        assert_eq!(sanitize_level("a b-c"), "a_b_c");
        assert_eq!(sanitize_level("v1.2"), "v1.2");
    }

    #[test]
    fn test_numeric_column_rejected() {
        assert!(DummyEncoder::fit(&train(), &["x".to_string()], false).is_err());
    }
}

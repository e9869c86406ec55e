//! Centering and scaling of numeric columns

use crate::data::{self, ColumnType};
use crate::error::{Result, TabflowError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Which parts of standardisation to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleKind {
    /// x - mean
    Center,
    /// x / sd
    Scale,
    /// (x - mean) / sd
    Normalize,
}

/// Parameters learned for one column
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerParams {
    column: String,
    center: f64,
    scale: f64,
}

/// Trained column scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    kind: ScaleKind,
    params: Vec<ScalerParams>,
}

impl Scaler {
    /// Learn means and standard deviations from the training frame
    pub fn fit(df: &DataFrame, columns: &[String], kind: ScaleKind) -> Result<Self> {
        let mut params = Vec::with_capacity(columns.len());
        let mut zero_sd = Vec::new();

        for name in columns {
            if data::column_type(df, name)? != ColumnType::Numeric {
                return Err(TabflowError::RecipeError(format!(
                    "scaling requires a numeric column, '{}' is not",
                    name
                )));
            }
            let values: Vec<f64> = data::numeric_values(df, name)?.into_iter().flatten().collect();
            let (mean, sd) = data::mean_sd(&values);

            let center = if kind == ScaleKind::Scale {
                0.0
            } else if mean.is_finite() {
                mean
            } else {
                warn!(column = %name, "No finite values to center on, using 0");
                0.0
            };

            let scale = if kind == ScaleKind::Center {
                1.0
            } else if sd.is_finite() && sd > 0.0 {
                sd
            } else {
                zero_sd.push(name.clone());
                1.0
            };

            params.push(ScalerParams { column: name.clone(), center, scale });
        }

        if !zero_sd.is_empty() {
            warn!(columns = ?zero_sd, "Zero variance columns cannot be scaled, leaving scale at 1");
        }

        Ok(Self { kind, params })
    }

    /// Apply the learned parameters; absent columns are skipped
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();
        for p in &self.params {
            if !data::has_column(&result, &p.column) {
                continue;
            }
            let scaled: Vec<Option<f64>> = data::numeric_values(&result, &p.column)?
                .into_iter()
                .map(|v| v.map(|x| (x - p.center) / p.scale))
                .collect();
            data::replace_column(&mut result, data::float_series(&p.column, scaled))?;
        }
        Ok(result)
    }

    pub fn kind(&self) -> ScaleKind {
        self.kind
    }

    /// Learned statistics, one row per column and statistic
    pub fn tidy(&self) -> Result<DataFrame> {
        let mut terms = Vec::new();
        let mut statistic = Vec::new();
        let mut value = Vec::new();
        for p in &self.params {
            if self.kind != ScaleKind::Scale {
                terms.push(p.column.clone());
                statistic.push("mean");
                value.push(p.center);
            }
            if self.kind != ScaleKind::Center {
                terms.push(p.column.clone());
                statistic.push("sd");
                value.push(p.scale);
            }
        }
        Ok(df!(
            "terms" => terms,
            "statistic" => statistic,
            "value" => value,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train() -> DataFrame {
        df!(
            "x" => &[1.0, 2.0, 3.0, 4.0, 5.0],
            "c" => &[7.0, 7.0, 7.0, 7.0, 7.0],
        )
        .unwrap()
    }

    #[test]
    fn test_normalize() {
        let scaler = Scaler::fit(&train(), &["x".to_string()], ScaleKind::Normalize).unwrap();
        let out = scaler.transform(&train()).unwrap();
        let x: Vec<f64> = data::numeric_values(&out, "x").unwrap().into_iter().flatten().collect();
        let (mean, sd) = data::mean_sd(&x);
        assert!(mean.abs() < 1e-12);
        assert!((sd - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_center_uses_training_mean() {
        let scaler = Scaler::fit(&train(), &["x".to_string()], ScaleKind::Center).unwrap();
        let new = df!("x" => &[3.0, 13.0]).unwrap();
        let out = scaler.transform(&new).unwrap();
        assert_eq!(data::numeric_values(&out, "x").unwrap(), vec![Some(0.0), Some(10.0)]);
    }

    #[test]
    fn test_zero_sd_divides_by_one() {
        let scaler = Scaler::fit(&train(), &["c".to_string()], ScaleKind::Scale).unwrap();
        let out = scaler.transform(&train()).unwrap();
        assert_eq!(data::numeric_values(&out, "c").unwrap()[0], Some(7.0));
    }

    #[test]
    fn test_tidy_lists_statistics() {
        let scaler = Scaler::fit(&train(), &["x".to_string()], ScaleKind::Normalize).unwrap();
        let tidy = scaler.tidy().unwrap();
        assert_eq!(tidy.height(), 2);
    }
}

//! Logarithmic transform

use crate::data::{self, ColumnType};
use crate::error::{Result, TabflowError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Trained log transform: `log_base(x + offset)`, or `sign(x) * log_base(|x|)`
/// for `|x| >= 1` (and 0 otherwise) when signed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogTransform {
    columns: Vec<String>,
    base: f64,
    offset: f64,
    signed: bool,
}

impl LogTransform {
    pub fn fit(df: &DataFrame, columns: &[String], base: f64, offset: f64, signed: bool) -> Result<Self> {
        if !(base > 0.0 && base != 1.0) {
            return Err(TabflowError::invalid_parameter("base", base, "must be positive and not 1"));
        }

        for name in columns {
            if data::column_type(df, name)? != ColumnType::Numeric {
                return Err(TabflowError::RecipeError(format!(
                    "log transform requires a numeric column, '{}' is not",
                    name
                )));
            }
            if !signed {
                let non_positive = data::numeric_values(df, name)?
                    .into_iter()
                    .flatten()
                    .filter(|x| x + offset <= 0.0)
                    .count();
                if non_positive > 0 {
                    warn!(
                        column = %name,
                        rows = non_positive,
                        "Log of non-positive values yields non-finite results"
                    );
                }
            }
        }

        if signed && offset != 0.0 {
            warn!("Offset is ignored for signed log transforms");
        }

        Ok(Self {
            columns: columns.to_vec(),
            base,
            offset,
            signed,
        })
    }

    fn transform_value(&self, x: f64) -> f64 {
        if self.signed {
            if x.abs() < 1.0 {
                0.0
            } else {
                x.signum() * x.abs().log(self.base)
            }
        } else {
            (x + self.offset).log(self.base)
        }
    }

    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();
        for name in &self.columns {
            if !data::has_column(&result, name) {
                continue;
            }
            let values: Vec<Option<f64>> = data::numeric_values(&result, name)?
                .into_iter()
                .map(|v| v.map(|x| self.transform_value(x)))
                .collect();
            data::replace_column(&mut result, data::float_series(name, values))?;
        }
        Ok(result)
    }

    pub fn tidy(&self) -> Result<DataFrame> {
        let n = self.columns.len();
        Ok(df!(
            "terms" => self.columns.clone(),
            "base" => vec![self.base; n],
            "offset" => vec![self.offset; n],
            "signed" => vec![self.signed; n],
        )?)
    }
}

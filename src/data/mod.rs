//! Tabular data helpers
//!
//! Thin layer over polars `DataFrame`s that the rest of the crate relies on:
//! - Column type classification (numeric vs nominal)
//! - Typed column extraction with explicit null handling
//! - Factor-level ordering for nominal columns
//! - Row subsetting and conversion to `ndarray` design matrices
//! - CSV loading/saving and dataset summaries

pub mod loader;

pub use loader::{DataLoader, DataSaver};

use crate::error::{Result, TabflowError};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Column data type as seen by recipes and models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Nominal,
    Other,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Numeric => write!(f, "numeric"),
            ColumnType::Nominal => write!(f, "nominal"),
            ColumnType::Other => write!(f, "other"),
        }
    }
}

/// Classify a polars dtype
pub fn dtype_kind(dtype: &DataType) -> ColumnType {
    match dtype {
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 |
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 |
        DataType::Float32 | DataType::Float64 => ColumnType::Numeric,
        DataType::String | DataType::Boolean => ColumnType::Nominal,
        _ => ColumnType::Other,
    }
}

fn get_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| TabflowError::FeatureNotFound(name.to_string()))
}

/// Type of a named column
pub fn column_type(df: &DataFrame, name: &str) -> Result<ColumnType> {
    Ok(dtype_kind(get_column(df, name)?.dtype()))
}

/// Column names in frame order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns().iter().map(|c| c.name().to_string()).collect()
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// Replace (or append) a column in place
pub fn replace_column(df: &mut DataFrame, series: Series) -> Result<()> {
    df.with_column(series)?;
    Ok(())
}

/// Extract a numeric column as `f64` values, preserving nulls
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = get_column(df, name)?;
    if dtype_kind(column.dtype()) != ColumnType::Numeric {
        return Err(TabflowError::DataError(format!(
            "column '{}' is not numeric (dtype {})",
            name,
            column.dtype()
        )));
    }
    let series = column
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}

/// Extract a column as strings, preserving nulls.
///
/// Booleans render as `TRUE`/`FALSE`; numbers use their shortest display form,
/// so an integer-coded class column `0/1` yields levels `"0"` and `"1"`.
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = get_column(df, name)?;
    let series = column.as_materialized_series();
    match column.dtype() {
        DataType::String => Ok(series
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect()),
        DataType::Boolean => Ok(series
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| if b { "TRUE".to_string() } else { "FALSE".to_string() }))
            .collect()),
        dtype if dtype_kind(dtype) == ColumnType::Numeric => Ok(numeric_values(df, name)?
            .into_iter()
            .map(|v| v.map(|x| format!("{}", x)))
            .collect()),
        other => Err(TabflowError::DataError(format!(
            "column '{}' has unsupported dtype {}",
            name, other
        ))),
    }
}

/// Sorted distinct non-null values of a column; this is the level order used
/// for dummy encoding, outcome classes and prediction columns.
pub fn levels(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let values = string_values(df, name)?;
    let set: BTreeSet<String> = values.into_iter().flatten().collect();
    Ok(set.into_iter().collect())
}

/// Subset rows by position, keeping the given order
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let height = df.height();
    if let Some(&bad) = indices.iter().find(|&&i| i >= height) {
        return Err(TabflowError::ValidationError(format!(
            "row index {} out of bounds for frame with {} rows",
            bad, height
        )));
    }
    let idx = IdxCa::from_vec(
        "idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    );
    Ok(df.take(&idx)?)
}

/// Build a row-major design matrix from numeric columns. Nulls are rejected.
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            numeric_values(df, col_name)?
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    v.ok_or_else(|| {
                        TabflowError::DataError(format!(
                            "column '{}' has a missing value at row {}; add an imputation step",
                            col_name, row
                        ))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_data[c][r]))
}

/// Build a `Float64` series from optional values
pub fn float_series(name: &str, values: Vec<Option<f64>>) -> Series {
    let ca: Float64Chunked = values.into_iter().collect();
    ca.with_name(name.into()).into_series()
}

/// Build a `String` series from optional values
pub fn string_series(name: &str, values: Vec<Option<String>>) -> Series {
    let ca: StringChunked = values.iter().map(|v| v.as_deref()).collect();
    ca.with_name(name.into()).into_series()
}

/// Mean and sample standard deviation (n - 1) of the finite values in a slice
pub(crate) fn mean_sd(values: &[f64]) -> (f64, f64) {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let n = finite.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let mean = finite.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, f64::NAN);
    }
    let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, var.sqrt())
}

/// Per-column summary used by `tabflow info`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: ColumnType,
    pub null_count: usize,
    pub unique_count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

/// Summary of a whole dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub columns: Vec<ColumnSummary>,
}

impl DatasetSummary {
    /// Compute summary statistics for every column
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let mut columns = Vec::with_capacity(df.width());
        for name in column_names(df) {
            let dtype = column_type(df, &name)?;
            let summary = match dtype {
                ColumnType::Numeric => {
                    let values = numeric_values(df, &name)?;
                    let present: Vec<f64> = values.iter().flatten().copied().collect();
                    let unique: BTreeSet<u64> = present.iter().map(|v| v.to_bits()).collect();
                    let (mean, sd) = mean_sd(&present);
                    ColumnSummary {
                        name,
                        dtype,
                        null_count: values.len() - present.len(),
                        unique_count: unique.len(),
                        mean: mean.is_finite().then_some(mean),
                        std: sd.is_finite().then_some(sd),
                    }
                }
                ColumnType::Nominal => {
                    let values = string_values(df, &name)?;
                    let null_count = values.iter().filter(|v| v.is_none()).count();
                    let unique: BTreeSet<&String> = values.iter().flatten().collect();
                    ColumnSummary {
                        unique_count: unique.len(),
                        name,
                        dtype,
                        null_count,
                        mean: None,
                        std: None,
                    }
                }
                ColumnType::Other => {
                    let column = get_column(df, &name)?;
                    ColumnSummary {
                        null_count: column.null_count(),
                        name,
                        dtype,
                        unique_count: 0,
                        mean: None,
                        std: None,
                    }
                }
            };
            columns.push(summary);
        }
        Ok(Self { n_rows: df.height(), columns })
    }
}

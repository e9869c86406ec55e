//! Data loading utilities

use crate::error::{Result, TabflowError};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// CSV data loader
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows scanned for schema inference
    infer_schema_length: usize,
    /// Override for the field separator
    separator: Option<u8>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 100,
            separator: None,
        }
    }

    /// Set the number of rows used for schema inference
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = n.max(1);
        self
    }

    /// Force a field separator
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = Some(separator);
        self
    }

    /// Load a delimited file; `.tsv` files default to tab separation
    pub fn load(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let is_tsv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("tsv"))
            .unwrap_or(false);
        let separator = self
            .separator
            .unwrap_or(if is_tsv { b'\t' } else { b',' });

        let file = File::open(path)
            .map_err(|e| TabflowError::DataError(format!("{}: {}", path.display(), e)))?;

        let parse_opts = CsvParseOptions::default().with_separator(separator);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| TabflowError::DataError(e.to_string()))?;

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded dataset");
        Ok(df)
    }
}

/// CSV writer for prediction tables and curves
pub struct DataSaver;

impl DataSaver {
    /// Write a frame to CSV with a header row
    pub fn write_csv(df: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path)?;
        let mut df = df.clone();
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)
            .map_err(|e| TabflowError::DataError(e.to_string()))?;
        debug!(path = %path.display(), rows = df.height(), "Wrote CSV");
        Ok(())
    }
}

//! Recipe steps and their trained counterparts

use super::encoding::DummyEncoder;
use super::filters::ColumnFilter;
use super::imputation::Imputer;
use super::scaling::{ScaleKind, Scaler};
use super::selector::Selector;
use super::transforms::LogTransform;
use super::VariableInfo;
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// An untrained preprocessing step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Indicator columns for nominal variables
    Dummy { selector: Selector, one_hot: bool },
    /// Remove highly correlated numeric variables
    Corr { selector: Selector, threshold: f64 },
    /// Logarithmic transform
    Log {
        selector: Selector,
        base: f64,
        offset: f64,
        signed: bool,
    },
    Center { selector: Selector },
    Scale { selector: Selector },
    Normalize { selector: Selector },
    /// Remove zero-variance variables
    Zv { selector: Selector },
    /// Remove near-zero-variance variables
    Nzv {
        selector: Selector,
        freq_cut: f64,
        unique_cut: f64,
    },
    ImputeMean { selector: Selector },
    ImputeMode { selector: Selector },
}

impl Step {
    pub fn dummy(selector: Selector) -> Self {
        Step::Dummy { selector, one_hot: false }
    }

    pub fn corr(selector: Selector) -> Self {
        Step::Corr { selector, threshold: 0.9 }
    }

    pub fn log(selector: Selector) -> Self {
        Step::Log {
            selector,
            base: std::f64::consts::E,
            offset: 0.0,
            signed: false,
        }
    }

    pub fn nzv(selector: Selector) -> Self {
        Step::Nzv {
            selector,
            freq_cut: 95.0 / 5.0,
            unique_cut: 10.0,
        }
    }

    /// Short name used in logs and summaries
    pub fn name(&self) -> &'static str {
        match self {
            Step::Dummy { .. } => "dummy",
            Step::Corr { .. } => "corr",
            Step::Log { .. } => "log",
            Step::Center { .. } => "center",
            Step::Scale { .. } => "scale",
            Step::Normalize { .. } => "normalize",
            Step::Zv { .. } => "zv",
            Step::Nzv { .. } => "nzv",
            Step::ImputeMean { .. } => "impute_mean",
            Step::ImputeMode { .. } => "impute_mode",
        }
    }

    pub fn selector(&self) -> &Selector {
        match self {
            Step::Dummy { selector, .. }
            | Step::Corr { selector, .. }
            | Step::Log { selector, .. }
            | Step::Center { selector }
            | Step::Scale { selector }
            | Step::Normalize { selector }
            | Step::Zv { selector }
            | Step::Nzv { selector, .. }
            | Step::ImputeMean { selector }
            | Step::ImputeMode { selector } => selector,
        }
    }

    /// Estimate the step's statistics from `df`
    pub fn prep(&self, df: &DataFrame, vars: &[VariableInfo]) -> Result<TrainedStep> {
        let columns = self.selector().resolve(vars)?;
        let trained = match self {
            Step::Dummy { one_hot, .. } => TrainedStep::Dummy(DummyEncoder::fit(df, &columns, *one_hot)?),
            Step::Corr { threshold, .. } => {
                TrainedStep::Filter(ColumnFilter::fit_corr(df, &columns, *threshold)?)
            }
            Step::Log { base, offset, signed, .. } => {
                TrainedStep::Log(LogTransform::fit(df, &columns, *base, *offset, *signed)?)
            }
            Step::Center { .. } => TrainedStep::Scale(Scaler::fit(df, &columns, ScaleKind::Center)?),
            Step::Scale { .. } => TrainedStep::Scale(Scaler::fit(df, &columns, ScaleKind::Scale)?),
            Step::Normalize { .. } => {
                TrainedStep::Scale(Scaler::fit(df, &columns, ScaleKind::Normalize)?)
            }
            Step::Zv { .. } => TrainedStep::Filter(ColumnFilter::fit_zv(df, &columns)?),
            Step::Nzv { freq_cut, unique_cut, .. } => {
                TrainedStep::Filter(ColumnFilter::fit_nzv(df, &columns, *freq_cut, *unique_cut)?)
            }
            Step::ImputeMean { .. } => TrainedStep::Impute(Imputer::fit_mean(df, &columns)?),
            Step::ImputeMode { .. } => TrainedStep::Impute(Imputer::fit_mode(df, &columns)?),
        };
        Ok(trained)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "step_{}({})", self.name(), self.selector())
    }
}

/// A step with its training statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "state", rename_all = "snake_case")]
pub enum TrainedStep {
    Dummy(DummyEncoder),
    Filter(ColumnFilter),
    Log(LogTransform),
    Scale(Scaler),
    Impute(Imputer),
}

impl TrainedStep {
    /// Apply to new data using the training statistics only
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        match self {
            TrainedStep::Dummy(s) => s.transform(df),
            TrainedStep::Filter(s) => s.transform(df),
            TrainedStep::Log(s) => s.transform(df),
            TrainedStep::Scale(s) => s.transform(df),
            TrainedStep::Impute(s) => s.transform(df),
        }
    }

    pub fn tidy(&self) -> Result<DataFrame> {
        match self {
            TrainedStep::Dummy(s) => s.tidy(),
            TrainedStep::Filter(s) => s.tidy(),
            TrainedStep::Log(s) => s.tidy(),
            TrainedStep::Scale(s) => s.tidy(),
            TrainedStep::Impute(s) => s.tidy(),
        }
    }
}

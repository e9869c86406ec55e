//! Column selectors resolved against the current variables of a recipe

use super::{Role, VariableInfo};
use crate::data::ColumnType;
use crate::error::{Result, TabflowError};
use serde::{Deserialize, Serialize};

/// Selects columns by role, type or name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Selector {
    AllPredictors,
    AllNumericPredictors,
    AllNominalPredictors,
    AllNumeric,
    AllNominal,
    AllOutcomes,
    Columns(Vec<String>),
    Except(Box<Selector>, Box<Selector>),
    And(Box<Selector>, Box<Selector>),
}

pub fn all_predictors() -> Selector {
    Selector::AllPredictors
}

pub fn all_numeric_predictors() -> Selector {
    Selector::AllNumericPredictors
}

pub fn all_nominal_predictors() -> Selector {
    Selector::AllNominalPredictors
}

pub fn all_numeric() -> Selector {
    Selector::AllNumeric
}

pub fn all_nominal() -> Selector {
    Selector::AllNominal
}

pub fn all_outcomes() -> Selector {
    Selector::AllOutcomes
}

/// Select columns by name
pub fn columns<S: AsRef<str>>(names: &[S]) -> Selector {
    Selector::Columns(names.iter().map(|s| s.as_ref().to_string()).collect())
}

impl Selector {
    /// Columns matched by `self` but not by `other`
    pub fn except(self, other: Selector) -> Selector {
        Selector::Except(Box::new(self), Box::new(other))
    }

    /// Columns matched by either selector
    pub fn and(self, other: Selector) -> Selector {
        Selector::And(Box::new(self), Box::new(other))
    }

    /// Resolve to column names, in variable order. Named columns must exist.
    pub fn resolve(&self, vars: &[VariableInfo]) -> Result<Vec<String>> {
        let mask = self.mask(vars)?;
        Ok(vars
            .iter()
            .zip(mask)
            .filter(|(_, keep)| *keep)
            .map(|(v, _)| v.variable.clone())
            .collect())
    }

    fn mask(&self, vars: &[VariableInfo]) -> Result<Vec<bool>> {
        let mask = match self {
            Selector::AllPredictors => by(vars, |v| v.role == Role::Predictor),
            Selector::AllNumericPredictors => {
                by(vars, |v| v.role == Role::Predictor && v.column_type == ColumnType::Numeric)
            }
            Selector::AllNominalPredictors => {
                by(vars, |v| v.role == Role::Predictor && v.column_type == ColumnType::Nominal)
            }
            Selector::AllNumeric => by(vars, |v| v.column_type == ColumnType::Numeric),
            Selector::AllNominal => by(vars, |v| v.column_type == ColumnType::Nominal),
            Selector::AllOutcomes => by(vars, |v| v.role == Role::Outcome),
            Selector::Columns(names) => {
                if let Some(missing) = names.iter().find(|n| !vars.iter().any(|v| &v.variable == *n)) {
                    return Err(TabflowError::FeatureNotFound(missing.clone()));
                }
                by(vars, |v| names.contains(&v.variable))
            }
            Selector::Except(a, b) => {
                let (a, b) = (a.mask(vars)?, b.mask(vars)?);
                a.into_iter().zip(b).map(|(x, y)| x && !y).collect()
            }
            Selector::And(a, b) => {
                let (a, b) = (a.mask(vars)?, b.mask(vars)?);
                a.into_iter().zip(b).map(|(x, y)| x || y).collect()
            }
        };
        Ok(mask)
    }
}

fn by(vars: &[VariableInfo], f: impl Fn(&VariableInfo) -> bool) -> Vec<bool> {
    vars.iter().map(f).collect()
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::AllPredictors => write!(f, "all_predictors()"),
            Selector::AllNumericPredictors => write!(f, "all_numeric_predictors()"),
            Selector::AllNominalPredictors => write!(f, "all_nominal_predictors()"),
            Selector::AllNumeric => write!(f, "all_numeric()"),
            Selector::AllNominal => write!(f, "all_nominal()"),
            Selector::AllOutcomes => write!(f, "all_outcomes()"),
            Selector::Columns(names) => write!(f, "{}", names.join(", ")),
            Selector::Except(a, b) => write!(f, "{}, -({})", a, b),
            Selector::And(a, b) => write!(f, "{}, {}", a, b),
        }
    }
}

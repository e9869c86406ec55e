//! Least-squares linear regression

use super::linalg::solve_spd;
use crate::error::{Result, TabflowError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Linear regression fit by the normal equations, ridge-penalised when `alpha > 0`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    /// L2 penalty on the coefficients (not the intercept)
    pub alpha: f64,
    pub is_fitted: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            alpha: 0.0,
            is_fitted: false,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Fit on centred data so the intercept is not penalised
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(TabflowError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(TabflowError::TrainingError("no training rows".to_string()));
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| TabflowError::TrainingError("no training rows".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let x_centered = x - &x_mean.clone().insert_axis(Axis(0));
        let y_centered = y - y_mean;

        let mut xtx = x_centered.t().dot(&x_centered);
        for i in 0..n_features {
            xtx[[i, i]] += self.alpha;
        }
        let xty = x_centered.t().dot(&y_centered);

        let coefficients = solve_spd(&xtx, &xty).ok_or_else(|| {
            TabflowError::ComputationError(
                "normal equations are singular; remove collinear predictors or add a penalty".to_string(),
            )
        })?;

        self.intercept = Some(y_mean - coefficients.dot(&x_mean));
        self.coefficients = Some(coefficients);
        self.is_fitted = true;

        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(TabflowError::ModelNotFitted)?;
        let intercept = self.intercept.unwrap_or(0.0);
        Ok(x.dot(coefficients) + intercept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_exact_fit() {
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0], [5.0, 3.0]];
        let y = x.column(0).mapv(|v| 2.0 * v) + x.column(1).mapv(|v| -1.0 * v) + 0.5;

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.as_ref().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-8);
        assert!((coef[1] + 1.0).abs() < 1e-8);
        assert!((model.intercept.unwrap() - 0.5).abs() < 1e-8);
    }

    #[test]
    fn test_ridge_shrinks() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let mut ols = LinearRegression::new();
        ols.fit(&x, &y).unwrap();
        let mut ridge = LinearRegression::new().with_alpha(10.0);
        ridge.fit(&x, &y).unwrap();
        assert!(ridge.coefficients.as_ref().unwrap()[0] < ols.coefficients.as_ref().unwrap()[0]);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LinearRegression::new();
        assert!(matches!(model.predict(&array![[1.0]]), Err(TabflowError::ModelNotFitted)));
    }
}

//! Binary logistic regression

use super::linalg::solve_spd;
use crate::error::{Result, TabflowError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Fitting algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogisticSolver {
    /// Newton-Raphson / iteratively reweighted least squares
    Irls,
    /// Batch gradient descent
    GradientDescent,
}

/// Logistic regression for a 0/1 target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    /// L2 penalty on the mean log-likelihood (intercept excluded)
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    /// Step size for gradient descent
    pub learning_rate: f64,
    pub solver: LogisticSolver,
    /// Iterations used by the last fit
    pub n_iter: usize,
    pub converged: bool,
    pub is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(LogisticSolver::Irls)
    }
}

fn sigmoid(v: f64) -> f64 {
    if v >= 0.0 {
        1.0 / (1.0 + (-v).exp())
    } else {
        let e = v.exp();
        e / (1.0 + e)
    }
}

/// Binomial deviance of fitted probabilities
fn deviance(y: &Array1<f64>, mu: &Array1<f64>) -> f64 {
    let eps = 1e-15;
    -2.0 * y
        .iter()
        .zip(mu.iter())
        .map(|(&yi, &p)| {
            let p = p.clamp(eps, 1.0 - eps);
            yi * p.ln() + (1.0 - yi) * (1.0 - p).ln()
        })
        .sum::<f64>()
}

impl LogisticRegression {
    pub fn new(solver: LogisticSolver) -> Self {
        let max_iter = match solver {
            LogisticSolver::Irls => 25,
            LogisticSolver::GradientDescent => 1000,
        };
        Self {
            coefficients: None,
            intercept: None,
            alpha: 0.0,
            max_iter,
            tol: 1e-8,
            learning_rate: 0.1,
            solver,
            n_iter: 0,
            converged: false,
            is_fitted: false,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Fit to a target of 0.0 / 1.0 values
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(TabflowError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(TabflowError::TrainingError("no training rows".to_string()));
        }
        if y.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(TabflowError::ValidationError(
                "logistic regression target must be 0 or 1".to_string(),
            ));
        }

        match self.solver {
            LogisticSolver::Irls => self.fit_irls(x, y)?,
            LogisticSolver::GradientDescent => self.fit_gradient_descent(x, y),
        }

        if !self.converged {
            warn!(iterations = self.n_iter, "Logistic regression did not converge");
        }
        debug!(iterations = self.n_iter, solver = ?self.solver, "Fitted logistic regression");
        self.is_fitted = true;
        Ok(self)
    }

    /// Newton steps on the penalised log-likelihood with a deviance stopping rule
    fn fit_irls(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();
        let p = x.ncols() + 1;

        // Design matrix with a leading intercept column
        let mut design = Array2::<f64>::ones((n, p));
        design.slice_mut(ndarray::s![.., 1..]).assign(x);

        let mut beta = Array1::<f64>::zeros(p);
        let mut dev_old = f64::INFINITY;
        self.converged = false;

        for iter in 0..self.max_iter {
            let eta = design.dot(&beta);
            let mu = eta.mapv(sigmoid);
            let w = mu.mapv(|m| (m * (1.0 - m)).max(1e-10));

            // X^T W X + penalty
            let mut xtwx = Array2::<f64>::zeros((p, p));
            for (i, row) in design.outer_iter().enumerate() {
                let wi = w[i];
                for a in 0..p {
                    let ra = row[a] * wi;
                    for b in a..p {
                        xtwx[[a, b]] += ra * row[b];
                    }
                }
            }
            for a in 0..p {
                for b in 0..a {
                    xtwx[[a, b]] = xtwx[[b, a]];
                }
            }
            for a in 1..p {
                xtwx[[a, a]] += self.alpha * n as f64;
            }

            // X^T (W eta + y - mu), the working response without dividing by W
            let rhs_vec: Array1<f64> = (&w * &eta) + y - &mu;
            let rhs = design.t().dot(&rhs_vec);

            let next = solve_spd(&xtwx, &rhs).ok_or_else(|| {
                TabflowError::ComputationError(
                    "singular information matrix; remove collinear predictors or add a penalty".to_string(),
                )
            })?;
            if next.iter().any(|v| !v.is_finite()) {
                return Err(TabflowError::ComputationError(
                    "logistic regression diverged".to_string(),
                ));
            }
            beta = next;
            self.n_iter = iter + 1;

            let mu_new = design.dot(&beta).mapv(sigmoid);
            let penalty = self.alpha * n as f64 * beta.iter().skip(1).map(|b| b * b).sum::<f64>();
            let dev = deviance(y, &mu_new) + penalty;
            if (dev - dev_old).abs() / (dev.abs() + 0.1) < self.tol {
                self.converged = true;
                break;
            }
            dev_old = dev;
        }

        self.intercept = Some(beta[0]);
        self.coefficients = Some(beta.slice(ndarray::s![1..]).to_owned());
        Ok(())
    }

    fn fit_gradient_descent(&mut self, x: &Array2<f64>, y: &Array1<f64>) {
        let n_samples = x.nrows() as f64;
        let mut weights = Array1::<f64>::zeros(x.ncols());
        let mut bias = 0.0;
        self.converged = false;

        for iter in 0..self.max_iter {
            let predictions = (x.dot(&weights) + bias).mapv(sigmoid);
            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples) + (2.0 * self.alpha * &weights);
            let db = errors.mean().unwrap_or(0.0);

            self.n_iter = iter + 1;
            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol.max(1e-6) {
                self.converged = true;
                break;
            }

            weights = weights - self.learning_rate * dw;
            bias -= self.learning_rate * db;
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(TabflowError::ModelNotFitted)?;
        let intercept = self.intercept.unwrap_or(0.0);
        Ok((x.dot(coefficients) + intercept).mapv(sigmoid))
    }
}

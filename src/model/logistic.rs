//! Logistic Regression adapter
//!
//! Primal L2-regularized logistic regression, the formulation used by
//! liblinear:
//!
//! ```text
//! min_w  ½‖w‖² + C Σ log(1 + exp(−yᵢ wᵀx̃ᵢ))      yᵢ ∈ {−1, +1}, x̃ᵢ = [xᵢ, 1]
//! ```
//!
//! The bias is the last coordinate of `w` and is regularized with the rest.
//! Solved with damped Newton steps (Cholesky solve + Armijo backtracking),
//! which makes the fit fully deterministic.

use super::{check_features, check_training_data, sigmoid, ModelAdapter, ParamReader};
use crate::{Error, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logistic Regression hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegressionParams {
    /// Inverse regularization strength
    pub c: f64,
    /// Maximum Newton iterations
    pub max_iter: usize,
    /// Stop when ‖∇f‖ ≤ tol · ‖∇f(0)‖
    pub tol: f64,
    /// Recorded for parity with the other adapters; the solver does not sample
    pub seed: u64,
}

impl Default for LogisticRegressionParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tol: 1e-4,
            seed: 42,
        }
    }
}

impl LogisticRegressionParams {
    pub(crate) fn from_params(reader: &ParamReader<'_>) -> Result<Self> {
        reader.allow_only(&["C", "solver", "max_iter", "tol", "seed"])?;
        reader.fixed_str("solver", "liblinear")?;
        let defaults = Self::default();
        let params = Self {
            c: reader.f64("C", defaults.c)?,
            max_iter: reader.usize("max_iter", defaults.max_iter)?,
            tol: reader.f64("tol", defaults.tol)?,
            seed: reader.u64("seed", defaults.seed)?,
        };
        if params.c <= 0.0 || params.max_iter == 0 || params.tol <= 0.0 {
            return Err(Error::Config(
                "logistic regression needs C > 0, max_iter >= 1 and tol > 0".to_string(),
            ));
        }
        Ok(params)
    }
}

/// Logistic regression for binary classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    params: LogisticRegressionParams,
    coefficients: Option<Vec<f64>>,
    intercept: f64,
    n_iter: usize,
}

/// `log(1 + exp(t))` without overflow
fn softplus(t: f64) -> f64 {
    t.max(0.0) + (-t.abs()).exp().ln_1p()
}

/// Objective value at `w` for margins `z = X̃w`
fn objective(w: &Array1<f64>, z: &Array1<f64>, y_sign: &Array1<f64>, c: f64) -> f64 {
    let loss: f64 = z
        .iter()
        .zip(y_sign.iter())
        .map(|(&zi, &yi)| softplus(-yi * zi))
        .sum();
    0.5 * w.dot(w) + c * loss
}

impl LogisticRegression {
    /// Create an unfitted model
    #[must_use]
    pub const fn new(params: LogisticRegressionParams) -> Self {
        Self {
            params,
            coefficients: None,
            intercept: 0.0,
            n_iter: 0,
        }
    }

    /// Fitted feature weights
    #[must_use]
    pub fn coefficients(&self) -> Option<&[f64]> {
        self.coefficients.as_deref()
    }

    /// Fitted bias
    #[must_use]
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Newton iterations used by the last fit
    #[must_use]
    pub const fn n_iter(&self) -> usize {
        self.n_iter
    }

    fn augment(x: &Array2<f64>) -> Result<Array2<f64>> {
        let ones = Array2::ones((x.nrows(), 1));
        ndarray::concatenate(Axis(1), &[x.view(), ones.view()])
            .map_err(|e| Error::Model(format!("cannot append bias column: {e}")))
    }
}

impl ModelAdapter for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;

        let xa = Self::augment(x)?;
        let dim = xa.ncols();
        let c = self.params.c;
        let y_sign = y.mapv(|v| 2.0 * v - 1.0);

        let mut w = Array1::<f64>::zeros(dim);
        let mut z = xa.dot(&w);
        let mut f = objective(&w, &z, &y_sign, c);
        let mut initial_norm = None;
        let mut iterations = 0;

        for _ in 0..self.params.max_iter {
            // ∇f = w + C Σ (σ(yz) − 1) y x̃
            let coef: Array1<f64> = z
                .iter()
                .zip(y_sign.iter())
                .map(|(&zi, &yi)| c * (sigmoid(yi * zi) - 1.0) * yi)
                .collect();
            let grad = &w + &xa.t().dot(&coef);
            let norm = grad.dot(&grad).sqrt();
            let g0 = *initial_norm.get_or_insert(norm);
            if norm <= self.params.tol * g0 || norm == 0.0 {
                break;
            }

            // H = I + C X̃ᵀ D X̃
            let d: Array1<f64> = z
                .iter()
                .map(|&zi| {
                    let p = sigmoid(zi);
                    c * p * (1.0 - p)
                })
                .collect();
            let weighted = &xa * &d.view().insert_axis(Axis(1));
            let mut hessian = xa.t().dot(&weighted);
            for i in 0..dim {
                hessian[[i, i]] += 1.0;
            }

            let step = cholesky_solve(&hessian, &grad.mapv(|v| -v)).ok_or_else(|| {
                Error::Model("Newton system is not positive definite".to_string())
            })?;

            // Armijo backtracking
            let slope = grad.dot(&step);
            let mut alpha = 1.0;
            loop {
                let candidate = &w + &(alpha * &step);
                let cz = xa.dot(&candidate);
                let cf = objective(&candidate, &cz, &y_sign, c);
                if cf <= f + 1e-4 * alpha * slope || alpha < 1e-10 {
                    w = candidate;
                    z = cz;
                    f = cf;
                    break;
                }
                alpha *= 0.5;
            }
            iterations += 1;
        }

        if !f.is_finite() {
            return Err(Error::Model("logistic regression diverged".to_string()));
        }

        tracing::debug!(iterations, objective = f, "logistic regression fitted");

        let mut coefficients = w.to_vec();
        self.intercept = coefficients.pop().unwrap_or(0.0);
        self.coefficients = Some(coefficients);
        self.n_iter = iterations;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| Error::Model("logistic regression is not fitted".to_string()))?;
        check_features(x, coefficients.len())?;

        let w = Array1::from(coefficients.clone());
        Ok((x.dot(&w) + self.intercept).mapv(sigmoid))
    }

    fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Solve symmetric positive-definite system Ax = b using Cholesky decomposition.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    // A = L Lᵀ
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Lᵀ x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

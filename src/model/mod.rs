//! Model adapters
//!
//! Every classifier family is wrapped behind [`ModelAdapter`], a uniform
//! `fit` / `predict` / `predict_proba` contract over `ndarray` matrices with
//! 0.0/1.0 targets. A [`ModelConfig`] names the family, carries its literal
//! hyperparameters and the probability capability flag; [`ModelConfig::build`]
//! is the only place the family is inspected.
//!
//! ## Families
//!
//! | Kind | Default params |
//! |---|---|
//! | `random_forest` | `n_estimators=200, max_depth=6, max_features=4, seed=42` |
//! | `logistic_regression` | `C=1.0, solver="liblinear", max_iter=100, seed=42` |
//! | `gradient_boosted_trees` | `n_estimators=300, max_depth=5, learning_rate=0.05, subsample=0.9, feature_subsample=0.9, seed=42, loss="logloss"` |

mod boosting;
mod forest;
mod logistic;
mod tree;

pub use boosting::{GradientBoostedTrees, GradientBoostingParams};
pub use forest::{RandomForest, RandomForestParams};
pub use logistic::{LogisticRegression, LogisticRegressionParams};
pub use tree::{Criterion, DecisionTree, TreeNode};

use crate::{Error, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Insertion-ordered hyperparameter map
pub type Params = serde_json::Map<String, Value>;

/// Uniform classifier contract
pub trait ModelAdapter {
    /// Fit on training features and 0.0/1.0 labels
    ///
    /// # Errors
    /// Returns [`Error::Model`] on shape mismatch or a non-binary target
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict 0.0/1.0 labels
    ///
    /// # Errors
    /// Returns [`Error::Model`] if the model is not fitted
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Positive-class probability, for models that can estimate one
    ///
    /// # Errors
    /// Returns [`Error::Model`] if unsupported or not fitted
    fn predict_proba(&self, _x: &Array2<f64>) -> Result<Array1<f64>> {
        Err(Error::Model(
            "probability estimates are not supported by this model".to_string(),
        ))
    }

    /// Serialized fitted state, for the model artifact
    ///
    /// # Errors
    /// Returns [`Error::Json`] if the model cannot be serialized
    fn to_json(&self) -> Result<Value>;
}

/// Classifier family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Bagged CART ensemble
    RandomForest,
    /// L2-regularized logistic regression
    LogisticRegression,
    /// Logloss gradient-boosted trees
    GradientBoostedTrees,
}

/// Literal configuration of one model run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Run/artifact name
    pub name: String,
    /// Model family
    pub kind: ModelKind,
    /// Hyperparameters, logged in insertion order
    #[serde(default)]
    pub params: Params,
    /// Whether ROC-AUC is computed from `predict_proba`
    #[serde(default = "default_supports_probability")]
    pub supports_probability: bool,
}

const fn default_supports_probability() -> bool {
    true
}

fn object(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}

impl ModelConfig {
    /// Create a config
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ModelKind, params: Params) -> Self {
        Self {
            name: name.into(),
            kind,
            params,
            supports_probability: true,
        }
    }

    /// Set the probability capability flag
    #[must_use]
    pub const fn with_probability(mut self, supports_probability: bool) -> Self {
        self.supports_probability = supports_probability;
        self
    }

    /// `RandomForest` with its literal parameters
    #[must_use]
    pub fn random_forest() -> Self {
        Self::new(
            "RandomForest",
            ModelKind::RandomForest,
            object(json!({
                "n_estimators": 200,
                "max_depth": 6,
                "max_features": 4,
                "seed": 42
            })),
        )
    }

    /// `LogisticRegression` with its literal parameters
    #[must_use]
    pub fn logistic_regression() -> Self {
        Self::new(
            "LogisticRegression",
            ModelKind::LogisticRegression,
            object(json!({
                "C": 1.0,
                "solver": "liblinear",
                "max_iter": 100,
                "seed": 42
            })),
        )
    }

    /// `GradientBoostedTrees` with its literal parameters
    #[must_use]
    pub fn gradient_boosted_trees() -> Self {
        Self::new(
            "GradientBoostedTrees",
            ModelKind::GradientBoostedTrees,
            object(json!({
                "n_estimators": 300,
                "max_depth": 5,
                "learning_rate": 0.05,
                "subsample": 0.9,
                "feature_subsample": 0.9,
                "seed": 42,
                "loss": "logloss"
            })),
        )
    }

    /// The three standard configurations, in execution order
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::random_forest(),
            Self::logistic_regression(),
            Self::gradient_boosted_trees(),
        ]
    }

    /// Instantiate an unfitted adapter for this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unknown, mistyped or out-of-range params.
    pub fn build(&self) -> Result<Box<dyn ModelAdapter>> {
        let reader = ParamReader::new(&self.name, &self.params);
        Ok(match self.kind {
            ModelKind::RandomForest => {
                Box::new(RandomForest::new(RandomForestParams::from_params(&reader)?))
            }
            ModelKind::LogisticRegression => Box::new(LogisticRegression::new(
                LogisticRegressionParams::from_params(&reader)?,
            )),
            ModelKind::GradientBoostedTrees => Box::new(GradientBoostedTrees::new(
                GradientBoostingParams::from_params(&reader)?,
            )),
        })
    }
}

/// Typed access to a [`Params`] map with config-error reporting
pub(crate) struct ParamReader<'a> {
    model: &'a str,
    params: &'a Params,
}

impl<'a> ParamReader<'a> {
    pub(crate) const fn new(model: &'a str, params: &'a Params) -> Self {
        Self { model, params }
    }

    fn error(&self, key: &str, expected: &str) -> Error {
        Error::Config(format!(
            "model '{}': param '{key}' must be {expected}, got {}",
            self.model, self.params[key]
        ))
    }

    /// Reject keys outside `allowed`
    pub(crate) fn allow_only(&self, allowed: &[&str]) -> Result<()> {
        match self.params.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(key) => Err(Error::Config(format!(
                "model '{}': unknown param '{key}'",
                self.model
            ))),
            None => Ok(()),
        }
    }

    pub(crate) fn usize(&self, key: &str, default: usize) -> Result<usize> {
        match self.params.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| self.error(key, "a non-negative integer")),
        }
    }

    pub(crate) fn u64(&self, key: &str, default: u64) -> Result<u64> {
        match self.params.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_u64()
                .ok_or_else(|| self.error(key, "a non-negative integer")),
        }
    }

    pub(crate) fn f64(&self, key: &str, default: f64) -> Result<f64> {
        match self.params.get(key) {
            None => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| self.error(key, "a number")),
        }
    }

    /// A string param restricted to one accepted value
    pub(crate) fn fixed_str(&self, key: &str, accepted: &str) -> Result<()> {
        match self.params.get(key) {
            None => Ok(()),
            Some(Value::String(s)) if s == accepted => Ok(()),
            Some(_) => Err(self.error(key, &format!("\"{accepted}\""))),
        }
    }

    /// A fraction in `(0, 1]`
    pub(crate) fn fraction(&self, key: &str, default: f64) -> Result<f64> {
        let value = self.f64(key, default)?;
        if value > 0.0 && value <= 1.0 {
            Ok(value)
        } else {
            Err(self.error(key, "in (0, 1]"))
        }
    }
}

/// Shape and target checks shared by every adapter's `fit`.
pub(crate) fn check_training_data(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(Error::Model(format!(
            "feature rows ({}) != label count ({})",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 {
        return Err(Error::Model("cannot fit on zero rows".to_string()));
    }
    if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(Error::Model(format!("target must be 0/1, found {bad}")));
    }
    Ok(())
}

/// Shape check shared by every adapter's `predict`.
pub(crate) fn check_features(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() == n_features {
        Ok(())
    } else {
        Err(Error::Model(format!(
            "expected {n_features} feature columns, got {}",
            x.ncols()
        )))
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
pub(crate) mod test_data {
    use ndarray::{Array1, Array2};

    /// Two noisy clusters separable mostly on the first two features.
    pub fn separable(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| {
            let class = (i % 2) as f64;
            let jitter = ((i * 7 + j * 13) % 11) as f64 / 11.0;
            match j {
                0 => class * 3.0 + jitter,
                1 => class * 2.0 - jitter,
                _ => jitter * 5.0,
            }
        });
        let y = (0..n).map(|i| (i % 2) as f64).collect();
        (x, y)
    }
}

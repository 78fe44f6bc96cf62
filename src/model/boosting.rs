//! Gradient-boosted trees adapter
//!
//! Logloss boosting: every round fits a regression tree to the negative
//! gradient `y − σ(F)` on a row/column subsample and adds
//! `learning_rate · tree(x)` to the raw score of every row.

use super::tree::DecisionTree;
use super::{check_features, check_training_data, sigmoid, ModelAdapter, ParamReader};
use crate::{Error, Result};
use ndarray::{Array1, Array2};
use rand::seq::{index, SliceRandom};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gradient boosting hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingParams {
    /// Boosting rounds
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: usize,
    /// Shrinkage applied to every tree
    pub learning_rate: f64,
    /// Row fraction drawn per round, in `(0, 1]`
    pub subsample: f64,
    /// Column fraction drawn per round, in `(0, 1]`
    pub feature_subsample: f64,
    /// Seed for row and column sampling
    pub seed: u64,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            max_depth: 5,
            learning_rate: 0.05,
            subsample: 0.9,
            feature_subsample: 0.9,
            seed: 42,
        }
    }
}

impl GradientBoostingParams {
    pub(crate) fn from_params(reader: &ParamReader<'_>) -> Result<Self> {
        reader.allow_only(&[
            "n_estimators",
            "max_depth",
            "learning_rate",
            "subsample",
            "feature_subsample",
            "seed",
            "loss",
        ])?;
        reader.fixed_str("loss", "logloss")?;
        let defaults = Self::default();
        let params = Self {
            n_estimators: reader.usize("n_estimators", defaults.n_estimators)?,
            max_depth: reader.usize("max_depth", defaults.max_depth)?,
            learning_rate: reader.f64("learning_rate", defaults.learning_rate)?,
            subsample: reader.fraction("subsample", defaults.subsample)?,
            feature_subsample: reader.fraction("feature_subsample", defaults.feature_subsample)?,
            seed: reader.u64("seed", defaults.seed)?,
        };
        if params.n_estimators == 0 || params.max_depth == 0 || params.learning_rate <= 0.0 {
            return Err(Error::Config(
                "gradient boosting needs n_estimators >= 1, max_depth >= 1 and learning_rate > 0"
                    .to_string(),
            ));
        }
        Ok(params)
    }
}

/// Gradient-boosted decision trees for binary classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    params: GradientBoostingParams,
    /// Log-odds of the training prior
    base_score: f64,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn sample_size(n: usize, fraction: f64) -> usize {
    ((n as f64 * fraction).ceil() as usize).clamp(1, n)
}

impl GradientBoostedTrees {
    /// Create an unfitted ensemble
    #[must_use]
    pub const fn new(params: GradientBoostingParams) -> Self {
        Self {
            params,
            base_score: 0.0,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    /// Number of boosting rounds fitted
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw additive score `F(x)` before the sigmoid
    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(Error::Model("gradient boosting is not fitted".to_string()));
        }
        check_features(x, self.n_features)?;

        let mut score = Array1::from_elem(x.nrows(), self.base_score);
        for tree in &self.trees {
            score.scaled_add(self.params.learning_rate, &tree.predict(x)?);
        }
        Ok(score)
    }
}

impl ModelAdapter for GradientBoostedTrees {
    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let n_rows = sample_size(n_samples, self.params.subsample);
        let n_cols = sample_size(n_features, self.params.feature_subsample);

        let prior = (y.sum() / n_samples as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (prior / (1.0 - prior)).ln();

        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed);
        let mut score = Array1::from_elem(n_samples, base_score);
        let mut columns: Vec<usize> = (0..n_features).collect();
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for _ in 0..self.params.n_estimators {
            let residual: Array1<f64> = y
                .iter()
                .zip(score.iter())
                .map(|(&target, &f)| target - sigmoid(f))
                .collect();

            let mut rows = index::sample(&mut rng, n_samples, n_rows).into_vec();
            rows.sort_unstable();
            columns.shuffle(&mut rng);
            let mut features = columns[..n_cols].to_vec();
            features.sort_unstable();

            let mut tree = DecisionTree::new_regressor().with_max_depth(self.params.max_depth);
            tree.fit_rows(x, &residual, &rows, &features, &mut rng)?;

            score.scaled_add(self.params.learning_rate, &tree.predict(x)?);
            trees.push(tree);
        }

        tracing::debug!(rounds = trees.len(), base_score, "gradient boosting fitted");
        self.base_score = base_score;
        self.trees = trees;
        self.n_features = n_features;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

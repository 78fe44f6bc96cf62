//! Random Forest adapter

use super::tree::DecisionTree;
use super::{check_training_data, ModelAdapter, ParamReader};
use crate::{Error, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Random Forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Candidate features per split
    pub max_features: Option<usize>,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Base seed; tree `t` uses `seed + t`
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: Some(6),
            max_features: Some(4),
            min_samples_leaf: 1,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl RandomForestParams {
    pub(crate) fn from_params(reader: &ParamReader<'_>) -> Result<Self> {
        reader.allow_only(&[
            "n_estimators",
            "max_depth",
            "max_features",
            "min_samples_leaf",
            "seed",
        ])?;
        let defaults = Self::default();
        let params = Self {
            n_estimators: reader.usize("n_estimators", defaults.n_estimators)?,
            max_depth: defaults
                .max_depth
                .map(|d| reader.usize("max_depth", d))
                .transpose()?,
            max_features: defaults
                .max_features
                .map(|k| reader.usize("max_features", k))
                .transpose()?,
            min_samples_leaf: reader.usize("min_samples_leaf", defaults.min_samples_leaf)?,
            bootstrap: true,
            seed: reader.u64("seed", defaults.seed)?,
        };
        if params.n_estimators == 0 || params.min_samples_leaf == 0 {
            return Err(Error::Config(
                "random forest needs n_estimators >= 1 and min_samples_leaf >= 1".to_string(),
            ));
        }
        Ok(params)
    }
}

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    params: RandomForestParams,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Create an unfitted forest
    #[must_use]
    pub const fn new(params: RandomForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
        }
    }

    /// Get number of fitted trees
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl ModelAdapter for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;

        let n_samples = x.nrows();
        let features: Vec<usize> = (0..x.ncols()).collect();

        let mut trees = Vec::with_capacity(self.params.n_estimators);
        for tree_idx in 0..self.params.n_estimators {
            let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed.wrapping_add(tree_idx as u64));

            let rows: Vec<usize> = if self.params.bootstrap {
                (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
            } else {
                (0..n_samples).collect()
            };

            let mut tree =
                DecisionTree::new_classifier().with_min_samples_leaf(self.params.min_samples_leaf);
            if let Some(d) = self.params.max_depth {
                tree = tree.with_max_depth(d);
            }
            if let Some(k) = self.params.max_features {
                tree = tree.with_max_features(k);
            }

            tree.fit_rows(x, y, &rows, &features, &mut rng)?;
            trees.push(tree);
        }

        tracing::debug!(trees = trees.len(), rows = n_samples, "random forest fitted");
        self.trees = trees;
        Ok(())
    }

    /// Majority of averaged leaf probabilities; exact ties go to class 0
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    #[allow(clippy::cast_precision_loss)]
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let Some(first) = self.trees.first() else {
            return Err(Error::Model("random forest is not fitted".to_string()));
        };
        let mut sum = first.predict(x)?;
        for tree in &self.trees[1..] {
            sum += &tree.predict(x)?;
        }
        Ok(sum / self.trees.len() as f64)
    }

    fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_data::separable;

    fn small() -> RandomForestParams {
        RandomForestParams {
            n_estimators: 15,
            max_depth: Some(4),
            max_features: Some(2),
            ..RandomForestParams::default()
        }
    }

    #[test]
    fn test_classifier_accuracy() {
        let (x, y) = separable(80);
        let mut rf = RandomForest::new(small());
        rf.fit(&x, &y).unwrap();

        let pred = rf.predict(&x).unwrap();
        let correct = pred.iter().zip(y.iter()).filter(|(p, a)| p == a).count();
        assert!(correct >= 72, "accuracy too low: {correct}/80");
        assert_eq!(rf.n_trees(), 15);
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (x, y) = separable(40);
        let mut rf = RandomForest::new(small());
        rf.fit(&x, &y).unwrap();

        for p in rf.predict_proba(&x).unwrap() {
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_same_seed_same_model() {
        let (x, y) = separable(40);
        let mut a = RandomForest::new(small());
        let mut b = RandomForest::new(small());
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_unfitted() {
        let rf = RandomForest::new(small());
        assert!(rf.predict(&Array2::zeros((1, 3))).is_err());
    }

    #[test]
    fn test_serializes() {
        let (x, y) = separable(20);
        let mut rf = RandomForest::new(small());
        rf.fit(&x, &y).unwrap();
        let json = rf.to_json().unwrap();
        assert_eq!(json["trees"].as_array().unwrap().len(), 15);
    }
}

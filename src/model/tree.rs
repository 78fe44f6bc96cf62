//! CART decision tree shared by the forest and boosting adapters

use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        /// Mean target of the rows reaching this leaf
        value: f64,
        /// Rows reaching this leaf
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        /// Column index into the full feature matrix
        feature_idx: usize,
        /// Rows with `x <= threshold` go left
        threshold: f64,
        /// `<=` branch
        left: Box<TreeNode>,
        /// `>` branch
        right: Box<TreeNode>,
        /// Rows reaching this node
        n_samples: usize,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity over 0/1 targets (classification)
    Gini,
    /// Mean squared error (regression)
    Mse,
}

/// Decision tree model
///
/// Leaves store the mean target, so a Gini tree over 0/1 labels predicts the
/// positive-class fraction and an MSE tree predicts the mean residual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Candidate features drawn per split (all when `None`)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    n_features: usize,
}

/// Running sums for one side of a candidate split
#[derive(Clone, Copy, Default)]
struct SideStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
}

impl SideStats {
    fn push(&mut self, y: f64) {
        self.count += 1;
        self.sum += y;
        self.sq_sum += y * y;
    }

    fn minus(self, other: Self) -> Self {
        Self {
            count: self.count - other.count,
            sum: self.sum - other.sum,
            sq_sum: self.sq_sum - other.sq_sum,
        }
    }
}

struct BestSplit {
    feature_idx: usize,
    threshold: f64,
}

impl DecisionTree {
    fn with_criterion(criterion: Criterion) -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion,
            n_features: 0,
        }
    }

    /// Create a new classifier tree
    #[must_use]
    pub fn new_classifier() -> Self {
        Self::with_criterion(Criterion::Gini)
    }

    /// Create a new regressor tree
    #[must_use]
    pub fn new_regressor() -> Self {
        Self::with_criterion(Criterion::Mse)
    }

    /// Set maximum depth
    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set the number of candidate features per split
    #[must_use]
    pub const fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set minimum samples in leaf
    #[must_use]
    pub const fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Fit on the given `rows` (duplicates allowed, e.g. a bootstrap draw),
    /// considering only the columns in `features`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Model`] on shape mismatch, empty `rows`/`features`,
    /// or out-of-bounds indices.
    pub fn fit_rows(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        rows: &[usize],
        features: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(Error::Model(format!(
                "feature rows ({}) != target count ({})",
                x.nrows(),
                y.len()
            )));
        }
        if rows.is_empty() || features.is_empty() {
            return Err(Error::Model("tree needs at least one row and one feature".to_string()));
        }
        if rows.iter().any(|&r| r >= x.nrows()) || features.iter().any(|&f| f >= x.ncols()) {
            return Err(Error::Model("row or feature index out of bounds".to_string()));
        }

        self.n_features = x.ncols();
        let mut rows = rows.to_vec();
        self.root = Some(self.build(x, y, &mut rows, features, 0, rng));
        Ok(())
    }

    fn leaf(y: &Array1<f64>, rows: &[usize]) -> TreeNode {
        let sum: f64 = rows.iter().map(|&r| y[r]).sum();
        #[allow(clippy::cast_precision_loss)]
        let value = sum / rows.len() as f64;
        TreeNode::Leaf {
            value,
            n_samples: rows.len(),
        }
    }

    fn build(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        rows: &mut [usize],
        features: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = rows.len();
        let first = y[rows[0]];
        let is_pure = rows.iter().all(|&r| (y[r] - first).abs() < 1e-12);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.is_some_and(|d| depth >= d)
            || is_pure;
        if should_stop {
            return Self::leaf(y, rows);
        }

        let Some(best) = self.find_best_split(x, y, rows, features, rng) else {
            return Self::leaf(y, rows);
        };

        // Partition in place: `<= threshold` first
        let mut boundary = 0;
        for i in 0..rows.len() {
            if x[[rows[i], best.feature_idx]] <= best.threshold {
                rows.swap(i, boundary);
                boundary += 1;
            }
        }
        let (left_rows, right_rows) = rows.split_at_mut(boundary);

        let left = Box::new(self.build(x, y, left_rows, features, depth + 1, rng));
        let right = Box::new(self.build(x, y, right_rows, features, depth + 1, rng));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn impurity(&self, stats: SideStats) -> f64 {
        if stats.count == 0 {
            return 0.0;
        }
        let n = stats.count as f64;
        let mean = stats.sum / n;
        match self.criterion {
            Criterion::Gini => 2.0 * mean * (1.0 - mean),
            Criterion::Mse => (stats.sq_sum / n - mean * mean).max(0.0),
        }
    }

    /// Sorted sweep over each candidate feature; returns the split with the
    /// largest impurity decrease, if any decreases impurity at all.
    #[allow(clippy::cast_precision_loss)]
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        rows: &[usize],
        features: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Option<BestSplit> {
        let mut candidates = features.to_vec();
        if let Some(k) = self.max_features {
            candidates.shuffle(rng);
            candidates.truncate(k.clamp(1, features.len()));
        }

        let mut total = SideStats::default();
        for &r in rows {
            total.push(y[r]);
        }
        let n = rows.len() as f64;
        let parent = self.impurity(total);

        let mut best: Option<(BestSplit, f64)> = None;
        let mut sorted = rows.to_vec();

        for &feature_idx in &candidates {
            sorted.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

            let mut left = SideStats::default();
            for i in 0..sorted.len() - 1 {
                left.push(y[sorted[i]]);
                let here = x[[sorted[i], feature_idx]];
                let next = x[[sorted[i + 1], feature_idx]];
                if here >= next {
                    continue;
                }

                let right = total.minus(left);
                if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                    continue;
                }

                let weighted = (left.count as f64 * self.impurity(left)
                    + right.count as f64 * self.impurity(right))
                    / n;
                let gain = parent - weighted;

                if gain > 1e-12 && best.as_ref().map_or(true, |(_, g)| gain > *g) {
                    let threshold = here + (next - here) / 2.0;
                    best = Some((
                        BestSplit {
                            feature_idx,
                            threshold,
                        },
                        gain,
                    ));
                }
            }
        }

        best.map(|(split, _)| split)
    }

    /// Predict one row
    fn predict_row(&self, root: &TreeNode, row: ArrayView1<'_, f64>) -> f64 {
        let mut node = root;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Make predictions
    ///
    /// # Errors
    ///
    /// Returns [`Error::Model`] if the tree is not fitted or `x` has the
    /// wrong number of columns.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| Error::Model("decision tree is not fitted".to_string()))?;
        super::check_features(x, self.n_features)?;

        Ok(x.rows()
            .into_iter()
            .map(|row| self.predict_row(root, row))
            .collect())
    }

    /// Get tree depth (a lone leaf has depth 1)
    #[must_use]
    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_classifier_simple() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 1.0], [4.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit_rows(&x, &y, &[0, 1, 2, 3], &[0, 1], &mut rng()).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn test_regressor_leaf_means() {
        let x = array![[1.0], [2.0], [10.0], [11.0]];
        let y = array![1.0, 3.0, 10.0, 12.0];

        let mut tree = DecisionTree::new_regressor().with_max_depth(1);
        tree.fit_rows(&x, &y, &[0, 1, 2, 3], &[0], &mut rng()).unwrap();

        let pred = tree.predict(&x).unwrap();
        assert!((pred[0] - 2.0).abs() < 1e-12);
        assert!((pred[3] - 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_max_depth_respected() {
        let (x, y) = crate::model::test_data::separable(64);
        let rows: Vec<usize> = (0..64).collect();

        let mut tree = DecisionTree::new_classifier().with_max_depth(2);
        tree.fit_rows(&x, &y, &rows, &[0, 1, 2], &mut rng()).unwrap();
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_bootstrap_rows_with_duplicates() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit_rows(&x, &y, &[0, 0, 3, 3, 1], &[0], &mut rng()).unwrap();
        let pred = tree.predict(&x).unwrap();
        assert!(pred[0] < 0.5);
        assert!(pred[3] > 0.5);
    }

    #[test]
    fn test_unfitted_predict_fails() {
        let tree = DecisionTree::new_classifier();
        assert!(tree.predict(&array![[1.0]]).is_err());
    }

    #[test]
    fn test_out_of_bounds_rows_rejected() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 1.0];
        let mut tree = DecisionTree::new_classifier();
        assert!(tree.fit_rows(&x, &y, &[0, 5], &[0], &mut rng()).is_err());
    }
}

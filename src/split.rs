//! Deterministic stratified train/test partition
//!
//! Each class receives `floor(n_test · n_class / n)` test rows, and the rows
//! left over after flooring go to the classes with the largest fractional
//! parts. Rows within a class are drawn by a seeded shuffle, so the same seed
//! and input order always produce the same membership.

use crate::{Error, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Default held-out fraction
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Default split seed
pub const DEFAULT_SEED: u64 = 42;

/// The finalized, read-only split shared by every model run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    /// Training features
    pub x_train: Array2<f64>,
    /// Held-out features
    pub x_test: Array2<f64>,
    /// Training labels (0.0/1.0)
    pub y_train: Array1<f64>,
    /// Held-out labels (0.0/1.0)
    pub y_test: Array1<f64>,
    /// Source row of each training row
    pub train_indices: Vec<usize>,
    /// Source row of each held-out row
    pub test_indices: Vec<usize>,
}

/// Stratified splitter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSplitter {
    test_fraction: f64,
    seed: u64,
}

impl Default for FeatureSplitter {
    fn default() -> Self {
        Self {
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: DEFAULT_SEED,
        }
    }
}

impl FeatureSplitter {
    /// Create a splitter
    ///
    /// # Errors
    ///
    /// Returns [`Error::Split`] unless `0 < test_fraction < 1`.
    pub fn new(test_fraction: f64, seed: u64) -> Result<Self> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(Error::Split(format!(
                "test_fraction must be in (0, 1), got {test_fraction}"
            )));
        }
        Ok(Self {
            test_fraction,
            seed,
        })
    }

    /// Held-out fraction
    #[must_use]
    pub const fn test_fraction(&self) -> f64 {
        self.test_fraction
    }

    /// Shuffle seed
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of held-out rows for `n` samples
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn test_size(&self, n: usize) -> usize {
        (self.test_fraction * n as f64).ceil() as usize
    }

    /// Partition `(x, y)` into train and test sets.
    ///
    /// # Errors
    ///
    /// - [`Error::Data`] if `y` has a single class
    /// - [`Error::Split`] on shape mismatch, or when train or test would be
    ///   smaller than the number of classes
    pub fn split(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<TrainTestSplit> {
        if x.nrows() != y.len() {
            return Err(Error::Split(format!(
                "feature rows ({}) != label count ({})",
                x.nrows(),
                y.len()
            )));
        }

        let labels: Vec<f64> = y.to_vec();
        let (train_indices, test_indices) = self.indices(&labels)?;

        Ok(TrainTestSplit {
            x_train: x.select(Axis(0), &train_indices),
            x_test: x.select(Axis(0), &test_indices),
            y_train: y.select(Axis(0), &train_indices),
            y_test: y.select(Axis(0), &test_indices),
            train_indices,
            test_indices,
        })
    }

    /// Compute `(train, test)` row indices for labels `y`.
    ///
    /// # Errors
    ///
    /// See [`FeatureSplitter::split`].
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn indices(&self, y: &[f64]) -> Result<(Vec<usize>, Vec<usize>)> {
        let n = y.len();

        let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &label) in y.iter().enumerate() {
            by_class.entry(label.round() as i64).or_default().push(idx);
        }

        if by_class.len() < 2 {
            return Err(Error::Data("cannot stratify: single class".to_string()));
        }

        let n_classes = by_class.len();
        let n_test = self.test_size(n);
        let n_train = n - n_test.min(n);
        if n_test < n_classes || n_train < n_classes {
            return Err(Error::Split(format!(
                "cannot stratify {n} rows into test={n_test}/train={n_train} with {n_classes} classes"
            )));
        }

        // Floor allocation, then largest remainder
        let mut alloc: Vec<(i64, usize, f64)> = by_class
            .iter()
            .map(|(&class, rows)| {
                let exact = n_test as f64 * rows.len() as f64 / n as f64;
                (class, exact.floor() as usize, exact - exact.floor())
            })
            .collect();
        let mut remaining = n_test - alloc.iter().map(|(_, k, _)| k).sum::<usize>();
        let mut order: Vec<usize> = (0..alloc.len()).collect();
        order.sort_by(|&a, &b| alloc[b].2.total_cmp(&alloc[a].2).then(a.cmp(&b)));
        for &i in order.iter().cycle().take(order.len() * 2) {
            if remaining == 0 {
                break;
            }
            let capacity = by_class[&alloc[i].0].len();
            if alloc[i].1 < capacity {
                alloc[i].1 += 1;
                remaining -= 1;
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut train = Vec::with_capacity(n_train);
        let mut test = Vec::with_capacity(n_test);

        for (class, k, _) in &alloc {
            let mut rows = by_class[class].clone();
            rows.shuffle(&mut rng);
            test.extend_from_slice(&rows[..*k]);
            train.extend_from_slice(&rows[*k..]);
        }

        train.shuffle(&mut rng);
        test.shuffle(&mut rng);

        tracing::debug!(
            rows = n,
            train = train.len(),
            test = test.len(),
            seed = self.seed,
            "stratified split"
        );

        Ok((train, test))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pos: usize, neg: usize) -> Vec<f64> {
        let mut y = vec![1.0; pos];
        y.extend(std::iter::repeat(0.0).take(neg));
        y
    }

    #[test]
    fn test_sizes_and_disjointness() {
        let y = labels(40, 60);
        let (train, test) = FeatureSplitter::default().indices(&y).unwrap();

        assert_eq!(test.len(), 20);
        assert_eq!(train.len(), 80);

        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_stratification_preserves_proportion() {
        let y = labels(30, 70);
        let (train, test) = FeatureSplitter::default().indices(&y).unwrap();

        let test_pos = test.iter().filter(|&&i| y[i] > 0.5).count();
        let train_pos = train.iter().filter(|&&i| y[i] > 0.5).count();
        assert_eq!(test_pos, 6);
        assert_eq!(train_pos, 24);
    }

    #[test]
    fn test_deterministic_for_same_seed() {
        let y = labels(17, 23);
        let a = FeatureSplitter::default().indices(&y).unwrap();
        let b = FeatureSplitter::default().indices(&y).unwrap();
        assert_eq!(a, b);

        let c = FeatureSplitter::new(0.2, 7).unwrap().indices(&y).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_single_class_rejected() {
        let err = FeatureSplitter::default().indices(&labels(0, 10)).unwrap_err();
        assert!(matches!(err, Error::Data(_)));
        assert!(err.to_string().contains("cannot stratify: single class"));
    }

    #[test]
    fn test_too_small_to_stratify() {
        let err = FeatureSplitter::default().indices(&labels(1, 2)).unwrap_err();
        assert!(matches!(err, Error::Split(_)));
    }

    #[test]
    fn test_invalid_fraction() {
        assert!(FeatureSplitter::new(0.0, 42).is_err());
        assert!(FeatureSplitter::new(1.0, 42).is_err());
        assert!(FeatureSplitter::new(f64::NAN, 42).is_err());
    }

    #[test]
    fn test_split_selects_matching_rows() {
        let x = Array2::from_shape_fn((10, 2), |(i, j)| (i * 10 + j) as f64);
        let y: Array1<f64> = (0..10).map(|i| f64::from(u8::from(i % 2 == 0))).collect();
        let split = FeatureSplitter::default().split(&x, &y).unwrap();

        assert_eq!(split.x_test.nrows(), 2);
        for (row, &src) in split.test_indices.iter().enumerate() {
            assert!((split.x_test[[row, 0]] - (src * 10) as f64).abs() < f64::EPSILON);
            assert!((split.y_test[row] - y[src]).abs() < f64::EPSILON);
        }
    }
}

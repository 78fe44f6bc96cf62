//! Binary classification metrics
//!
//! Labels are 0.0/1.0 as produced by [`crate::model::ModelAdapter::predict`];
//! the positive class is 1.

use crate::{Error, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 2×2 confusion matrix. Rows are the true class, columns the prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// True 0, predicted 0
    pub true_negative: usize,
    /// True 0, predicted 1
    pub false_positive: usize,
    /// True 1, predicted 0
    pub false_negative: usize,
    /// True 1, predicted 1
    pub true_positive: usize,
}

impl ConfusionMatrix {
    /// Count outcomes over paired labels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] if the slices differ in length or either holds
    /// a value other than 0.0/1.0.
    pub fn from_labels(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(Error::Data(format!(
                "label length mismatch: {} true vs {} predicted",
                y_true.len(),
                y_pred.len()
            )));
        }

        let mut cm = Self {
            true_negative: 0,
            false_positive: 0,
            false_negative: 0,
            true_positive: 0,
        };
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (binary(t)?, binary(p)?) {
                (false, false) => cm.true_negative += 1,
                (false, true) => cm.false_positive += 1,
                (true, false) => cm.false_negative += 1,
                (true, true) => cm.true_positive += 1,
            }
        }
        Ok(cm)
    }

    /// Sum of all four cells
    #[must_use]
    pub const fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    /// Cells as `[[tn, fp], [fn, tp]]`
    #[must_use]
    pub const fn as_rows(&self) -> [[usize; 2]; 2] {
        [
            [self.true_negative, self.false_positive],
            [self.false_negative, self.true_positive],
        ]
    }

    /// Proportion of correct predictions (0 on an empty matrix)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.true_negative + self.true_positive) as f64 / total as f64
        }
    }

    /// Positive-class F1. 0.0 if there are no true or predicted positives.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn f1(&self) -> f64 {
        let denom = 2 * self.true_positive + self.false_positive + self.false_negative;
        if denom == 0 {
            0.0
        } else {
            2.0 * self.true_positive as f64 / denom as f64
        }
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>8} {:>7} {:>7}", "", "pred_0", "pred_1")?;
        writeln!(
            f,
            "{:>8} {:>7} {:>7}",
            "true_0", self.true_negative, self.false_positive
        )?;
        writeln!(
            f,
            "{:>8} {:>7} {:>7}",
            "true_1", self.false_negative, self.true_positive
        )
    }
}

fn binary(v: f64) -> Result<bool> {
    if v == 0.0 {
        Ok(false)
    } else if v == 1.0 {
        Ok(true)
    } else {
        Err(Error::Data(format!("label must be 0 or 1, found {v}")))
    }
}

/// Fraction of matching labels.
///
/// # Errors
///
/// See [`ConfusionMatrix::from_labels`].
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    Ok(ConfusionMatrix::from_labels(y_true, y_pred)?.accuracy())
}

/// Binary F1 for the positive class.
///
/// # Errors
///
/// See [`ConfusionMatrix::from_labels`].
pub fn f1_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    Ok(ConfusionMatrix::from_labels(y_true, y_pred)?.f1())
}

/// Area under the ROC curve via the Mann–Whitney U statistic.
///
/// Tied scores receive their average rank, which counts a tied
/// positive/negative pair as half-correct.
///
/// # Errors
///
/// Returns [`Error::Data`] on a length mismatch, a non-binary label, or a
/// `y_true` containing only one class.
#[allow(clippy::cast_precision_loss)]
pub fn roc_auc(y_true: &Array1<f64>, y_score: &Array1<f64>) -> Result<f64> {
    if y_true.len() != y_score.len() {
        return Err(Error::Data(format!(
            "label length mismatch: {} true vs {} scores",
            y_true.len(),
            y_score.len()
        )));
    }
    let positive: Vec<bool> = y_true.iter().map(|&t| binary(t)).collect::<Result<_>>()?;
    let n_pos = positive.iter().filter(|&&p| p).count();
    let n_neg = positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(Error::Data(
            "ROC-AUC is undefined when y_true has a single class".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| y_score[a].total_cmp(&y_score[b]));

    // 1-based average ranks over tie groups
    let mut rank_sum_pos = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && y_score[order[end]] == y_score[order[start]] {
            end += 1;
        }
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let pos_in_group = order[start..end].iter().filter(|&&i| positive[i]).count();
        rank_sum_pos += avg_rank * pos_in_group as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    let u = rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0;
    Ok(u / (n_pos * n_neg as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_confusion_cells() {
        let t = array![0.0, 0.0, 1.0, 1.0, 1.0];
        let p = array![0.0, 1.0, 1.0, 0.0, 1.0];
        let cm = ConfusionMatrix::from_labels(&t, &p).unwrap();
        assert_eq!(cm.as_rows(), [[1, 1], [1, 2]]);
        assert_eq!(cm.total(), 5);
    }

    #[test]
    fn test_accuracy_and_f1() {
        let t = array![0.0, 0.0, 1.0, 1.0, 1.0];
        let p = array![0.0, 1.0, 1.0, 0.0, 1.0];
        assert!((accuracy(&t, &p).unwrap() - 0.6).abs() < 1e-12);
        // precision 2/3, recall 2/3
        assert!((f1_score(&t, &p).unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_f1_no_positives() {
        let t = array![0.0, 0.0];
        let p = array![0.0, 0.0];
        assert_eq!(f1_score(&t, &p).unwrap(), 0.0);
        assert_eq!(accuracy(&t, &p).unwrap(), 1.0);
    }

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let t = array![0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&t, &array![0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0);
        assert_eq!(roc_auc(&t, &array![0.9, 0.8, 0.2, 0.1]).unwrap(), 0.0);
    }

    #[test]
    fn test_roc_auc_ties() {
        let t = array![0.0, 1.0];
        assert!((roc_auc(&t, &array![0.5, 0.5]).unwrap() - 0.5).abs() < 1e-12);

        // pairs: (0.1 vs 0.4 ok) (0.1 vs 0.35 ok) (0.4 vs 0.4 half) (0.4 vs 0.35 miss)
        let t = array![0.0, 1.0, 0.0, 1.0];
        let s = array![0.1, 0.4, 0.4, 0.35];
        assert!((roc_auc(&t, &s).unwrap() - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_single_class() {
        let t = array![1.0, 1.0, 1.0];
        assert!(matches!(
            roc_auc(&t, &array![0.2, 0.5, 0.9]),
            Err(Error::Data(_))
        ));
    }

    #[test]
    fn test_non_binary_label_rejected() {
        assert!(ConfusionMatrix::from_labels(&array![0.5], &array![1.0]).is_err());
        assert!(accuracy(&array![1.0], &array![1.0, 0.0]).is_err());
    }
}

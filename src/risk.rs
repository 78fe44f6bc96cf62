//! Risk score derivation and the synthetic `disease_risk_real` label
//!
//! The label is manufactured from the features themselves:
//!
//! ```text
//! raw   = Σ weight_i · normalized(feature_i)      (≤ Σ weights = 1.5)
//! score = (raw - min(raw)) / (max(raw) - min(raw)) (∈ [0, 1])
//! label = score > median(score)                    (ties → false)
//! ```
//!
//! Normalization is `value / max(value)` for "higher is worse" columns and
//! `1 - value / max(value)` for "higher is better" columns (`sleep_hours`,
//! `daily_steps`). Boolean columns contribute their weight directly.
//!
//! Every statistic (column maxima, score min/max, median) is dataset-wide, so
//! derivation must run once over the full snapshot before splitting.

use crate::storage::RawRecord;
use crate::{Error, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Fixed weight table. Not learned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskScoreWeights {
    /// Age (higher is worse)
    pub age: f64,
    /// BMI (higher is worse)
    pub bmi: f64,
    /// Cholesterol (higher is worse)
    pub cholesterol: f64,
    /// Systolic blood pressure (higher is worse)
    pub systolic_bp: f64,
    /// Alcohol flag
    pub alcohol: f64,
    /// Sleep hours (inverted)
    pub sleep_hours: f64,
    /// Daily steps (inverted)
    pub daily_steps: f64,
    /// Smoker flag
    pub smoker: f64,
    /// Family history flag
    pub family_history: f64,
}

impl RiskScoreWeights {
    /// The literal weight table used for `disease_risk_real`.
    pub const STANDARD: Self = Self {
        age: 0.15,
        bmi: 0.20,
        cholesterol: 0.15,
        systolic_bp: 0.15,
        alcohol: 0.10,
        sleep_hours: 0.10,
        daily_steps: 0.10,
        smoker: 0.25,
        family_history: 0.30,
    };

    /// Upper bound of the raw (pre-rescale) score.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.age
            + self.bmi
            + self.cholesterol
            + self.systolic_bp
            + self.alcohol
            + self.sleep_hours
            + self.daily_steps
            + self.smoker
            + self.family_history
    }
}

impl Default for RiskScoreWeights {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Coarse banding of a rescaled score, as shown to subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// score < 0.25
    Low,
    /// 0.25 ≤ score < 0.5
    Moderate,
    /// 0.5 ≤ score < 0.75
    High,
    /// score ≥ 0.75
    Critical,
}

impl RiskLevel {
    /// All levels, lowest first
    pub const ALL: [Self; 4] = [Self::Low, Self::Moderate, Self::High, Self::Critical];

    /// Band a score in `[0, 1]`.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score < 0.25 {
            Self::Low
        } else if score < 0.5 {
            Self::Moderate
        } else if score < 0.75 {
            Self::High
        } else {
            Self::Critical
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Output of [`RiskScoreDeriver::derive`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDerivation {
    /// Weighted sums before the dataset-wide rescale
    pub raw_scores: Vec<f64>,
    /// Rescaled scores in `[0, 1]`
    pub scores: Vec<f64>,
    /// Median of `scores`
    pub median: f64,
    /// `disease_risk_real`: `score > median`
    pub labels: Vec<bool>,
}

impl RiskDerivation {
    /// Number of records labelled at-risk
    #[must_use]
    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l).count()
    }

    /// Number of records labelled not-at-risk
    #[must_use]
    pub fn negatives(&self) -> usize {
        self.labels.len() - self.positives()
    }

    /// Labels as a 0.0/1.0 target vector for the model adapters
    #[must_use]
    pub fn label_vector(&self) -> Array1<f64> {
        self.labels.iter().map(|&l| f64::from(u8::from(l))).collect()
    }

    /// Count of records per [`RiskLevel`], lowest level first
    #[must_use]
    pub fn level_counts(&self) -> Vec<(RiskLevel, usize)> {
        RiskLevel::ALL
            .iter()
            .map(|&level| {
                let count = self
                    .scores
                    .iter()
                    .filter(|&&s| RiskLevel::from_score(s) == level)
                    .count();
                (level, count)
            })
            .collect()
    }
}

/// Turns raw feature rows into rescaled risk scores and binary labels
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskScoreDeriver {
    weights: RiskScoreWeights,
}

impl RiskScoreDeriver {
    /// Create a deriver with a custom weight table
    #[must_use]
    pub const fn new(weights: RiskScoreWeights) -> Self {
        Self { weights }
    }

    /// Weight table in use
    #[must_use]
    pub const fn weights(&self) -> &RiskScoreWeights {
        &self.weights
    }

    /// Derive scores and labels for the full dataset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] when the dataset is empty, a normalized
    /// column holds NaN or infinite values, is constant (or has a
    /// non-positive maximum), every record scores the same, or the derived
    /// label has a single class.
    pub fn derive(&self, records: &[RawRecord]) -> Result<RiskDerivation> {
        if records.is_empty() {
            return Err(Error::Data("empty dataset".to_string()));
        }

        let age = ColumnScale::fit("age", records, |r| r.age)?;
        let bmi = ColumnScale::fit("bmi", records, |r| r.bmi)?;
        let cholesterol = ColumnScale::fit("cholesterol", records, |r| r.cholesterol)?;
        let systolic_bp = ColumnScale::fit("systolic_bp", records, |r| r.systolic_bp)?;
        let daily_steps = ColumnScale::fit("daily_steps", records, |r| r.daily_steps)?;
        let sleep_hours = ColumnScale::fit("sleep_hours", records, |r| r.sleep_hours)?;

        let w = &self.weights;
        let flag = |b: bool| f64::from(u8::from(b));
        let raw_scores: Vec<f64> = records
            .iter()
            .map(|r| {
                w.age * age.ratio(r.age)
                    + w.bmi * bmi.ratio(r.bmi)
                    + w.cholesterol * cholesterol.ratio(r.cholesterol)
                    + w.systolic_bp * systolic_bp.ratio(r.systolic_bp)
                    + w.alcohol * flag(r.alcohol)
                    + w.sleep_hours * (1.0 - sleep_hours.ratio(r.sleep_hours))
                    + w.daily_steps * (1.0 - daily_steps.ratio(r.daily_steps))
                    + w.smoker * flag(r.smoker)
                    + w.family_history * flag(r.family_history)
            })
            .collect();

        let (lo, hi) = min_max(&raw_scores);
        let range = hi - lo;
        if range <= 0.0 {
            return Err(Error::Data(
                "degenerate column 'risk_score': every record scores the same".to_string(),
            ));
        }
        let scores: Vec<f64> = raw_scores.iter().map(|s| (s - lo) / range).collect();

        let median = median(&scores);
        let labels: Vec<bool> = scores.iter().map(|&s| s > median).collect();

        let derivation = RiskDerivation {
            raw_scores,
            scores,
            median,
            labels,
        };

        if derivation.positives() == 0 || derivation.negatives() == 0 {
            return Err(Error::Data(
                "single-class label after derivation".to_string(),
            ));
        }

        tracing::debug!(
            records = records.len(),
            median = derivation.median,
            positives = derivation.positives(),
            "derived disease_risk_real"
        );

        Ok(derivation)
    }
}

/// Derive with [`RiskScoreWeights::STANDARD`].
///
/// # Errors
///
/// See [`RiskScoreDeriver::derive`].
pub fn derive(records: &[RawRecord]) -> Result<RiskDerivation> {
    RiskScoreDeriver::default().derive(records)
}

/// Dataset-wide maximum of one column.
struct ColumnScale {
    max: f64,
}

impl ColumnScale {
    fn fit(name: &str, records: &[RawRecord], get: impl Fn(&RawRecord) -> f64) -> Result<Self> {
        let values: Vec<f64> = records.iter().map(get).collect();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::Data(format!("column '{name}' has non-finite values")));
        }
        let (min, max) = min_max(&values);

        if max <= min || max <= 0.0 {
            return Err(Error::Data(format!("degenerate column '{name}'")));
        }
        Ok(Self { max })
    }

    fn ratio(&self, value: f64) -> f64 {
        value / self.max
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

/// Median with the even-length midpoint convention.
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(age: f64, sleep_hours: f64, smoker: bool) -> RawRecord {
        RawRecord {
            age,
            bmi: 20.0 + age / 10.0,
            cholesterol: 150.0 + age,
            systolic_bp: 100.0 + age / 2.0,
            daily_steps: 12_000.0 - age * 100.0,
            sleep_hours,
            smoker,
            alcohol: false,
            family_history: age > 50.0,
        }
    }

    #[test]
    fn test_standard_weights_sum() {
        assert!((RiskScoreWeights::STANDARD.sum() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_rescaled_scores_span_unit_interval() {
        let records: Vec<_> = (0..10)
            .map(|i| record(20.0 + f64::from(i) * 5.0, 5.0 + f64::from(i % 4), i % 3 == 0))
            .collect();
        let d = derive(&records).unwrap();

        let (lo, hi) = min_max(&d.scores);
        assert!(lo.abs() < 1e-12);
        assert!((hi - 1.0).abs() < 1e-12);
        for raw in &d.raw_scores {
            assert!(*raw <= RiskScoreWeights::STANDARD.sum() + 1e-12);
        }
        assert_eq!(d.positives() + d.negatives(), records.len());
    }

    #[test]
    fn test_constant_sleep_is_degenerate() {
        let records: Vec<_> = (0..5).map(|i| record(30.0 + f64::from(i), 7.0, false)).collect();
        let err = derive(&records).unwrap_err();
        assert!(matches!(err, Error::Data(_)));
        assert!(err.to_string().contains("degenerate column 'sleep_hours'"));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut records: Vec<_> = (0..8)
                .map(|i| record(25.0 + f64::from(i) * 5.0, 5.0 + f64::from(i % 3), i % 2 == 0))
                .collect();
            records[3].sleep_hours = bad;

            let err = derive(&records).unwrap_err();
            assert!(
                err.to_string()
                    .contains("column 'sleep_hours' has non-finite values"),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn test_empty_dataset() {
        assert!(matches!(derive(&[]), Err(Error::Data(_))));
    }

    #[test]
    fn test_median_even_and_odd() {
        assert!((median(&[3.0, 1.0, 2.0]) - 2.0).abs() < f64::EPSILON);
        assert!((median(&[4.0, 1.0, 2.0, 3.0]) - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_risk_level_bands() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.25), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(0.74), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(1.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::Critical.to_string(), "critical");
    }

    #[test]
    fn test_level_counts_cover_all_records() {
        let records: Vec<_> = (0..12)
            .map(|i| record(20.0 + f64::from(i) * 4.0, 4.0 + f64::from(i % 5), i % 2 == 0))
            .collect();
        let d = derive(&records).unwrap();
        let total: usize = d.level_counts().iter().map(|(_, c)| c).sum();
        assert_eq!(total, records.len());
    }
}

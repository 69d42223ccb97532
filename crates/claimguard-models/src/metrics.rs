//! Binary classification metrics.
//!
//! Undefined ratios (no predicted positives, no actual positives) score 0.0
//! rather than failing.

use crate::error::{ModelError, ModelResult};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl ConfusionCounts {
    pub fn from_labels(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> ModelResult<Self> {
        if y_true.len() != y_pred.len() {
            return Err(ModelError::ShapeMismatch(format!(
                "{} labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }
        let mut counts = Self::default();
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            match (*t > 0.5, *p > 0.5) {
                (true, true) => counts.true_positive += 1,
                (false, true) => counts.false_positive += 1,
                (false, false) => counts.true_negative += 1,
                (true, false) => counts.false_negative += 1,
            }
        }
        Ok(counts)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    #[must_use]
    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    #[must_use]
    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    #[must_use]
    pub fn f1(&self) -> f64 {
        ratio(2 * self.true_positive, 2 * self.true_positive + self.false_positive + self.false_negative)
    }

    #[must_use]
    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }
}

/// F1, precision and recall of a model on one split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetric {
    pub f1_score: f64,
    pub precision_score: f64,
    pub recall_score: f64,
}

impl ClassificationMetric {
    pub fn compute(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> ModelResult<Self> {
        let counts = ConfusionCounts::from_labels(y_true, y_pred)?;
        Ok(Self::from(counts))
    }
}

impl From<ConfusionCounts> for ClassificationMetric {
    fn from(counts: ConfusionCounts) -> Self {
        Self { f1_score: counts.f1(), precision_score: counts.precision(), recall_score: counts.recall() }
    }
}

/// Scalar score used for cross-validation and model selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMetric {
    #[default]
    Accuracy,
    #[serde(alias = "f1_score")]
    F1,
    #[serde(alias = "precision_score")]
    Precision,
    #[serde(alias = "recall_score")]
    Recall,
}

impl ScoreMetric {
    pub fn score(self, y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> ModelResult<f64> {
        let counts = ConfusionCounts::from_labels(y_true, y_pred)?;
        Ok(self.from_counts(&counts))
    }

    #[must_use]
    pub fn from_counts(self, counts: &ConfusionCounts) -> f64 {
        match self {
            Self::Accuracy => counts.accuracy(),
            Self::F1 => counts.f1(),
            Self::Precision => counts.precision(),
            Self::Recall => counts.recall(),
        }
    }

    /// Picks this metric out of a precomputed metric record.
    #[must_use]
    pub fn pick(self, metric: &ClassificationMetric) -> Option<f64> {
        match self {
            Self::Accuracy => None,
            Self::F1 => Some(metric.f1_score),
            Self::Precision => Some(metric.precision_score),
            Self::Recall => Some(metric.recall_score),
        }
    }
}

impl fmt::Display for ScoreMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accuracy => "accuracy",
            Self::F1 => "f1",
            Self::Precision => "precision",
            Self::Recall => "recall",
        })
    }
}

impl FromStr for ScoreMetric {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accuracy" => Ok(Self::Accuracy),
            "f1" | "f1_score" => Ok(Self::F1),
            "precision" | "precision_score" => Ok(Self::Precision),
            "recall" | "recall_score" => Ok(Self::Recall),
            other => Err(ModelError::invalid_param("scoring", format!("unknown metric '{other}'"))),
        }
    }
}

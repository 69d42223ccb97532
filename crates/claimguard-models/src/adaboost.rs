use crate::error::{ModelError, ModelResult};
use crate::estimator::{check_training_data, Classifier};
use crate::params::ParamValue;
use crate::tree::{DecisionTree, TreeParams};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WeightedStump {
    alpha: f64,
    tree: DecisionTree,
}

impl WeightedStump {
    fn vote(&self, row: ArrayView1<'_, f64>) -> f64 {
        if self.tree.predict_row(row) > 0.5 { 1.0 } else { -1.0 }
    }
}

/// SAMME stump weight; a perfect stump gets a large finite weight.
fn stump_alpha(learning_rate: f64, error: f64) -> f64 {
    let error = error.max(f64::EPSILON);
    learning_rate * ((1.0 - error) / error).ln()
}

/// Discrete AdaBoost (SAMME, two classes) over depth-one stumps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaBoost {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub seed: u64,
    #[serde(default)]
    stumps: Vec<WeightedStump>,
}

impl AdaBoost {
    pub const SUPPORTED_PARAMS: &'static [&'static str] = &["n_estimators", "learning_rate"];

    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { n_estimators: 50, learning_rate: 1.0, seed, stumps: Vec::new() }
    }

    #[must_use]
    pub fn n_stumps(&self) -> usize {
        self.stumps.len()
    }
}

impl Classifier for AdaBoost {
    fn name(&self) -> &'static str {
        "AdaBoostClassifier"
    }

    fn supported_params(&self) -> &'static [&'static str] {
        Self::SUPPORTED_PARAMS
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> ModelResult<()> {
        match key {
            "n_estimators" => self.n_estimators = value.as_usize(key)?.max(1),
            "learning_rate" => {
                let lr = value.as_f64(key)?;
                if lr <= 0.0 {
                    return Err(ModelError::invalid_param(key, "must be positive"));
                }
                self.learning_rate = lr;
            }
            _ => {
                return Err(ModelError::UnknownParam { family: self.name().to_string(), key: key.to_string() });
            }
        }
        Ok(())
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> ModelResult<()> {
        check_training_data(x, y)?;
        let n = y.len();
        let stump_params = TreeParams { max_depth: Some(1), ..TreeParams::default() };
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut weights = vec![1.0 / n as f64; n];
        self.stumps = Vec::with_capacity(self.n_estimators);

        for _ in 0..self.n_estimators {
            let tree = DecisionTree::fit(&stump_params, x, y, Some(&weights), &mut rng)?;
            let missed: Vec<bool> = (0..n)
                .map(|i| (tree.predict_row(x.row(i)) > 0.5) != (y[i] > 0.5))
                .collect();
            let total: f64 = weights.iter().sum();
            let error = weights.iter().zip(&missed).filter(|(_, m)| **m).map(|(w, _)| w).sum::<f64>() / total;

            if error <= 0.0 {
                self.stumps.push(WeightedStump { alpha: stump_alpha(self.learning_rate, error), tree });
                break;
            }
            if error >= 0.5 {
                // A stump no better than chance adds nothing, but an empty
                // ensemble cannot predict.
                if self.stumps.is_empty() {
                    self.stumps.push(WeightedStump { alpha: 1.0, tree });
                }
                break;
            }

            let alpha = stump_alpha(self.learning_rate, error);
            for (w, m) in weights.iter_mut().zip(&missed) {
                if *m {
                    *w *= alpha.exp();
                }
            }
            let norm: f64 = weights.iter().sum();
            weights.iter_mut().for_each(|w| *w /= norm);
            self.stumps.push(WeightedStump { alpha, tree });
        }
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> ModelResult<Array1<f64>> {
        let first = self.stumps.first().ok_or_else(|| ModelError::NotFitted(self.name().to_string()))?;
        first.tree.check_width(x)?;
        let alpha_sum: f64 = self.stumps.iter().map(|s| s.alpha).sum();
        Ok(x
            .rows()
            .into_iter()
            .map(|row| {
                let score = self.stumps.iter().map(|s| s.alpha * s.vote(row)).sum::<f64>() / alpha_sum;
                (score + 1.0) / 2.0
            })
            .collect())
    }
}

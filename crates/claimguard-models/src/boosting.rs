use crate::error::{ModelError, ModelResult};
use crate::estimator::{check_training_data, Classifier};
use crate::params::ParamValue;
use crate::tree::{Criterion, DecisionTree, MaxFeatures, TreeParams};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const PROB_EPS: f64 = 1e-15;

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Binomial-deviance gradient boosting with Newton leaf updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub subsample: f64,
    pub tree: TreeParams,
    pub seed: u64,
    #[serde(default)]
    init: f64,
    #[serde(default)]
    trees: Vec<DecisionTree>,
}

impl GradientBoosting {
    pub const SUPPORTED_PARAMS: &'static [&'static str] = &[
        "n_estimators",
        "learning_rate",
        "subsample",
        "criterion",
        "max_depth",
        "min_samples_split",
        "min_samples_leaf",
        "max_features",
    ];

    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            subsample: 1.0,
            tree: TreeParams {
                criterion: Criterion::SquaredError,
                max_depth: Some(3),
                ..TreeParams::default()
            },
            seed,
            init: 0.0,
            trees: Vec::new(),
        }
    }

    fn raw_score(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.init + self.learning_rate * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }
}

impl Classifier for GradientBoosting {
    fn name(&self) -> &'static str {
        "GradientBoostingClassifier"
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
            "subsample" => {
                let ratio = value.as_f64(key)?;
                if !(ratio > 0.0 && ratio <= 1.0) {
                    return Err(ModelError::invalid_param(key, "must be in (0, 1]"));
                }
                self.subsample = ratio;
            }
            // Leaf values are regression targets whatever name is given.
            "criterion" => {
                value.as_str(key)?.parse::<Criterion>()?;
                self.tree.criterion = Criterion::SquaredError;
            }
            "max_depth" => self.tree.max_depth = value.as_optional_usize(key)?,
            "min_samples_split" => self.tree.min_samples_split = value.as_usize(key)?,
            "min_samples_leaf" => self.tree.min_samples_leaf = value.as_usize(key)?,
            "max_features" => self.tree.max_features = value.as_str(key)?.parse::<MaxFeatures>()?,
            _ => {
                return Err(ModelError::UnknownParam { family: self.name().to_string(), key: key.to_string() });
            }
        }
        Ok(())
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> ModelResult<()> {
        check_training_data(x, y)?;
        let n = y.len();
        let mut rng = StdRng::seed_from_u64(self.seed);

        let prior = y.mean().unwrap_or(0.5).clamp(PROB_EPS, 1.0 - PROB_EPS);
        self.init = (prior / (1.0 - prior)).ln();
        self.trees = Vec::with_capacity(self.n_estimators);

        let mut scores = Array1::from_elem(n, self.init);
        let n_sub = ((self.subsample * n as f64).round() as usize).clamp(1, n);

        for _ in 0..self.n_estimators {
            let probs = scores.mapv(sigmoid);
            let residuals = &y - &probs;

            let weights: Vec<f64> = if n_sub < n {
                let mut w = vec![0.0; n];
                for i in rand::seq::index::sample(&mut rng, n, n_sub) {
                    w[i] = 1.0;
                }
                w
            } else {
                vec![1.0; n]
            };

            let mut tree = DecisionTree::fit(&self.tree, x, residuals.view(), Some(&weights), &mut rng)?;

            // Newton step per leaf over in-bag rows.
            let mut sums: BTreeMap<usize, (f64, f64)> = BTreeMap::new();
            for i in (0..n).filter(|&i| weights[i] > 0.0) {
                let leaf = tree.apply(x.row(i));
                let entry = sums.entry(leaf).or_insert((0.0, 0.0));
                entry.0 += residuals[i];
                entry.1 += probs[i] * (1.0 - probs[i]);
            }
            for (leaf, (num, den)) in sums {
                let value = if den.abs() < 1e-12 { 0.0 } else { num / den };
                tree.set_leaf_value(leaf, value)?;
            }

            for (i, score) in scores.iter_mut().enumerate() {
                *score += self.learning_rate * tree.predict_row(x.row(i));
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> ModelResult<Array1<f64>> {
        let first = self.trees.first().ok_or_else(|| ModelError::NotFitted(self.name().to_string()))?;
        first.check_width(x)?;
        Ok(x.rows().into_iter().map(|row| sigmoid(self.raw_score(row))).collect())
    }
}

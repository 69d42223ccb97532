use crate::error::{ModelError, ModelResult};
use crate::estimator::{check_training_data, Classifier};
use crate::params::ParamValue;
use crate::tree::{Criterion, DecisionTree, MaxFeatures, TreeParams};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Per-class reweighting applied to each tree's training rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    #[default]
    None,
    /// Inverse class frequency over the full training set.
    Balanced,
    /// Inverse class frequency over each tree's bootstrap sample.
    BalancedSubsample,
}

impl FromStr for ClassWeight {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "balanced" => Ok(Self::Balanced),
            "balanced_subsample" => Ok(Self::BalancedSubsample),
            other => Err(ModelError::invalid_param("class_weight", format!("unsupported value '{other}'"))),
        }
    }
}

/// Balanced weights `n / (2 * n_c)` for classes 0 and 1, given per-row counts.
fn balanced_weights(y: ArrayView1<'_, f64>, counts: &[f64]) -> [f64; 2] {
    let mut per_class = [0.0_f64; 2];
    for (label, count) in y.iter().zip(counts) {
        per_class[usize::from(*label > 0.5)] += count;
    }
    let total = per_class[0] + per_class[1];
    per_class.map(|c| if c > 0.0 { total / (2.0 * c) } else { 0.0 })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_estimators: usize,
    pub tree: TreeParams,
    pub bootstrap: bool,
    pub class_weight: ClassWeight,
    pub seed: u64,
    #[serde(default)]
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub const SUPPORTED_PARAMS: &'static [&'static str] = &[
        "n_estimators",
        "criterion",
        "max_depth",
        "min_samples_split",
        "min_samples_leaf",
        "max_features",
        "class_weight",
        "bootstrap",
    ];

    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            n_estimators: 100,
            tree: TreeParams { max_features: MaxFeatures::Sqrt, ..TreeParams::default() },
            bootstrap: true,
            class_weight: ClassWeight::None,
            seed,
            trees: Vec::new(),
        }
    }

    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    fn fit_tree(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, global: [f64; 2], seed: u64) -> ModelResult<DecisionTree> {
        let n = y.len();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut counts = vec![0.0_f64; n];
        if self.bootstrap {
            for _ in 0..n {
                counts[rng.gen_range(0..n)] += 1.0;
            }
        } else {
            counts.fill(1.0);
        }

        let class_weights = match self.class_weight {
            ClassWeight::None => [1.0, 1.0],
            ClassWeight::Balanced => global,
            ClassWeight::BalancedSubsample => balanced_weights(y, &counts),
        };
        let weights: Vec<f64> = counts
            .iter()
            .zip(y.iter())
            .map(|(c, label)| c * class_weights[usize::from(*label > 0.5)])
            .collect();

        DecisionTree::fit(&self.tree, x, y, Some(&weights), &mut rng)
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &'static str {
        "RandomForestClassifier"
    }

    fn supported_params(&self) -> &'static [&'static str] {
        Self::SUPPORTED_PARAMS
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> ModelResult<()> {
        match key {
            "n_estimators" => self.n_estimators = value.as_usize(key)?.max(1),
            "criterion" => {
                let criterion: Criterion = value.as_str(key)?.parse()?;
                if criterion == Criterion::SquaredError {
                    return Err(ModelError::invalid_param(key, "regression criterion on a classifier"));
                }
                self.tree.criterion = criterion;
            }
            "max_depth" => self.tree.max_depth = value.as_optional_usize(key)?,
            "min_samples_split" => self.tree.min_samples_split = value.as_usize(key)?,
            "min_samples_leaf" => self.tree.min_samples_leaf = value.as_usize(key)?,
            "max_features" => self.tree.max_features = value.as_str(key)?.parse()?,
            "class_weight" => self.class_weight = value.as_str(key)?.parse()?,
            "bootstrap" => {
                self.bootstrap = match value.as_str(key)? {
                    "true" => true,
                    "false" => false,
                    other => return Err(ModelError::invalid_param(key, format!("expected true/false, got {other}"))),
                };
            }
            _ => {
                return Err(ModelError::UnknownParam { family: self.name().to_string(), key: key.to_string() });
            }
        }
        Ok(())
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> ModelResult<()> {
        check_training_data(x, y)?;
        let global = balanced_weights(y, &vec![1.0; y.len()]);
        let mut master = StdRng::seed_from_u64(self.seed);
        let seeds: Vec<u64> = (0..self.n_estimators).map(|_| master.next_u64()).collect();

        let trees = seeds
            .par_iter()
            .map(|&seed| self.fit_tree(x, y, global, seed))
            .collect::<ModelResult<Vec<_>>>()?;
        self.trees = trees;
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> ModelResult<Array1<f64>> {
        let first = self.trees.first().ok_or_else(|| ModelError::NotFitted(self.name().to_string()))?;
        first.check_width(x)?;
        let n_trees = self.trees.len() as f64;
        Ok(x
            .rows()
            .into_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::two_blobs;

    #[test]
    fn test_forest_separates_blobs() {
        let (x, y) = two_blobs(60, 3);
        let mut forest = RandomForest::new(42);
        forest.n_estimators = 25;
        forest.fit(x.view(), y.view()).unwrap();

        let pred = forest.predict(x.view()).unwrap();
        let correct = pred.iter().zip(y.iter()).filter(|(p, t)| (*p - *t).abs() < 1e-9).count();
        assert!(correct as f64 / y.len() as f64 > 0.9);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = two_blobs(40, 9);
        let mut a = RandomForest::new(5);
        a.n_estimators = 10;
        let mut b = a.clone();
        a.fit(x.view(), y.view()).unwrap();
        b.fit(x.view(), y.view()).unwrap();
        assert_eq!(a.predict_proba(x.view()).unwrap(), b.predict_proba(x.view()).unwrap());
    }

    #[test]
    fn test_balanced_weights() {
        let y = ndarray::array![0.0, 0.0, 0.0, 1.0];
        let w = balanced_weights(y.view(), &[1.0; 4]);
        assert!((w[0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((w[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_set_param_rejects_unknown_key() {
        let mut forest = RandomForest::new(0);
        let err = forest.set_param("learning_rate", &ParamValue::Float(0.1)).unwrap_err();
        assert!(matches!(err, ModelError::UnknownParam { .. }));
        forest.set_param("max_depth", &ParamValue::Text("none".into())).unwrap();
        assert_eq!(forest.tree.max_depth, None);
        forest.set_param("class_weight", &ParamValue::Text("balanced_subsample".into())).unwrap();
        assert_eq!(forest.class_weight, ClassWeight::BalancedSubsample);
    }

    #[test]
    fn test_predict_before_fit() {
        let forest = RandomForest::new(0);
        let x = ndarray::Array2::<f64>::zeros((2, 2));
        assert!(matches!(forest.predict_proba(x.view()), Err(ModelError::NotFitted(_))));
    }
}

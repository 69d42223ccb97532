//! ClaimGuard Models
//!
//! Tabular binary classifiers and the tooling to pick between them:
//! - Weighted CART trees (`DecisionTree`)
//! - Tree ensembles (`RandomForest`, `GradientBoosting`, `AdaBoost`)
//! - Classification metrics (`ClassificationMetric`, `ScoreMetric`)
//! - Hyperparameter grids and stratified k-fold grid search (`GridSearch`)

pub mod adaboost;
pub mod boosting;
pub mod error;
pub mod estimator;
pub mod forest;
pub mod metrics;
pub mod params;
pub mod search;
pub mod tree;

pub use adaboost::AdaBoost;
pub use boosting::GradientBoosting;
pub use error::{ModelError, ModelResult};
pub use estimator::{Classifier, Estimator, ModelFamily};
pub use forest::{ClassWeight, RandomForest};
pub use metrics::{ClassificationMetric, ConfusionCounts, ScoreMetric};
pub use params::{describe_params, ParamGrid, ParamSet, ParamValue};
pub use search::{argmax_first, ComboScore, GridSearch, SearchResult, StratifiedKFold};
pub use tree::{Criterion, DecisionTree, MaxFeatures, TreeParams};

#[cfg(test)]
pub(crate) mod test_support {
    use ndarray::{Array1, Array2};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Two well-separated 2-D clusters with alternating labels.
    pub fn two_blobs(n: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut x = Array2::zeros((n, 2));
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let label = (i % 2) as f64;
            let center = label * 4.0;
            x[[i, 0]] = center + rng.gen_range(-1.0..1.0);
            x[[i, 1]] = center + rng.gen_range(-1.0..1.0);
            y[i] = label;
        }
        (x, y)
    }
}

//! Cross-validated hyperparameter search.

use crate::error::{ModelError, ModelResult};
use crate::estimator::{Classifier, Estimator, ModelFamily};
use crate::metrics::ScoreMetric;
use crate::params::{describe_params, ParamGrid, ParamSet};
use ndarray::{ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Index of the largest score; the earliest wins ties. NaN never wins.
pub fn argmax_first(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, b)| score > b) {
            best = Some((idx, score));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Stratified k-fold splitter without shuffling.
///
/// The j-th row of each class goes to fold `j % n_splits`, so every fold
/// keeps roughly the overall class ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedKFold {
    n_splits: usize,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> ModelResult<Self> {
        if n_splits < 2 {
            return Err(ModelError::Search(format!("need at least 2 folds, got {n_splits}")));
        }
        Ok(Self { n_splits })
    }

    #[must_use]
    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// `(train_indices, validation_indices)` per fold, each sorted ascending.
    pub fn split(&self, y: ArrayView1<'_, f64>) -> ModelResult<Vec<(Vec<usize>, Vec<usize>)>> {
        if y.len() < self.n_splits {
            return Err(ModelError::Search(format!(
                "cannot split {} rows into {} folds",
                y.len(),
                self.n_splits
            )));
        }
        let mut fold_of = vec![0_usize; y.len()];
        let mut seen = [0_usize; 2];
        for (i, label) in y.iter().enumerate() {
            let class = usize::from(*label > 0.5);
            fold_of[i] = seen[class] % self.n_splits;
            seen[class] += 1;
        }
        Ok((0..self.n_splits)
            .map(|fold| {
                let (validation, train): (Vec<usize>, Vec<usize>) =
                    (0..y.len()).partition(|&i| fold_of[i] == fold);
                (train, validation)
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboScore {
    pub params: ParamSet,
    pub mean_score: f64,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub best_params: ParamSet,
    pub best_score: f64,
    /// Every combination in enumeration order.
    pub scores: Vec<ComboScore>,
    /// Best combination refit on the full data.
    pub estimator: Estimator,
}

/// Exhaustive grid search for one model family.
#[derive(Debug, Clone)]
pub struct GridSearch {
    pub family: ModelFamily,
    pub grid: ParamGrid,
    pub cv: StratifiedKFold,
    pub scoring: ScoreMetric,
    pub seed: u64,
}

impl GridSearch {
    #[must_use]
    pub fn new(family: ModelFamily, grid: ParamGrid, cv: StratifiedKFold, scoring: ScoreMetric, seed: u64) -> Self {
        Self { family, grid, cv, scoring, seed }
    }

    fn cross_validate(
        &self,
        params: &ParamSet,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        folds: &[(Vec<usize>, Vec<usize>)],
    ) -> ModelResult<f64> {
        let mut total = 0.0;
        for (train, validation) in folds {
            let mut estimator = self.family.build(params, self.seed)?;
            let x_train = x.select(Axis(0), train);
            let y_train = y.select(Axis(0), train);
            estimator.fit(x_train.view(), y_train.view())?;

            let x_val = x.select(Axis(0), validation);
            let y_val = y.select(Axis(0), validation);
            let pred = estimator.predict(x_val.view())?;
            total += self.scoring.score(y_val.view(), pred.view())?;
        }
        Ok(total / folds.len() as f64)
    }

    /// Scores every combination in parallel, then refits the winner.
    ///
    /// Scores are collected in enumeration order, so the winner does not
    /// depend on thread scheduling.
    pub fn run(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> ModelResult<SearchResult> {
        let combos = self.grid.combinations();
        let folds = self.cv.split(y)?;

        let mean_scores = combos
            .par_iter()
            .map(|params| -> ModelResult<f64> {
                let score = self.cross_validate(params, x, y, &folds)?;
                debug!(family = %self.family, params = %describe_params(params), score, "cv combination scored");
                Ok(score)
            })
            .collect::<ModelResult<Vec<f64>>>()?;

        let best = argmax_first(&mean_scores)
            .ok_or_else(|| ModelError::Search(format!("no valid score for {}", self.family)))?;
        let best_params = combos[best].clone();
        let best_score = mean_scores[best];

        let mut estimator = self.family.build(&best_params, self.seed)?;
        estimator.fit(x, y)?;

        let scores = combos
            .into_iter()
            .zip(mean_scores)
            .map(|(params, mean_score)| ComboScore { params, mean_score })
            .collect();

        Ok(SearchResult { best_params, best_score, scores, estimator })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;
    use crate::test_support::two_blobs;
    use ndarray::array;

    #[test]
    fn test_argmax_first_prefers_earliest() {
        assert_eq!(argmax_first(&[0.70, 0.85, 0.65]), Some(1));
        assert_eq!(argmax_first(&[0.5, 0.9, 0.9]), Some(1));
        assert_eq!(argmax_first(&[f64::NAN, 0.1]), Some(1));
        assert_eq!(argmax_first(&[]), None);
    }

    #[test]
    fn test_stratified_folds_partition_rows() {
        let y = array![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let folds = StratifiedKFold::new(3).unwrap().split(y.view()).unwrap();

        assert_eq!(folds.len(), 3);
        let mut all: Vec<usize> = folds.iter().flat_map(|(_, v)| v.clone()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..9).collect::<Vec<_>>());
        for (train, validation) in &folds {
            assert_eq!(train.len() + validation.len(), 9);
            let positives = validation.iter().filter(|&&i| y[i] > 0.5).count();
            assert_eq!(positives, 1);
        }
    }

    #[test]
    fn test_too_few_rows_for_folds() {
        let y = array![0.0, 1.0];
        assert!(StratifiedKFold::new(3).unwrap().split(y.view()).is_err());
        assert!(StratifiedKFold::new(1).is_err());
    }

    #[test]
    fn test_grid_search_is_deterministic() {
        let (x, y) = two_blobs(45, 8);
        let grid = ParamGrid::new()
            .with("n_estimators", vec![5_i64, 10])
            .with("learning_rate", vec![0.5, 1.0]);
        let search = GridSearch::new(
            ModelFamily::AdaBoost,
            grid,
            StratifiedKFold::new(3).unwrap(),
            ScoreMetric::Accuracy,
            0,
        );

        let a = search.run(x.view(), y.view()).unwrap();
        let b = search.run(x.view(), y.view()).unwrap();
        assert_eq!(a.scores.len(), 4);
        assert_eq!(a.scores, b.scores);
        assert_eq!(a.best_params, b.best_params);
        assert!(a.best_score > 0.8);
        assert!(a.scores.iter().all(|s| s.mean_score <= a.best_score));
        assert!(a.best_params.contains_key("learning_rate"));
        assert!(matches!(a.best_params["n_estimators"], ParamValue::Int(_)));
    }
}

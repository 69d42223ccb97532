use crate::adaboost::AdaBoost;
use crate::boosting::GradientBoosting;
use crate::error::{ModelError, ModelResult};
use crate::forest::RandomForest;
use crate::params::{ParamGrid, ParamSet, ParamValue};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Binary classifier over a dense `f64` feature matrix.
///
/// Labels are `0.0` / `1.0`. `predict_proba` returns the probability of
/// class `1.0` for each row.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn supported_params(&self) -> &'static [&'static str];

    fn set_param(&mut self, key: &str, value: &ParamValue) -> ModelResult<()>;

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> ModelResult<()>;

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> ModelResult<Array1<f64>>;

    fn predict(&self, x: ArrayView2<'_, f64>) -> ModelResult<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }
}

pub(crate) fn check_training_data(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> ModelResult<()> {
    if x.nrows() == 0 {
        return Err(ModelError::InvalidData("empty training set".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(ModelError::ShapeMismatch(format!("x has {} rows but y has {}", x.nrows(), y.len())));
    }
    if let Some(bad) = y.iter().find(|v| **v != 0.0 && **v != 1.0) {
        return Err(ModelError::InvalidData(format!("labels must be 0 or 1, found {bad}")));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::InvalidData("features contain NaN or infinite values".to_string()));
    }
    Ok(())
}

/// Candidate model families known to the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    RandomForest,
    GradientBoosting,
    #[serde(alias = "adaboost")]
    AdaBoost,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 3] = [Self::RandomForest, Self::GradientBoosting, Self::AdaBoost];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RandomForest => "random_forest",
            Self::GradientBoosting => "gradient_boosting",
            Self::AdaBoost => "ada_boost",
        }
    }

    /// Builds an unfitted estimator with `params` applied over the defaults.
    pub fn build(self, params: &ParamSet, seed: u64) -> ModelResult<Estimator> {
        let mut estimator = match self {
            Self::RandomForest => Estimator::RandomForest(RandomForest::new(seed)),
            Self::GradientBoosting => Estimator::GradientBoosting(GradientBoosting::new(seed)),
            Self::AdaBoost => Estimator::AdaBoost(AdaBoost::new(seed)),
        };
        estimator.set_params(params)?;
        Ok(estimator)
    }

    /// The stock search space for this family.
    #[must_use]
    pub fn default_grid(self) -> ParamGrid {
        match self {
            Self::RandomForest => ParamGrid::new()
                .with("criterion", vec!["gini", "entropy"])
                .with("max_features", vec!["sqrt", "log2"])
                .with("n_estimators", vec![100_i64, 200])
                .with("max_depth", vec![ParamValue::from("none"), ParamValue::Int(20)])
                .with("min_samples_leaf", vec![1_i64, 2])
                .with("class_weight", vec!["balanced", "balanced_subsample"]),
            Self::GradientBoosting => ParamGrid::new()
                .with("learning_rate", vec![0.05, 0.1])
                .with("subsample", vec![0.8])
                .with("n_estimators", vec![100_i64, 200])
                .with("max_depth", vec![3_i64, 4])
                .with("max_features", vec!["sqrt"]),
            Self::AdaBoost => ParamGrid::new()
                .with("learning_rate", vec![0.05, 0.01])
                .with("n_estimators", vec![100_i64, 200, 300]),
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random_forest" | "randomforest" | "randomforestclassifier" => Ok(Self::RandomForest),
            "gradient_boosting" | "gradientboosting" | "gradientboostingclassifier" => {
                Ok(Self::GradientBoosting)
            }
            "ada_boost" | "adaboost" | "adaboostclassifier" => Ok(Self::AdaBoost),
            _ => Err(ModelError::UnknownFamily(s.to_string())),
        }
    }
}

/// A concrete, serializable estimator of any supported family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Estimator {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    AdaBoost(AdaBoost),
}

impl Estimator {
    #[must_use]
    pub fn family(&self) -> ModelFamily {
        match self {
            Self::RandomForest(_) => ModelFamily::RandomForest,
            Self::GradientBoosting(_) => ModelFamily::GradientBoosting,
            Self::AdaBoost(_) => ModelFamily::AdaBoost,
        }
    }

    pub fn set_params(&mut self, params: &ParamSet) -> ModelResult<()> {
        for (key, value) in params {
            self.set_param(key, value)?;
        }
        Ok(())
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            Self::RandomForest(m) => m,
            Self::GradientBoosting(m) => m,
            Self::AdaBoost(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            Self::RandomForest(m) => m,
            Self::GradientBoosting(m) => m,
            Self::AdaBoost(m) => m,
        }
    }
}

impl Classifier for Estimator {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn supported_params(&self) -> &'static [&'static str] {
        self.inner().supported_params()
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> ModelResult<()> {
        self.inner_mut().set_param(key, value)
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> ModelResult<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> ModelResult<Array1<f64>> {
        self.inner().predict_proba(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::two_blobs;

    #[test]
    fn test_default_grids_only_use_supported_params() {
        for family in ModelFamily::ALL {
            let estimator = family.build(&ParamSet::new(), 0).unwrap();
            for key in family.default_grid().keys() {
                assert!(
                    estimator.supported_params().contains(&key),
                    "{family} does not support {key}"
                );
            }
        }
    }

    #[test]
    fn test_default_grid_sizes() {
        assert_eq!(ModelFamily::RandomForest.default_grid().len(), 64);
        assert_eq!(ModelFamily::GradientBoosting.default_grid().len(), 8);
        assert_eq!(ModelFamily::AdaBoost.default_grid().len(), 6);
    }

    #[test]
    fn test_family_parsing() {
        assert_eq!("RandomForestClassifier".parse::<ModelFamily>().unwrap(), ModelFamily::RandomForest);
        assert_eq!("ada_boost".parse::<ModelFamily>().unwrap(), ModelFamily::AdaBoost);
        assert!(matches!("svm".parse::<ModelFamily>(), Err(ModelError::UnknownFamily(_))));
    }

    #[test]
    fn test_build_applies_params() {
        let mut params = ParamSet::new();
        params.insert("n_estimators".into(), ParamValue::Int(7));
        let Estimator::AdaBoost(model) = ModelFamily::AdaBoost.build(&params, 1).unwrap() else {
            panic!("wrong family");
        };
        assert_eq!(model.n_estimators, 7);
    }

    #[test]
    fn test_estimator_serde_roundtrip_preserves_predictions() {
        let (x, y) = two_blobs(30, 5);
        let mut params = ParamSet::new();
        params.insert("n_estimators".into(), ParamValue::Int(5));
        let mut estimator = ModelFamily::GradientBoosting.build(&params, 3).unwrap();
        estimator.fit(x.view(), y.view()).unwrap();

        let json = serde_json::to_string(&estimator).unwrap();
        assert!(json.contains("\"family\":\"gradient_boosting\""));
        let restored: Estimator = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.predict(x.view()).unwrap(), estimator.predict(x.view()).unwrap());
    }

    #[test]
    fn test_rejects_non_binary_labels() {
        let (x, _) = two_blobs(10, 1);
        let y = Array1::from_elem(x.nrows(), 2.0);
        let mut estimator = ModelFamily::AdaBoost.build(&ParamSet::new(), 0).unwrap();
        assert!(matches!(estimator.fit(x.view(), y.view()), Err(ModelError::InvalidData(_))));
    }
}

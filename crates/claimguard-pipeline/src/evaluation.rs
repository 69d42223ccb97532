//! Champion/challenger comparison.

use crate::artifacts::{DataIngestionArtifact, DataTransformationArtifact, ModelEvaluationArtifact, ModelTrainerArtifact};
use crate::bundle::TrainedModelBundle;
use crate::error::{PipelineResult, Stage, StageContext};
use crate::persist;
use crate::registry::ModelRegistry;
use crate::table::Table;
use crate::tracking::{MetricsSink, NoopMetricsSink, TrackingEvent};
use crate::transformation::target_vector;
use claimguard_models::{ClassificationMetric, Classifier};
use tracing::info;

/// Outcome of comparing a challenger score against the champion's.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub accepted: bool,
    pub metric_delta: f64,
}

/// Strictly better wins; a missing champion counts as zero.
#[must_use]
pub fn compare(challenger_score: f64, champion_score: Option<f64>) -> Verdict {
    let baseline = champion_score.unwrap_or(0.0);
    Verdict { accepted: challenger_score > baseline, metric_delta: challenger_score - baseline }
}

pub struct ModelEvaluator<'a> {
    registry: &'a dyn ModelRegistry,
    key: String,
    run_id: String,
    sink: &'a dyn MetricsSink,
}

impl<'a> ModelEvaluator<'a> {
    #[must_use]
    pub fn new(registry: &'a dyn ModelRegistry, key: impl Into<String>) -> Self {
        Self { registry, key: key.into(), run_id: String::new(), sink: &NoopMetricsSink }
    }

    #[must_use]
    pub fn with_tracking(mut self, run_id: impl Into<String>, sink: &'a dyn MetricsSink) -> Self {
        self.run_id = run_id.into();
        self.sink = sink;
        self
    }

    /// Loads the champion, if the registry holds one.
    ///
    /// An unreachable registry is a data access error. A key that exists but
    /// cannot be read or decoded is an evaluation error, never "no champion".
    pub fn load_champion(&self) -> PipelineResult<Option<TrainedModelBundle>> {
        if !self.registry.exists(&self.key).data_access(Stage::Evaluation)? {
            return Ok(None);
        }
        let bytes = self.registry.read(&self.key).evaluation(Stage::Evaluation)?;
        TrainedModelBundle::from_bytes(&bytes).evaluation(Stage::Evaluation).map(Some)
    }

    /// F1 of the champion's own predictions on the raw test rows.
    pub fn champion_score(&self, champion: &TrainedModelBundle, raw_test: &Table) -> PipelineResult<f64> {
        let y_true = target_vector(raw_test, champion.encoder.target_column()).evaluation(Stage::Evaluation)?;
        let y_pred = champion.predict(raw_test).evaluation(Stage::Evaluation)?;
        let metric = ClassificationMetric::compute(y_true.view(), y_pred.view()).evaluation(Stage::Evaluation)?;
        Ok(metric.f1_score)
    }

    pub fn initiate(
        &self,
        ingestion: &DataIngestionArtifact,
        transformation: &DataTransformationArtifact,
        trainer: &ModelTrainerArtifact,
    ) -> PipelineResult<ModelEvaluationArtifact> {
        info!(key = %self.key, "starting model evaluation");
        let challenger = TrainedModelBundle::load(&trainer.model_path).data_access(Stage::Evaluation)?;
        let test = persist::read_matrix(&transformation.test_array_path).data_access(Stage::Evaluation)?;
        let y_pred = challenger.model.predict(test.x.view()).evaluation(Stage::Evaluation)?;
        let challenger_score =
            ClassificationMetric::compute(test.y.view(), y_pred.view()).evaluation(Stage::Evaluation)?.f1_score;

        let champion_score = match self.load_champion()? {
            Some(champion) => {
                let raw_test = Table::read_csv(&ingestion.test_path).data_access(Stage::Evaluation)?;
                Some(self.champion_score(&champion, &raw_test)?)
            }
            None => {
                info!("no champion in registry");
                None
            }
        };

        let verdict = compare(challenger_score, champion_score);
        info!(
            challenger = challenger_score,
            champion = ?champion_score,
            delta = verdict.metric_delta,
            accepted = verdict.accepted,
            "model evaluation complete"
        );
        self.sink.record(TrackingEvent::Evaluated {
            run_id: self.run_id.clone(),
            accepted: verdict.accepted,
            challenger_score,
            champion_score,
        });

        Ok(ModelEvaluationArtifact {
            accepted: verdict.accepted,
            champion_key: self.key.clone(),
            challenger_path: trainer.model_path.clone(),
            metric_delta: verdict.metric_delta,
            challenger_score,
            champion_score,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bundle::tests::{risk_bundle, risk_table};
    use crate::error::PipelineError;
    use crate::registry::{FsModelRegistry, RegistryError, RegistryResult};
    use tempfile::TempDir;

    #[test]
    fn test_no_champion_accepts() {
        let verdict = compare(0.7, None);
        assert!(verdict.accepted);
        assert!((verdict.metric_delta - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tie_rejects() {
        let verdict = compare(0.8, Some(0.8));
        assert!(!verdict.accepted);
        assert_eq!(verdict.metric_delta, 0.0);
    }

    #[test]
    fn test_better_challenger_accepted() {
        let verdict = compare(0.82, Some(0.78));
        assert!(verdict.accepted);
        assert!((verdict.metric_delta - 0.04).abs() < 1e-9);
    }

    #[test]
    fn test_worse_challenger_rejected() {
        let verdict = compare(0.70, Some(0.78));
        assert!(!verdict.accepted);
        assert!(verdict.metric_delta < 0.0);
    }

    #[test]
    fn test_empty_registry_has_no_champion() {
        let temp = TempDir::new().unwrap();
        let registry = FsModelRegistry::new(temp.path());
        let evaluator = ModelEvaluator::new(&registry, "models/model.json");
        assert!(evaluator.load_champion().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_champion_is_fatal() {
        let temp = TempDir::new().unwrap();
        let registry = FsModelRegistry::new(temp.path());
        registry.write("models/model.json", b"garbage").unwrap();
        let err = ModelEvaluator::new(&registry, "models/model.json").load_champion().unwrap_err();
        assert!(matches!(err, PipelineError::Evaluation { stage: Stage::Evaluation, .. }));
    }

    pub(crate) struct Unreachable;

    impl ModelRegistry for Unreachable {
        fn exists(&self, _key: &str) -> RegistryResult<bool> {
            Err(RegistryError::Io(std::io::Error::other("connection refused")))
        }

        fn read(&self, _key: &str) -> RegistryResult<Vec<u8>> {
            Err(RegistryError::Io(std::io::Error::other("connection refused")))
        }

        fn write(&self, _key: &str, _bytes: &[u8]) -> RegistryResult<()> {
            Err(RegistryError::Io(std::io::Error::other("connection refused")))
        }
    }

    #[test]
    fn test_unreachable_registry_is_a_data_access_error() {
        let err = ModelEvaluator::new(&Unreachable, "models/model.json").load_champion().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DataAccess { stage: Stage::Evaluation, ref source }
                if source.downcast_ref::<RegistryError>().is_some()
        ));
    }

    #[test]
    fn test_champion_scored_on_raw_rows() {
        let temp = TempDir::new().unwrap();
        let registry = FsModelRegistry::new(temp.path());
        let champion = risk_bundle();
        registry.write("models/model.json", &champion.to_bytes().unwrap()).unwrap();

        let evaluator = ModelEvaluator::new(&registry, "models/model.json");
        let loaded = evaluator.load_champion().unwrap().unwrap();
        let score = evaluator.champion_score(&loaded, &risk_table(30)).unwrap();
        assert!((score - 1.0).abs() < 1e-12);
    }
}

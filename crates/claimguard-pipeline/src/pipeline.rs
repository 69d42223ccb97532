//! End-to-end training run.

use crate::artifacts::{
    make_run_file, ArtifactKind, DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact,
    ModelEvaluationArtifact, ModelPusherArtifact, ModelTrainerArtifact, RunFile, RunManifest,
};
use crate::config::PipelineConfig;
use crate::deadline::Deadline;
use crate::error::{PipelineResult, Stage};
use crate::evaluation::ModelEvaluator;
use crate::ingestion::{DataIngestion, DatasetProvider};
use crate::layout::{transformed, RunLayout};
use crate::pusher::ModelPusher;
use crate::registry::ModelRegistry;
use crate::schema::Schema;
use crate::tracking::{MetricsSink, NoopMetricsSink, TrackingEvent};
use crate::trainer::ModelTrainer;
use crate::transformation::DataTransformer;
use crate::validation::DataValidator;
use chrono::Utc;
use std::path::PathBuf;
use tracing::info;

/// Every artifact of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub ingestion: DataIngestionArtifact,
    pub validation: DataValidationArtifact,
    pub transformation: DataTransformationArtifact,
    pub trainer: ModelTrainerArtifact,
    pub evaluation: ModelEvaluationArtifact,
    pub pusher: ModelPusherArtifact,
    pub manifest_path: PathBuf,
}

pub struct TrainingPipeline<'a> {
    config: &'a PipelineConfig,
    schema: &'a Schema,
    provider: &'a dyn DatasetProvider,
    registry: &'a dyn ModelRegistry,
    sink: &'a dyn MetricsSink,
}

impl<'a> TrainingPipeline<'a> {
    #[must_use]
    pub fn new(
        config: &'a PipelineConfig,
        schema: &'a Schema,
        provider: &'a dyn DatasetProvider,
        registry: &'a dyn ModelRegistry,
    ) -> Self {
        Self { config, schema, provider, registry, sink: &NoopMetricsSink }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: &'a dyn MetricsSink) -> Self {
        self.sink = sink;
        self
    }

    /// Runs in a fresh timestamped directory under the artifact root.
    pub fn run(&self) -> PipelineResult<PipelineOutcome> {
        self.run_in(&RunLayout::for_timestamp(&self.config.artifact_root, Utc::now()))
    }

    pub fn run_in(&self, layout: &RunLayout) -> PipelineResult<PipelineOutcome> {
        self.config.validate()?;
        let deadline = Deadline::from_secs(self.config.time_budget_secs);
        let seed = self.config.random_seed;
        let run_id = layout.run_id().to_string();

        layout.ensure_run_dir()?;
        info!(run_id = %run_id, dir = %layout.run_dir().display(), "training pipeline started");
        self.sink.record(TrackingEvent::RunStarted { run_id: run_id.clone() });

        deadline.check(Stage::Ingestion)?;
        let ingestion = DataIngestion::new(&self.config.ingestion, layout, seed).initiate(self.provider)?;

        deadline.check(Stage::Validation)?;
        let validation = DataValidator::new(self.schema, layout.validation_report_path()).initiate(&ingestion)?;

        deadline.check(Stage::Transformation)?;
        let transformation =
            DataTransformer::new(self.schema, &self.config.transformation, layout.transformation_dir(), seed)
                .initiate(&ingestion)?;

        deadline.check(Stage::Training)?;
        let trainer = ModelTrainer::new(&self.config.trainer, seed)
            .with_tracking(run_id.clone(), self.sink)
            .with_deadline(deadline)
            .initiate(
                &transformation,
                &self.config.trainer.resolved_candidates(),
                layout.model_bundle_path(),
                layout.estimator_path(),
            )?;

        deadline.check(Stage::Evaluation)?;
        let evaluation = ModelEvaluator::new(self.registry, self.config.evaluation.registry_key())
            .with_tracking(run_id.clone(), self.sink)
            .initiate(&ingestion, &transformation, &trainer)?;

        deadline.check(Stage::Pushing)?;
        let pusher = ModelPusher::new(self.registry).push(&evaluation)?;

        self.sink.record(TrackingEvent::RunFinished { run_id: run_id.clone() });
        let manifest_path = layout.manifest_path();
        let manifest = RunManifest {
            run_id: run_id.clone(),
            created_at: Utc::now(),
            accepted: evaluation.accepted,
            files: self.collect_files(layout, &ingestion, &validation, &transformation, &trainer)?,
        };
        manifest.write(&manifest_path)?;
        info!(run_id = %run_id, accepted = evaluation.accepted, pushed = pusher.pushed, "training pipeline finished");

        Ok(PipelineOutcome {
            run_id,
            run_dir: layout.run_dir().to_path_buf(),
            ingestion,
            validation,
            transformation,
            trainer,
            evaluation,
            pusher,
            manifest_path,
        })
    }

    fn collect_files(
        &self,
        layout: &RunLayout,
        ingestion: &DataIngestionArtifact,
        validation: &DataValidationArtifact,
        transformation: &DataTransformationArtifact,
        trainer: &ModelTrainerArtifact,
    ) -> PipelineResult<Vec<RunFile>> {
        let mut entries = vec![
            (ArtifactKind::FeatureStore, ingestion.feature_store_path.clone()),
            (ArtifactKind::TrainSplit, ingestion.train_path.clone()),
            (ArtifactKind::TestSplit, ingestion.test_path.clone()),
            (ArtifactKind::ValidationReport, validation.report_path.clone()),
            (ArtifactKind::Encoder, transformation.encoder_path.clone()),
            (ArtifactKind::TrainArray, transformation.train_array_path.clone()),
            (ArtifactKind::TestArray, transformation.test_array_path.clone()),
            (ArtifactKind::ResamplingReport, transformation.resampling_report_path.clone()),
        ];
        for name in [transformed::TRAIN_CSV, transformed::TEST_CSV] {
            let path = layout.transformation_dir().join(name);
            if path.exists() {
                entries.push((ArtifactKind::TransformedCsv, path));
            }
        }
        entries.push((ArtifactKind::ModelBundle, trainer.model_path.clone()));
        entries.push((ArtifactKind::Estimator, trainer.estimator_path.clone()));
        if let Some(path) = self.config.tracking.metrics_path.as_ref().filter(|p| p.exists()) {
            entries.push((ArtifactKind::Metrics, path.clone()));
        }

        entries.into_iter().map(|(kind, path)| make_run_file(kind, path)).collect()
    }
}

//! Candidate search and model selection.

use crate::artifacts::{DataTransformationArtifact, ModelTrainerArtifact};
use crate::bundle::TrainedModelBundle;
use crate::config::{CandidateConfig, TrainerConfig};
use crate::deadline::Deadline;
use crate::encoder::EncodingPipeline;
use crate::error::{PipelineError, PipelineResult, Stage, StageContext};
use crate::persist;
use crate::tracking::{MetricsSink, NoopMetricsSink, TrackingEvent};
use claimguard_models::{
    argmax_first, describe_params, ClassificationMetric, Classifier, Estimator, GridSearch, ModelFamily,
    ParamSet, StratifiedKFold,
};
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How one candidate fared after its grid search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateReport {
    pub name: String,
    pub family: ModelFamily,
    pub best_params: ParamSet,
    pub cv_score: f64,
    pub train_metric: ClassificationMetric,
    pub test_metric: ClassificationMetric,
    /// Selection metric on the training split.
    pub train_score: f64,
    /// Selection metric on the test split.
    pub test_score: f64,
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub bundle: TrainedModelBundle,
    pub train_metric: ClassificationMetric,
    pub test_metric: ClassificationMetric,
    /// Every candidate, in configuration order.
    pub candidates: Vec<CandidateReport>,
    pub winner: usize,
}

impl TrainingOutcome {
    #[must_use]
    pub fn winning_report(&self) -> &CandidateReport {
        &self.candidates[self.winner]
    }
}

pub struct ModelTrainer<'a> {
    config: &'a TrainerConfig,
    seed: u64,
    run_id: String,
    sink: &'a dyn MetricsSink,
    deadline: Deadline,
}

impl<'a> ModelTrainer<'a> {
    #[must_use]
    pub fn new(config: &'a TrainerConfig, seed: u64) -> Self {
        Self { config, seed, run_id: String::new(), sink: &NoopMetricsSink, deadline: Deadline::unlimited() }
    }

    #[must_use]
    pub fn with_tracking(mut self, run_id: impl Into<String>, sink: &'a dyn MetricsSink) -> Self {
        self.run_id = run_id.into();
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Grid-searches every candidate and keeps the best on held-out data.
    ///
    /// Ties go to the earliest candidate.
    pub fn train(
        &self,
        encoder: &EncodingPipeline,
        x_train: ArrayView2<'_, f64>,
        y_train: ArrayView1<'_, f64>,
        x_test: ArrayView2<'_, f64>,
        y_test: ArrayView1<'_, f64>,
        candidates: &[CandidateConfig],
    ) -> PipelineResult<TrainingOutcome> {
        if candidates.is_empty() {
            return Err(PipelineError::training(Stage::Training, anyhow::anyhow!("no model candidates configured")));
        }
        let cv = StratifiedKFold::new(self.config.cv_folds).training(Stage::Training)?;

        let mut reports = Vec::with_capacity(candidates.len());
        let mut estimators: Vec<Estimator> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            self.deadline.check(Stage::Training)?;
            info!(candidate = %candidate.name, family = %candidate.family, "grid search started");

            let search = GridSearch::new(candidate.family, candidate.grid(), cv, self.config.scoring, self.seed);
            let result = search.run(x_train, y_train).training(Stage::Training)?;

            let train_pred = result.estimator.predict(x_train).training(Stage::Training)?;
            let test_pred = result.estimator.predict(x_test).training(Stage::Training)?;
            let metric = self.config.selection_metric;
            let report = CandidateReport {
                name: candidate.name.clone(),
                family: candidate.family,
                best_params: result.best_params.clone(),
                cv_score: result.best_score,
                train_metric: ClassificationMetric::compute(y_train, train_pred.view()).training(Stage::Training)?,
                test_metric: ClassificationMetric::compute(y_test, test_pred.view()).training(Stage::Training)?,
                train_score: metric.score(y_train, train_pred.view()).training(Stage::Training)?,
                test_score: metric.score(y_test, test_pred.view()).training(Stage::Training)?,
            };
            info!(
                candidate = %report.name,
                params = %describe_params(&report.best_params),
                cv_score = report.cv_score,
                test_score = report.test_score,
                "candidate scored"
            );
            self.sink.record(TrackingEvent::CandidateScored {
                run_id: self.run_id.clone(),
                candidate: report.name.clone(),
                cv_score: report.cv_score,
                test_score: report.test_score,
                params: report.best_params.clone(),
            });
            reports.push(report);
            estimators.push(result.estimator);
        }

        let scores: Vec<f64> = reports.iter().map(|r| r.test_score).collect();
        let winner = argmax_first(&scores).ok_or_else(|| {
            PipelineError::training(Stage::Training, anyhow::anyhow!("no candidate produced a usable score"))
        })?;
        let best = &reports[winner];
        debug!(scores = ?scores, winner, "selection scores");

        if best.test_score < self.config.expected_score {
            return Err(PipelineError::training(
                Stage::Training,
                anyhow::anyhow!(
                    "best model {} scored {:.4} {}, below the expected {:.4}",
                    best.name,
                    best.test_score,
                    self.config.selection_metric,
                    self.config.expected_score
                ),
            ));
        }
        let gap = best.train_score - best.test_score;
        if gap > self.config.overfit_threshold {
            warn!(
                model = %best.name,
                gap,
                threshold = self.config.overfit_threshold,
                "train/test gap exceeds overfitting threshold"
            );
        }

        let model = estimators.swap_remove(winner);
        let model_name = model.name().to_string();
        info!(model = %model_name, candidate = %best.name, score = best.test_score, "model selected");
        self.sink.record(TrackingEvent::ModelTrained {
            run_id: self.run_id.clone(),
            model_name: model_name.clone(),
            train: best.train_metric,
            test: best.test_metric,
        });

        Ok(TrainingOutcome {
            bundle: TrainedModelBundle::new(encoder.clone(), model, model_name),
            train_metric: best.train_metric,
            test_metric: best.test_metric,
            candidates: reports,
            winner,
        })
    }

    /// Loads the transformed arrays, trains, and persists the bundle.
    pub fn initiate(
        &self,
        transformation: &DataTransformationArtifact,
        candidates: &[CandidateConfig],
        model_path: PathBuf,
        estimator_path: PathBuf,
    ) -> PipelineResult<ModelTrainerArtifact> {
        info!("starting model training");
        let encoder: EncodingPipeline = persist::read_json(&transformation.encoder_path).data_access(Stage::Training)?;
        let train = persist::read_matrix(&transformation.train_array_path).data_access(Stage::Training)?;
        let test = persist::read_matrix(&transformation.test_array_path).data_access(Stage::Training)?;

        let outcome =
            self.train(&encoder, train.x.view(), train.y.view(), test.x.view(), test.y.view(), candidates)?;

        persist_outputs(&outcome.bundle, &model_path, &estimator_path).training(Stage::Training)?;
        self.sink.record(TrackingEvent::ModelLogged {
            run_id: self.run_id.clone(),
            model_name: outcome.bundle.model_name.clone(),
            path: model_path.clone(),
        });
        info!(path = %model_path.display(), "trained model bundle saved");

        Ok(ModelTrainerArtifact {
            model_path,
            estimator_path,
            model_name: outcome.bundle.model_name,
            train_metric: outcome.train_metric,
            test_metric: outcome.test_metric,
        })
    }
}

/// Writes the bundle and the bare estimator side by side, then moves both
/// into place. A failed write leaves neither output behind.
fn persist_outputs(bundle: &TrainedModelBundle, model_path: &Path, estimator_path: &Path) -> anyhow::Result<()> {
    let parent = model_path.parent().context("model path has no parent directory")?;
    std::fs::create_dir_all(parent).with_context(|| format!("cannot create {}", parent.display()))?;
    if let Some(dir) = estimator_path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    }

    let staging = tempfile::Builder::new().prefix(".model_trainer").tempdir_in(parent)?;
    let staged_model = staging.path().join("model.json");
    let staged_estimator = staging.path().join("estimator.json");
    bundle.save(&staged_model)?;
    persist::write_json(&staged_estimator, &bundle.model)?;

    std::fs::rename(&staged_estimator, estimator_path)
        .with_context(|| format!("cannot move estimator to {}", estimator_path.display()))?;
    std::fs::rename(&staged_model, model_path)
        .with_context(|| format!("cannot move model bundle to {}", model_path.display()))?;
    Ok(())
}

//! Immutable records handed from one stage to the next, plus the run manifest.

use crate::error::{PipelineError, PipelineResult, Stage};
use chrono::{DateTime, Utc};
use claimguard_models::ClassificationMetric;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIngestionArtifact {
    pub feature_store_path: PathBuf,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValidationArtifact {
    pub status: bool,
    pub message: String,
    pub report_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTransformationArtifact {
    pub encoder_path: PathBuf,
    pub train_array_path: PathBuf,
    pub test_array_path: PathBuf,
    pub resampling_report_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTrainerArtifact {
    pub model_path: PathBuf,
    pub estimator_path: PathBuf,
    pub model_name: String,
    pub train_metric: ClassificationMetric,
    pub test_metric: ClassificationMetric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvaluationArtifact {
    pub accepted: bool,
    pub champion_key: String,
    pub challenger_path: PathBuf,
    pub metric_delta: f64,
    pub challenger_score: f64,
    pub champion_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPusherArtifact {
    pub pushed: bool,
    pub registry_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    FeatureStore,
    TrainSplit,
    TestSplit,
    ValidationReport,
    Encoder,
    TrainArray,
    TestArray,
    TransformedCsv,
    ResamplingReport,
    ModelBundle,
    Estimator,
    Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFile {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub sha256: String,
}

/// Written at the end of every completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub accepted: bool,
    pub files: Vec<RunFile>,
}

impl RunManifest {
    pub fn write(&self, path: &Path) -> PipelineResult<()> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| PipelineError::data_access(Stage::Pushing, e))?;
        std::fs::write(path, json).map_err(|e| PipelineError::data_access(Stage::Pushing, e))
    }

    pub fn read(path: &Path) -> PipelineResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| PipelineError::data_access(Stage::Pushing, e))?;
        serde_json::from_slice(&bytes).map_err(|e| PipelineError::data_access(Stage::Pushing, e))
    }
}

pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

pub fn make_run_file(kind: ArtifactKind, path: PathBuf) -> PipelineResult<RunFile> {
    if !path.exists() {
        return Err(PipelineError::data_access(
            Stage::Pushing,
            anyhow::anyhow!("artifact path does not exist: {}", path.display()),
        ));
    }

    let sha256 = sha256_file(&path).map_err(|e| PipelineError::data_access(Stage::Pushing, e))?;
    Ok(RunFile { kind, path, sha256 })
}

use crate::error::{PipelineError, PipelineResult, Stage};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Timestamp format of run directories, e.g. `10_15_2026_09_30_00`.
pub const RUN_ID_FORMAT: &str = "%m_%d_%Y_%H_%M_%S";

/// Filesystem layout of one training run.
///
/// `<artifact_root>/<run_id>/{data_ingestion,data_validation,data_transformation,model_trainer}/...`
#[derive(Debug, Clone)]
pub struct RunLayout {
    run_dir: PathBuf,
    run_id: String,
}

impl RunLayout {
    #[must_use]
    pub fn new(artifact_root: &Path, run_id: impl Into<String>) -> Self {
        let run_id = run_id.into();
        Self { run_dir: artifact_root.join(&run_id), run_id }
    }

    #[must_use]
    pub fn for_timestamp(artifact_root: &Path, at: DateTime<Utc>) -> Self {
        Self::new(artifact_root, at.format(RUN_ID_FORMAT).to_string())
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    #[must_use]
    pub fn ingestion_dir(&self) -> PathBuf {
        self.run_dir.join("data_ingestion")
    }

    #[must_use]
    pub fn feature_store_path(&self, collection: &str) -> PathBuf {
        self.ingestion_dir().join("feature_store").join(format!("{collection}.csv"))
    }

    #[must_use]
    pub fn train_csv_path(&self) -> PathBuf {
        self.ingestion_dir().join("ingested").join("train.csv")
    }

    #[must_use]
    pub fn test_csv_path(&self) -> PathBuf {
        self.ingestion_dir().join("ingested").join("test.csv")
    }

    #[must_use]
    pub fn validation_report_path(&self) -> PathBuf {
        self.run_dir.join("data_validation").join("report.yaml")
    }

    #[must_use]
    pub fn transformation_dir(&self) -> PathBuf {
        self.run_dir.join("data_transformation")
    }

    #[must_use]
    pub fn trained_model_dir(&self) -> PathBuf {
        self.run_dir.join("model_trainer").join("trained_model")
    }

    #[must_use]
    pub fn model_bundle_path(&self) -> PathBuf {
        self.trained_model_dir().join("model.json")
    }

    #[must_use]
    pub fn estimator_path(&self) -> PathBuf {
        self.trained_model_dir().join("estimator.json")
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.run_dir.join("run_manifest.json")
    }

    pub fn ensure_run_dir(&self) -> PipelineResult<()> {
        std::fs::create_dir_all(&self.run_dir).map_err(|e| PipelineError::data_access(Stage::Ingestion, e))
    }
}

/// File names inside the transformation directory.
pub mod transformed {
    pub const ENCODER: &str = "encoder.json";
    pub const TRAIN_ARRAY: &str = "train.safetensors";
    pub const TEST_ARRAY: &str = "test.safetensors";
    pub const TRAIN_CSV: &str = "transformed_train.csv";
    pub const TEST_CSV: &str = "transformed_test.csv";
    pub const RESAMPLING_REPORT: &str = "resampling_report.json";
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let temp = TempDir::new().unwrap();
        let at = Utc.with_ymd_and_hms(2026, 10, 15, 9, 30, 5).unwrap();
        let layout = RunLayout::for_timestamp(temp.path(), at);

        assert_eq!(layout.run_id(), "10_15_2026_09_30_05");
        assert!(layout.train_csv_path().ends_with("data_ingestion/ingested/train.csv"));
        assert!(layout.feature_store_path("claims").ends_with("feature_store/claims.csv"));
        assert!(layout.validation_report_path().ends_with("data_validation/report.yaml"));
        assert!(layout.model_bundle_path().ends_with("model_trainer/trained_model/model.json"));

        layout.ensure_run_dir().unwrap();
        assert!(layout.run_dir().is_dir());
    }
}

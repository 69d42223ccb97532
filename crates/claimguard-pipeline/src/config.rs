//! Pipeline configuration.
//!
//! Loaded once from TOML, every field defaulted, then patched from the
//! environment before any stage runs.

use crate::error::{PipelineError, PipelineResult};
use claimguard_models::{ModelFamily, ParamGrid, ScoreMetric};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DATASET_URL_ENV: &str = "CLAIMGUARD_DATASET_URL";
pub const REGISTRY_ROOT_ENV: &str = "CLAIMGUARD_REGISTRY_ROOT";

fn default_artifact_root() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("schema").join("schema.yaml")
}

fn default_seed() -> u64 {
    42
}

fn default_collection() -> String {
    "vehicle_insurance".to_string()
}

fn default_test_ratio() -> f64 {
    0.2
}

fn default_true() -> bool {
    true
}

fn default_smote_k() -> usize {
    5
}

fn default_enn_k() -> usize {
    3
}

fn default_cv_folds() -> usize {
    3
}

fn default_selection_metric() -> ScoreMetric {
    ScoreMetric::Recall
}

fn default_expected_score() -> f64 {
    0.6
}

fn default_overfit_threshold() -> f64 {
    0.05
}

fn default_bucket() -> String {
    "claimguard-models".to_string()
}

fn default_model_key() -> String {
    "model.json".to_string()
}

fn default_registry_root() -> PathBuf {
    PathBuf::from("registry")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_artifact_root")]
    pub artifact_root: PathBuf,

    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,

    #[serde(default = "default_seed")]
    pub random_seed: u64,

    /// Wall-clock limit for one run, checked between stages and candidates.
    #[serde(default)]
    pub time_budget_secs: Option<u64>,

    #[serde(default)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    pub transformation: TransformationConfig,

    #[serde(default)]
    pub trainer: TrainerConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub tracking: TrackingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Directory holding `<collection>.csv`.
    #[serde(default)]
    pub dataset_url: Option<PathBuf>,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_test_ratio")]
    pub test_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationConfig {
    /// Rebalance the training matrix with SMOTE + ENN.
    #[serde(default = "default_true")]
    pub resample: bool,

    #[serde(default = "default_smote_k")]
    pub smote_k: usize,

    #[serde(default = "default_enn_k")]
    pub enn_k: usize,

    /// Also write the encoded matrices as CSV with a header row.
    #[serde(default = "default_true")]
    pub write_csv: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateConfig {
    pub name: String,
    pub family: ModelFamily,
    /// Replaces the family's stock grid when present.
    #[serde(default)]
    pub grid: Option<ParamGrid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,

    /// Metric optimised inside each grid search.
    #[serde(default)]
    pub scoring: ScoreMetric,

    /// Held-out metric used to pick between candidates.
    #[serde(default = "default_selection_metric")]
    pub selection_metric: ScoreMetric,

    #[serde(default = "default_expected_score")]
    pub expected_score: f64,

    #[serde(default = "default_overfit_threshold")]
    pub overfit_threshold: f64,

    /// Empty means the three stock ensembles.
    #[serde(default)]
    pub candidates: Vec<CandidateConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default = "default_model_key")]
    pub model_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_root")]
    pub root: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// JSON-lines file for metric events; none disables tracking.
    #[serde(default)]
    pub metrics_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            artifact_root: default_artifact_root(),
            schema_path: default_schema_path(),
            random_seed: default_seed(),
            time_budget_secs: None,
            ingestion: IngestionConfig::default(),
            transformation: TransformationConfig::default(),
            trainer: TrainerConfig::default(),
            evaluation: EvaluationConfig::default(),
            registry: RegistryConfig::default(),
            tracking: TrackingConfig::default(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self { dataset_url: None, collection: default_collection(), test_ratio: default_test_ratio() }
    }
}

impl Default for TransformationConfig {
    fn default() -> Self {
        Self { resample: true, smote_k: default_smote_k(), enn_k: default_enn_k(), write_csv: true }
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            cv_folds: default_cv_folds(),
            scoring: ScoreMetric::default(),
            selection_metric: default_selection_metric(),
            expected_score: default_expected_score(),
            overfit_threshold: default_overfit_threshold(),
            candidates: Vec::new(),
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self { bucket: default_bucket(), model_key: default_model_key() }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { root: default_registry_root() }
    }
}

impl TrainerConfig {
    /// Configured candidates, or one per stock family with its stock grid.
    #[must_use]
    pub fn resolved_candidates(&self) -> Vec<CandidateConfig> {
        if self.candidates.is_empty() {
            ModelFamily::ALL
                .iter()
                .map(|family| CandidateConfig { name: family.as_str().to_string(), family: *family, grid: None })
                .collect()
        } else {
            self.candidates.clone()
        }
    }
}

impl CandidateConfig {
    #[must_use]
    pub fn grid(&self) -> ParamGrid {
        self.grid.clone().unwrap_or_else(|| self.family.default_grid())
    }
}

impl EvaluationConfig {
    /// Registry key of the champion, `bucket/model_key`.
    #[must_use]
    pub fn registry_key(&self) -> String {
        format!("{}/{}", self.bucket.trim_end_matches('/'), self.model_key.trim_start_matches('/'))
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> PipelineResult<Self> {
        toml::from_str(content).map_err(|e| PipelineError::Config(format!("invalid config: {e}")))
    }

    pub fn load_from_file(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Loads the file if given, then applies process environment overrides.
    pub fn load(path: Option<&Path>) -> PipelineResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides_with(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_env_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(DATASET_URL_ENV).filter(|v| !v.is_empty()) {
            self.ingestion.dataset_url = Some(PathBuf::from(url));
        }
        if let Some(root) = lookup(REGISTRY_ROOT_ENV).filter(|v| !v.is_empty()) {
            self.registry.root = PathBuf::from(root);
        }
    }

    /// Dataset directory; required for a training run.
    pub fn dataset_url(&self) -> PipelineResult<&Path> {
        self.ingestion.dataset_url.as_deref().ok_or_else(|| {
            PipelineError::Config(format!("no dataset location: set ingestion.dataset_url or {DATASET_URL_ENV}"))
        })
    }

    pub fn validate(&self) -> PipelineResult<()> {
        let ratio = self.ingestion.test_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(PipelineError::Config(format!("ingestion.test_ratio must be in (0, 1), got {ratio}")));
        }
        if self.trainer.cv_folds < 2 {
            return Err(PipelineError::Config(format!(
                "trainer.cv_folds must be at least 2, got {}",
                self.trainer.cv_folds
            )));
        }
        if self.transformation.smote_k == 0 || self.transformation.enn_k == 0 {
            return Err(PipelineError::Config("neighbour counts must be positive".to_string()));
        }
        if self.evaluation.bucket.is_empty() || self.evaluation.model_key.is_empty() {
            return Err(PipelineError::Config("evaluation.bucket and evaluation.model_key are required".to_string()));
        }
        if self.time_budget_secs == Some(0) {
            return Err(PipelineError::Config("time_budget_secs must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimguard_models::ParamValue;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config.random_seed, 42);
        assert!((config.ingestion.test_ratio - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.trainer.cv_folds, 3);
        assert_eq!(config.trainer.scoring, ScoreMetric::Accuracy);
        assert_eq!(config.trainer.selection_metric, ScoreMetric::Recall);
        assert_eq!(config.evaluation.registry_key(), "claimguard-models/model.json");
        assert_eq!(config.trainer.resolved_candidates().len(), 3);
        config.validate().unwrap();
    }

    #[test]
    fn test_candidate_grid_override() {
        let toml = r#"
random_seed = 7

[trainer]
expected_score = 0.5

[[trainer.candidates]]
name = "fast_forest"
family = "random_forest"
grid = { n_estimators = [10], max_depth = ["none", 5] }
"#;
        let config = PipelineConfig::from_toml_str(toml).unwrap();
        let candidates = config.trainer.resolved_candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].family, ModelFamily::RandomForest);
        let combos = candidates[0].grid().combinations();
        assert_eq!(combos.len(), 2);
        assert_eq!(combos[0]["n_estimators"], ParamValue::Int(10));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = PipelineConfig::default();
        assert!(matches!(config.dataset_url(), Err(PipelineError::Config(_))));

        config.apply_env_overrides_with(|key| match key {
            DATASET_URL_ENV => Some("/data/claims".to_string()),
            REGISTRY_ROOT_ENV => Some("/srv/registry".to_string()),
            _ => None,
        });
        assert_eq!(config.dataset_url().unwrap(), Path::new("/data/claims"));
        assert_eq!(config.registry.root, PathBuf::from("/srv/registry"));
    }

    #[test]
    fn test_invalid_ratio() {
        let config = PipelineConfig::from_toml_str("[ingestion]\ntest_ratio = 1.0\n").unwrap();
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_unknown_family_is_config_error() {
        let toml = "[[trainer.candidates]]\nname = \"x\"\nfamily = \"svm\"\n";
        assert!(matches!(PipelineConfig::from_toml_str(toml), Err(PipelineError::Config(_))));
    }
}

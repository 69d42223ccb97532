//! Write-only experiment tracking.
//!
//! Recording never fails the pipeline: sinks swallow their own errors and
//! log a warning.

use crate::config::TrackingConfig;
use claimguard_models::{ClassificationMetric, ParamSet};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackingEvent {
    RunStarted { run_id: String },
    CandidateScored { run_id: String, candidate: String, cv_score: f64, test_score: f64, params: ParamSet },
    ModelTrained { run_id: String, model_name: String, train: ClassificationMetric, test: ClassificationMetric },
    ModelLogged { run_id: String, model_name: String, path: PathBuf },
    Evaluated { run_id: String, accepted: bool, challenger_score: f64, champion_score: Option<f64> },
    RunFinished { run_id: String },
}

pub trait MetricsSink: Send + Sync {
    fn record(&self, event: TrackingEvent);
}

#[derive(Debug, Default)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn record(&self, _event: TrackingEvent) {}
}

/// Appends one JSON object per event to a file.
#[derive(Debug)]
pub struct JsonlMetricsSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlMetricsSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, event: &TrackingEvent) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let _guard = self.lock.lock().map_err(|_| anyhow::anyhow!("metrics sink lock poisoned"))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

impl MetricsSink for JsonlMetricsSink {
    fn record(&self, event: TrackingEvent) {
        if let Err(err) = self.append(&event) {
            warn!(path = %self.path.display(), error = %err, "failed to record tracking event");
        }
    }
}

/// JSON-lines sink when a metrics path is configured, otherwise a no-op.
#[must_use]
pub fn sink_from_config(config: &TrackingConfig) -> Box<dyn MetricsSink> {
    match &config.metrics_path {
        Some(path) => Box::new(JsonlMetricsSink::new(path.clone())),
        None => Box::new(NoopMetricsSink),
    }
}

/// Reads back a JSON-lines event file.
pub fn read_events(path: &Path) -> anyhow::Result<Vec<TrackingEvent>> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(Into::into))
        .collect()
}

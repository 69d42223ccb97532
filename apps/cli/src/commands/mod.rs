//! Subcommand implementations.

pub mod champion;
pub mod predict;
pub mod train;

use claimguard_models::ClassificationMetric;
use claimguard_pipeline::{FsModelRegistry, PipelineConfig};
use std::path::Path;

/// Loads the configuration the way every subcommand does.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let config = PipelineConfig::load(path)?;
    config.validate()?;
    Ok(config)
}

pub fn open_registry(config: &PipelineConfig) -> FsModelRegistry {
    FsModelRegistry::new(&config.registry.root)
}

pub fn format_metric(metric: &ClassificationMetric) -> String {
    format!(
        "f1 {:.4}  precision {:.4}  recall {:.4}",
        metric.f1_score, metric.precision_score, metric.recall_score
    )
}

//! `claimguard train`

use super::{format_metric, load_config, open_registry};
use anyhow::Context;
use claimguard_pipeline::{sink_from_config, CsvDirectoryProvider, Schema, TrainingPipeline};
use colored::Colorize;
use std::path::Path;
use tracing::info;

pub fn execute(config_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let schema = Schema::load(&config.schema_path)
        .with_context(|| format!("loading schema from {}", config.schema_path.display()))?;
    let dataset = config.dataset_url()?;
    let provider = CsvDirectoryProvider::new(dataset);
    let registry = open_registry(&config);
    let sink = sink_from_config(&config.tracking);

    info!(dataset = %dataset.display(), registry = %registry.root().display(), "starting training run");
    let outcome = TrainingPipeline::new(&config, &schema, &provider, &registry)
        .with_sink(sink.as_ref())
        .run()?;

    if json {
        let summary = serde_json::json!({
            "run_id": outcome.run_id,
            "run_dir": outcome.run_dir,
            "model_name": outcome.trainer.model_name,
            "train_metric": outcome.trainer.train_metric,
            "test_metric": outcome.trainer.test_metric,
            "evaluation": outcome.evaluation,
            "pusher": outcome.pusher,
            "manifest": outcome.manifest_path,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{}", "Training run complete".bold().green());
    println!("  {} {}", "run:".bold(), outcome.run_id);
    println!("  {} {}", "artifacts:".bold(), outcome.run_dir.display());
    println!("  {} {}", "model:".bold(), outcome.trainer.model_name.cyan());
    println!("  {} {}", "train:".bold(), format_metric(&outcome.trainer.train_metric));
    println!("  {} {}", "test:".bold(), format_metric(&outcome.trainer.test_metric));

    let evaluation = &outcome.evaluation;
    let champion = evaluation.champion_score.map_or_else(|| "none".to_string(), |s| format!("{s:.4}"));
    println!(
        "  {} challenger {:.4} vs champion {} (delta {:+.4})",
        "evaluation:".bold(),
        evaluation.challenger_score,
        champion,
        evaluation.metric_delta
    );
    if outcome.pusher.pushed {
        println!("  {} {}", "pushed:".bold(), outcome.pusher.registry_key.green());
    } else {
        println!("  {} {}", "pushed:".bold(), "no, champion retained".yellow());
    }
    Ok(())
}

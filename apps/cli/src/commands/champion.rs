//! `claimguard champion`

use super::{load_config, open_registry};
use claimguard_models::Classifier;
use claimguard_pipeline::{ModelRegistry, TrainedModelBundle};
use colored::Colorize;
use std::path::Path;

pub fn execute(config_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let registry = open_registry(&config);
    let key = config.evaluation.registry_key();

    if !registry.exists(&key)? {
        if json {
            println!("{}", serde_json::json!({ "key": key, "present": false }));
        } else {
            println!("{} no champion at {}", "!".yellow(), key);
        }
        return Ok(());
    }

    let bundle = TrainedModelBundle::from_bytes(&registry.read(&key)?)?;
    if json {
        let info = serde_json::json!({
            "key": key,
            "present": true,
            "model_name": bundle.model_name,
            "estimator": bundle.model.name(),
            "trained_at": bundle.trained_at,
            "features": bundle.feature_names,
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{}", "Champion model".bold());
    println!("  {} {}", "key:".bold(), key);
    println!("  {} {}", "model:".bold(), bundle.model_name.cyan());
    println!("  {} {}", "trained:".bold(), bundle.trained_at.to_rfc3339());
    println!("  {} {}", "features:".bold(), bundle.feature_names.len());
    Ok(())
}

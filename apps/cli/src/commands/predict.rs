//! `claimguard predict`

use super::{load_config, open_registry};
use anyhow::Context;
use claimguard_pipeline::{ClaimClassifier, ClaimPrediction, ClaimRecord};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

pub fn execute(config_path: Option<&Path>, record_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let content = std::fs::read_to_string(record_path)
        .with_context(|| format!("reading record {}", record_path.display()))?;
    let record: ClaimRecord =
        serde_json::from_str(&content).with_context(|| format!("parsing record {}", record_path.display()))?;

    let classifier = ClaimClassifier::new(Arc::new(open_registry(&config)), config.evaluation.registry_key());
    let probability = classifier.predict_proba(&record)?;
    let prediction = ClaimPrediction::from_probability(probability);

    if json {
        let out = serde_json::json!({ "prediction": prediction, "probability": probability });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let label = match prediction {
        ClaimPrediction::Claim => prediction.to_string().red().bold(),
        ClaimPrediction::NoClaim => prediction.to_string().green().bold(),
    };
    println!("{label} (probability {probability:.3})");
    Ok(())
}

//! Single-record prediction against the registry champion.

use crate::bundle::TrainedModelBundle;
use crate::error::{PipelineError, PipelineResult, Stage, StageContext};
use crate::registry::ModelRegistry;
use crate::table::{Cell, Table};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// One driver, as collected by the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub driving_experience: String,
    pub education: String,
    pub income: String,
    pub vehicle_year: String,
    pub credit_score: f64,
    pub annual_mileage: f64,
    pub age: String,
    pub gender: String,
    pub vehicle_ownership: f64,
    pub married: f64,
    pub children: f64,
    pub speeding_violations: f64,
    pub past_accidents: f64,
}

impl ClaimRecord {
    /// One-row table with the record's fields as columns.
    pub fn to_table(&self) -> PipelineResult<Table> {
        let text = |v: &str| vec![Cell::Text(v.to_string())];
        let num = |v: f64| vec![Cell::Number(v)];
        Table::from_columns([
            ("driving_experience", text(&self.driving_experience)),
            ("education", text(&self.education)),
            ("income", text(&self.income)),
            ("vehicle_year", text(&self.vehicle_year)),
            ("credit_score", num(self.credit_score)),
            ("annual_mileage", num(self.annual_mileage)),
            ("age", text(&self.age)),
            ("gender", text(&self.gender)),
            ("vehicle_ownership", num(self.vehicle_ownership)),
            ("married", num(self.married)),
            ("children", num(self.children)),
            ("speeding_violations", num(self.speeding_violations)),
            ("past_accidents", num(self.past_accidents)),
        ])
        .data_access(Stage::Inference)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimPrediction {
    Claim,
    NoClaim,
}

impl ClaimPrediction {
    /// Claim when the positive-class probability exceeds one half.
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        if probability > 0.5 { Self::Claim } else { Self::NoClaim }
    }
}

impl fmt::Display for ClaimPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Claim => "claim",
            Self::NoClaim => "no claim",
        })
    }
}

/// Predictor backed by the registry champion, loaded on first use.
pub struct ClaimClassifier {
    registry: Arc<dyn ModelRegistry>,
    key: String,
    bundle: OnceCell<TrainedModelBundle>,
}

impl ClaimClassifier {
    pub fn new(registry: Arc<dyn ModelRegistry>, key: impl Into<String>) -> Self {
        Self { registry, key: key.into(), bundle: OnceCell::new() }
    }

    /// The champion bundle; fetched from the registry once.
    pub fn bundle(&self) -> PipelineResult<&TrainedModelBundle> {
        self.bundle.get_or_try_init(|| {
            let bytes = self.registry.read(&self.key).data_access(Stage::Inference)?;
            let bundle = TrainedModelBundle::from_bytes(&bytes).data_access(Stage::Inference)?;
            info!(key = %self.key, model = %bundle.model_name, "champion loaded");
            Ok(bundle)
        })
    }

    pub fn predict_proba(&self, record: &ClaimRecord) -> PipelineResult<f64> {
        let table = record.to_table()?;
        let proba = self.bundle()?.predict_proba(&table).transform(Stage::Inference)?;
        proba.first().copied().ok_or_else(|| {
            PipelineError::transform(Stage::Inference, anyhow::anyhow!("model returned no prediction"))
        })
    }

    pub fn predict(&self, record: &ClaimRecord) -> PipelineResult<ClaimPrediction> {
        self.predict_proba(record).map(ClaimPrediction::from_probability)
    }
}

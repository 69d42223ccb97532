//! The deployable unit: fitted encoder plus fitted estimator.

use crate::encoder::EncodingPipeline;
use crate::table::Table;
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use claimguard_models::{Classifier, Estimator};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModelBundle {
    pub encoder: EncodingPipeline,
    pub model: Estimator,
    pub model_name: String,
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
}

impl TrainedModelBundle {
    #[must_use]
    pub fn new(encoder: EncodingPipeline, model: Estimator, model_name: impl Into<String>) -> Self {
        let feature_names = encoder.feature_names().to_vec();
        Self { encoder, model, model_name: model_name.into(), feature_names, trained_at: Utc::now() }
    }

    /// Probability of a claim for every row of raw `table`.
    pub fn predict_proba(&self, table: &Table) -> anyhow::Result<Array1<f64>> {
        if self.feature_names.len() != self.encoder.n_features() {
            bail!(
                "bundle lists {} features but its encoder emits {}",
                self.feature_names.len(),
                self.encoder.n_features()
            );
        }
        let x = self.encoder.transform(table)?;
        Ok(self.model.predict_proba(x.view())?)
    }

    /// 0/1 labels for every row of raw `table`.
    pub fn predict(&self, table: &Table) -> anyhow::Result<Array1<f64>> {
        Ok(self.predict_proba(table)?.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        serde_json::from_slice(bytes).context("model bundle is not valid JSON")
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_bytes()?).with_context(|| format!("cannot write {}", path.display()))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::encoder::EncoderPlan;
    use crate::table::Cell;
    use claimguard_models::{ModelFamily, ParamSet, ParamValue};

    /// Two-feature table where `risk > 5` means a claim.
    pub(crate) fn risk_table(n: usize) -> Table {
        Table::from_columns([
            ("risk", (0..n).map(|i| Cell::Number((i % 10) as f64)).collect()),
            ("outcome", (0..n).map(|i| Cell::Number(if i % 10 > 5 { 1.0 } else { 0.0 })).collect()),
        ])
        .unwrap()
    }

    pub(crate) fn risk_bundle() -> TrainedModelBundle {
        let plan = EncoderPlan {
            target_column: "outcome".into(),
            drop_columns: vec![],
            ordinal_columns: vec![],
            onehot_columns: vec![],
            impute_columns: vec![],
        };
        let table = risk_table(100);
        let encoder = plan.fit(&table).unwrap();
        let x = encoder.transform(&table).unwrap();
        let y = crate::transformation::target_vector(&table, "outcome").unwrap();
        let mut params = ParamSet::new();
        params.insert("n_estimators".into(), ParamValue::Int(5));
        let mut model = ModelFamily::RandomForest.build(&params, 0).unwrap();
        model.fit(x.view(), y.view()).unwrap();
        TrainedModelBundle::new(encoder, model, "RandomForestClassifier")
    }

    #[test]
    fn test_bundle_predicts_raw_rows() {
        let bundle = risk_bundle();
        let table = risk_table(10);
        let pred = bundle.predict(&table).unwrap();
        let expected = crate::transformation::target_vector(&table, "outcome").unwrap();
        assert_eq!(pred, expected);
    }

    #[test]
    fn test_bundle_survives_disk() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("trained_model").join("model.json");
        let bundle = risk_bundle();
        bundle.save(&path).unwrap();
        let restored = TrainedModelBundle::load(&path).unwrap();
        assert_eq!(restored.feature_names, vec!["risk".to_string()]);
        assert_eq!(restored.predict(&risk_table(20)).unwrap(), bundle.predict(&risk_table(20)).unwrap());
    }

    #[test]
    fn test_corrupt_bytes_rejected() {
        assert!(TrainedModelBundle::from_bytes(b"{\"encoder\": 1}").is_err());
    }
}

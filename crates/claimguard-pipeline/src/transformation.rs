//! Encoding and class rebalancing of the validated split.

use crate::artifacts::{DataIngestionArtifact, DataTransformationArtifact};
use crate::config::TransformationConfig;
use crate::encoder::{build_encoder, EncoderPlan, EncodingPipeline};
use crate::error::{PipelineResult, Stage, StageContext};
use crate::layout::transformed;
use crate::persist;
use crate::resample::{smote_enn, ClassCounts};
use crate::schema::Schema;
use crate::table::{Cell, Table};
use anyhow::{anyhow, bail, Context};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Class balance before and after rebalancing.
///
/// The test counts are diagnostic; the persisted test array is never resampled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResamplingReport {
    pub applied: bool,
    pub smote_k: usize,
    pub enn_k: usize,
    pub seed: u64,
    pub train_before: ClassCounts,
    pub train_after: ClassCounts,
    pub test_before: ClassCounts,
    pub test_after: ClassCounts,
}

/// Output of `fit_transform`: the fitted encoder and both encoded halves.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedSplit {
    pub encoder: EncodingPipeline,
    pub train_x: Array2<f64>,
    pub train_y: Array1<f64>,
    pub test_x: Array2<f64>,
    pub test_y: Array1<f64>,
    pub report: ResamplingReport,
}

impl TransformedSplit {
    #[must_use]
    pub fn train_matrix(&self) -> Array2<f64> {
        persist::append_target(self.train_x.view(), self.train_y.view())
    }

    #[must_use]
    pub fn test_matrix(&self) -> Array2<f64> {
        persist::append_target(self.test_x.view(), self.test_y.view())
    }
}

/// Reads the target as 0/1 labels.
pub fn target_vector(table: &Table, target: &str) -> anyhow::Result<Array1<f64>> {
    let column = table.column(target).ok_or_else(|| anyhow!("missing target column {target}"))?;
    column
        .cells
        .iter()
        .enumerate()
        .map(|(row, cell)| match cell {
            Cell::Number(v) if *v == 0.0 || *v == 1.0 => Ok(*v),
            other => bail!("target {target} must be 0 or 1, found {other:?} at row {row}"),
        })
        .collect()
}

/// Fits the encoder on `train`, encodes both halves and rebalances the
/// training half.
pub fn fit_transform(
    train: &Table,
    test: &Table,
    plan: &EncoderPlan,
    settings: &TransformationConfig,
    seed: u64,
) -> anyhow::Result<TransformedSplit> {
    let encoder = plan.fit(train)?;
    let train_x = encoder.transform(train)?;
    let train_y = target_vector(train, &plan.target_column)?;
    let test_x = encoder.transform(test)?;
    let test_y = target_vector(test, &plan.target_column)?;

    let train_before = ClassCounts::of(train_y.view());
    let test_before = ClassCounts::of(test_y.view());
    let (train_x, train_y, train_after, test_after) = if settings.resample {
        let train_resampled = smote_enn(train_x.view(), train_y.view(), settings.smote_k, settings.enn_k, seed);
        let test_resampled = smote_enn(test_x.view(), test_y.view(), settings.smote_k, settings.enn_k, seed);
        let train_after = ClassCounts::of(train_resampled.y.view());
        (train_resampled.x, train_resampled.y, train_after, ClassCounts::of(test_resampled.y.view()))
    } else {
        (train_x, train_y, train_before, test_before)
    };

    let report = ResamplingReport {
        applied: settings.resample,
        smote_k: settings.smote_k,
        enn_k: settings.enn_k,
        seed,
        train_before,
        train_after,
        test_before,
        test_after,
    };
    Ok(TransformedSplit { encoder, train_x, train_y, test_x, test_y, report })
}

pub struct DataTransformer<'a> {
    schema: &'a Schema,
    config: &'a TransformationConfig,
    out_dir: PathBuf,
    seed: u64,
}

impl<'a> DataTransformer<'a> {
    #[must_use]
    pub fn new(schema: &'a Schema, config: &'a TransformationConfig, out_dir: PathBuf, seed: u64) -> Self {
        Self { schema, config, out_dir, seed }
    }

    pub fn initiate(&self, ingestion: &DataIngestionArtifact) -> PipelineResult<DataTransformationArtifact> {
        info!("starting data transformation");
        let train = Table::read_csv(&ingestion.train_path).data_access(Stage::Transformation)?;
        let test = Table::read_csv(&ingestion.test_path).data_access(Stage::Transformation)?;

        let plan = build_encoder(self.schema);
        let split = fit_transform(&train, &test, &plan, self.config, self.seed).transform(Stage::Transformation)?;
        info!(
            features = split.encoder.n_features(),
            train_rows_before = split.report.train_before.total(),
            train_rows_after = split.report.train_after.total(),
            "encoded and rebalanced training data"
        );

        self.persist(&split).transform(Stage::Transformation)?;
        info!(dir = %self.out_dir.display(), "data transformation complete");

        Ok(DataTransformationArtifact {
            encoder_path: self.out_dir.join(transformed::ENCODER),
            train_array_path: self.out_dir.join(transformed::TRAIN_ARRAY),
            test_array_path: self.out_dir.join(transformed::TEST_ARRAY),
            resampling_report_path: self.out_dir.join(transformed::RESAMPLING_REPORT),
        })
    }

    /// Writes every output into a sibling temp dir, then swaps it into place.
    fn persist(&self, split: &TransformedSplit) -> anyhow::Result<()> {
        let parent = self.out_dir.parent().ok_or_else(|| anyhow!("output dir has no parent"))?;
        std::fs::create_dir_all(parent)?;
        let staging = tempfile::Builder::new().prefix(".data_transformation").tempdir_in(parent)?;
        let staged = staging.path();

        let names = split.encoder.feature_names();
        let target = split.encoder.target_column();
        persist::write_json(&staged.join(transformed::ENCODER), &split.encoder)?;
        persist::write_matrix(&staged.join(transformed::TRAIN_ARRAY), split.train_x.view(), split.train_y.view(), names, target)?;
        persist::write_matrix(&staged.join(transformed::TEST_ARRAY), split.test_x.view(), split.test_y.view(), names, target)?;
        if self.config.write_csv {
            persist::write_matrix_csv(&staged.join(transformed::TRAIN_CSV), split.train_x.view(), split.train_y.view(), names, target)?;
            persist::write_matrix_csv(&staged.join(transformed::TEST_CSV), split.test_x.view(), split.test_y.view(), names, target)?;
        }
        persist::write_json(&staged.join(transformed::RESAMPLING_REPORT), &split.report)?;

        promote(staged, &self.out_dir)
    }
}

fn promote(staged: &Path, out_dir: &Path) -> anyhow::Result<()> {
    if out_dir.exists() {
        std::fs::remove_dir_all(out_dir)?;
    }
    std::fs::rename(staged, out_dir).with_context(|| format!("cannot promote {}", staged.display()))
}

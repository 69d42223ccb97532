use crate::artifacts::DataIngestionArtifact;
use crate::config::IngestionConfig;
use crate::error::{PipelineError, PipelineResult, Stage, StageContext};
use crate::layout::RunLayout;
use crate::table::{Table, TableResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::info;

/// Source of the raw record set.
pub trait DatasetProvider: Send + Sync {
    fn fetch(&self, collection: &str) -> anyhow::Result<Table>;
}

/// Reads `<dir>/<collection>.csv`.
#[derive(Debug, Clone)]
pub struct CsvDirectoryProvider {
    dir: PathBuf,
}

impl CsvDirectoryProvider {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.csv"))
    }
}

impl DatasetProvider for CsvDirectoryProvider {
    fn fetch(&self, collection: &str) -> anyhow::Result<Table> {
        let path = self.collection_path(collection);
        Table::read_csv(&path).map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))
    }
}

/// Seeded shuffle partition into `(train, test)` row indices.
///
/// `n_test = ceil(ratio * n)`; both sides keep shuffled order.
pub fn split_indices(n: usize, ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let n_test = ((ratio * n as f64).ceil() as usize).min(n);
    let train = indices.split_off(n_test);
    (train, indices)
}

pub fn split_table(table: &Table, ratio: f64, seed: u64) -> TableResult<(Table, Table)> {
    let (train, test) = split_indices(table.n_rows(), ratio, seed);
    Ok((table.select_rows(&train)?, table.select_rows(&test)?))
}

pub struct DataIngestion<'a> {
    config: &'a IngestionConfig,
    layout: &'a RunLayout,
    seed: u64,
}

impl<'a> DataIngestion<'a> {
    #[must_use]
    pub fn new(config: &'a IngestionConfig, layout: &'a RunLayout, seed: u64) -> Self {
        Self { config, layout, seed }
    }

    pub fn initiate(&self, provider: &dyn DatasetProvider) -> PipelineResult<DataIngestionArtifact> {
        let ratio = self.config.test_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(PipelineError::Config(format!("test ratio must be in (0, 1), got {ratio}")));
        }

        info!(collection = %self.config.collection, "exporting collection to feature store");
        let table = provider.fetch(&self.config.collection).data_access(Stage::Ingestion)?;
        if table.n_rows() < 2 {
            return Err(PipelineError::data_access(
                Stage::Ingestion,
                anyhow::anyhow!("collection {} has {} rows, need at least 2", self.config.collection, table.n_rows()),
            ));
        }

        let feature_store_path = self.layout.feature_store_path(&self.config.collection);
        write_table(&table, &feature_store_path)?;

        let (train, test) = split_table(&table, ratio, self.seed).data_access(Stage::Ingestion)?;
        let train_path = self.layout.train_csv_path();
        let test_path = self.layout.test_csv_path();
        write_table(&train, &train_path)?;
        write_table(&test, &test_path)?;
        info!(train_rows = train.n_rows(), test_rows = test.n_rows(), "train/test split written");

        Ok(DataIngestionArtifact { feature_store_path, train_path, test_path })
    }
}

fn write_table(table: &Table, path: &Path) -> PipelineResult<()> {
    table.write_csv(path).data_access(Stage::Ingestion)
}

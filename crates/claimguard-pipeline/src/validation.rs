//! Schema conformance checks for the train/test split.

use crate::artifacts::{DataIngestionArtifact, DataValidationArtifact};
use crate::error::{PipelineError, PipelineResult, Stage, StageContext};
use crate::schema::Schema;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Diagnostic summary of one table. Never affects the verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableProfile {
    pub rows: usize,
    pub columns: usize,
    /// Only columns with at least one missing cell.
    pub missing_cells: BTreeMap<String, usize>,
    pub duplicate_rows: usize,
}

impl TableProfile {
    #[must_use]
    pub fn of(table: &Table) -> Self {
        Self {
            rows: table.n_rows(),
            columns: table.n_cols(),
            missing_cells: table.missing_counts().into_iter().filter(|(_, n)| *n > 0).collect(),
            duplicate_rows: table.duplicate_row_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub status: bool,
    pub message: String,
    pub missing_columns: Vec<String>,
    pub expected_column_count: usize,
    pub train_column_count: usize,
    pub test_column_count: usize,
    pub train_profile: TableProfile,
    pub test_profile: TableProfile,
}

/// Runs every check on both tables; failures accumulate into the message.
#[must_use]
pub fn validate(train: &Table, test: &Table, schema: &Schema) -> ValidationReport {
    let expected = schema.expected_column_count();
    let mut clauses: Vec<String> = Vec::new();
    let mut missing_columns: Vec<String> = Vec::new();

    for (label, table) in [("train", train), ("test", test)] {
        if table.n_cols() != expected {
            clauses.push(format!(
                "{label} table has {} columns, expected {expected}.",
                table.n_cols()
            ));
        }
    }

    for (label, table) in [("train", train), ("test", test)] {
        let missing: Vec<&str> =
            schema.required_columns().into_iter().filter(|name| !table.has_column(name)).collect();
        if !missing.is_empty() {
            clauses.push(format!("{label} table is missing columns: {}.", missing.join(", ")));
            for name in missing {
                if !missing_columns.iter().any(|m| m == name) {
                    missing_columns.push(name.to_string());
                }
            }
        }
    }

    // Declaration order, regardless of which table reported the gap first.
    let order = schema.required_columns();
    missing_columns.sort_by_key(|name| order.iter().position(|o| *o == name.as_str()));

    ValidationReport {
        status: clauses.is_empty(),
        message: clauses.join(" "),
        missing_columns,
        expected_column_count: expected,
        train_column_count: train.n_cols(),
        test_column_count: test.n_cols(),
        train_profile: TableProfile::of(train),
        test_profile: TableProfile::of(test),
    }
}

pub struct DataValidator<'a> {
    schema: &'a Schema,
    report_path: PathBuf,
}

impl<'a> DataValidator<'a> {
    #[must_use]
    pub fn new(schema: &'a Schema, report_path: PathBuf) -> Self {
        Self { schema, report_path }
    }

    /// Validates the split and persists the report.
    ///
    /// A failing verdict comes back as `PipelineError::ValidationFailure`
    /// after the report has been written.
    pub fn initiate(&self, ingestion: &DataIngestionArtifact) -> PipelineResult<DataValidationArtifact> {
        info!("starting data validation");
        let train = Table::read_csv(&ingestion.train_path).data_access(Stage::Validation)?;
        let test = Table::read_csv(&ingestion.test_path).data_access(Stage::Validation)?;

        let report = validate(&train, &test, self.schema);
        self.write_report(&report)?;

        if !report.status {
            warn!(message = %report.message, missing = ?report.missing_columns, "data validation failed");
            return Err(PipelineError::ValidationFailure(Box::new(report)));
        }
        info!(
            duplicate_train_rows = report.train_profile.duplicate_rows,
            "data validation passed"
        );
        Ok(DataValidationArtifact { status: report.status, message: report.message, report_path: self.report_path.clone() })
    }

    fn write_report(&self, report: &ValidationReport) -> PipelineResult<()> {
        if let Some(parent) = self.report_path.parent() {
            std::fs::create_dir_all(parent).data_access(Stage::Validation)?;
        }
        let yaml = serde_yaml::to_string(report).data_access(Stage::Validation)?;
        std::fs::write(&self.report_path, yaml).data_access(Stage::Validation)
    }
}

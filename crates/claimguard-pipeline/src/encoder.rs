//! Feature encoding: the fitted transform shared by training and inference.
//!
//! Steps, in order: drop declared columns, rescale `credit_score`, ordinal
//! encode, one-hot encode, mean impute, pass the remaining numeric columns
//! through. Output columns follow the same order.

use crate::schema::Schema;
use crate::table::{Cell, Column, Table};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const CREDIT_SCORE_COLUMN: &str = "credit_score";
/// Ordinal code for a category not seen during fit.
pub const UNKNOWN_CATEGORY: f64 = -1.0;

const CREDIT_SCORE_MIN: f64 = 300.0;
const CREDIT_SCORE_MAX: f64 = 850.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EncodeError {
    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("column {column} must be numeric, found {value:?} at row {row}")]
    NonNumeric { column: String, row: usize, value: String },

    #[error("column {column} has a missing value at row {row}")]
    MissingValue { column: String, row: usize },

    #[error("cannot fit an encoder on an empty table")]
    EmptyTable,
}

pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

/// `round2(300 + score * (850 - 300))`.
#[must_use]
pub fn rescale_credit_score(score: f64) -> f64 {
    let scaled = CREDIT_SCORE_MIN + score * (CREDIT_SCORE_MAX - CREDIT_SCORE_MIN);
    (scaled * 100.0).round() / 100.0
}

/// Column roles copied from the schema; fitting turns it into an `EncodingPipeline`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderPlan {
    pub target_column: String,
    pub drop_columns: Vec<String>,
    pub ordinal_columns: Vec<String>,
    pub onehot_columns: Vec<String>,
    pub impute_columns: Vec<String>,
}

#[must_use]
pub fn build_encoder(schema: &Schema) -> EncoderPlan {
    EncoderPlan {
        target_column: schema.target_column.clone(),
        drop_columns: schema.drop_columns.clone(),
        ordinal_columns: schema.ordinal_columns.clone(),
        onehot_columns: schema.onehot_columns.clone(),
        impute_columns: schema.impute_columns.clone(),
    }
}

/// Sorted distinct categories: numerically if every value is a number,
/// lexically otherwise.
fn sorted_categories(cells: &[Cell]) -> Vec<String> {
    let mut present: Vec<&Cell> = cells.iter().filter(|c| !c.is_missing()).collect();
    let all_numeric = present.iter().all(|c| c.as_number().is_some());
    if all_numeric {
        present.sort_by(|a, b| {
            a.as_number().unwrap_or_default().total_cmp(&b.as_number().unwrap_or_default())
        });
    } else {
        present.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
    }
    let mut out: Vec<String> = present.into_iter().filter_map(Cell::category).collect();
    out.dedup();
    out
}

fn require<'t>(table: &'t Table, name: &str) -> EncodeResult<&'t Column> {
    table.column(name).ok_or_else(|| EncodeError::MissingColumn(name.to_string()))
}

fn numeric_cell(column: &str, row: usize, cell: &Cell) -> EncodeResult<Option<f64>> {
    match cell {
        Cell::Number(v) => Ok(Some(*v)),
        Cell::Missing => Ok(None),
        Cell::Text(s) => Err(EncodeError::NonNumeric { column: column.to_string(), row, value: s.clone() }),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdinalMapping {
    pub column: String,
    pub categories: Vec<String>,
}

impl OrdinalMapping {
    fn code(&self, cell: &Cell) -> f64 {
        cell.category()
            .and_then(|key| self.categories.iter().position(|c| *c == key))
            .map_or(UNKNOWN_CATEGORY, |idx| idx as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotMapping {
    pub column: String,
    /// All fitted categories; the first is the dropped reference level.
    pub categories: Vec<String>,
}

impl OneHotMapping {
    fn emitted(&self) -> &[String] {
        self.categories.get(1..).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanImputation {
    pub column: String,
    pub mean: f64,
}

/// A fitted, immutable encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingPipeline {
    plan: EncoderPlan,
    ordinal: Vec<OrdinalMapping>,
    onehot: Vec<OneHotMapping>,
    impute: Vec<MeanImputation>,
    passthrough: Vec<String>,
    feature_names: Vec<String>,
}

impl EncoderPlan {
    /// Drops declared and target columns and rescales the credit score.
    fn prepare(&self, table: &Table) -> EncodeResult<Table> {
        let mut prepared = table.clone();
        for name in self.drop_columns.iter().chain(std::iter::once(&self.target_column)) {
            prepared.remove_column(name);
        }
        if let Some(column) = prepared.column_mut(CREDIT_SCORE_COLUMN) {
            for (row, cell) in column.cells.iter_mut().enumerate() {
                if let Some(score) = numeric_cell(CREDIT_SCORE_COLUMN, row, cell)? {
                    *cell = Cell::Number(rescale_credit_score(score));
                }
            }
        }
        Ok(prepared)
    }

    fn role_of(&self, name: &str) -> bool {
        self.ordinal_columns.iter().chain(&self.onehot_columns).chain(&self.impute_columns).any(|c| c == name)
    }

    /// Learns categories and means from `train` (features, with or without target).
    pub fn fit(&self, train: &Table) -> EncodeResult<EncodingPipeline> {
        if train.is_empty() {
            return Err(EncodeError::EmptyTable);
        }
        let prepared = self.prepare(train)?;

        let ordinal = self
            .ordinal_columns
            .iter()
            .map(|name| -> EncodeResult<OrdinalMapping> {
                Ok(OrdinalMapping { column: name.clone(), categories: sorted_categories(&require(&prepared, name)?.cells) })
            })
            .collect::<EncodeResult<Vec<_>>>()?;

        let onehot = self
            .onehot_columns
            .iter()
            .map(|name| -> EncodeResult<OneHotMapping> {
                Ok(OneHotMapping { column: name.clone(), categories: sorted_categories(&require(&prepared, name)?.cells) })
            })
            .collect::<EncodeResult<Vec<_>>>()?;

        let mut impute = Vec::with_capacity(self.impute_columns.len());
        for name in &self.impute_columns {
            let column = require(&prepared, name)?;
            let mut sum = 0.0;
            let mut count = 0_usize;
            for (row, cell) in column.cells.iter().enumerate() {
                if let Some(v) = numeric_cell(name, row, cell)? {
                    sum += v;
                    count += 1;
                }
            }
            let mean = if count == 0 {
                warn!(column = %name, "impute column has no values, using 0.0");
                0.0
            } else {
                sum / count as f64
            };
            impute.push(MeanImputation { column: name.clone(), mean });
        }

        let passthrough: Vec<String> =
            prepared.column_names().filter(|name| !self.role_of(name)).map(str::to_string).collect();

        let mut feature_names: Vec<String> = self.ordinal_columns.clone();
        for mapping in &onehot {
            feature_names.extend(mapping.emitted().iter().map(|cat| format!("{}_{cat}", mapping.column)));
        }
        feature_names.extend(self.impute_columns.iter().cloned());
        feature_names.extend(passthrough.iter().cloned());
        debug!(features = feature_names.len(), "encoder fitted");

        let pipeline = EncodingPipeline { plan: self.clone(), ordinal, onehot, impute, passthrough, feature_names };
        // Passthrough columns must be numeric; surface that at fit time.
        pipeline.transform(train)?;
        Ok(pipeline)
    }
}

impl EncodingPipeline {
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    #[must_use]
    pub fn target_column(&self) -> &str {
        &self.plan.target_column
    }

    #[must_use]
    pub fn plan(&self) -> &EncoderPlan {
        &self.plan
    }

    /// Encodes every row of `table`. The target column is ignored if present.
    pub fn transform(&self, table: &Table) -> EncodeResult<Array2<f64>> {
        let prepared = self.plan.prepare(table)?;
        let n_rows = prepared.n_rows();

        let mut out = Array2::<f64>::zeros((n_rows, self.n_features()));
        let mut col = 0;

        for mapping in &self.ordinal {
            let cells = &require(&prepared, &mapping.column)?.cells;
            for (row, cell) in cells.iter().enumerate() {
                out[[row, col]] = mapping.code(cell);
            }
            col += 1;
        }

        for mapping in &self.onehot {
            let cells = &require(&prepared, &mapping.column)?.cells;
            for (row, cell) in cells.iter().enumerate() {
                let Some(key) = cell.category() else { continue };
                if let Some(offset) = mapping.emitted().iter().position(|c| *c == key) {
                    out[[row, col + offset]] = 1.0;
                }
            }
            col += mapping.emitted().len();
        }

        for imputation in &self.impute {
            let cells = &require(&prepared, &imputation.column)?.cells;
            for (row, cell) in cells.iter().enumerate() {
                out[[row, col]] = numeric_cell(&imputation.column, row, cell)?.unwrap_or(imputation.mean);
            }
            col += 1;
        }

        for name in &self.passthrough {
            let cells = &require(&prepared, name)?.cells;
            for (row, cell) in cells.iter().enumerate() {
                out[[row, col]] = numeric_cell(name, row, cell)?
                    .ok_or_else(|| EncodeError::MissingValue { column: name.clone(), row })?;
            }
            col += 1;
        }

        debug_assert_eq!(col, self.n_features());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> EncoderPlan {
        EncoderPlan {
            target_column: "outcome".into(),
            drop_columns: vec!["id".into()],
            ordinal_columns: vec!["income".into()],
            onehot_columns: vec!["gender".into()],
            impute_columns: vec![CREDIT_SCORE_COLUMN.into()],
        }
    }

    fn train() -> Table {
        Table::from_columns([
            ("id", vec![Cell::Number(1.0), Cell::Number(2.0), Cell::Number(3.0)]),
            ("income", vec![Cell::from("poverty"), Cell::from("upper class"), Cell::from("middle class")]),
            ("gender", vec![Cell::from("male"), Cell::from("female"), Cell::from("male")]),
            (CREDIT_SCORE_COLUMN, vec![Cell::Number(0.0), Cell::Missing, Cell::Number(1.0)]),
            ("children", vec![Cell::Number(1.0), Cell::Number(0.0), Cell::Number(2.0)]),
            ("outcome", vec![Cell::Number(0.0), Cell::Number(1.0), Cell::Number(0.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_credit_score_rescale() {
        assert!((rescale_credit_score(0.0) - 300.0).abs() < 1e-9);
        assert!((rescale_credit_score(1.0) - 850.0).abs() < 1e-9);
        assert!((rescale_credit_score(0.5) - 575.0).abs() < 1e-9);
        assert!((rescale_credit_score(0.123_456) - 367.9).abs() < 1e-9);
    }

    #[test]
    fn test_feature_layout() {
        let encoder = plan().fit(&train()).unwrap();
        assert_eq!(encoder.feature_names(), ["income", "gender_male", "credit_score", "children"]);

        let x = encoder.transform(&train()).unwrap();
        assert_eq!(x.dim(), (3, 4));
        // Sorted: middle class, poverty, upper class.
        assert_eq!(x.column(0).to_vec(), vec![1.0, 2.0, 0.0]);
        assert_eq!(x.column(1).to_vec(), vec![1.0, 0.0, 1.0]);
        // Missing credit score takes the mean of 300 and 850.
        assert_eq!(x.column(2).to_vec(), vec![300.0, 575.0, 850.0]);
        assert_eq!(x.column(3).to_vec(), vec![1.0, 0.0, 2.0]);
    }

    #[test]
    fn test_unseen_categories() {
        let encoder = plan().fit(&train()).unwrap();
        let row = Table::from_columns([
            ("income", vec![Cell::from("royalty")]),
            ("gender", vec![Cell::from("other")]),
            (CREDIT_SCORE_COLUMN, vec![Cell::Number(0.5)]),
            ("children", vec![Cell::Number(3.0)]),
        ])
        .unwrap();

        let x = encoder.transform(&row).unwrap();
        assert_eq!(x.row(0).to_vec(), vec![UNKNOWN_CATEGORY, 0.0, 575.0, 3.0]);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let encoder = plan().fit(&train()).unwrap();
        assert_eq!(encoder.transform(&train()).unwrap(), encoder.transform(&train()).unwrap());
    }

    #[test]
    fn test_missing_role_column_is_an_error() {
        let mut table = train();
        table.remove_column("gender");
        assert_eq!(plan().fit(&table).unwrap_err(), EncodeError::MissingColumn("gender".into()));
    }

    #[test]
    fn test_text_in_passthrough_is_rejected() {
        let mut table = train();
        table.push_column("vehicle_type", vec![Cell::from("sedan"), Cell::from("suv"), Cell::from("sedan")]).unwrap();
        assert!(matches!(plan().fit(&table), Err(EncodeError::NonNumeric { .. })));
    }

    #[test]
    fn test_numeric_categories_sort_numerically() {
        let cells = vec![Cell::Number(10.0), Cell::Number(2.0), Cell::Missing, Cell::Number(2.0)];
        assert_eq!(sorted_categories(&cells), vec!["2".to_string(), "10".to_string()]);
    }

    #[test]
    fn test_serde_roundtrip() {
        let encoder = plan().fit(&train()).unwrap();
        let json = serde_json::to_string(&encoder).unwrap();
        let restored: EncodingPipeline = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.transform(&train()).unwrap(), encoder.transform(&train()).unwrap());
    }
}

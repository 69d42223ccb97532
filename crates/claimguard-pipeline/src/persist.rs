//! On-disk formats for encoded matrices and JSON artifacts.
//!
//! Matrices are stored as a single `f64` safetensors tensor named `data` with
//! the target as the last column; feature names ride along in the header
//! metadata.

use anyhow::{anyhow, bail, Context};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use safetensors::tensor::{Dtype, TensorView};
use safetensors::SafeTensors;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

const TENSOR_NAME: &str = "data";
const FEATURE_NAMES_KEY: &str = "feature_names";
const TARGET_COLUMN_KEY: &str = "target_column";

/// Encoded features plus target, as read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledMatrix {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub feature_names: Vec<String>,
    pub target_column: String,
}

impl LabelledMatrix {
    /// Features with the target appended as the last column.
    #[must_use]
    pub fn combined(&self) -> Array2<f64> {
        append_target(self.x.view(), self.y.view())
    }
}

#[must_use]
pub fn append_target(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Array2<f64> {
    let cols = x.ncols();
    let mut out = Array2::zeros((x.nrows(), cols + 1));
    out.slice_mut(s![.., ..cols]).assign(&x);
    out.column_mut(cols).assign(&y);
    out
}

pub fn write_matrix(
    path: &Path,
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    feature_names: &[String],
    target_column: &str,
) -> anyhow::Result<()> {
    if x.nrows() != y.len() {
        bail!("{} feature rows but {} targets", x.nrows(), y.len());
    }
    if x.ncols() != feature_names.len() {
        bail!("{} feature columns but {} names", x.ncols(), feature_names.len());
    }

    let combined = append_target(x, y);
    let bytes: Vec<u8> = combined.iter().flat_map(|v| v.to_le_bytes()).collect();
    let view = TensorView::new(Dtype::F64, vec![combined.nrows(), combined.ncols()], &bytes)
        .map_err(|e| anyhow!("invalid tensor view: {e}"))?;

    let mut metadata = HashMap::new();
    metadata.insert(FEATURE_NAMES_KEY.to_string(), serde_json::to_string(feature_names)?);
    metadata.insert(TARGET_COLUMN_KEY.to_string(), target_column.to_string());

    let serialized = safetensors::serialize([(TENSOR_NAME, view)], Some(metadata))
        .map_err(|e| anyhow!("safetensors serialization failed: {e}"))?;
    std::fs::write(path, serialized).with_context(|| format!("cannot write {}", path.display()))
}

pub fn read_matrix(path: &Path) -> anyhow::Result<LabelledMatrix> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let tensors = SafeTensors::deserialize(&bytes).map_err(|e| anyhow!("{}: {e}", path.display()))?;
    let tensor = tensors.tensor(TENSOR_NAME).map_err(|e| anyhow!("{}: {e}", path.display()))?;
    if tensor.dtype() != Dtype::F64 {
        bail!("{}: expected f64 tensor, found {:?}", path.display(), tensor.dtype());
    }
    let [rows, cols] = tensor.shape() else {
        bail!("{}: expected a 2-d tensor, found shape {:?}", path.display(), tensor.shape());
    };
    let (rows, cols) = (*rows, *cols);
    if cols == 0 {
        bail!("{}: matrix has no target column", path.display());
    }

    let values: Vec<f64> = tensor
        .data()
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect();
    let combined = Array2::from_shape_vec((rows, cols), values)?;

    let (_, header) = SafeTensors::read_metadata(&bytes).map_err(|e| anyhow!("{}: {e}", path.display()))?;
    let metadata = header.metadata().as_ref().ok_or_else(|| anyhow!("{}: missing metadata", path.display()))?;
    let feature_names: Vec<String> = serde_json::from_str(
        metadata.get(FEATURE_NAMES_KEY).ok_or_else(|| anyhow!("{}: missing feature names", path.display()))?,
    )?;
    let target_column = metadata.get(TARGET_COLUMN_KEY).cloned().unwrap_or_default();
    if feature_names.len() + 1 != cols {
        bail!("{}: {} feature names for {} feature columns", path.display(), feature_names.len(), cols - 1);
    }

    Ok(LabelledMatrix {
        x: combined.slice(s![.., ..cols - 1]).to_owned(),
        y: combined.column(cols - 1).to_owned(),
        feature_names,
        target_column,
    })
}

/// Plain-text mirror of an encoded matrix: one header row, target last.
pub fn write_matrix_csv(
    path: &Path,
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    feature_names: &[String],
    target_column: &str,
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("cannot create {}", path.display()))?;
    writer.write_record(feature_names.iter().map(String::as_str).chain(std::iter::once(target_column)))?;
    for (row, target) in x.rows().into_iter().zip(y.iter()) {
        writer.write_record(row.iter().chain(std::iter::once(target)).map(ToString::to_string))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("cannot write {}", path.display()))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("cannot parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_matrix_survives_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("train.safetensors");
        let x = array![[1.5, -1.0], [0.0, 575.25]];
        let y = array![1.0, 0.0];

        write_matrix(&path, x.view(), y.view(), &names(&["income", "credit_score"]), "outcome").unwrap();
        let loaded = read_matrix(&path).unwrap();

        assert_eq!(loaded.x, x);
        assert_eq!(loaded.y, y);
        assert_eq!(loaded.feature_names, names(&["income", "credit_score"]));
        assert_eq!(loaded.target_column, "outcome");
        assert_eq!(loaded.combined(), array![[1.5, -1.0, 1.0], [0.0, 575.25, 0.0]]);
    }

    #[test]
    fn test_name_count_must_match_width() {
        let temp = TempDir::new().unwrap();
        let x = array![[1.0, 2.0]];
        let y = array![0.0];
        let err = write_matrix(&temp.path().join("m.safetensors"), x.view(), y.view(), &names(&["a"]), "t");
        assert!(err.is_err());
    }

    #[test]
    fn test_garbage_file_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.safetensors");
        std::fs::write(&path, b"not a tensor").unwrap();
        assert!(read_matrix(&path).is_err());
    }

    #[test]
    fn test_csv_mirror_has_target_last() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("m.csv");
        write_matrix_csv(&path, array![[1.0, 2.5]].view(), array![1.0].view(), &names(&["a", "b"]), "outcome")
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b,outcome\n1,2.5,1\n");
    }
}

//! Hyperparameter values and grids.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value as it appears in a grid or config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_usize(&self, key: &str) -> ModelResult<usize> {
        match self {
            Self::Int(v) if *v >= 0 => Ok(*v as usize),
            _ => Err(ModelError::invalid_param(key, format!("expected non-negative integer, got {self}"))),
        }
    }

    pub fn as_f64(&self, key: &str) -> ModelResult<f64> {
        match self {
            Self::Int(v) => Ok(*v as f64),
            Self::Float(v) => Ok(*v),
            Self::Text(_) => Err(ModelError::invalid_param(key, format!("expected number, got {self}"))),
        }
    }

    pub fn as_str(&self, key: &str) -> ModelResult<&str> {
        match self {
            Self::Text(s) => Ok(s.as_str()),
            _ => Err(ModelError::invalid_param(key, format!("expected string, got {self}"))),
        }
    }

    /// Integer, or `"none"` for an unbounded value (e.g. `max_depth`).
    pub fn as_optional_usize(&self, key: &str) -> ModelResult<Option<usize>> {
        match self {
            Self::Text(s) if s.eq_ignore_ascii_case("none") => Ok(None),
            other => other.as_usize(key).map(Some),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// One concrete assignment of hyperparameters.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Renders a parameter set as `k=v, k=v` for logs.
pub fn describe_params(params: &ParamSet) -> String {
    params.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(", ")
}

/// Mapping from hyperparameter name to the values to try.
///
/// Keys are kept sorted so that `combinations` enumerates in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid(BTreeMap<String, Vec<ParamValue>>);

impl ParamGrid {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with<V: Into<ParamValue>>(mut self, key: &str, values: Vec<V>) -> Self {
        self.0.insert(key.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of parameter sets the grid expands to.
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product of all value lists, last key varying fastest.
    ///
    /// An empty grid yields a single empty parameter set (estimator defaults).
    pub fn combinations(&self) -> Vec<ParamSet> {
        let mut out = vec![ParamSet::new()];
        for (key, values) in &self.0 {
            let mut next = Vec::with_capacity(out.len() * values.len());
            for base in &out {
                for value in values {
                    let mut set = base.clone();
                    set.insert(key.clone(), value.clone());
                    next.push(set);
                }
            }
            out = next;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combinations_cover_cartesian_product() {
        let grid = ParamGrid::new()
            .with("n_estimators", vec![100_i64, 200])
            .with("learning_rate", vec![0.05, 0.01]);
        let combos = grid.combinations();
        assert_eq!(combos.len(), 4);
        assert_eq!(grid.len(), 4);
        assert_eq!(combos[0]["learning_rate"], ParamValue::Float(0.05));
        assert_eq!(combos[0]["n_estimators"], ParamValue::Int(100));
        assert_eq!(combos[1]["n_estimators"], ParamValue::Int(200));
    }

    #[test]
    fn test_empty_grid_yields_defaults() {
        let grid = ParamGrid::new();
        assert_eq!(grid.combinations(), vec![ParamSet::new()]);
    }

    #[test]
    fn test_untagged_deserialize() {
        let grid: ParamGrid =
            serde_json::from_str(r#"{"max_depth": ["none", 20], "learning_rate": [0.1]}"#).unwrap();
        let combos = grid.combinations();
        assert_eq!(combos.len(), 2);
        assert_eq!(combos[0]["max_depth"].as_optional_usize("max_depth").unwrap(), None);
        assert_eq!(combos[1]["max_depth"].as_optional_usize("max_depth").unwrap(), Some(20));
    }

    #[test]
    fn test_as_f64_accepts_int() {
        assert!((ParamValue::Int(1).as_f64("subsample").unwrap() - 1.0).abs() < f64::EPSILON);
        assert!(ParamValue::Text("x".into()).as_f64("subsample").is_err());
    }
}

//! Dataset schema: declared columns and their encoding roles.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

pub const DEFAULT_TARGET_COLUMN: &str = "outcome";

fn default_target_column() -> String {
    DEFAULT_TARGET_COLUMN.to_string()
}

/// `- age` or `- age: int`; the type annotation is informational.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ColumnDecl {
    Name(String),
    Typed(BTreeMap<String, serde_yaml::Value>),
}

#[derive(Debug, Clone, Deserialize)]
struct SchemaFile {
    columns: Vec<ColumnDecl>,
    // Role lists are required; an empty role is written as `[]`.
    numerical_columns: Vec<String>,
    categorical_columns: Vec<String>,
    ordinal_features: Vec<String>,
    onehot_features: Vec<String>,
    impute_features: Vec<String>,
    drop_columns: Vec<String>,
    #[serde(default = "default_target_column")]
    target_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub target_column: String,
    pub columns: Vec<String>,
    pub drop_columns: Vec<String>,
    pub ordinal_columns: Vec<String>,
    pub onehot_columns: Vec<String>,
    pub impute_columns: Vec<String>,
    pub numerical_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
}

impl Schema {
    pub fn from_yaml_str(content: &str) -> PipelineResult<Self> {
        let file: SchemaFile =
            serde_yaml::from_str(content).map_err(|e| PipelineError::Config(format!("invalid schema: {e}")))?;

        let mut columns = Vec::with_capacity(file.columns.len());
        for decl in file.columns {
            match decl {
                ColumnDecl::Name(name) => columns.push(name),
                ColumnDecl::Typed(map) if map.len() == 1 => columns.extend(map.into_keys()),
                ColumnDecl::Typed(map) => {
                    return Err(PipelineError::Config(format!(
                        "column entries must have exactly one key, got {:?}",
                        map.keys().collect::<Vec<_>>()
                    )));
                }
            }
        }

        let schema = Self {
            target_column: file.target_column,
            columns,
            drop_columns: file.drop_columns,
            ordinal_columns: file.ordinal_features,
            onehot_columns: file.onehot_features,
            impute_columns: file.impute_features,
            numerical_columns: file.numerical_columns,
            categorical_columns: file.categorical_columns,
        };
        schema.check_roles()?;
        Ok(schema)
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("cannot read schema {}: {e}", path.display())))?;
        Self::from_yaml_str(&content)
    }

    #[must_use]
    pub fn expected_column_count(&self) -> usize {
        self.columns.len()
    }

    /// Numerical then categorical names, each once, declaration order.
    #[must_use]
    pub fn required_columns(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.numerical_columns
            .iter()
            .chain(&self.categorical_columns)
            .map(String::as_str)
            .filter(|name| seen.insert(*name))
            .collect()
    }

    fn check_roles(&self) -> PipelineResult<()> {
        let roles: [(&str, &[String]); 4] = [
            ("ordinal_features", &self.ordinal_columns),
            ("onehot_features", &self.onehot_columns),
            ("impute_features", &self.impute_columns),
            ("drop_columns", &self.drop_columns),
        ];

        for (i, (a_name, a)) in roles.iter().enumerate() {
            if a.contains(&self.target_column) {
                return Err(PipelineError::Config(format!(
                    "target column {} must not appear in {a_name}",
                    self.target_column
                )));
            }
            for (b_name, b) in &roles[i + 1..] {
                if let Some(shared) = a.iter().find(|c| b.contains(c)) {
                    return Err(PipelineError::Config(format!("column {shared} is in both {a_name} and {b_name}")));
                }
            }
        }

        if let Some(shared) = self.numerical_columns.iter().find(|c| self.categorical_columns.contains(c)) {
            return Err(PipelineError::Config(format!(
                "column {shared} is both numerical and categorical"
            )));
        }
        Ok(())
    }
}

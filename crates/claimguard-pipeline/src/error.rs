use crate::validation::ValidationReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Config,
    Ingestion,
    Validation,
    Transformation,
    Training,
    Evaluation,
    Pushing,
    Inference,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Config => "config",
            Self::Ingestion => "ingestion",
            Self::Validation => "validation",
            Self::Transformation => "transformation",
            Self::Training => "training",
            Self::Evaluation => "evaluation",
            Self::Pushing => "pushing",
            Self::Inference => "inference",
        })
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{stage}: data access failed: {source}")]
    DataAccess {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    #[error("data validation failed: {}", .0.message)]
    ValidationFailure(Box<ValidationReport>),

    #[error("{stage}: transform failed: {source}")]
    Transform {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    #[error("{stage}: training failed: {source}")]
    Training {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    #[error("{stage}: evaluation failed: {source}")]
    Evaluation {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Config(_) => Stage::Config,
            Self::ValidationFailure(_) => Stage::Validation,
            Self::DataAccess { stage, .. }
            | Self::Transform { stage, .. }
            | Self::Training { stage, .. }
            | Self::Evaluation { stage, .. } => *stage,
        }
    }

    pub fn data_access(stage: Stage, source: impl Into<anyhow::Error>) -> Self {
        Self::DataAccess { stage, source: source.into() }
    }

    pub fn transform(stage: Stage, source: impl Into<anyhow::Error>) -> Self {
        Self::Transform { stage, source: source.into() }
    }

    pub fn training(stage: Stage, source: impl Into<anyhow::Error>) -> Self {
        Self::Training { stage, source: source.into() }
    }

    pub fn evaluation(stage: Stage, source: impl Into<anyhow::Error>) -> Self {
        Self::Evaluation { stage, source: source.into() }
    }

    /// The deadline ran out while `stage` was pending.
    #[must_use]
    pub fn budget_exhausted(stage: Stage, budget_secs: u64) -> Self {
        let source = anyhow::anyhow!("time budget of {budget_secs}s exhausted");
        match stage {
            Stage::Config => Self::Config(source.to_string()),
            Stage::Ingestion | Stage::Validation | Stage::Inference => Self::DataAccess { stage, source },
            Stage::Transformation => Self::Transform { stage, source },
            Stage::Training => Self::Training { stage, source },
            Stage::Evaluation | Stage::Pushing => Self::Evaluation { stage, source },
        }
    }

    #[must_use]
    pub fn is_validation_failure(&self) -> bool {
        matches!(self, Self::ValidationFailure(_))
    }
}

/// Tags a fallible call with the stage and error kind it belongs to.
pub trait StageContext<T> {
    fn data_access(self, stage: Stage) -> PipelineResult<T>;
    fn transform(self, stage: Stage) -> PipelineResult<T>;
    fn training(self, stage: Stage) -> PipelineResult<T>;
    fn evaluation(self, stage: Stage) -> PipelineResult<T>;
}

impl<T, E> StageContext<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn data_access(self, stage: Stage) -> PipelineResult<T> {
        self.map_err(|e| PipelineError::data_access(stage, e))
    }

    fn transform(self, stage: Stage) -> PipelineResult<T> {
        self.map_err(|e| PipelineError::transform(stage, e))
    }

    fn training(self, stage: Stage) -> PipelineResult<T> {
        self.map_err(|e| PipelineError::training(stage, e))
    }

    fn evaluation(self, stage: Stage) -> PipelineResult<T> {
        self.map_err(|e| PipelineError::evaluation(stage, e))
    }
}

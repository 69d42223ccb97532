use thiserror::Error;

pub type ModelResult<T> = std::result::Result<T, ModelError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("invalid hyperparameter {key}: {message}")]
    InvalidParam { key: String, message: String },

    #[error("unknown hyperparameter {key} for {family}")]
    UnknownParam { family: String, key: String },

    #[error("unknown model family: {0}")]
    UnknownFamily(String),

    #[error("invalid training data: {0}")]
    InvalidData(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("{0} is not fitted")]
    NotFitted(String),

    #[error("search error: {0}")]
    Search(String),
}

impl ModelError {
    pub(crate) fn invalid_param(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidParam { key: key.to_string(), message: message.into() }
    }
}

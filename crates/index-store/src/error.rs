use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexStoreError>;

#[derive(Error, Debug)]
pub enum IndexStoreError {
    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Embedding model mismatch: index holds '{expected}', query uses '{actual}'")]
    ModelMismatch { expected: String, actual: String },

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),
}

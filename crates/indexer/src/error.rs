use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Index store error: {0}")]
    IndexStoreError(#[from] context_index_store::IndexStoreError),

    #[error("Invalid workspace path: {0}")]
    InvalidPath(String),

    #[error("Invalid ignore pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid indexing configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Other(String),
}

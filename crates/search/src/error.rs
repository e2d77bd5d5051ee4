use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Index store error: {0}")]
    IndexStoreError(#[from] context_index_store::IndexStoreError),

    #[error("Indexer error: {0}")]
    IndexerError(#[from] context_indexer::IndexerError),

    #[error("Invalid retrieval configuration: {0}")]
    InvalidConfig(String),
}

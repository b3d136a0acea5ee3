use std::path::PathBuf;

pub type IngestResult<T> = Result<T, IngestError>;

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("Failed to list objects under {prefix}: {source}")]
    Listing {
        prefix: String,
        #[source]
        source: object_store::Error,
    },
    #[error("No CSV files under {0}")]
    EmptyCatalog(String),
    #[error("No data from {0}")]
    NoData(String),
    #[error("Worker count must be greater than 0")]
    InvalidWorkerCount,
    #[error("Cannot merge an empty set of tables")]
    EmptyMerge,
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to move output into place at {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Ingestion panicked: {0}")]
    Panicked(String),
}

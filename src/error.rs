use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(rocksdb::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// A row lock could not be acquired within the configured wait.
    #[error("Store busy: {0}")]
    Busy(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl MarketError {
    pub fn is_busy(&self) -> bool {
        matches!(self, MarketError::Busy(_))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for MarketError {
    fn from(err: rocksdb::Error) -> Self {
        match err.kind() {
            rocksdb::ErrorKind::Busy | rocksdb::ErrorKind::TimedOut | rocksdb::ErrorKind::TryAgain => {
                MarketError::Busy(err.into_string())
            }
            _ => MarketError::RocksDbError(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;

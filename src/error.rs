use crate::domain::channel::Channel;
use crate::domain::lifecycle::CommandState;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
    #[error("Publish error: {0}")]
    PublishError(String),
    #[error("No handler registered for channel {0}")]
    NoHandler(Channel),
    #[error("Invalid state transition for {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: Uuid,
        from: CommandState,
        to: CommandState,
    },
    #[error("Worker error: {0}")]
    WorkerError(String),
    #[error("{count} command(s) could not be processed")]
    Unprocessed { count: usize },
    #[error("Command {id} gave up after {attempts} conflicting attempts")]
    RetriesExhausted { id: Uuid, attempts: u32 },
}

pub type Result<T> = std::result::Result<T, EngineError>;

//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Queue error: {0}")]
    Queue(#[from] tpdf_queue::QueueError),

    #[error("Cache error: {0}")]
    Cache(#[from] tpdf_cache::CacheError),

    #[error("Registry error: {0}")]
    Registry(#[from] tpdf_registry::RegistryError),

    #[error("Collaborator error: {0}")]
    Client(#[from] tpdf_clients::ClientError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Collaborator call '{0}' timed out")]
    Timeout(&'static str),
}

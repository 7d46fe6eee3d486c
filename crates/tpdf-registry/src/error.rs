//! Registry error types.

use thiserror::Error;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Cache error: {0}")]
    Cache(#[from] tpdf_cache::CacheError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

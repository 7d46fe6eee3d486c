//! Collaborator client error types.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unexpected response from {service}: {detail}")]
    InvalidResponse { service: &'static str, detail: String },
}

impl ClientError {
    pub fn invalid_response(service: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service,
            detail: detail.into(),
        }
    }
}

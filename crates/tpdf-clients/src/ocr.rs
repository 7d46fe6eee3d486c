//! Text recognition client.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::ClientsConfig;
use crate::error::{ClientError, ClientResult};

/// Text recognition over a preprocessed image.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognize text in the image at `image_path`.
    async fn recognize(&self, image_path: &str) -> ClientResult<String>;
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    text: String,
}

/// Recognizer backed by an HTTP OCR service.
pub struct HttpRecognizer {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRecognizer {
    pub fn new(config: &ClientsConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.ocr_url.clone(),
        })
    }
}

#[async_trait]
impl Recognizer for HttpRecognizer {
    async fn recognize(&self, image_path: &str) -> ClientResult<String> {
        let bytes = tokio::fs::read(image_path).await?;
        let file_name = std::path::Path::new(image_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.png".to_string());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("image", part);

        let response = self
            .http
            .post(format!("{}/ocr", self.base_url))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let body: OcrResponse = response
            .json()
            .await
            .map_err(|e| ClientError::invalid_response("ocr", e.to_string()))?;

        debug!(image_path, chars = body.text.len(), "recognized text");
        Ok(body.text)
    }
}

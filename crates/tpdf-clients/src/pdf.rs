//! PDF render client.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::config::ClientsConfig;
use crate::error::ClientResult;

/// Rendering of translated text into a PDF document.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `text` into a PDF at `output_path`, returning the artifact path.
    async fn render(&self, text: &str, output_path: &str) -> ClientResult<String>;
}

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    text: &'a str,
}

/// Renderer backed by an HTTP render service; the response body is the
/// PDF bytes, written to the requested output path.
pub struct HttpRenderer {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRenderer {
    pub fn new(config: &ClientsConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.render_url.clone(),
        })
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render(&self, text: &str, output_path: &str) -> ClientResult<String> {
        let response = self
            .http
            .post(format!("{}/render", self.base_url))
            .json(&RenderRequest { text })
            .send()
            .await?
            .error_for_status()?;

        let bytes = response.bytes().await?;

        if let Some(parent) = std::path::Path::new(output_path).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output_path, &bytes).await?;

        debug!(output_path, size = bytes.len(), "rendered PDF");
        Ok(output_path.to_string())
    }
}

//! Translation client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClientsConfig;
use crate::error::{ClientError, ClientResult};

/// Translation of recognized text.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into the configured target language.
    async fn translate(&self, text: &str) -> ClientResult<String>;
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    target_lang: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translated_text: String,
}

/// Translator backed by an HTTP translation service.
pub struct HttpTranslator {
    http: reqwest::Client,
    base_url: String,
    target_lang: String,
}

impl HttpTranslator {
    pub fn new(config: &ClientsConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.translate_url.clone(),
            target_lang: config.target_lang.clone(),
        })
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str) -> ClientResult<String> {
        let response = self
            .http
            .post(format!("{}/translate", self.base_url))
            .json(&TranslateRequest {
                text,
                target_lang: &self.target_lang,
            })
            .send()
            .await?
            .error_for_status()?;

        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|e| ClientError::invalid_response("translate", e.to_string()))?;

        debug!(
            source_chars = text.len(),
            translated_chars = body.translated_text.len(),
            "translated text"
        );
        Ok(body.translated_text)
    }
}

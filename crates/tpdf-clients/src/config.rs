//! Collaborator configuration.

use std::time::Duration;

/// Configuration for the collaborator clients.
#[derive(Debug, Clone)]
pub struct ClientsConfig {
    /// Base URL of the OCR service
    pub ocr_url: String,
    /// Base URL of the translation service
    pub translate_url: String,
    /// Base URL of the PDF render service
    pub render_url: String,
    /// Target language for translation
    pub target_lang: String,
    /// Per-request timeout applied to every HTTP call
    pub request_timeout: Duration,
}

impl Default for ClientsConfig {
    fn default() -> Self {
        Self {
            ocr_url: "http://localhost:8601".to_string(),
            translate_url: "http://localhost:8602".to_string(),
            render_url: "http://localhost:8603".to_string(),
            target_lang: "vi".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl ClientsConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            ocr_url: std::env::var("OCR_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8601".to_string()),
            translate_url: std::env::var("TRANSLATE_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8602".to_string()),
            render_url: std::env::var("RENDER_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8603".to_string()),
            target_lang: std::env::var("TARGET_LANG").unwrap_or_else(|_| "vi".to_string()),
            request_timeout: Duration::from_secs(
                std::env::var("CLIENT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
        }
    }
}

//! Stage queue message payloads.
//!
//! Each pipeline stage consumes exactly one payload shape. The tagged
//! [`StageMessage`] envelope is what actually travels over the wire, so a
//! malformed or misrouted payload fails deserialization instead of turning
//! into a half-populated map downstream.

use serde::{Deserialize, Serialize};

use crate::job::JobId;
use crate::stage::Stage;

/// Payload for the preprocess queue: the uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessMessage {
    pub image_path: String,
    pub job_id: JobId,
}

/// Payload for the OCR queue: the preprocessed image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrMessage {
    pub image_path: String,
    pub job_id: JobId,
}

/// Payload for the translate queue: the recognized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateMessage {
    pub text: String,
    pub job_id: JobId,
}

/// Payload for the render queue: the translated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfMessage {
    pub text: String,
    pub job_id: JobId,
}

/// Tagged union of all stage payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageMessage {
    Preprocess(PreprocessMessage),
    Ocr(OcrMessage),
    Translate(TranslateMessage),
    Pdf(PdfMessage),
}

impl StageMessage {
    /// The stage whose queue this message belongs on.
    pub fn stage(&self) -> Stage {
        match self {
            StageMessage::Preprocess(_) => Stage::Preprocess,
            StageMessage::Ocr(_) => Stage::Ocr,
            StageMessage::Translate(_) => Stage::Translate,
            StageMessage::Pdf(_) => Stage::Pdf,
        }
    }

    /// The job this message advances.
    pub fn job_id(&self) -> &JobId {
        match self {
            StageMessage::Preprocess(m) => &m.job_id,
            StageMessage::Ocr(m) => &m.job_id,
            StageMessage::Translate(m) => &m.job_id,
            StageMessage::Pdf(m) => &m.job_id,
        }
    }
}

/// Broker envelope: a stage payload plus delivery metadata.
///
/// `attempt` travels with the message so the retry bound survives
/// requeue-with-delay, which republishes under a fresh stream entry id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub message: StageMessage,
    /// Delivery attempt, starting at 1 for the first publish.
    #[serde(default = "default_attempt")]
    pub attempt: u32,
}

fn default_attempt() -> u32 {
    1
}

impl MessageEnvelope {
    pub fn new(message: StageMessage) -> Self {
        Self { message, attempt: 1 }
    }

    /// Envelope for the next delivery attempt of the same payload.
    pub fn retry(&self) -> Self {
        Self {
            message: self.message.clone(),
            attempt: self.attempt + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_defaults_attempt_for_legacy_payloads() {
        let json = r#"{"message":{"stage":"ocr","image_path":"/tmp/a.png","job_id":"j1"}}"#;
        let envelope: MessageEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.attempt, 1);
        assert_eq!(envelope.message.stage(), Stage::Ocr);
    }

    #[test]
    fn retry_increments_attempt_only() {
        let envelope = MessageEnvelope::new(StageMessage::Translate(TranslateMessage {
            text: "hello".into(),
            job_id: JobId::from_string("j2"),
        }));
        let retried = envelope.retry();
        assert_eq!(retried.attempt, 2);
        assert_eq!(retried.message, envelope.message);
    }

    #[test]
    fn misrouted_payload_fails_to_parse() {
        // A translate payload tagged as pdf is missing nothing (same shape),
        // but a preprocess payload tagged as translate lacks `text`.
        let json = r#"{"stage":"translate","image_path":"/tmp/a.png","job_id":"j1"}"#;
        assert!(serde_json::from_str::<StageMessage>(json).is_err());
    }
}

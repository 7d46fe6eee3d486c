//! Pipeline stage definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One stop in the processing pipeline.
///
/// Stages are strictly ordered: `Preprocess -> Ocr -> Translate -> Pdf`.
/// A job's `current_step` only moves forward through this order, with one
/// exception: the full-pipeline shortcut lets the preprocess worker jump
/// straight to `Pdf` when a cached translation already exists for the
/// uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Image cleanup before recognition
    Preprocess,
    /// Text recognition
    Ocr,
    /// Translation of recognized text
    Translate,
    /// Final PDF rendering
    Pdf,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 4] = [Stage::Preprocess, Stage::Ocr, Stage::Translate, Stage::Pdf];

    /// String form, used for routing keys, cache key tags and job records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Preprocess => "preprocess",
            Stage::Ocr => "ocr",
            Stage::Translate => "translate",
            Stage::Pdf => "pdf",
        }
    }

    /// The stage that follows this one, or `None` for the terminal stage.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Preprocess => Some(Stage::Ocr),
            Stage::Ocr => Some(Stage::Translate),
            Stage::Translate => Some(Stage::Pdf),
            Stage::Pdf => None,
        }
    }

    /// Whether this is the terminal (render) stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Pdf)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown stage: {0}")]
pub struct StageParseError(pub String);

impl FromStr for Stage {
    type Err = StageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preprocess" => Ok(Stage::Preprocess),
            "ocr" => Ok(Stage::Ocr),
            "translate" => Ok(Stage::Translate),
            "pdf" => Ok(Stage::Pdf),
            other => Err(StageParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_forward_only() {
        assert_eq!(Stage::Preprocess.next(), Some(Stage::Ocr));
        assert_eq!(Stage::Ocr.next(), Some(Stage::Translate));
        assert_eq!(Stage::Translate.next(), Some(Stage::Pdf));
        assert_eq!(Stage::Pdf.next(), None);
        assert!(Stage::Pdf.is_terminal());
    }

    #[test]
    fn stage_round_trips_through_str() {
        for stage in Stage::ALL {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        }
        assert!("render".parse::<Stage>().is_err());
    }

    #[test]
    fn stage_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Stage::Preprocess).unwrap(), "\"preprocess\"");
        assert_eq!(serde_json::from_str::<Stage>("\"pdf\"").unwrap(), Stage::Pdf);
    }
}

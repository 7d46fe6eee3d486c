//! Local image preprocessing.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::imageops::FilterType;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Images wider or taller than this are scaled down before recognition.
const MAX_DIMENSION: u32 = 2500;

/// Contrast boost applied after grayscale conversion.
const CONTRAST_BOOST: f32 = 18.0;

/// Image cleanup before recognition.
#[async_trait]
pub trait Preprocessor: Send + Sync {
    /// Produce a cleaned-up copy of the image, returning its path.
    async fn preprocess(&self, input_path: &str) -> ClientResult<String>;
}

/// Preprocessor backed by the `image` crate: grayscale, contrast boost and
/// a size cap. Deterministic for a given input file, which is what makes
/// the preprocess stage cacheable by content hash.
#[derive(Debug, Clone, Default)]
pub struct LocalPreprocessor;

impl LocalPreprocessor {
    pub fn new() -> Self {
        Self
    }

    fn output_path(input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        input.with_file_name(format!("{}_processed.png", stem))
    }
}

#[async_trait]
impl Preprocessor for LocalPreprocessor {
    async fn preprocess(&self, input_path: &str) -> ClientResult<String> {
        let input = PathBuf::from(input_path);
        let output = Self::output_path(&input);
        let output_str = output.to_string_lossy().into_owned();

        // Decode/transform/encode is CPU-bound; keep it off the runtime.
        let result = tokio::task::spawn_blocking(move || -> ClientResult<()> {
            let img = image::open(&input)?;

            let (width, height) = (img.width(), img.height());
            let img = if width > MAX_DIMENSION || height > MAX_DIMENSION {
                img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
            } else {
                img
            };

            let processed = img.grayscale().adjust_contrast(CONTRAST_BOOST);
            processed.save(&output)?;
            Ok(())
        })
        .await
        .map_err(|e| ClientError::Io(std::io::Error::other(e)))?;

        result?;
        debug!(input = input_path, output = %output_str, "preprocessed image");
        Ok(output_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[tokio::test]
    async fn preprocess_writes_a_grayscale_copy() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sample.png");
        let img = ImageBuffer::from_fn(64, 48, |x, _| Rgb([(x * 4) as u8, 80u8, 200u8]));
        img.save(&input).unwrap();

        let preprocessor = LocalPreprocessor::new();
        let output = preprocessor
            .preprocess(input.to_str().unwrap())
            .await
            .unwrap();

        assert!(output.ends_with("sample_processed.png"));
        let processed = image::open(&output).unwrap();
        assert_eq!(processed.width(), 64);
        assert_eq!(processed.height(), 48);
    }

    #[tokio::test]
    async fn preprocess_fails_on_missing_file() {
        let preprocessor = LocalPreprocessor::new();
        let result = preprocessor.preprocess("/nonexistent/no.png").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn oversized_images_are_scaled_down() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("big.png");
        let img = ImageBuffer::from_pixel(3000, 100, Rgb([128u8, 128, 128]));
        img.save(&input).unwrap();

        let preprocessor = LocalPreprocessor::new();
        let output = preprocessor
            .preprocess(input.to_str().unwrap())
            .await
            .unwrap();

        let processed = image::open(&output).unwrap();
        assert!(processed.width() <= MAX_DIMENSION);
        assert!(processed.height() <= MAX_DIMENSION);
    }
}

//! Stage processors.
//!
//! Every processor follows the same skeleton: mark the job processing at
//! its step, derive the content-addressed cache key, reuse a cached value
//! or call the collaborator, persist the job-scoped intermediate, then
//! publish to the next stage. Cache writes always happen before the publish
//! so the next consumer never sees a job with a missing intermediate.

pub mod ocr;
pub mod pdf;
pub mod preprocess;
pub mod translate;

use serde::{Deserialize, Serialize};

use tpdf_models::StageMessage;

use crate::context::ProcessingContext;
use crate::error::WorkerResult;

/// The cached full-pipeline result for a file, keyed by the translation
/// key derived from the file's content hash. Lets a resubmission of
/// previously seen bytes skip recognition and translation entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullPipelineEntry {
    pub ocr_text: String,
    pub translated_text: String,
}

/// Dispatch a stage message to its processor.
pub async fn process_message(ctx: &ProcessingContext, message: &StageMessage) -> WorkerResult<()> {
    match message {
        StageMessage::Preprocess(m) => preprocess::run(ctx, m).await,
        StageMessage::Ocr(m) => ocr::run(ctx, m).await,
        StageMessage::Translate(m) => translate::run(ctx, m).await,
        StageMessage::Pdf(m) => pdf::run(ctx, m).await,
    }
}

//! OCR stage: text recognition over the preprocessed image.

use tracing::info;

use tpdf_cache::{content_key, hash_bytes, CacheTier};
use tpdf_models::{JobStatus, OcrMessage, Stage, StageMessage, TranslateMessage};
use tpdf_registry::keys;

use crate::context::ProcessingContext;
use crate::error::WorkerResult;

pub async fn run(ctx: &ProcessingContext, msg: &OcrMessage) -> WorkerResult<()> {
    let job_id = &msg.job_id;
    ctx.jobs
        .update_status(job_id, JobStatus::Processing, Some(Stage::Ocr), None)
        .await?;
    let timer = ctx.metrics.start_measure("ocr", job_id);

    // Keyed by the bytes of the image actually recognized, so unrelated
    // jobs uploading the same file share one recognition run.
    let bytes = tokio::fs::read(&msg.image_path).await?;
    let cache_key = content_key(&hash_bytes(&bytes), Stage::Ocr, None);

    let text = match ctx.cache.get::<String>(&cache_key).await {
        Some(text) => {
            info!(job_id = %job_id, "reusing recognized text from cache");
            ctx.metrics.cache_hit("ocr", job_id).await;
            text
        }
        None => {
            let text = ctx
                .with_deadline("ocr", ctx.recognizer.recognize(&msg.image_path))
                .await?;
            ctx.cache
                .set_with_priority(&cache_key, &text, CacheTier::Long)
                .await;
            ctx.metrics.cache_miss("ocr", job_id).await;
            text
        }
    };

    ctx.cache
        .set_with_priority(&keys::job_stage(job_id, Stage::Ocr), &text, CacheTier::Short)
        .await;

    let ms = ctx.metrics.end_measure(timer).await;
    info!(job_id = %job_id, ms, chars = text.len(), "ocr finished");

    ctx.queue
        .publish(StageMessage::Translate(TranslateMessage {
            text,
            job_id: job_id.clone(),
        }))
        .await?;
    ctx.jobs
        .update_status(job_id, JobStatus::Processing, Some(Stage::Translate), None)
        .await?;

    Ok(())
}

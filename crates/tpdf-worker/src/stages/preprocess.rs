//! Preprocess stage: image cleanup and the full-pipeline shortcut.

use tracing::{info, warn};

use tpdf_cache::{content_key, hash_bytes, CacheTier};
use tpdf_models::{JobStatus, OcrMessage, PdfMessage, PreprocessMessage, Stage, StageMessage};
use tpdf_registry::keys;

use crate::context::ProcessingContext;
use crate::error::WorkerResult;
use crate::stages::FullPipelineEntry;

pub async fn run(ctx: &ProcessingContext, msg: &PreprocessMessage) -> WorkerResult<()> {
    let job_id = &msg.job_id;
    ctx.jobs
        .update_status(job_id, JobStatus::Processing, Some(Stage::Preprocess), None)
        .await?;
    let timer = ctx.metrics.start_measure("preprocess", job_id);

    let bytes = tokio::fs::read(&msg.image_path).await?;
    let file_hash = hash_bytes(&bytes);
    let cache_key = content_key(&file_hash, Stage::Preprocess, None);

    let cached_path: Option<String> = ctx.cache.get(&cache_key).await;
    let cached_path = match cached_path {
        // A cached path is only usable while the file is still on disk.
        Some(path) if tokio::fs::metadata(&path).await.is_ok() => Some(path),
        _ => None,
    };

    let processed_path = if let Some(path) = cached_path {
        info!(job_id = %job_id, "reusing preprocessed image from cache");
        ctx.metrics.cache_hit("preprocess", job_id).await;

        // Shortcut: if this exact file has been fully processed before,
        // the recognized and translated text are already cached and the
        // job can jump straight to rendering.
        let translate_key = content_key(&file_hash, Stage::Translate, None);
        if let Some(entry) = ctx.cache.get::<FullPipelineEntry>(&translate_key).await {
            info!(job_id = %job_id, "full pipeline result cached, skipping ocr and translation");

            ctx.cache
                .set_with_priority(&keys::job_stage(job_id, Stage::Ocr), &entry.ocr_text, CacheTier::Short)
                .await;
            ctx.cache
                .set_with_priority(
                    &keys::job_stage(job_id, Stage::Translate),
                    &entry.translated_text,
                    CacheTier::Short,
                )
                .await;
            ctx.cache
                .set_with_priority(&keys::job_filehash(job_id), &file_hash, CacheTier::Short)
                .await;

            ctx.jobs
                .update_status(job_id, JobStatus::Processing, Some(Stage::Pdf), None)
                .await?;
            ctx.queue
                .publish(StageMessage::Pdf(PdfMessage {
                    text: entry.translated_text,
                    job_id: job_id.clone(),
                }))
                .await?;

            let ms = ctx.metrics.end_measure(timer).await;
            info!(job_id = %job_id, ms, "preprocess finished via shortcut");
            return Ok(());
        }

        path
    } else {
        let result = ctx
            .with_deadline("preprocess", ctx.preprocessor.preprocess(&msg.image_path))
            .await;
        let path = match result {
            Ok(path) => path,
            Err(e) => {
                // Preprocessing is an optimization; fall back to the
                // original upload rather than failing the job.
                warn!(job_id = %job_id, "preprocess failed, using original image: {}", e);
                msg.image_path.clone()
            }
        };
        ctx.cache
            .set_with_priority(&cache_key, &path, CacheTier::Long)
            .await;
        ctx.metrics.cache_miss("preprocess", job_id).await;
        path
    };

    ctx.cache
        .set_with_priority(&keys::job_filehash(job_id), &file_hash, CacheTier::Short)
        .await;
    ctx.cache
        .set_with_priority(&keys::job_preprocessed(job_id), &processed_path, CacheTier::Short)
        .await;

    let ms = ctx.metrics.end_measure(timer).await;
    info!(job_id = %job_id, ms, "preprocess finished");

    ctx.queue
        .publish(StageMessage::Ocr(OcrMessage {
            image_path: processed_path,
            job_id: job_id.clone(),
        }))
        .await?;
    ctx.jobs
        .update_status(job_id, JobStatus::Processing, Some(Stage::Ocr), None)
        .await?;

    Ok(())
}

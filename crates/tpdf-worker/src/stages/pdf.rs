//! PDF stage: final rendering and job completion.

use tracing::info;

use tpdf_cache::{content_key, CacheTier};
use tpdf_models::{JobStatus, PdfMessage, Stage};
use tpdf_registry::keys;

use crate::context::ProcessingContext;
use crate::error::WorkerResult;
use crate::stages::FullPipelineEntry;

pub async fn run(ctx: &ProcessingContext, msg: &PdfMessage) -> WorkerResult<()> {
    let job_id = &msg.job_id;
    ctx.jobs
        .update_status(job_id, JobStatus::Processing, Some(Stage::Pdf), None)
        .await?;
    let timer = ctx.metrics.start_measure("pdf", job_id);

    let cache_key = content_key(&msg.text, Stage::Pdf, None);

    let cached_artifact: Option<String> = ctx.cache.get(&cache_key).await;
    let cached_artifact = match cached_artifact {
        Some(path) if tokio::fs::metadata(&path).await.is_ok() => Some(path),
        _ => None,
    };

    let artifact_path = match cached_artifact {
        Some(path) => {
            info!(job_id = %job_id, "reusing rendered PDF from cache");
            ctx.metrics.cache_hit("pdf", job_id).await;
            path
        }
        None => {
            let output_path = format!("{}/output_{}.pdf", ctx.config.output_dir, job_id);
            let path = ctx
                .with_deadline("render", ctx.renderer.render(&msg.text, &output_path))
                .await?;
            ctx.cache
                .set_with_priority(&cache_key, &path, CacheTier::Long)
                .await;
            ctx.metrics.cache_miss("pdf", job_id).await;
            path
        }
    };

    ctx.cache
        .set_with_priority(&keys::job_stage(job_id, Stage::Pdf), &artifact_path, CacheTier::Long)
        .await;

    // Seed the full-pipeline shortcut: future uploads of the same file
    // bytes can jump from preprocess straight to this stage.
    let file_hash: Option<String> = ctx.cache.get(&keys::job_filehash(job_id)).await;
    let ocr_text: Option<String> = ctx.cache.get(&keys::job_stage(job_id, Stage::Ocr)).await;
    if let (Some(file_hash), Some(ocr_text)) = (file_hash, ocr_text) {
        let shortcut_key = content_key(&file_hash, Stage::Translate, None);
        let entry = FullPipelineEntry {
            ocr_text,
            translated_text: msg.text.clone(),
        };
        ctx.cache
            .set_with_priority(&shortcut_key, &entry, CacheTier::Long)
            .await;
    }

    ctx.cache
        .set_with_priority(&keys::job_completed(job_id), &true, CacheTier::Long)
        .await;
    ctx.jobs
        .update_status(job_id, JobStatus::Completed, Some(Stage::Pdf), None)
        .await?;

    let ms = ctx.metrics.end_measure(timer).await;
    info!(job_id = %job_id, ms, artifact = artifact_path, "pdf finished, job completed");

    Ok(())
}

//! Translate stage.

use tracing::info;

use tpdf_cache::{content_key, CacheTier};
use tpdf_models::{JobStatus, PdfMessage, Stage, StageMessage, TranslateMessage};
use tpdf_registry::keys;

use crate::context::ProcessingContext;
use crate::error::WorkerResult;

pub async fn run(ctx: &ProcessingContext, msg: &TranslateMessage) -> WorkerResult<()> {
    let job_id = &msg.job_id;
    ctx.jobs
        .update_status(job_id, JobStatus::Processing, Some(Stage::Translate), None)
        .await?;
    let timer = ctx.metrics.start_measure("translate", job_id);

    // Keyed by the recognized text itself: identical text recognized from
    // different images still hits one cached translation.
    let cache_key = content_key(&msg.text, Stage::Translate, None);

    let translated = match ctx.cache.get::<String>(&cache_key).await {
        Some(translated) => {
            info!(job_id = %job_id, "reusing translation from cache");
            ctx.metrics.cache_hit("translate", job_id).await;
            translated
        }
        None => {
            let translated = ctx
                .with_deadline("translate", ctx.translator.translate(&msg.text))
                .await?;
            ctx.cache
                .set_with_priority(&cache_key, &translated, CacheTier::Long)
                .await;
            ctx.metrics.cache_miss("translate", job_id).await;
            translated
        }
    };

    ctx.cache
        .set_with_priority(
            &keys::job_stage(job_id, Stage::Translate),
            &translated,
            CacheTier::Short,
        )
        .await;

    let ms = ctx.metrics.end_measure(timer).await;
    info!(job_id = %job_id, ms, "translation finished");

    ctx.queue
        .publish(StageMessage::Pdf(PdfMessage {
            text: translated,
            job_id: job_id.clone(),
        }))
        .await?;
    ctx.jobs
        .update_status(job_id, JobStatus::Processing, Some(Stage::Pdf), None)
        .await?;

    Ok(())
}

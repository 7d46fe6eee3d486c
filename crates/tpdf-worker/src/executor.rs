//! Stage consumer loops.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tpdf_models::{JobStatus, Stage};
use tpdf_queue::{Delivery, StageQueue};

use crate::context::ProcessingContext;
use crate::error::WorkerResult;
use crate::stages;

/// Runs one consumer loop per pipeline stage, each bounded by its own
/// counting semaphore. The semaphore limits concurrently executing units
/// inside the process; the fetch count bounds what the broker hands us in
/// the first place.
pub struct WorkerExecutor {
    ctx: Arc<ProcessingContext>,
    queue: Arc<StageQueue>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl WorkerExecutor {
    pub fn new(ctx: Arc<ProcessingContext>) -> Self {
        let queue = Arc::clone(&ctx.queue);
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            ctx,
            queue,
            shutdown,
            consumer_name,
        }
    }

    /// Start all stage loops and block until shutdown.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            consumer = self.consumer_name,
            concurrency = self.ctx.config.stage_concurrency,
            "starting worker executor"
        );

        // The consume loops tolerate a broker that is not up yet; init is
        // retried until the consumer groups exist.
        loop {
            match self.queue.init().await {
                Ok(()) => break,
                Err(e) => {
                    warn!("queue init failed, retrying: {}", e);
                    tokio::time::sleep(self.ctx.config.reconnect_delay).await;
                }
            }
        }

        let mut handles = Vec::new();
        for stage in Stage::ALL {
            handles.push(tokio::spawn(Self::stage_loop(
                Arc::clone(&self.ctx),
                Arc::clone(&self.queue),
                stage,
                format!("{}-{}", self.consumer_name, stage),
                self.shutdown.subscribe(),
            )));
        }

        for handle in handles {
            handle.await.ok();
        }

        info!("worker executor stopped");
        Ok(())
    }

    /// Signal shutdown to every stage loop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    async fn stage_loop(
        ctx: Arc<ProcessingContext>,
        queue: Arc<StageQueue>,
        stage: Stage,
        consumer_name: String,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let semaphore = Arc::new(Semaphore::new(ctx.config.stage_concurrency));
        let mut claim_interval = tokio::time::interval(ctx.config.claim_interval);
        info!(stage = %stage, consumer = consumer_name, "stage consumer started");

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(stage = %stage, "stage consumer stopping");
                        break;
                    }
                }
                _ = claim_interval.tick() => {
                    match queue.claim_pending(stage, &consumer_name, ctx.config.prefetch).await {
                        Ok(claimed) if !claimed.is_empty() => {
                            info!(stage = %stage, count = claimed.len(), "claimed pending messages");
                            for delivery in claimed {
                                Self::dispatch(&ctx, &queue, &semaphore, stage, delivery).await;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => warn!(stage = %stage, "failed to claim pending: {}", e),
                    }
                }
                result = Self::poll_once(&ctx, &queue, &semaphore, stage, &consumer_name) => {
                    if let Err(e) = result {
                        // Broker unreachable; back off and reconnect on the
                        // next fetch (connections are per-operation).
                        error!(stage = %stage, "consume error: {}", e);
                        tokio::time::sleep(ctx.config.reconnect_delay).await;
                    }
                }
            }
        }

        // Drain: wait for in-flight units before exiting.
        let _ = tokio::time::timeout(Duration::from_secs(60), async {
            while semaphore.available_permits() < ctx.config.stage_concurrency {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await;
    }

    async fn poll_once(
        ctx: &Arc<ProcessingContext>,
        queue: &Arc<StageQueue>,
        semaphore: &Arc<Semaphore>,
        stage: Stage,
        consumer_name: &str,
    ) -> WorkerResult<()> {
        let available = semaphore.available_permits();
        if available == 0 {
            // All slots busy; messages stay unacknowledged at the broker.
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let deliveries = queue
            .fetch(
                stage,
                consumer_name,
                1000,
                available.min(ctx.config.prefetch),
            )
            .await?;

        if deliveries.is_empty() {
            return Ok(());
        }
        debug!(stage = %stage, count = deliveries.len(), "fetched messages");

        for delivery in deliveries {
            Self::dispatch(ctx, queue, semaphore, stage, delivery).await;
        }

        Ok(())
    }

    async fn dispatch(
        ctx: &Arc<ProcessingContext>,
        queue: &Arc<StageQueue>,
        semaphore: &Arc<Semaphore>,
        stage: Stage,
        delivery: Delivery,
    ) {
        let Ok(permit) = Arc::clone(semaphore).acquire_owned().await else {
            return;
        };
        let ctx = Arc::clone(ctx);
        let queue = Arc::clone(queue);

        tokio::spawn(async move {
            let _permit = permit;
            Self::execute_delivery(ctx, queue, stage, delivery).await;
        });
    }

    /// Run one delivery to completion: ack on success, requeue with delay
    /// on failure, dead-letter once the attempt bound is exhausted.
    async fn execute_delivery(
        ctx: Arc<ProcessingContext>,
        queue: Arc<StageQueue>,
        stage: Stage,
        delivery: Delivery,
    ) {
        let job_id = delivery.envelope.message.job_id().clone();
        debug!(stage = %stage, job_id = %job_id, attempt = delivery.envelope.attempt, "executing");

        match stages::process_message(&ctx, &delivery.envelope.message).await {
            Ok(()) => {
                if let Err(e) = queue.ack(stage, &delivery.message_id).await {
                    error!(stage = %stage, job_id = %job_id, "failed to ack: {}", e);
                }
            }
            Err(e) => {
                error!(stage = %stage, job_id = %job_id, attempt = delivery.envelope.attempt, "stage failed: {}", e);

                if delivery.envelope.attempt >= queue.max_retries() {
                    // Poison message: park it and surface a terminal error
                    // on the job so polling clients stop waiting.
                    if let Err(dlq_err) = queue.dead_letter(&delivery, &e.to_string()).await {
                        error!(stage = %stage, job_id = %job_id, "failed to dead-letter: {}", dlq_err);
                    }
                    if let Err(status_err) = ctx
                        .jobs
                        .update_status(
                            &job_id,
                            JobStatus::Error,
                            None,
                            Some(format!("{} failed after {} attempts: {}", stage, delivery.envelope.attempt, e)),
                        )
                        .await
                    {
                        error!(job_id = %job_id, "failed to mark job error: {}", status_err);
                    }
                } else if let Err(requeue_err) = queue.requeue_with_delay(&delivery).await {
                    // Requeue failed; the message stays pending and the
                    // claim scan will pick it up.
                    error!(stage = %stage, job_id = %job_id, "failed to requeue: {}", requeue_err);
                }
            }
        }
    }
}

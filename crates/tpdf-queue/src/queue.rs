//! Stage queues over Redis Streams.

use std::time::Duration;

use redis::AsyncCommands;
use tracing::{debug, info, warn};

use tpdf_models::{MessageEnvelope, Stage, StageMessage};

use crate::error::{QueueError, QueueResult};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Prefix for per-stage stream names
    pub stream_prefix: String,
    /// Consumer group name (shared by all workers of a stage)
    pub consumer_group: String,
    /// Dead letter stream name
    pub dlq_stream: String,
    /// Max delivery attempts before dead-lettering
    pub max_retries: u32,
    /// Delay before a failed message is requeued
    pub requeue_delay: Duration,
    /// Minimum idle time before a pending entry can be claimed
    pub claim_min_idle: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_prefix: "tpdf:stage:".to_string(),
            consumer_group: "tpdf:workers".to_string(),
            dlq_stream: "tpdf:dlq".to_string(),
            max_retries: 5,
            requeue_delay: Duration::from_secs(5),
            claim_min_idle: Duration::from_secs(300),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            stream_prefix: std::env::var("QUEUE_STREAM_PREFIX")
                .unwrap_or_else(|_| "tpdf:stage:".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "tpdf:workers".to_string()),
            dlq_stream: std::env::var("QUEUE_DLQ_STREAM")
                .unwrap_or_else(|_| "tpdf:dlq".to_string()),
            max_retries: std::env::var("QUEUE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            requeue_delay: Duration::from_secs(
                std::env::var("QUEUE_REQUEUE_DELAY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            claim_min_idle: Duration::from_secs(
                std::env::var("QUEUE_CLAIM_MIN_IDLE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
        }
    }
}

/// A message fetched from a stage stream, not yet acknowledged.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message_id: String,
    pub envelope: MessageEnvelope,
}

/// Client for the per-stage streams.
///
/// Connections are acquired fresh per operation from the multiplexed
/// client; a broker disconnect therefore heals on the next call rather
/// than wedging a cached channel.
pub struct StageQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl StageQueue {
    /// Create a new stage queue client.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    /// Stream name for a stage (the routing key).
    pub fn stream_name(&self, stage: Stage) -> String {
        format!("{}{}", self.config.stream_prefix, stage.as_str())
    }

    /// Max delivery attempts before dead-lettering.
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Delay applied before a failed message is requeued.
    pub fn requeue_delay(&self) -> Duration {
        self.config.requeue_delay
    }

    async fn conn(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Create the consumer group on every stage stream (idempotent).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.conn().await?;

        for stage in Stage::ALL {
            let stream = self.stream_name(stage);
            let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(&stream)
                .arg(&self.config.consumer_group)
                .arg("$")
                .arg("MKSTREAM")
                .query_async(&mut conn)
                .await;

            match result {
                Ok(_) => info!(stream, "created consumer group"),
                Err(e) if e.to_string().contains("BUSYGROUP") => {
                    debug!(stream, "consumer group already exists");
                }
                Err(e) => return Err(QueueError::Redis(e)),
            }
        }

        Ok(())
    }

    /// Publish a message to its stage's stream.
    pub async fn publish(&self, message: StageMessage) -> QueueResult<String> {
        self.publish_envelope(MessageEnvelope::new(message)).await
    }

    async fn publish_envelope(&self, envelope: MessageEnvelope) -> QueueResult<String> {
        let mut conn = self.conn().await?;

        let stage = envelope.message.stage();
        let payload = serde_json::to_string(&envelope)?;

        let message_id: String = redis::cmd("XADD")
            .arg(self.stream_name(stage))
            .arg("*")
            .arg("envelope")
            .arg(&payload)
            .query_async(&mut conn)
            .await?;

        debug!(
            job_id = %envelope.message.job_id(),
            stage = %stage,
            message_id,
            attempt = envelope.attempt,
            "published stage message"
        );

        Ok(message_id)
    }

    /// Acknowledge a delivery (completed or re-published elsewhere).
    pub async fn ack(&self, stage: Stage, message_id: &str) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let stream = self.stream_name(stage);

        redis::cmd("XACK")
            .arg(&stream)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&stream)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!(stage = %stage, message_id, "acknowledged");
        Ok(())
    }

    /// Return a failed message to its stream after the configured delay,
    /// with the attempt counter bumped. The original entry is acknowledged
    /// only after the replacement is durably published.
    pub async fn requeue_with_delay(&self, delivery: &Delivery) -> QueueResult<String> {
        tokio::time::sleep(self.config.requeue_delay).await;

        let retried = delivery.envelope.retry();
        let stage = retried.message.stage();
        let new_id = self.publish_envelope(retried).await?;
        self.ack(stage, &delivery.message_id).await?;

        info!(
            stage = %stage,
            old_id = delivery.message_id,
            new_id,
            "requeued failed message"
        );
        Ok(new_id)
    }

    /// Move a poison message to the dead-letter stream.
    pub async fn dead_letter(&self, delivery: &Delivery, error: &str) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let stage = delivery.envelope.message.stage();
        let payload = serde_json::to_string(&delivery.envelope)?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream)
            .arg("*")
            .arg("envelope")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(&delivery.message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(stage, &delivery.message_id).await?;

        warn!(
            job_id = %delivery.envelope.message.job_id(),
            stage = %stage,
            attempts = delivery.envelope.attempt,
            "moved message to DLQ: {}",
            error
        );
        Ok(())
    }

    /// Fetch up to `count` new messages for a stage.
    ///
    /// `count` doubles as the prefetch bound: entries beyond it stay on the
    /// stream until this consumer asks again, independent of any in-process
    /// semaphore.
    pub async fn fetch(
        &self,
        stage: Stage,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<Delivery>> {
        let mut conn = self.conn().await?;

        let reply: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(self.stream_name(stage))
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut deliveries = Vec::new();
        for stream_key in reply.keys {
            for entry in stream_key.ids {
                if let Some(delivery) = self.decode_entry(stage, entry).await {
                    deliveries.push(delivery);
                }
            }
        }

        Ok(deliveries)
    }

    /// Claim pending messages idle past the configured threshold.
    /// Picks up work from crashed or wedged consumers.
    pub async fn claim_pending(
        &self,
        stage: Stage,
        consumer_name: &str,
        count: usize,
    ) -> QueueResult<Vec<Delivery>> {
        let mut conn = self.conn().await?;
        let stream = self.stream_name(stage);

        let pending: redis::streams::StreamPendingReply = redis::cmd("XPENDING")
            .arg(&stream)
            .arg(&self.config.consumer_group)
            .query_async(&mut conn)
            .await?;

        if pending.count() == 0 {
            return Ok(Vec::new());
        }

        let reply: redis::streams::StreamClaimReply = redis::cmd("XCLAIM")
            .arg(&stream)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(self.config.claim_min_idle.as_millis() as u64)
            .arg("0-0")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut deliveries = Vec::new();
        for entry in reply.ids {
            if let Some(delivery) = self.decode_entry(stage, entry).await {
                info!(
                    stage = %stage,
                    message_id = delivery.message_id,
                    "claimed pending message"
                );
                deliveries.push(delivery);
            }
        }

        Ok(deliveries)
    }

    async fn decode_entry(&self, stage: Stage, entry: redis::streams::StreamId) -> Option<Delivery> {
        let message_id = entry.id.clone();
        let payload = match entry.map.get("envelope") {
            Some(redis::Value::BulkString(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
            _ => {
                warn!(stage = %stage, message_id, "entry missing envelope field, discarding");
                self.ack(stage, &message_id).await.ok();
                return None;
            }
        };

        match serde_json::from_str::<MessageEnvelope>(&payload) {
            Ok(envelope) if envelope.message.stage() == stage => {
                Some(Delivery { message_id, envelope })
            }
            Ok(envelope) => {
                warn!(
                    stage = %stage,
                    found = %envelope.message.stage(),
                    message_id,
                    "misrouted message, discarding"
                );
                self.ack(stage, &message_id).await.ok();
                None
            }
            Err(e) => {
                // Ack malformed payloads so they cannot loop forever.
                warn!(stage = %stage, message_id, "failed to parse envelope: {}", e);
                self.ack(stage, &message_id).await.ok();
                None
            }
        }
    }

    /// Backlog length of a stage stream.
    pub async fn len(&self, stage: Stage) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.xlen(self.stream_name(stage)).await?)
    }

    /// Dead-letter stream length.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.xlen(&self.config.dlq_stream).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_names_follow_stage_routing_keys() {
        let queue = StageQueue::new(QueueConfig::default()).unwrap();
        assert_eq!(queue.stream_name(Stage::Preprocess), "tpdf:stage:preprocess");
        assert_eq!(queue.stream_name(Stage::Pdf), "tpdf:stage:pdf");
    }

    #[test]
    fn config_defaults_bound_retries() {
        let config = QueueConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.requeue_delay, Duration::from_secs(5));
    }

    // Publish/fetch/ack/claim round trips against a live broker live in
    // tests/queue_tests.rs.
}

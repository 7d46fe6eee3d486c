//! Stage queue integration tests against a live broker.
//!
//! Run with `cargo test -- --ignored` with Redis on localhost (or set
//! REDIS_URL). Each test uses its own stream prefix so runs never collide.

use std::time::Duration;

use tpdf_models::{JobId, OcrMessage, PreprocessMessage, Stage, StageMessage};
use tpdf_queue::{QueueConfig, StageQueue};

fn test_queue(requeue_delay: Duration) -> StageQueue {
    let suffix = {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos()
    };
    let config = QueueConfig {
        redis_url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        stream_prefix: format!("tpdf:test:{}:stage:", suffix),
        consumer_group: "tpdf:test:workers".to_string(),
        dlq_stream: format!("tpdf:test:{}:dlq", suffix),
        max_retries: 3,
        requeue_delay,
        // Zero idle threshold so tests can claim their own pending entries.
        claim_min_idle: Duration::ZERO,
    };
    StageQueue::new(config).expect("queue")
}

fn preprocess_message(job: &str) -> StageMessage {
    StageMessage::Preprocess(PreprocessMessage {
        image_path: "/tmp/page.png".to_string(),
        job_id: JobId::from_string(job),
    })
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn publish_fetch_ack_round_trip() {
    let queue = test_queue(Duration::from_millis(50));
    queue.init().await.unwrap();

    queue.publish(preprocess_message("job-1")).await.unwrap();
    assert_eq!(queue.len(Stage::Preprocess).await.unwrap(), 1);

    let deliveries = queue.fetch(Stage::Preprocess, "c1", 100, 10).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].envelope.attempt, 1);
    assert_eq!(deliveries[0].envelope.message.job_id().as_str(), "job-1");

    queue.ack(Stage::Preprocess, &deliveries[0].message_id).await.unwrap();
    assert_eq!(queue.len(Stage::Preprocess).await.unwrap(), 0);

    // Nothing left to fetch, and nothing pending to claim.
    let again = queue.fetch(Stage::Preprocess, "c1", 100, 10).await.unwrap();
    assert!(again.is_empty());
    let claimed = queue.claim_pending(Stage::Preprocess, "c2", 10).await.unwrap();
    assert!(claimed.is_empty());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn fetch_respects_the_count_bound() {
    let queue = test_queue(Duration::from_millis(50));
    queue.init().await.unwrap();

    for i in 0..5 {
        queue.publish(preprocess_message(&format!("job-{i}"))).await.unwrap();
    }

    let first = queue.fetch(Stage::Preprocess, "c1", 100, 3).await.unwrap();
    assert_eq!(first.len(), 3);

    // The remainder stays on the stream until asked for again.
    let rest = queue.fetch(Stage::Preprocess, "c1", 100, 3).await.unwrap();
    assert_eq!(rest.len(), 2);

    for d in first.iter().chain(rest.iter()) {
        queue.ack(Stage::Preprocess, &d.message_id).await.unwrap();
    }
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn requeue_bumps_attempt_and_acks_the_original() {
    let queue = test_queue(Duration::from_millis(10));
    queue.init().await.unwrap();

    queue.publish(preprocess_message("job-r")).await.unwrap();
    let first = queue.fetch(Stage::Preprocess, "c1", 100, 1).await.unwrap();
    assert_eq!(first[0].envelope.attempt, 1);

    queue.requeue_with_delay(&first[0]).await.unwrap();

    let second = queue.fetch(Stage::Preprocess, "c1", 100, 1).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].envelope.attempt, 2);
    assert_ne!(second[0].message_id, first[0].message_id);
    assert_eq!(second[0].envelope.message, first[0].envelope.message);

    queue.ack(Stage::Preprocess, &second[0].message_id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn dead_letter_parks_the_message_and_clears_the_stream() {
    let queue = test_queue(Duration::from_millis(10));
    queue.init().await.unwrap();

    queue
        .publish(StageMessage::Ocr(OcrMessage {
            image_path: "/tmp/bad.png".to_string(),
            job_id: JobId::from_string("job-dlq"),
        }))
        .await
        .unwrap();

    let deliveries = queue.fetch(Stage::Ocr, "c1", 100, 1).await.unwrap();
    queue.dead_letter(&deliveries[0], "recognizer unreachable").await.unwrap();

    assert_eq!(queue.len(Stage::Ocr).await.unwrap(), 0);
    assert_eq!(queue.dlq_len().await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn unacked_messages_can_be_claimed_by_another_consumer() {
    let queue = test_queue(Duration::from_millis(10));
    queue.init().await.unwrap();

    queue.publish(preprocess_message("job-c")).await.unwrap();

    // c1 fetches but never acks (a crashed worker).
    let fetched = queue.fetch(Stage::Preprocess, "c1", 100, 1).await.unwrap();
    assert_eq!(fetched.len(), 1);

    let claimed = queue.claim_pending(Stage::Preprocess, "c2", 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].message_id, fetched[0].message_id);

    queue.ack(Stage::Preprocess, &claimed[0].message_id).await.unwrap();
}

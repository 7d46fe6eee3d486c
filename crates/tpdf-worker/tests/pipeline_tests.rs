//! End-to-end pipeline tests.
//!
//! These drive the real executor loops over a live Redis with collaborator
//! doubles standing in for the OCR, translation and render services. Run
//! with `cargo test -- --ignored`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use tpdf_cache::{CacheConfig, CacheStore};
use tpdf_clients::{ClientError, ClientResult, Preprocessor, Recognizer, Renderer, Translator};
use tpdf_models::{JobId, JobStatus, PreprocessMessage, StageMessage};
use tpdf_queue::{QueueConfig, StageQueue};
use tpdf_worker::{ProcessingContext, WorkerConfig, WorkerExecutor};

struct FakePreprocessor {
    calls: AtomicUsize,
}

#[async_trait]
impl Preprocessor for FakePreprocessor {
    async fn preprocess(&self, input_path: &str) -> ClientResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(input_path.to_string())
    }
}

struct FakeRecognizer {
    calls: AtomicUsize,
    /// Fail this many calls before starting to succeed.
    fail_first: usize,
}

#[async_trait]
impl Recognizer for FakeRecognizer {
    async fn recognize(&self, _image_path: &str) -> ClientResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(ClientError::invalid_response("ocr", "service warming up"));
        }
        Ok("recognized text".to_string())
    }
}

struct FakeTranslator {
    calls: AtomicUsize,
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, text: &str) -> ClientResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("vi: {text}"))
    }
}

struct FakeRenderer {
    calls: AtomicUsize,
    always_fail: bool,
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(&self, _text: &str, output_path: &str) -> ClientResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.always_fail {
            return Err(ClientError::invalid_response("render", "out of disk"));
        }
        tokio::fs::write(output_path, b"%PDF-1.4 fake").await?;
        Ok(output_path.to_string())
    }
}

struct Harness {
    ctx: Arc<ProcessingContext>,
    executor: Arc<WorkerExecutor>,
    preprocessor: Arc<FakePreprocessor>,
    recognizer: Arc<FakeRecognizer>,
    translator: Arc<FakeTranslator>,
    renderer: Arc<FakeRenderer>,
    // Held for the lifetime of the test so uploads and artifacts survive.
    #[allow(dead_code)]
    dir: TempDir,
}

fn harness(max_retries: u32, recognizer_fail_first: usize, renderer_always_fail: bool) -> Harness {
    let suffix = {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos()
    };
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

    let cache = Arc::new(
        CacheStore::new(CacheConfig {
            redis_url: redis_url.clone(),
            prefix: format!("tpdf:test:{}:", suffix),
        })
        .expect("cache"),
    );

    let queue = Arc::new(
        StageQueue::new(QueueConfig {
            redis_url,
            stream_prefix: format!("tpdf:test:{}:stage:", suffix),
            consumer_group: "tpdf:test:workers".to_string(),
            dlq_stream: format!("tpdf:test:{}:dlq", suffix),
            max_retries,
            requeue_delay: Duration::from_millis(20),
            claim_min_idle: Duration::from_secs(300),
        })
        .expect("queue"),
    );

    let dir = TempDir::new().expect("tempdir");
    let config = WorkerConfig {
        stage_concurrency: 2,
        prefetch: 2,
        collaborator_timeout: Duration::from_secs(5),
        output_dir: dir.path().to_string_lossy().into_owned(),
        claim_interval: Duration::from_secs(300),
        reconnect_delay: Duration::from_millis(100),
    };

    let preprocessor = Arc::new(FakePreprocessor { calls: AtomicUsize::new(0) });
    let recognizer = Arc::new(FakeRecognizer {
        calls: AtomicUsize::new(0),
        fail_first: recognizer_fail_first,
    });
    let translator = Arc::new(FakeTranslator { calls: AtomicUsize::new(0) });
    let renderer = Arc::new(FakeRenderer {
        calls: AtomicUsize::new(0),
        always_fail: renderer_always_fail,
    });

    let ctx = Arc::new(ProcessingContext::with_collaborators(
        config,
        cache,
        queue,
        Arc::clone(&preprocessor) as Arc<dyn Preprocessor>,
        Arc::clone(&recognizer) as Arc<dyn Recognizer>,
        Arc::clone(&translator) as Arc<dyn Translator>,
        Arc::clone(&renderer) as Arc<dyn Renderer>,
    ));
    let executor = Arc::new(WorkerExecutor::new(Arc::clone(&ctx)));

    Harness {
        ctx,
        executor,
        preprocessor,
        recognizer,
        translator,
        renderer,
        dir,
    }
}

impl Harness {
    fn start(&self) -> tokio::task::JoinHandle<()> {
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            executor.run().await.ok();
        })
    }

    async fn submit(&self, image_bytes: &[u8]) -> (JobId, String) {
        let path = self
            .dir
            .path()
            .join(format!("upload-{}.png", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .into_owned();
        tokio::fs::write(&path, image_bytes).await.expect("write upload");

        let job_id = self.ctx.jobs.create_job().await.expect("create job");
        self.ctx
            .queue
            .publish(StageMessage::Preprocess(PreprocessMessage {
                image_path: path.clone(),
                job_id: job_id.clone(),
            }))
            .await
            .expect("publish");
        (job_id, path)
    }

    async fn wait_for_terminal(&self, job_id: &JobId) -> JobStatus {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
        loop {
            if let Ok(Some(record)) = self.ctx.jobs.get_job(job_id).await {
                if record.status.is_terminal() {
                    return record.status;
                }
            }
            if tokio::time::Instant::now() > deadline {
                panic!("job {job_id} did not reach a terminal status in time");
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn pipeline_runs_every_stage_exactly_once() {
    let h = harness(3, 0, false);
    let worker = h.start();

    let (job_id, _) = h.submit(b"page one bytes").await;
    assert_eq!(h.wait_for_terminal(&job_id).await, JobStatus::Completed);

    assert_eq!(h.preprocessor.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.recognizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.translator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 1);

    let view = h.ctx.jobs.get_job_result(&job_id).await.unwrap().unwrap();
    let result = view.result.expect("completed job has a result");
    assert_eq!(result.ocr.as_deref(), Some("recognized text"));
    assert_eq!(result.translate.as_deref(), Some("vi: recognized text"));
    let artifact = result.pdf.expect("artifact path");
    assert!(tokio::fs::metadata(&artifact).await.is_ok());

    h.executor.shutdown();
    worker.await.ok();
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn resubmitting_the_same_bytes_skips_recognition_and_translation() {
    let h = harness(3, 0, false);
    let worker = h.start();

    let (first, _) = h.submit(b"identical page bytes").await;
    assert_eq!(h.wait_for_terminal(&first).await, JobStatus::Completed);

    // Same content under a different upload path: the content hash matches,
    // so the pipeline jumps from preprocess straight to rendering, and the
    // rendered artifact itself is reused.
    let (second, _) = h.submit(b"identical page bytes").await;
    assert_eq!(h.wait_for_terminal(&second).await, JobStatus::Completed);

    assert_eq!(h.recognizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.translator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 1);

    // The second job still carries the full result.
    let view = h.ctx.jobs.get_job_result(&second).await.unwrap().unwrap();
    let result = view.result.expect("shortcut job has a result");
    assert_eq!(result.ocr.as_deref(), Some("recognized text"));
    assert_eq!(result.translate.as_deref(), Some("vi: recognized text"));

    h.executor.shutdown();
    worker.await.ok();
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn transient_collaborator_failures_retry_until_success() {
    // Recognizer fails twice, succeeds on the third delivery.
    let h = harness(5, 2, false);
    let worker = h.start();

    let (job_id, _) = h.submit(b"flaky page bytes").await;
    assert_eq!(h.wait_for_terminal(&job_id).await, JobStatus::Completed);

    assert_eq!(h.recognizer.calls.load(Ordering::SeqCst), 3);
    // Downstream stages ran once; the failures never leaked past OCR.
    assert_eq!(h.translator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.ctx.queue.dlq_len().await.unwrap(), 0);

    h.executor.shutdown();
    worker.await.ok();
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn exhausted_retries_dead_letter_and_mark_the_job_failed() {
    let h = harness(2, 0, true);
    let worker = h.start();

    let (job_id, _) = h.submit(b"poison page bytes").await;
    assert_eq!(h.wait_for_terminal(&job_id).await, JobStatus::Error);

    assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.ctx.queue.dlq_len().await.unwrap(), 1);

    let record = h.ctx.jobs.get_job(&job_id).await.unwrap().unwrap();
    let message = record.message.expect("failed job carries a message");
    assert!(message.contains("after 2 attempts"), "message: {message}");

    // A failed job never reports a result.
    let view = h.ctx.jobs.get_job_result(&job_id).await.unwrap().unwrap();
    assert!(view.result.is_none());

    h.executor.shutdown();
    worker.await.ok();
}

//! Shared processing context.

use std::future::Future;
use std::sync::Arc;

use tpdf_cache::{CacheStore, PipelineMetrics};
use tpdf_clients::{
    ClientsConfig, HttpRecognizer, HttpRenderer, HttpTranslator, LocalPreprocessor, Preprocessor,
    Recognizer, Renderer, Translator,
};
use tpdf_queue::StageQueue;
use tpdf_registry::JobManager;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

/// Everything a stage processor needs, injected once at startup.
///
/// Holding the clients here (rather than in module-level statics) keeps
/// connection lifecycles explicit: each store/queue client reconnects on
/// use, and dropping the context drops every handle.
pub struct ProcessingContext {
    pub config: WorkerConfig,
    pub cache: Arc<CacheStore>,
    pub metrics: PipelineMetrics,
    pub jobs: JobManager,
    pub queue: Arc<StageQueue>,
    pub preprocessor: Arc<dyn Preprocessor>,
    pub recognizer: Arc<dyn Recognizer>,
    pub translator: Arc<dyn Translator>,
    pub renderer: Arc<dyn Renderer>,
}

impl ProcessingContext {
    /// Build a context with the real collaborators, configured from the
    /// environment.
    pub fn from_env(config: WorkerConfig, queue: Arc<StageQueue>) -> WorkerResult<Self> {
        let clients_config = ClientsConfig::from_env();
        let cache = Arc::new(CacheStore::from_env()?);

        Ok(Self::with_collaborators(
            config,
            cache,
            queue,
            Arc::new(LocalPreprocessor::new()),
            Arc::new(HttpRecognizer::new(&clients_config)?),
            Arc::new(HttpTranslator::new(&clients_config)?),
            Arc::new(HttpRenderer::new(&clients_config)?),
        ))
    }

    /// Build a context around explicit collaborators. Tests inject doubles
    /// through this.
    pub fn with_collaborators(
        config: WorkerConfig,
        cache: Arc<CacheStore>,
        queue: Arc<StageQueue>,
        preprocessor: Arc<dyn Preprocessor>,
        recognizer: Arc<dyn Recognizer>,
        translator: Arc<dyn Translator>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let metrics = PipelineMetrics::new(Arc::clone(&cache));
        let jobs = JobManager::new(Arc::clone(&cache));

        Self {
            config,
            cache,
            metrics,
            jobs,
            queue,
            preprocessor,
            recognizer,
            translator,
            renderer,
        }
    }

    /// Run a collaborator call under the configured deadline.
    ///
    /// A stuck external call must not hold a semaphore slot forever; an
    /// elapsed deadline is reported as a collaborator failure and takes the
    /// normal retry path.
    pub async fn with_deadline<T, F>(&self, what: &'static str, fut: F) -> WorkerResult<T>
    where
        F: Future<Output = Result<T, tpdf_clients::ClientError>>,
    {
        match tokio::time::timeout(self.config.collaborator_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(WorkerError::Timeout(what)),
        }
    }
}

//! Pipeline stage workers.
//!
//! One consumer per stage, all running in this process: each reads its
//! stage's stream, checks the content-addressed cache, invokes its external
//! collaborator on a miss, writes the job-scoped intermediate and hands the
//! job to the next stage. Concurrency is bounded per stage by a counting
//! semaphore on top of the queue's prefetch bound.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod stages;

pub use config::WorkerConfig;
pub use context::ProcessingContext;
pub use error::{WorkerError, WorkerResult};
pub use executor::WorkerExecutor;

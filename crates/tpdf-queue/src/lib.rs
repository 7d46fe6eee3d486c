//! Redis Streams stage queues.
//!
//! This crate provides:
//! - One durable stream per pipeline stage, addressed by [`Stage`]
//! - Publishing with persistent JSON envelopes
//! - Consumer-group fetch with bounded prefetch and acknowledgment
//! - Requeue-with-delay retries, a bounded retry counter and a
//!   dead-letter stream for poison messages
//! - Pending-entry claiming for crash recovery

pub mod error;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use queue::{Delivery, QueueConfig, StageQueue};

pub use tpdf_models::Stage;

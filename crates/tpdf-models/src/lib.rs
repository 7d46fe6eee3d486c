//! Shared data models for the tpdf backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and their lifecycle (status, current step, result assembly)
//! - Pipeline stages and stage queue messages
//! - Anonymous sessions and job ownership

pub mod job;
pub mod message;
pub mod session;
pub mod stage;

// Re-export common types
pub use job::{JobId, JobRecord, JobResult, JobResultView, JobStatus};
pub use message::{MessageEnvelope, OcrMessage, PdfMessage, PreprocessMessage, StageMessage, TranslateMessage};
pub use session::{Session, SessionJobEntry};
pub use stage::{Stage, StageParseError};

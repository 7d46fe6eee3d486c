//! Job state manager and session/ownership ledger.
//!
//! Both components persist through the shared cache store. The job manager
//! is the single writer of job records; the session ledger is the single
//! writer of the job-ownership mapping.

pub mod error;
pub mod job_manager;
pub mod keys;
pub mod session;

pub use error::{RegistryError, RegistryResult};
pub use job_manager::JobManager;
pub use session::{SessionLedger, SESSION_TTL};

//! Job infrastructure for the application pipeline.
//!
//! - [`Job`] - job row model with claim/lease/resolution queries
//! - [`PostgresJobQueue`] / [`enqueue`] - idempotent enqueue and SKIP LOCKED claims
//! - [`JobRegistry`] - job type to handler dispatch
//! - [`JobWorker`] - concurrent slots that claim, execute and resolve jobs
//! - [`BackoffPolicy`] - per-type retry delays
//!
//! Stage handlers live in their domains; this module only runs them.

mod backoff;
mod error;
mod job;
mod queue;
mod registry;
mod worker;

pub use backoff::BackoffPolicy;
pub use error::{JobError, JobResultExt};
pub use job::{Job, JobStatus, JobType, NewJob};
pub use queue::{enqueue, EnqueueResult, PostgresJobQueue};
pub use registry::{JobRegistry, SharedJobRegistry};
pub use worker::{JobResolution, JobWorker, JobWorkerConfig, ProcessedJob};

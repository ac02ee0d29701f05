// Application Screening Orchestrator - core library
//
// Moves candidate applications from the talent system through resume
// download, fact extraction, summarization and (optionally) an async
// interview, leaving humans to decide at the review points.
//
// Pipeline stages run as durable jobs in Postgres; see kernel/jobs.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;

use kernel::jobs::JobRegistry;

/// Registry with every domain's job handlers.
pub fn build_registry() -> JobRegistry {
    let mut registry = JobRegistry::new();
    domains::applications::jobs::register_jobs(&mut registry);
    domains::interviews::jobs::register_jobs(&mut registry);
    registry
}

//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod http_collaborators;
pub mod jobs;
pub mod scheduled_tasks;
pub mod test_dependencies;
pub mod traits;

pub use deps::{PipelineSettings, ServerDeps};
pub use http_collaborators::{
    HttpCollaborator, HttpFactExtractor, HttpInterviewChannel, HttpResumeParser, HttpTalentSystem,
};
pub use scheduled_tasks::{start_scheduler, SchedulerConfig};
pub use test_dependencies::TestDependencies;
pub use traits::*;

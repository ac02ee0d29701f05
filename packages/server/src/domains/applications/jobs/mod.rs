pub mod job_handlers;

use crate::common::ApplicationId;
use crate::kernel::jobs::{JobRegistry, JobType};

pub use job_handlers::*;

/// Register the pipeline stage handlers.
pub fn register_jobs(registry: &mut JobRegistry) {
    registry.register(JobType::Sync, |_entity_id, deps| handle_sync(deps));
    registry.register(JobType::Download, |entity_id, deps| {
        handle_download(ApplicationId::from_uuid(entity_id), deps)
    });
    registry.register(JobType::Extract, |entity_id, deps| {
        handle_extract(ApplicationId::from_uuid(entity_id), deps)
    });
    registry.register(JobType::Summarize, |entity_id, deps| {
        handle_summarize(ApplicationId::from_uuid(entity_id), deps)
    });
}

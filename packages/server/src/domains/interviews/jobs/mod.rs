pub mod job_handlers;

use crate::common::ApplicationId;
use crate::kernel::jobs::{JobRegistry, JobType};

pub use job_handlers::*;

/// Register the interview stage handlers.
pub fn register_jobs(registry: &mut JobRegistry) {
    registry.register(JobType::SendInterview, |entity_id, deps| {
        handle_send_interview(ApplicationId::from_uuid(entity_id), deps)
    });
    registry.register(JobType::Transcribe, |entity_id, deps| {
        handle_transcribe(ApplicationId::from_uuid(entity_id), deps)
    });
}

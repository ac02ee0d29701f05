//! Job registry mapping job types to handlers.
//!
//! Handlers receive the job's entity id and the shared dependencies. They
//! never touch the job row or the application status; the worker does that.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use uuid::Uuid;

use super::error::JobError;
use super::job::JobType;
use crate::kernel::ServerDeps;

type BoxedHandler =
    Box<dyn Fn(Uuid, Arc<ServerDeps>) -> BoxFuture<'static, Result<(), JobError>> + Send + Sync>;

/// Registry that maps job types to handlers.
///
/// ```ignore
/// let mut registry = JobRegistry::new();
/// registry.register(JobType::Download, |entity_id, deps| async move {
///     download::handle(ApplicationId::from_uuid(entity_id), &deps).await
/// });
/// ```
#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<JobType, BoxedHandler>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, replacing any previous one for the type.
    pub fn register<F, Fut>(&mut self, job_type: JobType, handler: F)
    where
        F: Fn(Uuid, Arc<ServerDeps>) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        let boxed: BoxedHandler = Box::new(move |entity_id, deps| {
            let handler = handler.clone();
            async move { handler(entity_id, deps).await }.boxed()
        });

        self.handlers.insert(job_type, boxed);
    }

    /// Run the handler for `job_type`. An unregistered type is a permanent failure.
    pub async fn execute(
        &self,
        job_type: JobType,
        entity_id: Uuid,
        deps: Arc<ServerDeps>,
    ) -> Result<(), JobError> {
        let handler = self
            .handlers
            .get(&job_type)
            .ok_or_else(|| JobError::permanent(format!("unknown job type: {job_type}")))?;

        handler(entity_id, deps).await
    }

    pub fn is_registered(&self, job_type: JobType) -> bool {
        self.handlers.contains_key(&job_type)
    }

    pub fn registered_types(&self) -> Vec<JobType> {
        self.handlers.keys().copied().collect()
    }
}

/// Thread-safe registry wrapped in Arc.
pub type SharedJobRegistry = Arc<JobRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::TestDependencies;

    #[test]
    fn register_and_check() {
        let mut registry = JobRegistry::new();
        registry.register(JobType::Download, |_id, _deps| async move { Ok(()) });

        assert!(registry.is_registered(JobType::Download));
        assert!(!registry.is_registered(JobType::Transcribe));
        assert_eq!(registry.registered_types(), vec![JobType::Download]);
    }

    #[tokio::test]
    async fn unknown_type_is_permanent() {
        let registry = JobRegistry::new();
        let deps = TestDependencies::new().into_server_deps_lazy();

        let err = registry
            .execute(JobType::Extract, Uuid::now_v7(), deps)
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert!(err.message().contains("extract"));
    }

    #[tokio::test]
    async fn execute_passes_the_entity_id_through() {
        let mut registry = JobRegistry::new();
        let expected = Uuid::now_v7();
        registry.register(JobType::Summarize, move |id, _deps| async move {
            if id == expected {
                Ok(())
            } else {
                Err(JobError::permanent("wrong entity"))
            }
        });
        let deps = TestDependencies::new().into_server_deps_lazy();

        registry
            .execute(JobType::Summarize, expected, deps)
            .await
            .unwrap();
    }
}

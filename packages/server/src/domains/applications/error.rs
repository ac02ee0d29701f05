use std::fmt;

use thiserror::Error;

use super::models::ApplicationStatus;
use crate::common::ApplicationId;

/// An application was not in a status the operation accepts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct InvalidStateError {
    pub application_id: ApplicationId,
    pub expected: Vec<ApplicationStatus>,
    pub actual: ApplicationStatus,
}

impl fmt::Display for InvalidStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expected = self
            .expected
            .iter()
            .map(ApplicationStatus::as_str)
            .collect::<Vec<_>>()
            .join("|");
        write!(
            f,
            "application {} is {}, expected {}",
            self.application_id, self.actual, expected
        )
    }
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),

    #[error("application {0} not found")]
    NotFound(ApplicationId),

    /// A related record (job, interview) does not exist.
    #[error("{0} not found")]
    Missing(String),

    #[error("{0}")]
    Validation(String),

    /// The request conflicts with the current state of a related record.
    #[error("{0}")]
    Conflict(String),

    /// A job for the application is running; recovery must wait.
    #[error("application {0} has a running job")]
    Busy(ApplicationId),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApplicationError {
    pub fn invalid_state(&self) -> Option<&InvalidStateError> {
        match self {
            ApplicationError::InvalidState(err) => Some(err),
            _ => None,
        }
    }
}

pub type ApplicationResult<T> = std::result::Result<T, ApplicationError>;

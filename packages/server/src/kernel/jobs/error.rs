//! Outcome type at the handler boundary.
//!
//! Handlers classify their own failures. The worker owns what happens next:
//! transient failures are retried with backoff, permanent failures
//! dead-letter the job and take the stage fallback.

use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

use crate::kernel::traits::ProviderError;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("transient: {message}")]
    Transient {
        message: String,
        /// Provider-supplied minimum delay before retrying.
        retry_after: Option<Duration>,
    },

    #[error("permanent: {message}")]
    Permanent { message: String },
}

impl JobError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient { retry_after, .. } => *retry_after,
            Self::Permanent { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Transient { message, .. } | Self::Permanent { message } => message,
        }
    }
}

impl From<ProviderError> for JobError {
    fn from(err: ProviderError) -> Self {
        let message = err.to_string();
        if err.is_transient() {
            Self::Transient {
                message,
                retry_after: err.retry_after(),
            }
        } else {
            Self::Permanent { message }
        }
    }
}

impl From<sqlx::Error> for JobError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::permanent("row not found"),
            other => Self::transient(format!("database error: {other}")),
        }
    }
}

/// Storage plumbing returns `anyhow::Error`; a failed query is worth retrying.
impl From<anyhow::Error> for JobError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ProviderError>() {
            Ok(provider) => provider.into(),
            Err(err) => match err.downcast_ref::<sqlx::Error>() {
                Some(sqlx::Error::RowNotFound) => Self::permanent(format!("{err:#}")),
                _ => Self::transient(format!("{err:#}")),
            },
        }
    }
}

/// Explicit classification for results that are not provider errors.
pub trait JobResultExt<T> {
    fn transient(self) -> Result<T, JobError>;
    fn permanent(self) -> Result<T, JobError>;
}

impl<T, E: Display> JobResultExt<T> for Result<T, E> {
    fn transient(self) -> Result<T, JobError> {
        self.map_err(|e| JobError::transient(e.to_string()))
    }

    fn permanent(self) -> Result<T, JobError> {
        self.map_err(|e| JobError::permanent(e.to_string()))
    }
}

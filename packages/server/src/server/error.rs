//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::domains::applications::ApplicationError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Application(#[from] ApplicationError),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual_status: Option<String>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Application(err) => match err {
                ApplicationError::InvalidState(_)
                | ApplicationError::Conflict(_)
                | ApplicationError::Busy(_) => StatusCode::CONFLICT,
                ApplicationError::NotFound(_) | ApplicationError::Missing(_) => StatusCode::NOT_FOUND,
                ApplicationError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ApplicationError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
                ApplicationError::Database(_) | ApplicationError::Other(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Application(ApplicationError::InvalidState(_)) => "invalid_state",
            ApiError::Application(ApplicationError::Conflict(_)) => "conflict",
            ApiError::Application(ApplicationError::Busy(_)) => "busy",
            ApiError::Application(ApplicationError::Validation(_)) => "validation",
            ApiError::BadRequest(_) => "bad_request",
            _ if self.status_code() == StatusCode::NOT_FOUND => "not_found",
            _ => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let actual_status = match &self {
            ApiError::Application(ApplicationError::InvalidState(err)) => Some(err.actual.to_string()),
            _ => None,
        };
        let error = if status.is_server_error() {
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error,
            code: self.code(),
            actual_status,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

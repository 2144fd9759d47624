use std::sync::Arc;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::decode::DecodeError;

pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Decoding error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Preference store error: {0}")]
    Preferences(#[from] rusqlite::Error),

    #[error("Unexpected response shape: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(String),

    /// A failure observed by several callers waiting on the same fetch.
    #[error(transparent)]
    Shared(Arc<DashboardError>),
}

impl DashboardError {
    /// Transport failures and upstream 5xx are worth another attempt; everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            DashboardError::Http(e) => !e.is_decode() && !e.is_builder(),
            DashboardError::Status { status, .. } => *status >= 500,
            DashboardError::Shared(inner) => inner.is_retryable(),
            _ => false,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

impl ResponseError for DashboardError {
    fn status_code(&self) -> StatusCode {
        match self {
            DashboardError::NotFound(_) => StatusCode::NOT_FOUND,
            DashboardError::BadRequest(_) | DashboardError::Decode(_) => StatusCode::BAD_REQUEST,
            DashboardError::Http(_) | DashboardError::Status { .. } | DashboardError::Json(_) => {
                StatusCode::BAD_GATEWAY
            }
            DashboardError::Preferences(_) | DashboardError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            DashboardError::Shared(inner) => inner.status_code(),
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(ErrorBody {
            code: status.as_u16(),
            message: self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_status_codes() {
        assert_eq!(
            DashboardError::NotFound("node 0x01".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            DashboardError::from(DecodeError::Empty).status_code(),
            StatusCode::BAD_REQUEST
        );
        let upstream = DashboardError::Status {
            status: 503,
            message: "unavailable".into(),
        };
        assert_eq!(upstream.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn only_server_side_failures_are_retryable() {
        let unavailable = DashboardError::Status {
            status: 503,
            message: String::new(),
        };
        let rejected = DashboardError::Status {
            status: 400,
            message: String::new(),
        };
        assert!(unavailable.is_retryable());
        assert!(!rejected.is_retryable());
        assert!(!DashboardError::NotFound("x".into()).is_retryable());
    }
}

//! Error responses for the mock backend.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nutrisnap::api::{codes, ApiErrorBody};
use tracing::{error, warn};

/// Errors returned by route handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Input failed validation or could not be decoded.
    #[error("{0}")]
    BadRequest(String),

    /// Unknown session token or wrong password.
    #[error("{0}")]
    Unauthorized(String),

    /// No such user.
    #[error("{0}")]
    NotFound(String),

    /// The email is already registered.
    #[error("{0}")]
    Conflict(String),

    /// Anything else.
    #[error("{0}")]
    Internal(String),
}

/// Result alias for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error code sent in the response body.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => codes::BAD_REQUEST,
            Self::Unauthorized(_) => codes::UNAUTHORIZED,
            Self::NotFound(_) => codes::NOT_FOUND,
            Self::Conflict(_) => codes::CONFLICT,
            Self::Internal(_) => codes::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn invalid_token() -> Self {
        Self::Unauthorized("Invalid token".to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}: {}", self.code(), self);
        } else {
            warn!("{}: {}", self.code(), self);
        }
        let body = ApiErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

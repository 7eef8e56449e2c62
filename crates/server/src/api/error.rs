//! Mapping of service errors to HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use manhwadex_core::ServiceError;

/// The error response body: `{ "error": { "message", "app_code", "details?" } }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub app_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Transport wrapper around [`ServiceError`], usable as an axum rejection.
#[derive(Debug)]
pub struct AppError(pub ServiceError);

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        AppError(e)
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError(ServiceError::Validation(message.into()))
    }

    fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::BadInput(_)
            | ServiceError::InvalidData(_)
            | ServiceError::Validation(_)
            | ServiceError::PaginationExceeded(_) => StatusCode::BAD_REQUEST,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::External(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Unauthorised(_)
            | ServiceError::SyncFailed(_)
            | ServiceError::SearchFailed(_)
            | ServiceError::Transient(_)
            | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                message: self.0.to_string(),
                app_code: self.0.app_code().to_string(),
                details: None,
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

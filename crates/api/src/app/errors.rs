use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use rentdesk_auth::AuthzError;
use rentdesk_core::DomainError;
use rentdesk_infra::services::ServiceError;

/// Handler result: a ready response or a JSON error.
pub type ApiResult = Result<Response, ApiError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        json_error(self.status, self.code, self.message)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let status = match err {
            DomainError::Validation(_) | DomainError::InvalidId(_) => StatusCode::BAD_REQUEST,
            DomainError::InvariantViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(e) => e.into(),
            ServiceError::Unauthenticated(msg) => Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", msg),
            ServiceError::Forbidden(msg) => Self::new(StatusCode::FORBIDDEN, "forbidden", msg),
            ServiceError::Store(e) => {
                error!(error = ?e, "store failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
            }
            ServiceError::Internal(msg) => {
                error!(error = %msg, "internal failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", err.to_string())
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

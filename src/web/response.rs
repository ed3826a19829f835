use crate::core::DbError;
use crate::service::{FieldErrors, ServiceError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

/// Uniform response body of every endpoint
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
    /// Internal error detail, only in local environments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

/// Successful response
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    message: String,
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            message: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            status: "success",
            code: self.status.as_u16(),
            message: self.message,
            data: self.data,
            field_errors: None,
            msg: None,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Failed response built from a service error
#[derive(Debug)]
pub struct ApiError {
    error: ServiceError,
    expose_detail: bool,
}

impl ApiError {
    pub fn new(error: ServiceError, expose_detail: bool) -> Self {
        Self { error, expose_detail }
    }

    pub fn error(&self) -> &ServiceError {
        &self.error
    }

    pub fn status(&self) -> StatusCode {
        match &self.error {
            ServiceError::Validation { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Database(err) if err.is_unique_violation() => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Database(_) | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (message, field_errors, msg) = match self.error {
            ServiceError::Validation { message, field_errors } => (message, Some(field_errors), None),
            ServiceError::Unauthorized { message, field_errors } => {
                let field_errors = (!field_errors.is_empty()).then_some(field_errors);
                (message, field_errors, None)
            }
            ServiceError::Forbidden(message) | ServiceError::NotFound(message) => (message, None, None),
            ServiceError::Database(DbError::ConstraintViolation(_)) => {
                ("Invalid input".to_string(), Some(FieldErrors::new()), None)
            }
            other => {
                error!(error = %other, "request failed");
                let detail = self.expose_detail.then(|| other.to_string());
                ("Internal server error".to_string(), None, detail)
            }
        };

        let body = Envelope::<()> {
            status: "failed",
            code: status.as_u16(),
            message,
            data: None,
            field_errors,
            msg,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ServiceError::bad_request("bad"), StatusCode::BAD_REQUEST),
            (ServiceError::unauthorized("who"), StatusCode::UNAUTHORIZED),
            (ServiceError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (ServiceError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (
                ServiceError::Database(DbError::ConstraintViolation("users.email".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::Database(DbError::Conflict("users/u1".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::new(error, false).status(), expected);
        }
    }
}

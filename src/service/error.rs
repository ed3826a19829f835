use crate::core::DbError;
use std::collections::BTreeMap;
use thiserror::Error;

/// Per-field messages attached to a failed request
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: FieldErrors,
    },

    #[error("{message}")]
    Unauthorized {
        message: String,
        field_errors: FieldErrors,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            field_errors: FieldErrors::new(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ServiceError::Unauthorized {
            message: message.into(),
            field_errors: FieldErrors::new(),
        }
    }

    /// Attach a message for one request field
    pub fn with_field(mut self, field: &str, message: impl Into<String>) -> Self {
        if let ServiceError::Validation { field_errors, .. }
        | ServiceError::Unauthorized { field_errors, .. } = &mut self
        {
            field_errors.insert(field.to_string(), message.into());
        }
        self
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ServiceError::Validation { field_errors, .. }
            | ServiceError::Unauthorized { field_errors, .. } => Some(field_errors),
            _ => None,
        }
    }
}

impl From<bcrypt::BcryptError> for ServiceError {
    fn from(err: bcrypt::BcryptError) -> Self {
        ServiceError::Internal(format!("password hashing failed: {}", err))
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServiceError::Internal(format!("background task failed: {}", err))
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_only_on_request_errors() {
        let err = ServiceError::bad_request("Invalid input").with_field("email", "Email is already in use.");
        assert_eq!(err.to_string(), "Invalid input");
        assert_eq!(
            err.field_errors().and_then(|fields| fields.get("email")).map(String::as_str),
            Some("Email is already in use.")
        );

        let missing = ServiceError::NotFound("User not found".into()).with_field("id", "ignored");
        assert!(missing.field_errors().is_none());
    }

    #[test]
    fn test_database_errors_convert() {
        let err: ServiceError = DbError::Conflict("users/u1".into()).into();
        assert!(matches!(err, ServiceError::Database(DbError::Conflict(_))));
    }
}

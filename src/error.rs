//! Shared error handling utilities.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::{DbConn, DbPool};

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    pub success: bool,
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_id: Option<i32>,
}

impl ApiError {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            code: code.into(),
            existing_id: None,
        }
    }

    pub fn bad_request(
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::BAD_REQUEST, Json(Self::new(message, code)))
    }

    pub fn unauthorized(
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::UNAUTHORIZED, Json(Self::new(message, code)))
    }

    pub fn forbidden(
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::FORBIDDEN, Json(Self::new(message, code)))
    }

    pub fn not_found(
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::NOT_FOUND, Json(Self::new(message, code)))
    }

    pub fn conflict(
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::CONFLICT, Json(Self::new(message, code)))
    }

    pub fn internal(
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Self::new(message, code)),
        )
    }

    pub fn db_error() -> (StatusCode, Json<Self>) {
        Self::internal("Database error", "DB_ERROR")
    }
}

pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

/// Failure outcomes of the domain services, independent of the HTTP layer.
#[derive(Debug)]
pub enum ServiceError {
    Unauthenticated,
    Forbidden(String),
    NotFound(String),
    Conflict {
        message: String,
        existing_id: Option<i32>,
    },
    Invalid(String),
    Internal(diesel::result::Error),
}

impl ServiceError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            existing_id: None,
        }
    }

    pub fn conflict_with(message: impl Into<String>, existing_id: i32) -> Self {
        Self::Conflict {
            message: message.into(),
            existing_id: Some(existing_id),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::Invalid(_) => "INVALID_INPUT",
            Self::Internal(_) => "DB_ERROR",
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "Authentication required"),
            Self::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::Conflict { message, .. } => write!(f, "Conflict: {}", message),
            Self::Invalid(msg) => write!(f, "Invalid input: {}", msg),
            Self::Internal(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Internal(e) => Some(e),
            _ => None,
        }
    }
}

impl From<diesel::result::Error> for ServiceError {
    fn from(e: diesel::result::Error) -> Self {
        Self::Internal(e)
    }
}

impl From<ServiceError> for (StatusCode, Json<ApiError>) {
    fn from(e: ServiceError) -> Self {
        let code = e.code();
        match e {
            ServiceError::Unauthenticated => {
                ApiError::unauthorized("Authentication required", code)
            }
            ServiceError::Forbidden(msg) => ApiError::forbidden(msg, code),
            ServiceError::NotFound(msg) => ApiError::not_found(msg, code),
            ServiceError::Conflict {
                message,
                existing_id,
            } => {
                let mut body = ApiError::new(message, code);
                body.existing_id = existing_id;
                (StatusCode::CONFLICT, Json(body))
            }
            ServiceError::Invalid(msg) => ApiError::bad_request(msg, code),
            ServiceError::Internal(e) => {
                error!(error = %e, "Database error");
                ApiError::db_error()
            }
        }
    }
}

pub fn get_db_conn(pool: &DbPool) -> Result<DbConn, (StatusCode, Json<ApiError>)> {
    pool.get().map_err(|e| {
        error!(error = %e, "Database connection error");
        ApiError::internal("Database connection error", "DB_CONNECTION_ERROR")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_carries_existing_id() {
        let (status, Json(body)): (StatusCode, Json<ApiError>) =
            ServiceError::conflict_with("Request already sent", 7).into();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.existing_id, Some(7));
        assert!(!body.success);
    }

    #[test]
    fn test_database_error_hides_details() {
        let (status, Json(body)): (StatusCode, Json<ApiError>) =
            ServiceError::from(diesel::result::Error::NotFound).into();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "Database error");
        assert_eq!(body.code, "DB_ERROR");
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ServiceError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (ServiceError::forbidden("no"), StatusCode::FORBIDDEN),
            (ServiceError::not_found("task"), StatusCode::NOT_FOUND),
            (ServiceError::invalid("name"), StatusCode::BAD_REQUEST),
        ];
        for (err, expected) in cases {
            let (status, _): (StatusCode, Json<ApiError>) = err.into();
            assert_eq!(status, expected);
        }
    }
}

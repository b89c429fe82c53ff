/// Error taxonomy and HTTP response mapping
///
/// Handlers return `ApiResult<T>`; an [`ApiError`] converts itself into a
/// response with the right status code and a structured JSON body.
///
/// # Taxonomy
///
/// - `BadRequest` (400): malformed request shape
/// - `Unauthorized` (401): missing/invalid/expired credential
/// - `Forbidden` (403): authenticated but role/ownership check failed
/// - `NotFound` (404): referenced task/user/dependency does not exist
/// - `Conflict` (409): duplicate edge, cycle-forming edge, duplicate email
/// - `ValidationError` (422): out-of-range or unparseable input values
/// - `InternalError` (500): everything else; detail is logged, not leaked

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use taskboard_shared::auth::{jwt::JwtError, password::PasswordError};
use taskboard_shared::models::{dependency::DependencyError, task::TaskError};

/// Result alias used by all handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// The one error type the HTTP layer speaks
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - duplicate email, duplicate or cycle-forming dependency
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),
}

/// One field-level validation failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Offending field
    pub field: String,

    /// What was wrong with it
    pub message: String,
}

/// Wire shape of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable code ("not_found", "conflict", ...)
    pub error: String,

    /// Human-readable message
    pub message: String,

    /// Field details, present for validation errors only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// Builds a single-field validation error
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.to_string(),
            message: message.into(),
        }])
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Detail goes to the log, never to the client
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Store failures: missing rows and dangling references are 404, unique
/// violations are 409
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.kind() {
                // An FK violation means the request named a user or task
                // that does not exist
                sqlx::error::ErrorKind::ForeignKeyViolation => {
                    ApiError::NotFound("Referenced resource not found".to_string())
                }
                sqlx::error::ErrorKind::UniqueViolation => {
                    if db_err.constraint().map_or(false, |c| c.contains("email")) {
                        ApiError::Conflict("Email already registered".to_string())
                    } else {
                        ApiError::Conflict("Resource already exists".to_string())
                    }
                }
                _ => ApiError::InternalError(format!("Database error: {}", db_err)),
            },
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert validator failures to field-level validation errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let errors: Vec<ValidationErrorDetail> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        ApiError::ValidationError(errors)
    }
}

/// Token failures are all 401
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

/// Hashing failures are operational, not user errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password hashing failed: {}", err))
    }
}

/// Convert task operation errors to API errors
impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::NotFound(id) => ApiError::NotFound(format!("Task {} not found", id)),
            TaskError::ParentNotFound(id) => {
                ApiError::NotFound(format!("Parent task {} not found", id))
            }
            TaskError::ParentCycle => {
                ApiError::Conflict("Parent link would create a cycle".to_string())
            }
            TaskError::Database(e) => e.into(),
        }
    }
}

/// Convert dependency errors to API errors
impl From<DependencyError> for ApiError {
    fn from(err: DependencyError) -> Self {
        match err {
            DependencyError::TaskNotFound(id) => {
                ApiError::NotFound(format!("Task {} not found", id))
            }
            DependencyError::SelfDependency => {
                ApiError::Conflict("Task cannot depend on itself".to_string())
            }
            DependencyError::Duplicate => {
                ApiError::Conflict("Dependency already exists".to_string())
            }
            DependencyError::Cycle => {
                ApiError::Conflict("Dependency would create a cycle".to_string())
            }
            DependencyError::Database(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display() {
        let err = ApiError::Conflict("Dependency already exists".to_string());
        assert_eq!(err.to_string(), "Conflict: Dependency already exists");

        let err = ApiError::NotFound("Task not found".to_string());
        assert_eq!(err.to_string(), "Not found: Task not found");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ApiError::ValidationError(vec![
            ValidationErrorDetail {
                field: "status".to_string(),
                message: "Unknown status".to_string(),
            },
            ValidationErrorDetail {
                field: "days".to_string(),
                message: "Out of range".to_string(),
            },
        ]);
        assert_eq!(err.to_string(), "Validation failed: 2 errors");
    }

    #[test]
    fn test_dependency_errors_map_to_conflict_or_not_found() {
        assert!(matches!(
            ApiError::from(DependencyError::Cycle),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(DependencyError::Duplicate),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(DependencyError::SelfDependency),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(DependencyError::TaskNotFound(Uuid::new_v4())),
            ApiError::NotFound(_)
        ));
    }

    #[test]
    fn test_task_errors_map() {
        assert!(matches!(
            ApiError::from(TaskError::NotFound(Uuid::new_v4())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(TaskError::ParentCycle),
            ApiError::Conflict(_)
        ));
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            ApiError::from(sqlx::Error::RowNotFound),
            ApiError::NotFound(_)
        ));
    }

    #[test]
    fn test_jwt_expired_maps_to_unauthorized() {
        assert!(matches!(
            ApiError::from(JwtError::Expired),
            ApiError::Unauthorized(_)
        ));
    }
}

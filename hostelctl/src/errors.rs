use crate::db::errors::DbError;
use crate::types::PermissionKey;
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Credential missing, malformed, expired, or resolving to an inactive user
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Authenticated, but the caller's role does not grant the required key
    #[error("Missing permission {required}")]
    Forbidden { required: PermissionKey },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Uniqueness violation or an operation incompatible with the current state
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Per-client request budget exhausted
    #[error("Rate limit exceeded")]
    TooManyRequests { retry_after_secs: u64 },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure half of the response envelope
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<u64>,
}

impl Error {
    pub fn not_found(resource: &str, id: impl ToString) -> Self {
        Error::NotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest { message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Error::Conflict { message: message.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            // Conflicts are reported as 400 alongside other rule violations
            Error::Conflict { .. } => StatusCode::BAD_REQUEST,
            Error::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the message shown to the caller
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Not authenticated".to_string()),
            Error::Forbidden { .. } => "You do not have permission to perform this action".to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } if id.is_empty() => format!("{resource} not found"),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Conflict { message } => message.clone(),
            Error::TooManyRequests { .. } => "Too many requests, please try again later.".to_string(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { constraint, .. } => unique_violation_message(constraint.as_deref()).to_string(),
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }

    /// Raw error text, surfaced to the caller only for server-side failures
    fn raw_detail(&self) -> Option<String> {
        match self {
            Error::Internal { .. } | Error::Other(_) | Error::Database(DbError::Other(_)) => Some(format!("{self:#}")),
            _ => None,
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::BadRequest {
            message: rejection.body_text(),
        }
    }
}

/// Map the storage-level unique constraints onto caller-facing messages
fn unique_violation_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_email_unique") => "An account with this email address already exists",
        Some("permissions_key_unique") | Some("permissions_name_unique") => "Permission with this name or key already exists",
        Some("roles_code_unique") | Some("roles_name_unique") => "Role with this name or code already exists",
        Some("rooms_room_number_unique") => "Room number already exists",
        Some("beds_room_bed_number_unique") => "Bed number already exists in this room",
        Some("members_member_code_unique") | Some("members_cnic_unique") => "Member with same code or CNIC already exists",
        Some("bed_assignments_active_member_unique") => "Member already has an active bed assignment",
        Some("bed_assignments_active_bed_unique") => "Bed already has an active assignment",
        Some("food_items_name_category_unique") => "Food item already exists in this category",
        Some("bills_bill_number_unique") => "Bill number already exists",
        Some("attendance_member_date_unique") => "Attendance already recorded for this member and date",
        _ => "Resource already exists",
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) | Error::Conflict { .. } => {
                tracing::warn!("Conflict: {}", self);
            }
            Error::Unauthenticated { .. } | Error::Forbidden { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::TooManyRequests { .. } => {
                tracing::info!("Rate limited: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let retry_after_secs = match &self {
            Error::TooManyRequests { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        let body = ErrorBody {
            success: false,
            message: self.user_message(),
            error: self.raw_detail(),
            retry_after_secs,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after_secs {
            response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_and_validation_share_400() {
        assert_eq!(Error::conflict("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        let unique = Error::Database(DbError::UniqueViolation {
            constraint: Some("rooms_room_number_unique".to_string()),
            table: Some("rooms".to_string()),
            message: "duplicate key".to_string(),
        });
        assert_eq!(unique.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(unique.user_message(), "Room number already exists");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Unauthenticated { message: None }.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::Forbidden {
                required: PermissionKey::RoomCreate
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(Error::not_found("Room", "abc").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::TooManyRequests { retry_after_secs: 3 }.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            Error::Internal {
                operation: "x".to_string()
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_message_without_id() {
        assert_eq!(Error::not_found("Dashboard stats", "").user_message(), "Dashboard stats not found");
        assert_eq!(Error::not_found("Room", "r1").user_message(), "Room with ID r1 not found");
    }

    #[test]
    fn test_raw_detail_only_for_server_errors() {
        assert!(Error::bad_request("nope").raw_detail().is_none());
        let internal = Error::Other(anyhow::anyhow!("connection reset"));
        assert_eq!(internal.raw_detail().as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_rate_limit_response_sets_retry_after() {
        let response = Error::TooManyRequests { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }
}

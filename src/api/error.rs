//! Structured API error responses with error codes
//!
//! Every failed request returns
//! `{ "error": { code, numeric_code, message, details?, resource_id? } }`
//! and repeats the code in the `x-error-code` header.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;
use crate::domain::TransitionError;
use crate::infra::DeskError;

// ============================================================================
// Error Codes
// ============================================================================

/// Error codes for API responses
///
/// These codes are stable and can be used by clients for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication errors (1xxx)
    /// No authentication credentials provided
    AuthRequired,
    /// Invalid JWT token
    InvalidToken,
    /// Token has expired
    TokenExpired,
    /// Role not permitted for this operation
    InsufficientPermissions,
    /// Wrong email, badge id or password
    InvalidCredentials,

    // Validation errors (3xxx)
    /// Request body is malformed
    InvalidRequestBody,
    /// Required field is missing
    MissingRequiredField,
    /// Field value is invalid
    InvalidFieldValue,
    /// Upload exceeds size limit
    PayloadTooLarge,

    // Resource errors (4xxx)
    /// Requested resource not found
    ResourceNotFound,

    // Conflict errors (5xxx)
    /// Request conflicts with current state
    Conflict,
    /// Resource already exists
    AlreadyExists,

    // Signature errors (6xxx)
    /// Payment signature verification failed
    SignatureVerificationFailed,

    // State errors (7xxx)
    /// Invalid complaint status transition
    InvalidStateTransition,

    // Infrastructure errors (8xxx)
    /// Database operation failed
    DatabaseError,
    /// Payment gateway unavailable or failed
    GatewayError,
    /// Uploaded file could not be stored
    UploadFailed,
    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn numeric_code(&self) -> u32 {
        match self {
            ErrorCode::AuthRequired => 1001,
            ErrorCode::InvalidToken => 1002,
            ErrorCode::TokenExpired => 1003,
            ErrorCode::InsufficientPermissions => 1004,
            ErrorCode::InvalidCredentials => 1005,

            ErrorCode::InvalidRequestBody => 3001,
            ErrorCode::MissingRequiredField => 3002,
            ErrorCode::InvalidFieldValue => 3003,
            ErrorCode::PayloadTooLarge => 3004,

            ErrorCode::ResourceNotFound => 4001,

            ErrorCode::Conflict => 5001,
            ErrorCode::AlreadyExists => 5002,

            ErrorCode::SignatureVerificationFailed => 6001,

            ErrorCode::InvalidStateTransition => 7001,

            ErrorCode::DatabaseError => 8001,
            ErrorCode::GatewayError => 8002,
            ErrorCode::UploadFailed => 8003,
            ErrorCode::InternalError => 8999,
        }
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::AuthRequired
            | ErrorCode::InvalidToken
            | ErrorCode::TokenExpired
            | ErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ErrorCode::InsufficientPermissions => StatusCode::FORBIDDEN,

            ErrorCode::InvalidRequestBody
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFieldValue => StatusCode::BAD_REQUEST,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,

            ErrorCode::ResourceNotFound => StatusCode::NOT_FOUND,

            ErrorCode::Conflict | ErrorCode::AlreadyExists => StatusCode::CONFLICT,

            ErrorCode::SignatureVerificationFailed => StatusCode::BAD_REQUEST,

            ErrorCode::InvalidStateTransition => StatusCode::BAD_REQUEST,

            ErrorCode::DatabaseError | ErrorCode::UploadFailed | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorCode::GatewayError => StatusCode::BAD_GATEWAY,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code_str = match self {
            ErrorCode::AuthRequired => "AUTH_REQUIRED",
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::TokenExpired => "TOKEN_EXPIRED",
            ErrorCode::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::InvalidRequestBody => "INVALID_REQUEST_BODY",
            ErrorCode::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            ErrorCode::InvalidFieldValue => "INVALID_FIELD_VALUE",
            ErrorCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorCode::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::SignatureVerificationFailed => "SIGNATURE_VERIFICATION_FAILED",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::GatewayError => "GATEWAY_ERROR",
            ErrorCode::UploadFailed => "UPLOAD_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", code_str)
    }
}

// ============================================================================
// Structured Error Response
// ============================================================================

/// Structured error response for API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ErrorDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Numeric error code for easy categorization
    pub numeric_code: u32,

    /// Human-readable error message
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Related resource ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetails {
                code,
                numeric_code: code.numeric_code(),
                message: message.into(),
                details: None,
                resource_id: None,
            },
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }

    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.error.resource_id = Some(id.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.error.code.http_status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code_str = self.error.code.to_string();
        let mut response = (status, Json(self)).into_response();

        if let Ok(code_value) = axum::http::HeaderValue::from_str(&code_str) {
            response.headers_mut().insert(
                axum::http::header::HeaderName::from_static("x-error-code"),
                code_value,
            );
        }

        response
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<DeskError> for ApiError {
    fn from(err: DeskError) -> Self {
        match err {
            DeskError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                ApiError::new(ErrorCode::DatabaseError, "Database error")
            }
            DeskError::NotFound {
                entity_type,
                entity_id,
            } => ApiError::new(
                ErrorCode::ResourceNotFound,
                format!("{} not found", capitalize(entity_type)),
            )
            .with_resource_id(entity_id.clone())
            .with_details(serde_json::json!({
                "entity_type": entity_type,
                "entity_id": entity_id
            })),
            DeskError::Transition(e) => ApiError::from(e),
            DeskError::Validation(msg) => ApiError::new(ErrorCode::InvalidFieldValue, msg),
            DeskError::Unauthorized(msg) => ApiError::new(ErrorCode::InvalidCredentials, msg),
            DeskError::Forbidden(msg) => ApiError::new(ErrorCode::InsufficientPermissions, msg),
            DeskError::Conflict(msg) => ApiError::new(ErrorCode::Conflict, msg),
            DeskError::Gateway(msg) => {
                tracing::error!(error = %msg, "Payment gateway error");
                ApiError::new(ErrorCode::GatewayError, "Payment initiation failed")
            }
            DeskError::SignatureMismatch => ApiError::new(
                ErrorCode::SignatureVerificationFailed,
                "Payment verification failed",
            ),
            DeskError::Upload(msg) => {
                tracing::error!(error = %msg, "Upload failed");
                ApiError::new(ErrorCode::UploadFailed, "Failed to store uploaded file")
            }
            DeskError::Configuration(msg) => {
                ApiError::new(ErrorCode::InternalError, format!("Configuration error: {}", msg))
            }
            DeskError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ApiError::new(ErrorCode::InternalError, "Internal server error")
            }
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match &err {
            TransitionError::ProofRequired => {
                ApiError::new(ErrorCode::MissingRequiredField, err.to_string())
                    .with_details(serde_json::json!({ "field": "proof" }))
            }
            TransitionError::NotOfficerSettable(status) => {
                ApiError::new(ErrorCode::InvalidFieldValue, err.to_string())
                    .with_details(serde_json::json!({ "field": "status", "value": status }))
            }
            TransitionError::NotAllowed { from, to } => {
                ApiError::new(ErrorCode::InvalidStateTransition, err.to_string())
                    .with_details(serde_json::json!({ "from_state": from, "to_state": to }))
            }
            TransitionError::NotResolved(status) => {
                ApiError::new(ErrorCode::InvalidStateTransition, err.to_string())
                    .with_details(serde_json::json!({ "from_state": status }))
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuth => ApiError::new(ErrorCode::AuthRequired, "Authentication required"),
            AuthError::InvalidJwt(_) => ApiError::new(ErrorCode::InvalidToken, "Invalid token"),
            AuthError::TokenExpired => ApiError::new(ErrorCode::TokenExpired, "Token expired"),
            AuthError::InsufficientPermissions => {
                ApiError::new(ErrorCode::InsufficientPermissions, "Access denied")
            }
            AuthError::InvalidCredentials => {
                ApiError::new(ErrorCode::InvalidCredentials, "Invalid credentials")
            }
            AuthError::Hashing(msg) => {
                tracing::error!(error = %msg, "Password hashing failed");
                ApiError::new(ErrorCode::InternalError, "Internal server error")
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Create a not found error for a specific resource type
pub fn not_found(resource_type: &str, id: impl std::fmt::Display) -> ApiError {
    ApiError::new(
        ErrorCode::ResourceNotFound,
        format!("{} not found", capitalize(resource_type)),
    )
    .with_resource_id(id.to_string())
}

/// Create a validation error with field details
pub fn validation_error(field: &str, message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::InvalidFieldValue, message.into())
        .with_details(serde_json::json!({ "field": field }))
}

/// Create a missing-field error
pub fn missing_field(field: &str) -> ApiError {
    ApiError::new(ErrorCode::MissingRequiredField, format!("{} is required", field))
        .with_details(serde_json::json!({ "field": field }))
}

pub fn unauthorized(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::AuthRequired, message.into())
}

pub fn forbidden(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::InsufficientPermissions, message.into())
}

pub fn internal_error(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::InternalError, message.into())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ComplaintStatus;

    #[test]
    fn test_error_code_numeric() {
        assert_eq!(ErrorCode::AuthRequired.numeric_code(), 1001);
        assert_eq!(ErrorCode::InvalidRequestBody.numeric_code(), 3001);
        assert_eq!(ErrorCode::ResourceNotFound.numeric_code(), 4001);
        assert_eq!(ErrorCode::Conflict.numeric_code(), 5001);
        assert_eq!(ErrorCode::SignatureVerificationFailed.numeric_code(), 6001);
        assert_eq!(ErrorCode::InvalidStateTransition.numeric_code(), 7001);
        assert_eq!(ErrorCode::InternalError.numeric_code(), 8999);
    }

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::AuthRequired.http_status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::InsufficientPermissions.http_status(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::ResourceNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::Conflict.http_status(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::GatewayError.http_status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn desk_errors_map_to_status() {
        let cases = [
            (DeskError::not_found("bill", "TAX9"), StatusCode::NOT_FOUND),
            (DeskError::validation("bad"), StatusCode::BAD_REQUEST),
            (DeskError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (DeskError::Conflict("paid".into()), StatusCode::CONFLICT),
            (DeskError::SignatureMismatch, StatusCode::BAD_REQUEST),
            (DeskError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn not_found_carries_resource_id() {
        let error = ApiError::from(DeskError::not_found("complaint", 42));
        assert_eq!(error.error.message, "Complaint not found");
        assert_eq!(error.error.resource_id.as_deref(), Some("42"));
    }

    #[test]
    fn proof_required_is_a_missing_field() {
        let error = ApiError::from(DeskError::from(TransitionError::ProofRequired));
        assert_eq!(error.error.code, ErrorCode::MissingRequiredField);
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);

        let error = ApiError::from(TransitionError::NotResolved(ComplaintStatus::Pending));
        assert_eq!(error.error.code, ErrorCode::InvalidStateTransition);
    }

    #[test]
    fn auth_errors_are_unauthorized() {
        assert_eq!(ApiError::from(AuthError::MissingAuth).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(AuthError::TokenExpired).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(AuthError::InsufficientPermissions).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_error_serialization() {
        let error = validation_error("email", "Email is required");
        let json = serde_json::to_string(&error).unwrap();

        assert!(json.contains("INVALID_FIELD_VALUE"));
        assert!(json.contains("Email is required"));
        assert!(json.contains("3003"));
        assert!(!json.contains("resource_id"));
    }

    #[test]
    fn response_sets_error_code_header() {
        let response = not_found("bill", "TAX9").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get("x-error-code").unwrap(),
            "RESOURCE_NOT_FOUND"
        );
    }
}

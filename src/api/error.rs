//! Unified API error handling for TriClub.
//!
//! Every handler returns `ApiError` on failure, rendered as
//! `{ "error": { "code", "message", "details"? } }` with a matching HTTP status.
//! Domain errors from the ledger, invitation, registration, store and workout
//! modules convert into it here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{invitations, points, registration, store, workouts};

/// Error codes for API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Client errors (4xx)
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    TooManyRequests,
    ValidationError,
    InsufficientPoints,
    InsufficientStock,
    InvalidInvite,

    // Server errors (5xx)
    InternalError,
    DatabaseError,
}

impl ErrorCode {
    /// Get the default HTTP status code for this error code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::InsufficientPoints => StatusCode::BAD_REQUEST,
            ErrorCode::InsufficientStock => StatusCode::CONFLICT,
            ErrorCode::InvalidInvite => StatusCode::BAD_REQUEST,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the string representation of the error code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Conflict => "conflict",
            ErrorCode::TooManyRequests => "too_many_requests",
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::InsufficientPoints => "insufficient_points",
            ErrorCode::InsufficientStock => "insufficient_stock",
            ErrorCode::InvalidInvite => "invalid_invite",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::DatabaseError => "database_error",
        }
    }
}

/// The inner error object in the response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (e.g., validation errors per field)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

/// Additional error details
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetails {
    /// Field-level validation errors
    ValidationErrors(HashMap<String, Vec<String>>),
    /// Generic key-value details
    Generic(HashMap<String, serde_json::Value>),
}

/// The full error response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Unified API error type
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    status: StatusCode,
    message: String,
    details: Option<ErrorDetails>,
}

impl ApiError {
    /// Create a new API error with a specific code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: code.status_code(),
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Add details to the error
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = Some(details);
        self
    }

    /// Add validation errors as details
    pub fn with_validation_errors(mut self, errors: HashMap<String, Vec<String>>) -> Self {
        self.details = Some(ErrorDetails::ValidationErrors(errors));
        self
    }

    /// Bad request error (400)
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Unauthorized error (401) - authentication required
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Forbidden error (403) - authenticated but not allowed
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Not found error (404)
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Conflict error (409)
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Validation error (400) with field-level details
    pub fn validation(errors: HashMap<String, Vec<String>>) -> Self {
        let message = if errors.len() == 1 {
            errors
                .values()
                .next()
                .and_then(|v| v.first())
                .cloned()
                .unwrap_or_else(|| "Validation failed".to_string())
        } else {
            format!("Validation failed for {} fields", errors.len())
        };

        Self::new(ErrorCode::ValidationError, message).with_validation_errors(errors)
    }

    /// Single field validation error
    pub fn validation_field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.into()]);
        Self::validation(errors)
    }

    /// Internal server error (500)
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Database error (500)
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Too many requests error (429)
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TooManyRequests, message)
    }

    fn insufficient_points(available: i64, requested: i64) -> Self {
        let mut details = HashMap::new();
        details.insert("available".to_string(), serde_json::json!(available));
        details.insert("requested".to_string(), serde_json::json!(requested));
        Self::new(
            ErrorCode::InsufficientPoints,
            format!(
                "Not enough points: {} available, {} required",
                available, requested
            ),
        )
        .with_details(ErrorDetails::Generic(details))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let response = ErrorResponse {
            error: ErrorBody {
                code: self.code.as_str().to_string(),
                message: self.message,
                details: self.details,
            },
        };

        (self.status, Json(response)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

// -------------------------------------------------------------------------
// Conversion implementations
// -------------------------------------------------------------------------

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);

        match &err {
            sqlx::Error::RowNotFound => ApiError::not_found("Resource not found"),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    ApiError::conflict("A resource with this identifier already exists")
                } else if db_err.is_foreign_key_violation() {
                    ApiError::bad_request("Referenced resource does not exist")
                } else {
                    ApiError::database("A database error occurred")
                }
            }
            _ => ApiError::database("A database error occurred"),
        }
    }
}

impl From<points::Error> for ApiError {
    fn from(err: points::Error) -> Self {
        match err {
            points::Error::UserNotFound(_) => ApiError::not_found("User not found"),
            points::Error::InvalidAmount(_) => {
                ApiError::validation_field("points", "Points must be a positive integer")
            }
            points::Error::InsufficientPoints {
                available,
                requested,
            } => ApiError::insufficient_points(available, requested),
            points::Error::Database(e) => e.into(),
        }
    }
}

impl From<invitations::Error> for ApiError {
    fn from(err: invitations::Error) -> Self {
        match err {
            invitations::Error::InvalidCode => ApiError::not_found("Invitation code not found"),
            invitations::Error::Expired => {
                ApiError::new(ErrorCode::InvalidInvite, "Invitation code has expired")
            }
            invitations::Error::ExhaustedUses => ApiError::new(
                ErrorCode::InvalidInvite,
                "Invitation code has already been used",
            ),
            invitations::Error::InvalidParameters(message) => ApiError::bad_request(message),
            invitations::Error::CodeGenerationExhausted(attempts) => {
                tracing::error!(attempts = attempts, "Invitation code generation exhausted");
                ApiError::internal("Could not generate an invitation code")
            }
            invitations::Error::Database(e) => e.into(),
        }
    }
}

impl From<registration::Error> for ApiError {
    fn from(err: registration::Error) -> Self {
        match err {
            registration::Error::EmailAlreadyRegistered => {
                ApiError::conflict("Email is already registered")
            }
            registration::Error::Invitation(e) => e.into(),
            registration::Error::Points(e) => e.into(),
            registration::Error::PasswordHash(message) => {
                tracing::error!("Password hashing failed: {}", message);
                ApiError::internal("Registration failed")
            }
            registration::Error::Database(e) => e.into(),
        }
    }
}

impl From<store::Error> for ApiError {
    fn from(err: store::Error) -> Self {
        match err {
            store::Error::ProductNotFound(_) => ApiError::not_found("Product not found"),
            store::Error::UserNotFound(_) => ApiError::not_found("User not found"),
            store::Error::InvalidQuantity { min, .. } => ApiError::validation_field(
                "quantity",
                format!("Quantity must be at least {}", min),
            ),
            store::Error::QuantityLimit { max, .. } => ApiError::validation_field(
                "quantity",
                format!("Quantity cannot exceed {} per product", max),
            ),
            store::Error::TotalOverflow => ApiError::bad_request("Cart total is too large"),
            store::Error::EmptyCart => ApiError::bad_request("Cart is empty"),
            store::Error::InsufficientPoints {
                available,
                requested,
            } => ApiError::insufficient_points(available, requested),
            store::Error::StockUnavailable { product_id, name } => {
                let mut details = HashMap::new();
                details.insert("productId".to_string(), serde_json::json!(product_id));
                ApiError::new(
                    ErrorCode::InsufficientStock,
                    format!("Not enough stock for {}", name),
                )
                .with_details(ErrorDetails::Generic(details))
            }
            store::Error::Database(e) => e.into(),
        }
    }
}

impl From<workouts::Error> for ApiError {
    fn from(err: workouts::Error) -> Self {
        match err {
            workouts::Error::Invalid(message) => ApiError::bad_request(message),
            workouts::Error::UserNotFound(_) => ApiError::not_found("User not found"),
            workouts::Error::Points(e) => e.into(),
            workouts::Error::Database(e) => e.into(),
        }
    }
}

// -------------------------------------------------------------------------
// Builder for validation errors
// -------------------------------------------------------------------------

/// Builder for collecting multiple validation errors
#[derive(Debug, Default)]
pub struct ValidationErrorBuilder {
    errors: HashMap<String, Vec<String>>,
}

impl ValidationErrorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validation error for a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    /// Record the error of a validator, if any
    pub fn check(&mut self, field: &str, result: Result<(), String>) -> &mut Self {
        if let Err(message) = result {
            self.add(field, message);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Build the ApiError if there are any errors
    pub fn build(self) -> Option<ApiError> {
        if self.errors.is_empty() {
            None
        } else {
            Some(ApiError::validation(self.errors))
        }
    }

    /// Return Ok(()) if no errors, or Err(ApiError) if there are errors
    pub fn finish(self) -> Result<(), ApiError> {
        match self.build() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

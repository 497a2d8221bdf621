/// Unified error types for the contacts API
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Session cache backend errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Missing, invalid or expired bearer token, or the user behind it is gone
    #[error("Could not validate credentials")]
    Unauthenticated,

    /// Login with an unknown email, wrong password or unconfirmed account
    #[error("{0}")]
    InvalidCredentials(String),

    /// Token decoded fine but carries the wrong scope for this use
    #[error("Invalid scope for token")]
    WrongScope,

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (duplicate email or username)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Image host or mail relay failures
    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Map a sqlx error, turning unique-constraint violations into `Conflict`
    pub fn from_write(err: sqlx::Error, conflict_message: &str) -> Self {
        match err.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => {
                ApiError::Conflict(conflict_message.to_string())
            }
            _ => ApiError::Database(err),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reasons = errs
                    .iter()
                    .map(|e| e.code.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{} ({})", field, reasons)
            })
            .collect();
        fields.sort();
        ApiError::Validation(format!("invalid fields: {}", fields.join("; ")))
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert ApiError to HTTP response
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::Unauthenticated | ApiError::WrongScope | ApiError::InvalidCredentials(_) => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
                self.to_string(),
            ),
            ApiError::Validation(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "InvalidRequest",
                self.to_string(),
            ),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "Conflict", self.to_string()),
            ApiError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimitExceeded",
                "Rate limit exceeded".to_string(),
            ),
            ApiError::Upstream(_) => {
                tracing::error!(error = %self, "upstream failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "UpstreamError",
                    "Upstream service unavailable".to_string(),
                )
            }
            ApiError::Database(_)
            | ApiError::Migration(_)
            | ApiError::Cache(_)
            | ApiError::Config(_)
            | ApiError::Internal(_)
            | ApiError::Io(_) => {
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalServerError",
                    "Internal server error".to_string(), // Don't leak details
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, header::HeaderValue::from_static("Bearer"));
        }
        if let ApiError::RateLimitExceeded { retry_after } = self {
            if let Ok(value) = header::HeaderValue::from_str(&retry_after.as_secs().max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// Main error type for the rul-dispatch service
#[derive(Debug)]
pub enum DispatchError {
    // HTTP and API errors
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    InternalServer(String),

    // Payment and settlement errors
    Payment(String),

    // Upstream collaborator errors (geolocation, card provider)
    Upstream(String),

    // Cache and coordination errors
    RedisConnection(String),
    RedisQuery(String),

    // Network and HTTP client errors
    NetworkTimeout,
    NetworkConnection(String),
    HttpClient(String),

    // Serialization and parsing errors
    JsonParsing(String),
    JsonSerialization(String),

    // Configuration and setup errors
    MissingEnvironmentVariable(String),
    InvalidConfiguration(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            DispatchError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            DispatchError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DispatchError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            DispatchError::InternalServer(msg) => write!(f, "Internal server error: {}", msg),

            DispatchError::Payment(msg) => write!(f, "Payment error: {}", msg),

            DispatchError::Upstream(msg) => write!(f, "Upstream service error: {}", msg),

            DispatchError::RedisConnection(msg) => write!(f, "Redis connection error: {}", msg),
            DispatchError::RedisQuery(msg) => write!(f, "Redis query error: {}", msg),

            DispatchError::NetworkTimeout => write!(f, "Network request timed out"),
            DispatchError::NetworkConnection(msg) => write!(f, "Network connection error: {}", msg),
            DispatchError::HttpClient(msg) => write!(f, "HTTP client error: {}", msg),

            DispatchError::JsonParsing(msg) => write!(f, "JSON parsing error: {}", msg),
            DispatchError::JsonSerialization(msg) => write!(f, "JSON serialization error: {}", msg),

            DispatchError::MissingEnvironmentVariable(var) => {
                write!(f, "Missing environment variable: {}", var)
            }
            DispatchError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for DispatchError {}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            DispatchError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            DispatchError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            DispatchError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            DispatchError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),

            // Payment rejections and upstream failures surface to callers as 400s,
            // with the taxonomy preserved in the error tag
            DispatchError::Payment(msg) => (StatusCode::BAD_REQUEST, "payment_error", msg),
            DispatchError::Upstream(msg) => (StatusCode::BAD_REQUEST, "upstream_error", msg),

            // All other errors are treated as internal server errors
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", self.to_string()),
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, axum::Json(error_response)).into_response()
    }
}

// Convenience type alias for Results
pub type DispatchResult<T> = Result<T, DispatchError>;

// Conversion implementations for common error types
impl From<redis::RedisError> for DispatchError {
    fn from(err: redis::RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::IoError => DispatchError::RedisConnection(err.to_string()),
            redis::ErrorKind::ResponseError => DispatchError::RedisQuery(err.to_string()),
            redis::ErrorKind::AuthenticationFailed => {
                DispatchError::RedisConnection("Authentication failed".to_string())
            }
            _ => DispatchError::RedisQuery(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DispatchError::NetworkTimeout
        } else if err.is_connect() {
            DispatchError::NetworkConnection(err.to_string())
        } else {
            DispatchError::HttpClient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() {
            DispatchError::JsonParsing(err.to_string())
        } else {
            DispatchError::JsonSerialization(err.to_string())
        }
    }
}

// Helper functions for creating common errors
impl DispatchError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        DispatchError::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        DispatchError::Unauthorized(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        DispatchError::NotFound(resource.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        DispatchError::Conflict(msg.into())
    }

    pub fn payment(msg: impl Into<String>) -> Self {
        DispatchError::Payment(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        DispatchError::Upstream(msg.into())
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        DispatchError::InternalServer(msg.into())
    }

    /// The uniform miss for trip lookups and guarded trip transitions. A
    /// transition whose status/actor precondition does not hold is
    /// indistinguishable from a trip that does not exist.
    pub fn trip_not_found() -> Self {
        DispatchError::NotFound("trip not found".to_string())
    }

    pub fn rental_not_found() -> Self {
        DispatchError::NotFound("rental not found".to_string())
    }

    /// Unknown, expired or foreign negotiation token.
    pub fn invalid_tracking_id() -> Self {
        DispatchError::BadRequest("invalid tracking id".to_string())
    }
}

// HTTP API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// HTTP API error with appropriate status codes and client-friendly messages.
///
/// Route handlers translate every lower-layer failure into one of these;
/// nothing below the routing layer writes HTTP responses directly.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Client-safe error message.
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({ "message": self.message() })
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<crate::database::DatabaseError> for ApiError {
    fn from(err: crate::database::DatabaseError) -> Self {
        match err {
            crate::database::DatabaseError::ConfigMissing(_) => {
                tracing::error!("Database configuration error: {}", err);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            crate::database::DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return a generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Internal server error")
            }
        }
    }
}

impl From<crate::models::account::AccountError> for ApiError {
    fn from(err: crate::models::account::AccountError) -> Self {
        match err {
            crate::models::account::AccountError::AlreadyExists(name) => {
                ApiError::conflict(format!("Account already exists: {}", name))
            }
            crate::models::account::AccountError::MissingName => {
                ApiError::bad_request("Missing required fields")
            }
            crate::models::account::AccountError::Database(e) => e.into(),
        }
    }
}

impl From<crate::auth::AuthError> for ApiError {
    fn from(err: crate::auth::AuthError) -> Self {
        match err {
            crate::auth::AuthError::InvalidToken(_) => ApiError::unauthorized("Unauthorized"),
            other => {
                tracing::error!("Auth error: {}", other);
                ApiError::internal_server_error("Internal server error")
            }
        }
    }
}

impl From<crate::models::user::UserError> for ApiError {
    fn from(err: crate::models::user::UserError) -> Self {
        match err {
            crate::models::user::UserError::UsernameTaken(name) => {
                ApiError::conflict(format!("Username already taken: {}", name))
            }
            crate::models::user::UserError::Auth(e) => e.into(),
        }
    }
}

impl From<crate::salesforce::SfdcError> for ApiError {
    fn from(err: crate::salesforce::SfdcError) -> Self {
        use crate::salesforce::SfdcError;
        match err {
            SfdcError::OrgIdRequired => ApiError::bad_request("orgId is required"),
            SfdcError::SessionExpired => {
                ApiError::unauthorized("Salesforce session expired")
            }
            SfdcError::OAuth(msg) => {
                tracing::error!("Salesforce OAuth error: {}", msg);
                ApiError::bad_request("Salesforce authorization failed")
            }
            SfdcError::Connection(msg) => {
                tracing::error!("Salesforce connection error: {}", msg);
                ApiError::service_unavailable("Unable to reach Salesforce")
            }
            SfdcError::Io(e) => {
                tracing::error!("Org workspace I/O error: {}", e);
                ApiError::internal_server_error("Internal server error")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

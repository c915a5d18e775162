/// Error Handling Module
///
/// One error taxonomy for the whole service:
/// 1. Domain-specific error types (validation, authentication, storage, configuration)
/// 2. A unified `AppError` used for control flow (`?` everywhere)
/// 3. HTTP response mapping with the uniform `{error, message}` body
/// 4. Structured error logging with a request id

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for request bodies
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// A required field is missing; the message lists what the route needs
    Incomplete(&'static str),
    /// The body could not be read as the expected shape
    InvalidBody(String),
    InvalidFormat(String),
    TooLong(String, usize),
    InvalidDate,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Incomplete(msg) => write!(f, "{}", msg),
            ValidationError::InvalidBody(msg) => write!(f, "{}", msg),
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidDate => {
                write!(f, "Invalid input: dob must be a real date in format YYYY-MM-DD")
            }
        }
    }
}

impl StdError for ValidationError {}

/// Data Store errors
#[derive(Debug)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    QueryExecution(String),
    ConnectionPool(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => {
                write!(f, "Duplicate entry: {}", msg)
            }
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::UnexpectedError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

/// Credential and token failures. Every variant maps to 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown email or wrong password; deliberately indistinguishable
    InvalidCredentials,
    MissingToken,
    MalformedToken,
    TokenExpired,
    TokenInvalid,
    TokenRevoked,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Incorrect email or password"),
            AuthError::MissingToken => {
                write!(f, "Authorization header ('Bearer token') not found")
            }
            AuthError::MalformedToken => write!(f, "Authorization header is malformed"),
            AuthError::TokenExpired => write!(f, "JWT token has expired"),
            AuthError::TokenInvalid => write!(f, "Invalid JWT token"),
            AuthError::TokenRevoked => write!(f, "JWT token has been revoked"),
        }
    }
}

impl StdError for AuthError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Auth(AuthError),
    /// Authenticated, but as somebody else
    Forbidden,
    Conflict(String),
    NotFound(String),
    Database(DatabaseError),
    Config(ConfigError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Forbidden => write!(f, "Forbidden"),
            AppError::Conflict(msg) => write!(f, "{}", msg),
            AppError::NotFound(msg) => write!(f, "{}", msg),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // 23505 = unique_violation
            if db_err.code().as_deref() == Some("23505") {
                return AppError::Database(DatabaseError::UniqueConstraintViolation(
                    db_err.message().to_string(),
                ));
            }
        }

        let error_msg = err.to_string();
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Database(DatabaseError::ConnectionPool(error_msg))
            }
            sqlx::Error::Database(_) | sqlx::Error::ColumnDecode { .. } => {
                AppError::Database(DatabaseError::QueryExecution(error_msg))
            }
            _ => AppError::Database(DatabaseError::UnexpectedError(error_msg)),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Blocking task failed: {}", err))
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Body of every error response
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Always `true`; lets clients branch on a single field
    pub error: bool,
    /// Human-readable error message, never internal detail
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self) -> (StatusCode, ErrorResponse) {
        let status = ResponseError::status_code(self);
        let message = match self {
            // Client-facing messages are the Display text
            AppError::Validation(_)
            | AppError::Auth(_)
            | AppError::Forbidden
            | AppError::Conflict(_)
            | AppError::NotFound(_) => self.to_string(),

            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                "User already exists".to_string()
            }
            AppError::Database(DatabaseError::ConnectionPool(_)) => {
                "Database service temporarily unavailable".to_string()
            }
            AppError::Database(_) => "Database error occurred".to_string(),
            AppError::Config(_) => "Server configuration error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        };

        (status, ErrorResponse::new(message))
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!(request_id = request_id, "Invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::Forbidden => {
                tracing::warn!(request_id = request_id, "Authorization error");
            }
            AppError::Conflict(_)
            | AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                tracing::warn!(request_id = request_id, error = %self, "Duplicate entry attempt");
            }
            AppError::NotFound(msg) => {
                tracing::debug!(request_id = request_id, error = %msg, "Not found");
            }
            AppError::Database(e) => {
                tracing::error!(request_id = request_id, error = %e, "Database error");
            }
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

/// Implement ResponseError for Actix-web integration
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, body) = <Self as ErrorHandler>::error_response(self);
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(e) => match e {
                DatabaseError::UniqueConstraintViolation(_) => StatusCode::CONFLICT,
                DatabaseError::ConnectionPool(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Per-operation context carried through a handler for log correlation
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub operation: &'static str,
}

impl ErrorContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation,
        }
    }

    /// Logs `error` with this context and hands it back for `?` / `map_err` chains
    pub fn record(&self, error: AppError) -> AppError {
        tracing::debug!(
            request_id = %self.request_id,
            operation = self.operation,
            error = %error,
            "Operation failed"
        );
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        assert_eq!(
            ValidationError::InvalidDate.to_string(),
            "Invalid input: dob must be a real date in format YYYY-MM-DD"
        );
        assert_eq!(
            ValidationError::InvalidFormat("email".to_string()).to_string(),
            "email has invalid format"
        );
    }

    #[test]
    fn test_app_error_conversion() {
        let app_err: AppError = AuthError::TokenRevoked.into();
        match app_err {
            AppError::Auth(AuthError::TokenRevoked) => (),
            _ => panic!("Expected Auth error"),
        }
    }

    #[test]
    fn test_status_codes() {
        let cases: Vec<(AppError, u16)> = vec![
            (ValidationError::InvalidDate.into(), 400),
            (AuthError::MissingToken.into(), 401),
            (AuthError::TokenExpired.into(), 401),
            (AuthError::InvalidCredentials.into(), 401),
            (AppError::Forbidden, 403),
            (AppError::NotFound("User not found".to_string()), 404),
            (AppError::Conflict("User already exists".to_string()), 409),
            (
                DatabaseError::UniqueConstraintViolation("users_email_key".to_string()).into(),
                409,
            ),
            (DatabaseError::ConnectionPool("timeout".to_string()).into(), 503),
            (AppError::Internal("boom".to_string()), 500),
        ];

        for (err, expected) in cases {
            assert_eq!(ResponseError::status_code(&err).as_u16(), expected, "{:?}", err);
        }
    }

    #[test]
    fn test_internal_detail_is_not_exposed() {
        let err = AppError::Internal("signing key was hunter2".to_string());
        let (_, body) = ErrorHandler::error_response(&err);

        assert!(body.error);
        assert_eq!(body.message, "Internal server error");
    }

    #[test]
    fn test_error_response_shape() {
        let (status, body) = ErrorHandler::error_response(&AppError::Forbidden);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json, serde_json::json!({"error": true, "message": "Forbidden"}));
    }
}

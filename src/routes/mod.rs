mod profile;
mod user;

pub use profile::{get_profile, update_profile};
pub use user::{login, logout, refresh, register};

use actix_web::{error::JsonPayloadError, HttpRequest, HttpResponse};

use crate::error::{AppError, ValidationError};

pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    HttpResponse::Ok().finish()
}

/// Fallback for unmatched routes, in the same `{error, message}` shape
pub async fn not_found() -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound("Not found".to_string()))
}

const CREDENTIALS_INVALID: &str = "Request body invalid: email and password must be strings only";
const LOGIN_INVALID: &str = "Request body invalid: email and password must be strings only, \
bearerExpiresInSeconds and refreshExpiresInSeconds must be integers and longExpiry a boolean";
const REFRESH_TOKEN_INVALID: &str = "Request body invalid: refreshToken must be a string";

/// `JsonConfig` error handler: unreadable JSON bodies become a plain 400
pub fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(path = %req.path(), error = %err, "Rejected request body");
    let message = invalid_body_message(req.path(), &err);
    AppError::Validation(ValidationError::InvalidBody(message.to_string())).into()
}

/// JSON that parsed but had wrong field types gets the route's field list;
/// anything else (not JSON, wrong content type, too large) the generic text.
fn invalid_body_message(path: &str, err: &JsonPayloadError) -> &'static str {
    let wrong_types = matches!(err, JsonPayloadError::Deserialize(e) if e.is_data());
    if !wrong_types {
        return profile::BODY_NOT_JSON;
    }

    match path {
        "/user/register" => CREDENTIALS_INVALID,
        "/user/login" => LOGIN_INVALID,
        "/user/refresh" | "/user/logout" => REFRESH_TOKEN_INVALID,
        _ => profile::BODY_NOT_JSON,
    }
}

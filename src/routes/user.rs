/// Authentication Routes
///
/// Registration, login, token refresh and logout. Body checks happen here;
/// everything else is delegated to the `SessionAuthority`.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::{LoginOptions, SessionAuthority};
use crate::error::{AppError, ErrorContext, ValidationError};

const CREDENTIALS_INCOMPLETE: &str = "Request body incomplete - email and password needed";
const REFRESH_TOKEN_INCOMPLETE: &str = "Request body incomplete, refresh token required";

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub long_expiry: bool,
    pub bearer_expires_in_seconds: Option<i64>,
    pub refresh_expires_in_seconds: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Both fields present and non-empty, or the route's "incomplete" error
fn credentials<'a>(
    email: &'a Option<String>,
    password: &'a Option<String>,
) -> Result<(&'a str, &'a str), ValidationError> {
    match (email.as_deref(), password.as_deref()) {
        (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
            Ok((email, password))
        }
        _ => Err(ValidationError::Incomplete(CREDENTIALS_INCOMPLETE)),
    }
}

fn refresh_token(form: &RefreshRequest) -> Result<&str, ValidationError> {
    form.refresh_token
        .as_deref()
        .filter(|token| !token.is_empty())
        .ok_or(ValidationError::Incomplete(REFRESH_TOKEN_INCOMPLETE))
}

/// POST /user/register
///
/// # Errors
/// - 400: email or password missing, or email has invalid format
/// - 409: email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    authority: web::Data<SessionAuthority>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");
    let (email, password) = credentials(&form.email, &form.password)?;

    authority
        .register(email, password)
        .await
        .map_err(|e| context.record(e))?;

    Ok(HttpResponse::Created().json(serde_json::json!({ "message": "User created" })))
}

/// POST /user/login
///
/// Returns a bearer/refresh pair. `bearerExpiresInSeconds` and
/// `refreshExpiresInSeconds` override the default lifetimes; `longExpiry`
/// sets both to a year in development only.
///
/// # Errors
/// - 400: email or password missing, or a non-positive lifetime
/// - 401: incorrect email or password (one message for both)
pub async fn login(
    form: web::Json<LoginRequest>,
    authority: web::Data<SessionAuthority>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");
    let (email, password) = credentials(&form.email, &form.password)?;

    let options = LoginOptions {
        long_expiry: form.long_expiry,
        bearer_expires_in: form.bearer_expires_in_seconds,
        refresh_expires_in: form.refresh_expires_in_seconds,
    };
    let pair = authority
        .login(email, password, options)
        .await
        .map_err(|e| context.record(e))?;

    Ok(HttpResponse::Ok().json(pair))
}

/// POST /user/refresh
///
/// Single-use rotation: the presented refresh token is revoked and a new
/// pair is issued for the same user.
///
/// # Errors
/// - 400: refresh token missing
/// - 401: refresh token malformed, invalid, expired or revoked
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    authority: web::Data<SessionAuthority>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");
    let token = refresh_token(&form)?;

    let pair = authority.refresh(token).await.map_err(|e| context.record(e))?;

    Ok(HttpResponse::Ok().json(pair))
}

/// POST /user/logout
///
/// # Errors
/// Same as `/user/refresh`
pub async fn logout(
    form: web::Json<RefreshRequest>,
    authority: web::Data<SessionAuthority>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_logout");
    let token = refresh_token(&form)?;

    authority.logout(token).await.map_err(|e| context.record(e))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "error": false,
        "message": "Token successfully invalidated",
    })))
}

/// Profile Routes
///
/// `GET` is public with owner-only fields; `PUT` is owner-only. Both run
/// behind the `AuthorizationGate` and branch on its verdict.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, ErrorContext, ValidationError};
use crate::middleware::AuthorizationVerdict;
use crate::store::{ProfileUpdate, UserRecord, UserStore};
use crate::validators::parse_dob;

const PROFILE_INCOMPLETE: &str = "Request body incomplete: firstName, lastName and dob are required";
const PROFILE_INVALID: &str =
    "Request body invalid: firstName, lastName, dob and address must be strings only";
pub(crate) const BODY_NOT_JSON: &str = "Request body invalid: expected a JSON object";

/// Fields only the owner sees
#[derive(Debug, Serialize)]
pub struct PrivateProfile {
    pub dob: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub private: Option<PrivateProfile>,
}

impl ProfileResponse {
    pub fn public(user: UserRecord) -> Self {
        Self {
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            private: None,
        }
    }

    pub fn full(user: UserRecord) -> Self {
        let private = PrivateProfile {
            dob: user.dob.map(|dob| dob.format("%Y-%m-%d").to_string()),
            address: user.address.clone(),
        };
        Self {
            private: Some(private),
            ..Self::public(user)
        }
    }
}

/// Raw body: values are checked by hand so that "missing" and "not a string"
/// get different messages.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    pub first_name: Option<Value>,
    pub last_name: Option<Value>,
    pub dob: Option<Value>,
    pub address: Option<Value>,
}

impl ProfileUpdateRequest {
    pub fn parse(body: &[u8]) -> Result<Self, ValidationError> {
        serde_json::from_slice(body)
            .map_err(|_| ValidationError::InvalidBody(BODY_NOT_JSON.to_string()))
    }

    pub fn validate(&self) -> Result<ProfileUpdate, ValidationError> {
        let fields = [&self.first_name, &self.last_name, &self.dob, &self.address];
        let wrong_type = fields
            .iter()
            .any(|field| matches!(field, Some(value) if !value.is_string() && !value.is_null()));
        if wrong_type {
            return Err(ValidationError::InvalidBody(PROFILE_INVALID.to_string()));
        }

        let (first_name, last_name, dob) = match (
            as_str(&self.first_name),
            as_str(&self.last_name),
            as_str(&self.dob),
        ) {
            (Some(first_name), Some(last_name), Some(dob)) => (first_name, last_name, dob),
            _ => return Err(ValidationError::Incomplete(PROFILE_INCOMPLETE)),
        };

        Ok(ProfileUpdate {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            dob: parse_dob(dob)?,
            address: as_str(&self.address).map(str::to_string),
        })
    }
}

fn as_str(field: &Option<Value>) -> Option<&str> {
    field.as_ref().and_then(Value::as_str)
}

/// GET /user/{email}/profile
///
/// Everyone gets `email`, `firstName` and `lastName`; the authenticated owner
/// also gets `dob` and `address`.
///
/// # Errors
/// - 401: a credential was sent and it is bad (handled by the gate)
/// - 404: no such user
pub async fn get_profile(
    path: web::Path<String>,
    verdict: web::ReqData<AuthorizationVerdict>,
    store: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let email = path.into_inner();

    let user = store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let body = if verdict.is_owner_of(&email) {
        ProfileResponse::full(user)
    } else {
        ProfileResponse::public(user)
    };

    Ok(HttpResponse::Ok().json(body))
}

/// PUT /user/{email}/profile
///
/// The body is read raw and parsed after the identity checks, so an
/// anonymous caller gets 401 even for a body that is not JSON.
///
/// # Errors
/// - 401: not authenticated
/// - 403: authenticated as a different user
/// - 400: incomplete body, non-string field, or `dob` not a real `YYYY-MM-DD` date
/// - 404: no such user
pub async fn update_profile(
    path: web::Path<String>,
    verdict: web::ReqData<AuthorizationVerdict>,
    body: web::Bytes,
    store: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("profile_update");
    let email = path.into_inner();

    let subject = verdict.require()?;
    if subject != email {
        tracing::warn!(
            request_id = %context.request_id,
            subject = %subject,
            target = %email,
            "Profile update for another user"
        );
        return Err(AppError::Forbidden);
    }

    let update = ProfileUpdateRequest::parse(&body)?.validate()?;
    let user = store
        .update_profile(&email, &update)
        .await
        .map_err(|e| context.record(e))?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tracing::info!(request_id = %context.request_id, email = %email, "Profile updated");
    Ok(HttpResponse::Ok().json(ProfileResponse::full(user)))
}

/// JWT Token Codec
///
/// Signs and verifies bearer/refresh claim sets with the shared HS256 secret.
/// Pure and stateless: no locks, no I/O.

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

use crate::auth::claims::{TokenClaims, TokenKind};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

lazy_static! {
    // header.payload.signature, each unpadded base64url
    static ref TOKEN_SHAPE: Regex =
        Regex::new(r"^[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+$").unwrap();
}

/// Why a token string failed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    /// Not three dot-separated base64url segments
    Malformed,
    /// Right shape, but not signed by us (or not decodable as our claims)
    BadSignature,
    /// Authentic, but `exp <= now`
    Expired,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyError::Malformed => write!(f, "token is malformed"),
            VerifyError::BadSignature => write!(f, "token signature is invalid"),
            VerifyError::Expired => write!(f, "token has expired"),
        }
    }
}

impl std::error::Error for VerifyError {}

impl From<VerifyError> for AuthError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Malformed => AuthError::MalformedToken,
            VerifyError::BadSignature => AuthError::TokenInvalid,
            VerifyError::Expired => AuthError::TokenExpired,
        }
    }
}

/// Returns true if `token` has the compact JWS shape
pub fn has_token_shape(token: &str) -> bool {
    TOKEN_SHAPE.is_match(token)
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(config: &JwtSettings) -> Self {
        Self::from_secret(config.secret.as_bytes(), &config.issuer)
    }

    pub fn from_secret(secret: &[u8], issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by hand after the signature, with no leeway
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.to_string(),
            validation,
        }
    }

    /// Issue a signed token for `subject` expiring `ttl_seconds` from now
    ///
    /// # Errors
    /// Returns error if signing fails
    pub fn issue(&self, subject: &str, kind: TokenKind, ttl_seconds: i64) -> Result<String, AppError> {
        self.issue_at(subject, kind, ttl_seconds, chrono::Utc::now().timestamp())
    }

    pub fn issue_at(
        &self,
        subject: &str,
        kind: TokenKind,
        ttl_seconds: i64,
        now: i64,
    ) -> Result<String, AppError> {
        let claims = TokenClaims::new(subject, kind, ttl_seconds, &self.issuer, now);

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Verify a token against the wall clock
    pub fn verify(&self, token: &str) -> Result<TokenClaims, VerifyError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    /// Verify shape, then signature and issuer, then expiry against `now`.
    /// No claim is looked at before the signature checks out.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<TokenClaims, VerifyError> {
        if !has_token_shape(token) {
            return Err(VerifyError::Malformed);
        }

        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("JWT validation error: {}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => VerifyError::Expired,
                    _ => VerifyError::BadSignature,
                }
            })?;

        if claims.is_expired_at(now) {
            return Err(VerifyError::Expired);
        }

        Ok(claims)
    }
}

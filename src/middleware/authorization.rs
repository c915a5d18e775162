/// Authorization Gate
///
/// Classifies the credential on every request to a gated route and attaches
/// exactly one `AuthorizationVerdict` to the request extensions. Handlers take
/// it as `web::ReqData<AuthorizationVerdict>` and match on it; nothing
/// downstream re-reads the header.
///
/// Requests with no bearer credential pass through as `Unauthenticated`, so
/// routes can still serve a public view. A credential that is present but bad
/// (malformed, expired, forged, revoked, wrong kind) is rejected here with 401.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderValue, AUTHORIZATION},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use lazy_static::lazy_static;
use regex::Regex;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::{RevocationLedger, TokenCodec, TokenKind, VerifyError};
use crate::error::{AppError, AuthError};

lazy_static! {
    static ref BEARER_SCHEME: Regex = Regex::new(r"^Bearer .").unwrap();
}

/// Credential state of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationVerdict {
    /// No `Authorization: Bearer ...` header
    Unauthenticated,
    /// Header present, token segment is not a JWT
    Malformed,
    Expired,
    Revoked,
    /// Bad signature, wrong issuer or wrong token kind
    Invalid,
    Authenticated { subject: String },
}

impl AuthorizationVerdict {
    pub fn subject(&self) -> Option<&str> {
        match self {
            AuthorizationVerdict::Authenticated { subject } => Some(subject),
            _ => None,
        }
    }

    /// True only for the authenticated owner of `email`
    pub fn is_owner_of(&self, email: &str) -> bool {
        self.subject() == Some(email)
    }

    /// The 401 this verdict produces on a route that requires authentication
    pub fn require(&self) -> Result<&str, AuthError> {
        match self {
            AuthorizationVerdict::Authenticated { subject } => Ok(subject),
            AuthorizationVerdict::Unauthenticated => Err(AuthError::MissingToken),
            AuthorizationVerdict::Malformed => Err(AuthError::MalformedToken),
            AuthorizationVerdict::Expired => Err(AuthError::TokenExpired),
            AuthorizationVerdict::Revoked => Err(AuthError::TokenRevoked),
            AuthorizationVerdict::Invalid => Err(AuthError::TokenInvalid),
        }
    }

    /// The 401 the gate answers with before any handler runs, if any
    pub fn rejection(&self) -> Option<AuthError> {
        match self {
            AuthorizationVerdict::Unauthenticated | AuthorizationVerdict::Authenticated { .. } => {
                None
            }
            other => other.require().err(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AuthorizationVerdict::Unauthenticated => "unauthenticated",
            AuthorizationVerdict::Malformed => "malformed",
            AuthorizationVerdict::Expired => "expired",
            AuthorizationVerdict::Revoked => "revoked",
            AuthorizationVerdict::Invalid => "invalid",
            AuthorizationVerdict::Authenticated { .. } => "authenticated",
        }
    }
}

/// Classify a raw `Authorization` header value
pub fn classify(
    header: Option<&HeaderValue>,
    codec: &TokenCodec,
    ledger: &RevocationLedger,
) -> AuthorizationVerdict {
    let header = match header {
        None => return AuthorizationVerdict::Unauthenticated,
        Some(value) => match value.to_str() {
            Ok(value) => value,
            Err(_) => return AuthorizationVerdict::Malformed,
        },
    };

    if !BEARER_SCHEME.is_match(header) {
        return AuthorizationVerdict::Unauthenticated;
    }
    let token = &header["Bearer ".len()..];

    let claims = match codec.verify(token) {
        Ok(claims) => claims,
        Err(VerifyError::Malformed) => return AuthorizationVerdict::Malformed,
        Err(VerifyError::Expired) => return AuthorizationVerdict::Expired,
        Err(VerifyError::BadSignature) => return AuthorizationVerdict::Invalid,
    };

    if claims.kind != TokenKind::Bearer {
        return AuthorizationVerdict::Invalid;
    }
    if ledger.is_revoked(token) {
        return AuthorizationVerdict::Revoked;
    }

    AuthorizationVerdict::Authenticated { subject: claims.sub }
}

/// Gate middleware, wrapped around routes that read the caller's identity
#[derive(Clone)]
pub struct AuthorizationGate {
    codec: TokenCodec,
    ledger: Arc<RevocationLedger>,
}

impl AuthorizationGate {
    pub fn new(codec: TokenCodec, ledger: Arc<RevocationLedger>) -> Self {
        Self { codec, ledger }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthorizationGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthorizationGateService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthorizationGateService {
            service: Rc::new(service),
            gate: self.clone(),
        }))
    }
}

pub struct AuthorizationGateService<S> {
    service: Rc<S>,
    gate: AuthorizationGate,
}

impl<S, B> Service<ServiceRequest> for AuthorizationGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let verdict = classify(
            req.headers().get(AUTHORIZATION),
            &self.gate.codec,
            &self.gate.ledger,
        );

        if let Some(rejection) = verdict.rejection() {
            tracing::warn!(
                verdict = verdict.label(),
                path = %req.path(),
                "Rejected request credential"
            );
            return Box::pin(async move { Err(AppError::Auth(rejection).into()) });
        }

        tracing::debug!(
            verdict = verdict.label(),
            subject = verdict.subject().unwrap_or("-"),
            "Classified request credential"
        );
        req.extensions_mut().insert(verdict);

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key-at-least-32-characters-long";

    fn fixtures() -> (TokenCodec, RevocationLedger) {
        (TokenCodec::from_secret(SECRET, "test"), RevocationLedger::new())
    }

    fn header(value: &str) -> HeaderValue {
        HeaderValue::from_str(value).unwrap()
    }

    #[test]
    fn test_missing_or_foreign_scheme_is_unauthenticated() {
        let (codec, ledger) = fixtures();

        assert_eq!(classify(None, &codec, &ledger), AuthorizationVerdict::Unauthenticated);
        for value in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer ", "bearer abc.def.ghi"] {
            assert_eq!(
                classify(Some(&header(value)), &codec, &ledger),
                AuthorizationVerdict::Unauthenticated,
                "{:?}",
                value
            );
        }
    }

    #[test]
    fn test_malformed_token() {
        let (codec, ledger) = fixtures();

        for value in ["Bearer abc", "Bearer a.b", "Bearer  a.b.c", "Bearer a.b.c.d"] {
            assert_eq!(
                classify(Some(&header(value)), &codec, &ledger),
                AuthorizationVerdict::Malformed,
                "{:?}",
                value
            );
        }
    }

    #[test]
    fn test_non_utf8_header_is_malformed() {
        let (codec, ledger) = fixtures();
        let value = HeaderValue::from_bytes(b"Bearer \xff\xfe").unwrap();

        assert_eq!(classify(Some(&value), &codec, &ledger), AuthorizationVerdict::Malformed);
    }

    #[test]
    fn test_expired_token() {
        let (codec, ledger) = fixtures();
        let token = codec.issue_at("a@x.com", TokenKind::Bearer, 10, 1_000).unwrap();

        assert_eq!(
            classify(Some(&header(&format!("Bearer {}", token))), &codec, &ledger),
            AuthorizationVerdict::Expired
        );
    }

    #[test]
    fn test_forged_token_is_invalid() {
        let (codec, ledger) = fixtures();
        let token = TokenCodec::from_secret(b"other-secret", "test")
            .issue("a@x.com", TokenKind::Bearer, 600)
            .unwrap();

        assert_eq!(
            classify(Some(&header(&format!("Bearer {}", token))), &codec, &ledger),
            AuthorizationVerdict::Invalid
        );
    }

    #[test]
    fn test_refresh_token_is_not_a_bearer_credential() {
        let (codec, ledger) = fixtures();
        let token = codec.issue("a@x.com", TokenKind::Refresh, 600).unwrap();

        assert_eq!(
            classify(Some(&header(&format!("Bearer {}", token))), &codec, &ledger),
            AuthorizationVerdict::Invalid
        );
    }

    #[test]
    fn test_revoked_token() {
        let (codec, ledger) = fixtures();
        let token = codec.issue("a@x.com", TokenKind::Bearer, 600).unwrap();
        ledger.revoke(&token, chrono::Utc::now().timestamp() + 600);

        assert_eq!(
            classify(Some(&header(&format!("Bearer {}", token))), &codec, &ledger),
            AuthorizationVerdict::Revoked
        );
    }

    #[test]
    fn test_authenticated() {
        let (codec, ledger) = fixtures();
        let token = codec.issue("a@x.com", TokenKind::Bearer, 600).unwrap();
        let verdict = classify(Some(&header(&format!("Bearer {}", token))), &codec, &ledger);

        assert_eq!(
            verdict,
            AuthorizationVerdict::Authenticated {
                subject: "a@x.com".to_string()
            }
        );
        assert!(verdict.is_owner_of("a@x.com"));
        assert!(!verdict.is_owner_of("b@x.com"));
        assert_eq!(verdict.require(), Ok("a@x.com"));
        assert_eq!(verdict.rejection(), None);
    }

    #[test]
    fn test_rejections() {
        assert_eq!(AuthorizationVerdict::Unauthenticated.rejection(), None);
        assert_eq!(
            AuthorizationVerdict::Unauthenticated.require(),
            Err(AuthError::MissingToken)
        );
        assert_eq!(
            AuthorizationVerdict::Malformed.rejection(),
            Some(AuthError::MalformedToken)
        );
        assert_eq!(
            AuthorizationVerdict::Expired.rejection(),
            Some(AuthError::TokenExpired)
        );
        assert_eq!(
            AuthorizationVerdict::Revoked.rejection(),
            Some(AuthError::TokenRevoked)
        );
        assert_eq!(
            AuthorizationVerdict::Invalid.rejection(),
            Some(AuthError::TokenInvalid)
        );
    }
}

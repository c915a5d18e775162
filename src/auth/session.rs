/// Session Authority
///
/// Orchestrates registration, login, refresh and logout over the Token Codec,
/// the Revocation Ledger and the user store. Credential state is never stored;
/// it is rederived from the presented token on every call:
///
/// - refresh: verify → must be a Refresh token → burn it in the ledger → issue a new pair
/// - logout:  verify → must be a Refresh token → burn it in the ledger
///
/// Burning uses `RevocationLedger::claim`, so one refresh token yields at most
/// one successor pair even under concurrent presentation.

use std::sync::Arc;

use serde::Serialize;

use crate::auth::claims::{TokenClaims, TokenKind};
use crate::auth::jwt::TokenCodec;
use crate::auth::password::{
    hash_password_blocking, verify_dummy_blocking, verify_password_blocking,
};
use crate::auth::revocation::RevocationLedger;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, DatabaseError, ValidationError};
use crate::store::UserStore;
use crate::validators::is_valid_email;

/// Token lifetimes, in seconds
#[derive(Debug, Clone, Copy)]
pub struct TokenPolicy {
    pub bearer_ttl: i64,
    pub refresh_ttl: i64,
    pub long_expiry_ttl: i64,
    /// `longExpiry` is a development convenience; production ignores it
    pub allow_long_expiry: bool,
}

impl TokenPolicy {
    pub fn from_settings(config: &JwtSettings, allow_long_expiry: bool) -> Self {
        Self {
            bearer_ttl: config.bearer_token_expiry,
            refresh_ttl: config.refresh_token_expiry,
            long_expiry_ttl: config.long_expiry,
            allow_long_expiry,
        }
    }
}

/// Per-call lifetime overrides accepted by login
#[derive(Debug, Clone, Copy, Default)]
pub struct LoginOptions {
    pub long_expiry: bool,
    pub bearer_expires_in: Option<i64>,
    pub refresh_expires_in: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Response body of login and refresh
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedTokenPair {
    pub bearer_token: IssuedToken,
    pub refresh_token: IssuedToken,
}

pub struct SessionAuthority {
    store: Arc<dyn UserStore>,
    codec: TokenCodec,
    ledger: Arc<RevocationLedger>,
    policy: TokenPolicy,
}

impl SessionAuthority {
    pub fn new(
        store: Arc<dyn UserStore>,
        codec: TokenCodec,
        ledger: Arc<RevocationLedger>,
        policy: TokenPolicy,
    ) -> Self {
        Self {
            store,
            codec,
            ledger,
            policy,
        }
    }

    /// Create a credential for `email`.
    ///
    /// # Errors
    /// - 400: invalid email or over-long password
    /// - 409: email already registered (pre-check or store uniqueness violation)
    pub async fn register(&self, email: &str, password: &str) -> Result<(), AppError> {
        let email = is_valid_email(email)?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(user_exists());
        }

        let password_hash = hash_password_blocking(password.to_string()).await?;

        // Two racing registrations can both pass the pre-check; the store decides
        match self.store.insert_user(&email, &password_hash).await {
            Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_))) => {
                Err(user_exists())
            }
            other => other,
        }?;

        tracing::info!(email = %email, "User registered successfully");
        Ok(())
    }

    /// Verify credentials and issue a fresh pair.
    ///
    /// # Errors
    /// - 400: non-positive TTL override
    /// - 401: unknown email or wrong password (same error for both)
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        options: LoginOptions,
    ) -> Result<IssuedTokenPair, AppError> {
        let (bearer_ttl, refresh_ttl) = self.resolve_ttls(options)?;

        let user = match self.store.find_user_by_email(email.trim()).await? {
            Some(user) => user,
            None => {
                // Same bcrypt cost as a real mismatch
                verify_dummy_blocking(password.to_string()).await?;
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let matches =
            verify_password_blocking(password.to_string(), user.password_hash.clone()).await?;
        if !matches {
            return Err(AuthError::InvalidCredentials.into());
        }

        let pair = self.issue_pair(&user.email, bearer_ttl, refresh_ttl)?;
        tracing::info!(email = %user.email, "User logged in successfully");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair; the presented token is burned.
    ///
    /// # Errors
    /// 401 if the token is malformed, forged, expired, not a refresh token, or already revoked
    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedTokenPair, AppError> {
        let claims = self.redeem(refresh_token)?;

        let pair = self.issue_pair(&claims.sub, self.policy.bearer_ttl, self.policy.refresh_ttl)?;
        tracing::info!(email = %claims.sub, "Token refreshed successfully");
        Ok(pair)
    }

    /// Revoke a refresh token. Issues nothing.
    ///
    /// # Errors
    /// Same as `refresh`
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        let claims = self.redeem(refresh_token)?;

        tracing::info!(email = %claims.sub, "User logged out");
        Ok(())
    }

    /// Verify a presented refresh token and revoke it until its natural expiry.
    /// Signature and expiry are checked before the ledger is consulted.
    fn redeem(&self, refresh_token: &str) -> Result<TokenClaims, AuthError> {
        let claims = self.codec.verify(refresh_token)?;

        if claims.kind != TokenKind::Refresh {
            tracing::warn!(email = %claims.sub, "Bearer token presented as refresh token");
            return Err(AuthError::TokenInvalid);
        }

        if !self.ledger.claim(refresh_token, claims.exp) {
            tracing::warn!(email = %claims.sub, "Attempt to use revoked refresh token");
            return Err(AuthError::TokenRevoked);
        }

        Ok(claims)
    }

    fn resolve_ttls(&self, options: LoginOptions) -> Result<(i64, i64), AppError> {
        if options.long_expiry {
            if self.policy.allow_long_expiry {
                return Ok((self.policy.long_expiry_ttl, self.policy.long_expiry_ttl));
            }
            tracing::warn!("longExpiry requested outside development; ignoring");
        }

        let bearer_ttl = options.bearer_expires_in.unwrap_or(self.policy.bearer_ttl);
        let refresh_ttl = options.refresh_expires_in.unwrap_or(self.policy.refresh_ttl);
        if bearer_ttl <= 0 || refresh_ttl <= 0 {
            return Err(ValidationError::InvalidBody(
                "Invalid input: bearerExpiresInSeconds and refreshExpiresInSeconds must be positive"
                    .to_string(),
            )
            .into());
        }
        // Overrides never outlive the long-expiry ceiling
        let ceiling = self.policy.long_expiry_ttl;
        let over_ceiling = [options.bearer_expires_in, options.refresh_expires_in]
            .iter()
            .any(|ttl| matches!(ttl, Some(ttl) if *ttl > ceiling));
        if over_ceiling {
            return Err(ValidationError::InvalidBody(format!(
                "Invalid input: bearerExpiresInSeconds and refreshExpiresInSeconds must not exceed {}",
                ceiling
            ))
            .into());
        }

        Ok((bearer_ttl, refresh_ttl))
    }

    fn issue_pair(
        &self,
        subject: &str,
        bearer_ttl: i64,
        refresh_ttl: i64,
    ) -> Result<IssuedTokenPair, AppError> {
        Ok(IssuedTokenPair {
            bearer_token: IssuedToken {
                token: self.codec.issue(subject, TokenKind::Bearer, bearer_ttl)?,
                token_type: TokenKind::Bearer.as_str(),
                expires_in: bearer_ttl,
            },
            refresh_token: IssuedToken {
                token: self.codec.issue(subject, TokenKind::Refresh, refresh_ttl)?,
                token_type: TokenKind::Refresh.as_str(),
                expires_in: refresh_ttl,
            },
        })
    }
}

fn user_exists() -> AppError {
    AppError::Conflict("User already exists".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryUserStore, ProfileUpdate, UserRecord};
    use async_trait::async_trait;

    /// Loses every registration race: the lookup misses, the insert collides
    struct RacingStore;

    #[async_trait]
    impl UserStore for RacingStore {
        async fn find_user_by_email(&self, _email: &str) -> Result<Option<UserRecord>, AppError> {
            Ok(None)
        }

        async fn insert_user(&self, email: &str, _password_hash: &str) -> Result<(), AppError> {
            Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                format!("users.email = {}", email),
            )))
        }

        async fn update_profile(
            &self,
            _email: &str,
            _update: &ProfileUpdate,
        ) -> Result<Option<UserRecord>, AppError> {
            Ok(None)
        }
    }

    const SECRET: &[u8] = b"test-secret-key-at-least-32-characters-long";

    fn policy(allow_long_expiry: bool) -> TokenPolicy {
        TokenPolicy {
            bearer_ttl: 600,
            refresh_ttl: 86400,
            long_expiry_ttl: 31_536_000,
            allow_long_expiry,
        }
    }

    fn authority_with(allow_long_expiry: bool) -> (SessionAuthority, Arc<RevocationLedger>) {
        let ledger = Arc::new(RevocationLedger::new());
        let authority = SessionAuthority::new(
            Arc::new(InMemoryUserStore::new()),
            TokenCodec::from_secret(SECRET, "test"),
            ledger.clone(),
            policy(allow_long_expiry),
        );
        (authority, ledger)
    }

    async fn logged_in(authority: &SessionAuthority) -> IssuedTokenPair {
        authority.register("m@x.com", "pw").await.unwrap();
        authority
            .login("m@x.com", "pw", LoginOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_then_duplicate_conflicts() {
        let (authority, _) = authority_with(false);

        authority.register("m@x.com", "pw").await.unwrap();
        let err = authority.register("m@x.com", "other").await.unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_store_uniqueness_violation_is_a_conflict() {
        let authority = SessionAuthority::new(
            Arc::new(RacingStore),
            TokenCodec::from_secret(SECRET, "test"),
            Arc::new(RevocationLedger::new()),
            policy(false),
        );

        let err = authority.register("m@x.com", "pw").await.unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.to_string(), "User already exists");
    }

    #[tokio::test]
    async fn test_concurrent_registrations_create_one_user() {
        let (authority, _) = authority_with(false);
        let authority = Arc::new(authority);

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let authority = authority.clone();
                tokio::spawn(async move { authority.register("m@x.com", "pw").await })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => created += 1,
                Err(err) => assert!(matches!(err, AppError::Conflict(_)), "{:?}", err),
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_email() {
        let (authority, _) = authority_with(false);
        let err = authority.register("not-an-email", "pw").await.unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_login_issues_verifiable_pair() {
        let (authority, _) = authority_with(false);
        let pair = logged_in(&authority).await;
        let codec = TokenCodec::from_secret(SECRET, "test");

        assert_eq!(pair.bearer_token.token_type, "Bearer");
        assert_eq!(pair.bearer_token.expires_in, 600);
        assert_eq!(pair.refresh_token.token_type, "Refresh");
        assert_eq!(pair.refresh_token.expires_in, 86400);

        let bearer = codec.verify(&pair.bearer_token.token).unwrap();
        let refresh = codec.verify(&pair.refresh_token.token).unwrap();
        assert_eq!(bearer.sub, "m@x.com");
        assert_eq!(bearer.kind, TokenKind::Bearer);
        assert_eq!(refresh.kind, TokenKind::Refresh);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (authority, _) = authority_with(false);
        authority.register("m@x.com", "pw").await.unwrap();

        let wrong_password = authority
            .login("m@x.com", "nope", LoginOptions::default())
            .await
            .unwrap_err();
        let unknown_email = authority
            .login("who@x.com", "pw", LoginOptions::default())
            .await
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert!(matches!(wrong_password, AppError::Auth(AuthError::InvalidCredentials)));
        assert!(matches!(unknown_email, AppError::Auth(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_ttl_overrides() {
        let (authority, _) = authority_with(false);
        authority.register("m@x.com", "pw").await.unwrap();

        let pair = authority
            .login(
                "m@x.com",
                "pw",
                LoginOptions {
                    bearer_expires_in: Some(30),
                    refresh_expires_in: Some(60),
                    ..LoginOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(pair.bearer_token.expires_in, 30);
        assert_eq!(pair.refresh_token.expires_in, 60);

        let err = authority
            .login(
                "m@x.com",
                "pw",
                LoginOptions {
                    bearer_expires_in: Some(0),
                    ..LoginOptions::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_login_rejects_lifetimes_past_the_ceiling() {
        let (authority, _) = authority_with(false);
        authority.register("m@x.com", "pw").await.unwrap();

        for options in [
            LoginOptions {
                bearer_expires_in: Some(i64::MAX),
                ..LoginOptions::default()
            },
            LoginOptions {
                refresh_expires_in: Some(31_536_001),
                ..LoginOptions::default()
            },
        ] {
            let err = authority.login("m@x.com", "pw", options).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(ValidationError::InvalidBody(_))));
        }

        let pair = authority
            .login(
                "m@x.com",
                "pw",
                LoginOptions {
                    refresh_expires_in: Some(31_536_000),
                    ..LoginOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(pair.refresh_token.expires_in, 31_536_000);
    }

    #[tokio::test]
    async fn test_long_expiry_only_when_allowed() {
        let long = LoginOptions {
            long_expiry: true,
            ..LoginOptions::default()
        };

        let (dev, _) = authority_with(true);
        dev.register("m@x.com", "pw").await.unwrap();
        let pair = dev.login("m@x.com", "pw", long).await.unwrap();
        assert_eq!(pair.bearer_token.expires_in, 31_536_000);
        assert_eq!(pair.refresh_token.expires_in, 31_536_000);

        let (prod, _) = authority_with(false);
        prod.register("m@x.com", "pw").await.unwrap();
        let pair = prod.login("m@x.com", "pw", long).await.unwrap();
        assert_eq!(pair.bearer_token.expires_in, 600);
        assert_eq!(pair.refresh_token.expires_in, 86400);
    }

    #[tokio::test]
    async fn test_refresh_is_single_use() {
        let (authority, ledger) = authority_with(false);
        let pair = logged_in(&authority).await;
        let presented = pair.refresh_token.token;

        let next = authority.refresh(&presented).await.unwrap();
        assert_ne!(next.refresh_token.token, presented);
        assert!(ledger.is_revoked(&presented));

        let err = authority.refresh(&presented).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenRevoked)));

        // The successor is still good
        authority.refresh(&next.refresh_token.token).await.unwrap();
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh_token() {
        let (authority, ledger) = authority_with(false);
        let pair = logged_in(&authority).await;
        let token = pair.refresh_token.token;

        authority.logout(&token).await.unwrap();
        assert!(ledger.is_revoked(&token));
        assert_eq!(ledger.len(), 1);

        let err = authority.logout(&token).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenRevoked)));
        assert!(matches!(
            authority.refresh(&token).await.unwrap_err(),
            AppError::Auth(AuthError::TokenRevoked)
        ));
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_bearer_token_cannot_refresh() {
        let (authority, ledger) = authority_with(false);
        let pair = logged_in(&authority).await;

        let err = authority.refresh(&pair.bearer_token.token).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenInvalid)));
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_classifies_bad_tokens() {
        let (authority, ledger) = authority_with(false);
        let codec = TokenCodec::from_secret(SECRET, "test");
        let forged = TokenCodec::from_secret(b"someone-else", "test")
            .issue("m@x.com", TokenKind::Refresh, 600)
            .unwrap();
        let expired = codec
            .issue_at("m@x.com", TokenKind::Refresh, 10, 1_000)
            .unwrap();

        let cases = [
            ("garbage", AuthError::MalformedToken),
            (forged.as_str(), AuthError::TokenInvalid),
            (expired.as_str(), AuthError::TokenExpired),
        ];
        for (token, expected) in cases {
            match authority.refresh(token).await {
                Err(AppError::Auth(actual)) => assert_eq!(actual, expected),
                other => panic!("expected {:?}, got {:?}", expected, other.map(|_| ())),
            }
        }

        // Nothing unverified ever reaches the ledger
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_refresh_yields_one_successor() {
        let (authority, _) = authority_with(false);
        let authority = Arc::new(authority);
        let presented = logged_in(&authority).await.refresh_token.token;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let authority = authority.clone();
                let presented = presented.clone();
                tokio::spawn(async move { authority.refresh(&presented).await.is_ok() })
            })
            .collect();

        let mut successes = 0;
        for task in tasks {
            if task.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}

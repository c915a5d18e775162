/// JWT Claims structure
///
/// The payload signed into every bearer and refresh token. Claims are never
/// stored; they are rebuilt by verification.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which half of an issued pair a token is
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Bearer,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Bearer => "Bearer",
            TokenKind::Refresh => "Refresh",
        }
    }
}

/// JWT Claims for both token kinds
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// Subject (user email)
    pub sub: String,
    pub kind: TokenKind,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
    /// Token id; keeps two tokens minted in the same second distinct
    pub jti: String,
}

impl TokenClaims {
    /// Create claims for `subject` valid for `ttl_seconds` after `now`
    pub fn new(subject: &str, kind: TokenKind, ttl_seconds: i64, issuer: &str, now: i64) -> Self {
        Self {
            sub: subject.to_string(),
            kind,
            exp: now.saturating_add(ttl_seconds),
            iat: now,
            iss: issuer.to_string(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Strict: a token is expired at the exact second of `exp`
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp <= now
    }
}

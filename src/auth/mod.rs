/// Authentication module
///
/// Token signing/verification, password hashing, refresh token revocation,
/// and the session operations built on them.

mod claims;
mod jwt;
mod password;
mod revocation;
mod session;

pub use claims::{TokenClaims, TokenKind};
pub use jwt::{has_token_shape, TokenCodec, VerifyError};
pub use password::{hash_password, verify_password};
pub use revocation::{spawn_sweeper, RevocationLedger, SweeperHandle};
pub use session::{IssuedToken, IssuedTokenPair, LoginOptions, SessionAuthority, TokenPolicy};

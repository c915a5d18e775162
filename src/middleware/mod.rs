/// Middleware module
///
/// Request-boundary credential classification.

mod authorization;

pub use authorization::{classify, AuthorizationGate, AuthorizationVerdict};

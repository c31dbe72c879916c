//! Authentication: credential verification and the session gate.

pub mod gate;
pub mod handlers;
pub mod password;
pub mod verifier;

pub use gate::{AuthAttempt, AuthUser, FailureContext, FailureHandler, GateState, RedirectToLogin};
pub use handlers::*;
pub use verifier::{AuthError, PasswordVerifier, Strategy, UserIdentity, Verifier};

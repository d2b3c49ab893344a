//! Authentication and authorization for the complaint desk
//!
//! # Credentials
//!
//! - **Citizens** log in with email and password, after registering through
//!   an emailed one-time passcode.
//! - **Officers** log in with their badge id (`off_id`) and password.
//!
//! Both receive an HS256 JWT whose claims carry `sub`, `role` and `name`.
//! Passwords and passcodes are stored as Argon2id PHC strings.
//!
//! # Authorization Model
//!
//! Every route declares a [`Requirement`]; [`authorize`] turns the caller's
//! role into [`Access::Allowed`], [`Access::Unauthenticated`] (401) or
//! [`Access::Forbidden`] (403). Ownership and assignment checks are made
//! by the handlers on top of that.
//!
//! # Configuration
//!
//! - `JWT_SECRET`: HMAC secret for signing and validation (required)
//! - `JWT_ISSUER`: issuer claim (default `civic-desk`)
//! - `JWT_TTL_MINUTES`: session lifetime (default 1440)
//! - `OTP_TTL_MINUTES`: passcode lifetime (default 5)

mod guard;
mod jwt;
mod middleware;
mod otp;
mod password;

pub use guard::*;
pub use jwt::*;
pub use middleware::*;
pub use otp::*;
pub use password::*;

use crate::domain::{Principal, Role};

/// Authentication context extracted from request
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    /// Authenticated account
    pub principal: Principal,

    /// Display name from the token, if present
    pub name: Option<String>,

    /// Email from the token, if present
    pub email: Option<String>,
}

impl AuthContext {
    pub fn role(&self) -> Role {
        self.principal.role()
    }

    /// Access decision for this caller.
    pub fn access(&self, required: Requirement) -> Access {
        authorize(required, Some(self.role()))
    }
}

/// Authentication error
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing authentication")]
    MissingAuth,

    #[error("invalid JWT: {0}")]
    InvalidJwt(String),

    #[error("token expired")]
    TokenExpired,

    #[error("insufficient permissions")]
    InsufficientPermissions,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("hashing failed: {0}")]
    Hashing(String),
}

//! Authorization helper functions for REST API handlers.

use crate::api::error::{forbidden, unauthorized, ApiError};
use crate::auth::{Access, AuthContext, Requirement};
use crate::domain::{OfficerId, UserId};

/// Ensure the caller's role satisfies `required`.
pub fn ensure_role(auth: &AuthContext, required: Requirement) -> Result<(), ApiError> {
    match auth.access(required) {
        Access::Allowed => Ok(()),
        Access::Unauthenticated => Err(unauthorized("Authentication required")),
        Access::Forbidden => Err(forbidden("Access denied")),
    }
}

/// Ensure the caller is a citizen and return their id.
pub fn ensure_citizen(auth: &AuthContext) -> Result<UserId, ApiError> {
    ensure_role(auth, Requirement::CITIZEN)?;
    auth.principal
        .citizen_id()
        .ok_or_else(|| forbidden("Access denied"))
}

/// Ensure the caller is an officer and return their id.
pub fn ensure_officer(auth: &AuthContext) -> Result<OfficerId, ApiError> {
    ensure_role(auth, Requirement::OFFICER)?;
    auth.principal
        .officer_id()
        .cloned()
        .ok_or_else(|| forbidden("Access denied"))
}

//! Authentication middleware for Axum
//!
//! Validates the bearer token and attaches the caller's [`AuthContext`] to
//! the request. Role checks happen in the handlers.

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::{AuthContext, AuthError, JwtValidator};
use crate::api::ApiError;

/// Auth context extension for request
#[derive(Clone)]
pub struct AuthContextExt(pub AuthContext);

/// Authentication middleware state.
#[derive(Clone)]
pub struct AuthMiddlewareState {
    pub jwt: Arc<JwtValidator>,
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingAuth)?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or(AuthError::MissingAuth)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::MissingAuth);
    }
    Ok(token)
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let context = match bearer_token(auth_header).and_then(|token| state.jwt.validate(token)) {
        Ok(context) => context,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected request authentication");
            return ApiError::from(e).into_response();
        }
    };

    request.extensions_mut().insert(AuthContextExt(context));
    next.run(request).await
}

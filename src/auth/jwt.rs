//! JWT authentication
//!
//! HS256 tokens carrying the caller's id, role and display name.

use super::{AuthContext, AuthError};
use crate::domain::{Principal, Role};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims for desk sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (citizen row id or officer id)
    pub sub: String,

    /// Account role
    pub role: Role,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Email, when known
    #[serde(default)]
    pub email: Option<String>,

    /// Issuer
    pub iss: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// JWT ID
    pub jti: String,
}

/// JWT validator and issuer
pub struct JwtValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl JwtValidator {
    /// Create a new JWT validator with a secret key
    pub fn new(secret: &[u8], issuer: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.to_string(),
            ttl,
        }
    }

    /// Issue a session token
    pub fn issue(
        &self,
        principal: &Principal,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: principal.subject(),
            role: principal.role(),
            name: name.map(str::to_string),
            email: email.map(str::to_string),
            iss: self.issuer.clone(),
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidJwt(e.to_string()))
    }

    /// Validate a token and return the caller's context
    pub fn validate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidJwt(e.to_string()),
            }
        })?;

        let claims = token_data.claims;
        let principal = Principal::from_parts(claims.role, &claims.sub)
            .ok_or_else(|| AuthError::InvalidJwt("invalid subject".to_string()))?;

        Ok(AuthContext {
            principal,
            name: claims.name,
            email: claims.email,
        })
    }
}

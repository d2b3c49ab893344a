//! Session context for the client
//!
//! The bearer token lives in a [`TokenStore`]. [`SessionContext`] decodes its
//! payload once, without checking the signature, to know who is signed in
//! for display and route gating. The server remains the authority on every
//! request.

use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;

use crate::auth::{authorize, Access, Requirement};
use crate::domain::{Principal, Role};

/// Holds the bearer token between runs.
#[cfg_attr(test, automock)]
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, token: &str);
    fn clear(&self);
}

/// Process-local token store.
#[derive(Debug, Default, Clone)]
pub struct MemoryTokenStore {
    token: Arc<Mutex<Option<String>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(Mutex::new(Some(token.into()))),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    fn save(&self, token: &str) {
        if let Ok(mut slot) = self.token.lock() {
            *slot = Some(token.to_string());
        }
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.token.lock() {
            *slot = None;
        }
    }
}

/// Claims read from the token payload. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct UnverifiedClaims {
    sub: String,
    role: Role,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

/// Who the stored token says is signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub principal: Principal,
    pub display_name: String,
}

impl Identity {
    pub fn role(&self) -> Role {
        self.principal.role()
    }
}

/// Decode a token's payload. Anything malformed, expired or carrying an
/// unusable subject yields `None`.
pub fn decode_identity(token: &str, now: DateTime<Utc>) -> Option<Identity> {
    let mut parts = token.trim().split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| URL_SAFE.decode(payload))
        .ok()?;
    let claims: UnverifiedClaims = serde_json::from_slice(&bytes).ok()?;

    if claims.exp.is_some_and(|exp| exp <= now.timestamp()) {
        return None;
    }

    let principal = Principal::from_parts(claims.role, &claims.sub)?;
    let display_name = claims
        .name
        .filter(|n| !n.trim().is_empty())
        .or(claims.email.filter(|e| !e.trim().is_empty()))
        .unwrap_or_else(|| match claims.role {
            Role::Citizen => "Citizen".to_string(),
            Role::Officer => "Officer".to_string(),
        });

    Some(Identity {
        principal,
        display_name,
    })
}

/// Session state built once at startup and handed to every view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    token: Option<String>,
    identity: Option<Identity>,
}

impl SessionContext {
    /// Anonymous session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Read the stored token. An unreadable token is cleared from the store.
    pub fn from_store(store: &dyn TokenStore, now: DateTime<Utc>) -> Self {
        let Some(token) = store.load() else {
            return Self::anonymous();
        };
        match decode_identity(&token, now) {
            Some(identity) => Self {
                token: Some(token),
                identity: Some(identity),
            },
            None => {
                store.clear();
                Self::anonymous()
            }
        }
    }

    /// Persist a freshly issued token and switch to it.
    pub fn sign_in(store: &dyn TokenStore, token: &str, now: DateTime<Utc>) -> Self {
        store.save(token);
        Self::from_store(store, now)
    }

    pub fn sign_out(store: &dyn TokenStore) -> Self {
        store.clear();
        Self::anonymous()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.identity.as_ref().map(Identity::role)
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.display_name.as_str())
    }

    /// Token to attach as `Authorization: Bearer`.
    pub fn bearer(&self) -> Option<&str> {
        self.identity.as_ref().and(self.token.as_deref())
    }

    pub fn access(&self, required: Requirement) -> Access {
        authorize(required, self.role())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtValidator;
    use crate::domain::{OfficerId, UserId};
    use chrono::Duration;

    fn encode_payload(json: &str) -> String {
        format!("eyJhbGciOiJIUzI1NiJ9.{}.c2ln", URL_SAFE_NO_PAD.encode(json))
    }

    #[test]
    fn decodes_server_issued_token() {
        let jwt = JwtValidator::new(b"secret", "civic-desk", Duration::hours(1));
        let token = jwt
            .issue(&Principal::Officer(OfficerId::new("OFF7")), Some("Asha"), None)
            .unwrap();

        let identity = decode_identity(&token, Utc::now()).unwrap();
        assert_eq!(identity.principal, Principal::Officer(OfficerId::new("OFF7")));
        assert_eq!(identity.display_name, "Asha");
        assert_eq!(identity.role(), Role::Officer);
    }

    #[test]
    fn name_falls_back_to_email_then_role() {
        let now = Utc::now();
        let with_email = encode_payload(r#"{"sub":"3","role":"citizen","email":"a@b.in"}"#);
        assert_eq!(decode_identity(&with_email, now).unwrap().display_name, "a@b.in");

        let bare = encode_payload(r#"{"sub":"3","role":"citizen"}"#);
        let identity = decode_identity(&bare, now).unwrap();
        assert_eq!(identity.display_name, "Citizen");
        assert_eq!(identity.principal, Principal::Citizen(UserId(3)));
    }

    #[test]
    fn malformed_tokens_fail_closed() {
        let now = Utc::now();
        assert!(decode_identity("", now).is_none());
        assert!(decode_identity("not-a-jwt", now).is_none());
        assert!(decode_identity("a.%%%.c", now).is_none());
        assert!(decode_identity(&encode_payload(r#"{"sub":"3"}"#), now).is_none());
        assert!(decode_identity(&encode_payload(r#"{"sub":"x","role":"citizen"}"#), now).is_none());
        assert!(decode_identity(&encode_payload(r#"{"sub":"3","role":"admin"}"#), now).is_none());

        let expired = encode_payload(&format!(
            r#"{{"sub":"3","role":"citizen","exp":{}}}"#,
            (now - Duration::minutes(1)).timestamp()
        ));
        assert!(decode_identity(&expired, now).is_none());
    }

    #[test]
    fn unreadable_stored_token_is_cleared() {
        let mut store = MockTokenStore::new();
        store.expect_load().return_const(Some("garbage".to_string()));
        store.expect_clear().times(1).return_const(());

        let session = SessionContext::from_store(&store, Utc::now());
        assert!(!session.is_authenticated());
        assert_eq!(session.access(Requirement::CITIZEN), Access::Unauthenticated);
        assert!(session.bearer().is_none());
    }

    #[test]
    fn sign_in_and_out() {
        let store = MemoryTokenStore::new();
        let token = encode_payload(r#"{"sub":"9","role":"citizen","name":"Ravi"}"#);

        let session = SessionContext::sign_in(&store, &token, Utc::now());
        assert_eq!(session.display_name(), Some("Ravi"));
        assert_eq!(session.bearer(), Some(token.as_str()));
        assert_eq!(session.access(Requirement::OFFICER), Access::Forbidden);

        let session = SessionContext::sign_out(&store);
        assert!(store.load().is_none());
        assert_eq!(session.role(), None);
    }
}

//! Sign-in and registration flows.

use chrono::Utc;

use crate::api::types::RegisterRequest;
use crate::domain::{normalize_email, MIN_PASSWORD_CHARS};

use super::api::{CivicApi, ClientError};
use super::session::{SessionContext, TokenStore};

fn require(value: &str, message: &str) -> Result<String, ClientError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ClientError::Validation(message.to_string()));
    }
    Ok(value.to_string())
}

/// Citizen login by email. The returned session replaces the current one.
pub async fn sign_in_citizen(
    api: &dyn CivicApi,
    store: &dyn TokenStore,
    email: &str,
    password: &str,
) -> Result<SessionContext, ClientError> {
    let email = require(email, "Email and password are required")?;
    let password = require(password, "Email and password are required")?;
    let response = api.login(&normalize_email(&email), &password).await?;
    Ok(SessionContext::sign_in(store, &response.access_token, Utc::now()))
}

/// Officer login by badge id.
pub async fn sign_in_officer(
    api: &dyn CivicApi,
    store: &dyn TokenStore,
    off_id: &str,
    password: &str,
) -> Result<SessionContext, ClientError> {
    let off_id = require(off_id, "Officer id and password are required")?;
    let password = require(password, "Officer id and password are required")?;
    let response = api.officer_login(&off_id, &password).await?;
    Ok(SessionContext::sign_in(store, &response.access_token, Utc::now()))
}

/// Where the registration wizard stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationStep {
    EnterEmail,
    EnterOtp { email: String },
    EnterDetails { email: String },
    Done,
}

/// Email, then one-time code, then account details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationFlow {
    step: RegistrationStep,
}

impl Default for RegistrationFlow {
    fn default() -> Self {
        Self {
            step: RegistrationStep::EnterEmail,
        }
    }
}

/// Account details collected on the last step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitizenDetails {
    pub name: String,
    pub password: String,
    pub area: String,
    pub state: String,
    pub phone_number: Option<String>,
}

impl RegistrationFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> &RegistrationStep {
        &self.step
    }

    /// Request a code. An already registered email is sent to login instead.
    pub async fn request_otp(&mut self, api: &dyn CivicApi, email: &str) -> Result<(), ClientError> {
        let email = normalize_email(&require(email, "Email is required")?);
        if api.check_email(&email).await? {
            return Err(ClientError::Conflict("User already exists, please login".into()));
        }
        api.send_otp(&email).await?;
        self.step = RegistrationStep::EnterOtp { email };
        Ok(())
    }

    pub async fn confirm_otp(&mut self, api: &dyn CivicApi, otp: &str) -> Result<(), ClientError> {
        let RegistrationStep::EnterOtp { email } = &self.step else {
            return Err(ClientError::Validation("Request a code first".into()));
        };
        let otp = require(otp, "Email and OTP are required")?;
        api.verify_otp(email, &otp).await?;
        self.step = RegistrationStep::EnterDetails {
            email: email.clone(),
        };
        Ok(())
    }

    pub async fn submit(&mut self, api: &dyn CivicApi, details: CitizenDetails) -> Result<(), ClientError> {
        let RegistrationStep::EnterDetails { email } = &self.step else {
            return Err(ClientError::Validation("Email not verified".into()));
        };
        let name = require(&details.name, "All fields are required")?;
        let area = require(&details.area, "All fields are required")?;
        let state = require(&details.state, "All fields are required")?;
        if details.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(ClientError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_CHARS} characters"
            )));
        }

        api.register(RegisterRequest {
            name: Some(name),
            email: Some(email.clone()),
            password: Some(details.password),
            area: Some(area),
            state: Some(state),
            phone_number: details.phone_number.filter(|p| !p.trim().is_empty()),
        })
        .await?;
        self.step = RegistrationStep::Done;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{LoginResponse, LoginUser, MessageResponse};
    use crate::auth::JwtValidator;
    use crate::client::api::MockCivicApi;
    use crate::client::session::MemoryTokenStore;
    use crate::domain::{Principal, Role, UserId};
    use chrono::Duration;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn citizen_sign_in_stores_token() {
        let jwt = JwtValidator::new(b"secret", "civic-desk", Duration::hours(1));
        let token = jwt
            .issue(&Principal::Citizen(UserId(4)), Some("Ravi"), Some("ravi@example.in"))
            .unwrap();

        let mut api = MockCivicApi::new();
        api.expect_login()
            .with(eq("ravi@example.in"), eq("password123"))
            .returning(move |_, _| {
                Ok(LoginResponse {
                    access_token: token.clone(),
                    user: LoginUser {
                        id: 4,
                        name: "Ravi".into(),
                        email: "ravi@example.in".into(),
                        role: Role::Citizen,
                    },
                })
            });

        let store = MemoryTokenStore::new();
        let session = sign_in_citizen(&api, &store, " Ravi@Example.in ", "password123")
            .await
            .unwrap();
        assert_eq!(session.role(), Some(Role::Citizen));
        assert_eq!(session.display_name(), Some("Ravi"));
        assert!(store.load().is_some());
    }

    #[tokio::test]
    async fn failed_sign_in_keeps_store_empty() {
        let mut api = MockCivicApi::new();
        api.expect_officer_login()
            .returning(|_, _| Err(ClientError::Unauthorized("Invalid credential".into())));

        let store = MemoryTokenStore::new();
        let err = sign_in_officer(&api, &store, "OFF1", "wrong-pass").await.unwrap_err();
        assert_eq!(err.user_message(), "Invalid credential");
        assert!(store.load().is_none());

        let err = sign_in_officer(&api, &store, "", "x").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[tokio::test]
    async fn registration_walks_through_steps() {
        let mut api = MockCivicApi::new();
        api.expect_check_email().returning(|_| Ok(false));
        api.expect_send_otp()
            .with(eq("new@example.in"))
            .returning(|_| Ok(MessageResponse::new("OTP sent to email")));
        api.expect_verify_otp()
            .with(eq("new@example.in"), eq("123456"))
            .returning(|_, _| Ok(MessageResponse::new("OTP verified successfully")));
        api.expect_register()
            .withf(|r| r.email.as_deref() == Some("new@example.in") && r.phone_number.is_none())
            .times(1)
            .returning(|_| Ok(MessageResponse::new("User registered successfully")));

        let mut flow = RegistrationFlow::new();
        assert!(flow.submit(&api, CitizenDetails::default()).await.is_err());

        flow.request_otp(&api, "New@Example.in").await.unwrap();
        flow.confirm_otp(&api, "123456").await.unwrap();

        let short = CitizenDetails {
            name: "Asha".into(),
            password: "short".into(),
            area: "Indiranagar".into(),
            state: "Karnataka".into(),
            phone_number: Some(" ".into()),
        };
        assert!(flow.submit(&api, short.clone()).await.is_err());

        flow.submit(
            &api,
            CitizenDetails {
                password: "long-enough".into(),
                ..short
            },
        )
        .await
        .unwrap();
        assert_eq!(flow.step(), &RegistrationStep::Done);
    }

    #[tokio::test]
    async fn registered_email_is_sent_to_login() {
        let mut api = MockCivicApi::new();
        api.expect_check_email().returning(|_| Ok(true));
        api.expect_send_otp().never();

        let mut flow = RegistrationFlow::new();
        let err = flow.request_otp(&api, "old@example.in").await.unwrap_err();
        assert!(matches!(err, ClientError::Conflict(_)));
        assert_eq!(flow.step(), &RegistrationStep::EnterEmail);
    }
}

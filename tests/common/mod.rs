//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::Duration;
use http_body_util::BodyExt;
use serde_json::json;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

use civic_desk::auth::{hash_password, JwtValidator, OtpSender};
use civic_desk::domain::{NewCitizen, NewOfficer, OfficerId, Polygon, Principal, UserId, Ward};
use civic_desk::infra::sqlite::connect_in_memory;
use civic_desk::infra::{
    OfflineGateway, SqliteAccountStore, SqliteCatalog, UploadStore, MAX_IMAGE_BYTES,
};
use civic_desk::server::{build_router, AppState};

pub const JWT_SECRET: &[u8] = b"integration-test-secret";
pub const GATEWAY_KEY_ID: &str = "rzp_test_key";
pub const GATEWAY_SECRET: &str = "rzp_test_secret";
pub const OFFICER_PASSWORD: &str = "officer-pass-1";
pub const CITIZEN_PASSWORD: &str = "citizen-pass-1";

/// Ward 1 covers (12.9, 77.6).
pub fn ward_one() -> Ward {
    Ward {
        ward_id: 1,
        name: "Indiranagar".into(),
        polygon: Polygon(vec![
            [77.5, 12.8],
            [77.7, 12.8],
            [77.7, 13.0],
            [77.5, 13.0],
        ]),
    }
}

/// Ward 2 sits next to ward 1 and has no officer.
pub fn ward_two() -> Ward {
    Ward {
        ward_id: 2,
        name: "Whitefield".into(),
        polygon: Polygon(vec![
            [77.7, 12.8],
            [77.9, 12.8],
            [77.9, 13.0],
            [77.7, 13.0],
        ]),
    }
}

/// OTP sender that keeps the last code per email.
#[derive(Default)]
pub struct CapturingOtpSender {
    codes: Mutex<Vec<(String, String)>>,
}

impl CapturingOtpSender {
    pub fn last_code(&self, email: &str) -> Option<String> {
        self.codes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(e, _)| e == email)
            .map(|(_, c)| c.clone())
    }
}

#[async_trait]
impl OtpSender for CapturingOtpSender {
    async fn send(&self, email: &str, code: &str) -> civic_desk::Result<()> {
        self.codes
            .lock()
            .unwrap()
            .push((email.to_string(), code.to_string()));
        Ok(())
    }
}

/// A fully wired router over an in-memory database.
pub struct TestApp {
    pub app: axum::Router,
    pub pool: SqlitePool,
    pub jwt: Arc<JwtValidator>,
    pub gateway: Arc<OfflineGateway>,
    pub otp: Arc<CapturingOtpSender>,
    pub uploads: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_otp_ttl(Duration::minutes(5)).await
    }

    pub async fn with_otp_ttl(otp_ttl: Duration) -> Self {
        let pool = connect_in_memory().await.unwrap();
        civic_desk::seed::seed_reference_data(&pool).await.unwrap();

        let catalog = SqliteCatalog::new(pool.clone());
        catalog.upsert_ward(&ward_one()).await.unwrap();
        catalog.upsert_ward(&ward_two()).await.unwrap();

        let uploads = TempDir::new().unwrap();
        let jwt = Arc::new(JwtValidator::new(JWT_SECRET, "civic-desk", Duration::hours(1)));
        let gateway = Arc::new(OfflineGateway::new(GATEWAY_KEY_ID, GATEWAY_SECRET));
        let otp = Arc::new(CapturingOtpSender::default());

        let state = AppState::new(
            pool.clone(),
            jwt.clone(),
            UploadStore::new(uploads.path(), MAX_IMAGE_BYTES),
            gateway.clone(),
            otp_ttl,
        )
        .with_otp_sender(otp.clone());

        Self {
            app: build_router(state, None),
            pool,
            jwt,
            gateway,
            otp,
            uploads,
        }
    }

    pub async fn add_officer(&self, off_id: &str, name: &str, ward_id: i64) -> String {
        let officer = NewOfficer {
            off_id: OfficerId::new(off_id),
            name: name.into(),
            email: format!("{}@city.gov.in", off_id.to_lowercase()),
            ward_id,
            phone_number: "9000000000".into(),
            designation: "Ward Officer".into(),
        };
        let hash = hash_password(OFFICER_PASSWORD).unwrap();
        SqliteAccountStore::new(self.pool.clone())
            .create_officer(&officer, &hash)
            .await
            .unwrap();
        self.jwt
            .issue(&Principal::Officer(OfficerId::new(off_id)), Some(name), None)
            .unwrap()
    }

    /// Create a citizen directly and return `(id, token)`.
    pub async fn add_citizen(&self, name: &str, email: &str) -> (UserId, String) {
        let citizen = NewCitizen {
            name: name.into(),
            email: email.into(),
            area: "Indiranagar".into(),
            state: "Karnataka".into(),
            phone_number: None,
        };
        let hash = hash_password(CITIZEN_PASSWORD).unwrap();
        let id = SqliteAccountStore::new(self.pool.clone())
            .create_citizen(&citizen, &hash)
            .await
            .unwrap();
        let token = self
            .jwt
            .issue(&Principal::Citizen(id), Some(name), Some(email))
            .unwrap();
        (id, token)
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
        token: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = body
            .map(|v| Body::from(serde_json::to_vec(&v).unwrap()))
            .unwrap_or_else(Body::empty);
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn multipart(
        &self,
        method: Method,
        uri: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &str)>,
        token: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let boundary = "civicdeskboundary";
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((name, filename)) = file {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(&[0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a]);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", format!("multipart/form-data; boundary={boundary}"));
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        let json = if bytes.is_empty() {
            json!({})
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| json!({ "raw": String::from_utf8_lossy(&bytes) }))
        };
        (status, json)
    }

    /// File the reference pothole complaint at (12.9, 77.6).
    pub async fn file_pothole(&self, token: &str, description: &str) -> i64 {
        let (status, body) = self
            .multipart(
                Method::POST,
                "/api/complaints",
                &[
                    ("title", "Pothole on 5th"),
                    ("description", description),
                    ("issue_name", "pothole"),
                    ("latitude", "12.9"),
                    ("longitude", "77.6"),
                ],
                Some(("image", "pothole.png")),
                Some(token),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["complaint_id"].as_i64().unwrap()
    }

    /// Move a complaint to `status` as its officer, with a proof image.
    pub async fn officer_sets(&self, token: &str, id: i64, status: &str) -> (StatusCode, serde_json::Value) {
        self.multipart(
            Method::PUT,
            &format!("/api/complaints/officer/{id}"),
            &[("status", status)],
            Some(("proof", "proof.jpg")),
            Some(token),
        )
        .await
    }
}

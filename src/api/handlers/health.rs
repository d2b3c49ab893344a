//! Health check handlers
//!
//! `/health` is a liveness probe that never touches storage; `/ready` runs a
//! trivial query against the SQLite pool.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

/// Response for the basic health check endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall health status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Timestamp of health check
    pub timestamp: String,
}

/// Overall health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Basic health check endpoint.
///
/// Use this for liveness probes.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        service: "civic-desk".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Readiness check endpoint.
///
/// Checks database connectivity. Use this for readiness probes.
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => {
            let response_time = start.elapsed().as_millis() as u64;
            Ok(Json(serde_json::json!({
                "status": "ready",
                "database": {
                    "connected": true,
                    "response_time_ms": response_time,
                    "pool_size": state.pool.size(),
                    "idle": state.pool.num_idle(),
                },
            })))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Database unavailable: {}", e),
            ))
        }
    }
}

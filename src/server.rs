//! HTTP server bootstrap for the complaint desk.
//!
//! This module wires together:
//! - configuration
//! - the SQLite pool and stores
//! - the payment gateway, upload store and SLA sweeper
//! - the Axum router

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::api::handlers::{health_check, readiness_check};
use crate::auth::{AuthMiddlewareState, JwtValidator, LogOtpSender, OtpSender, OtpService};
use crate::infra::{
    serve_with_shutdown, shutdown_signal, spawn_sla_sweeper, GracefulShutdownConfig,
    OfflineGateway, PaymentGateway, RazorpayGateway, ShutdownCoordinator, SlaSweepConfig,
    SlaSweeper, SqliteAccountStore, SqliteBillStore, SqliteCatalog, SqliteComplaintStore,
    SqliteLedger, SqliteOtpStore, UploadStore, MAX_IMAGE_BYTES,
};
use crate::telemetry::{init_telemetry, TelemetryConfig};

/// Multipart overhead allowed on top of the largest accepted image.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Which payment gateway to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayConfig {
    Razorpay {
        api_base: String,
        key_id: String,
        key_secret: String,
    },
    Offline {
        key_id: String,
        key_secret: String,
    },
}

impl GatewayConfig {
    pub fn build(&self) -> Arc<dyn PaymentGateway> {
        match self {
            GatewayConfig::Razorpay {
                api_base,
                key_id,
                key_secret,
            } => Arc::new(RazorpayGateway::new(api_base, key_id, key_secret)),
            GatewayConfig::Offline { key_id, key_secret } => {
                Arc::new(OfflineGateway::new(key_id, key_secret))
            }
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL.
    pub database_url: String,
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Maximum database connections.
    pub max_connections: u32,
    /// Apply embedded migrations at startup.
    pub migrate_on_startup: bool,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_ttl: chrono::Duration,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub otp_ttl: chrono::Duration,
    pub gateway: GatewayConfig,
    pub sla_sweep_interval: Duration,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{key} has an invalid value: {raw:?}")),
        _ => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env_or("DATABASE_URL", "sqlite://civic_desk.db?mode=rwc");

        let host = env_or("HOST", "0.0.0.0");
        let port: u16 = env_parse("PORT", 5000)?;
        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address {host}:{port}: {e}"))?;

        let max_connections: u32 = env_parse("MAX_DB_CONNECTIONS", 5)?;

        let migrate_on_startup = std::env::var("DB_MIGRATE_ON_STARTUP")
            .ok()
            .map(|v| {
                !matches!(
                    v.trim().to_ascii_lowercase().as_str(),
                    "0" | "false" | "off"
                )
            })
            .unwrap_or(true);

        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET must be set"))?;

        let gateway = match env_or("PAYMENT_GATEWAY", "razorpay").trim() {
            "razorpay" => GatewayConfig::Razorpay {
                api_base: env_or("RAZORPAY_API_BASE", "https://api.razorpay.com"),
                key_id: std::env::var("RAZORPAY_KEY_ID")
                    .map_err(|_| anyhow::anyhow!("RAZORPAY_KEY_ID must be set"))?,
                key_secret: std::env::var("RAZORPAY_KEY_SECRET")
                    .map_err(|_| anyhow::anyhow!("RAZORPAY_KEY_SECRET must be set"))?,
            },
            "offline" => GatewayConfig::Offline {
                key_id: env_or("RAZORPAY_KEY_ID", "rzp_offline"),
                key_secret: env_or("RAZORPAY_KEY_SECRET", "offline-secret"),
            },
            other => anyhow::bail!("unknown PAYMENT_GATEWAY: {other}"),
        };

        Ok(Self {
            database_url,
            listen_addr,
            max_connections,
            migrate_on_startup,
            jwt_secret,
            jwt_issuer: env_or("JWT_ISSUER", "civic-desk"),
            jwt_ttl: chrono::Duration::minutes(env_parse("JWT_TTL_MINUTES", 1440)?),
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads/complaints")),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", MAX_IMAGE_BYTES)?,
            otp_ttl: chrono::Duration::minutes(env_parse("OTP_TTL_MINUTES", 5)?),
            gateway,
            sla_sweep_interval: Duration::from_secs(env_parse("SLA_SWEEP_INTERVAL_SECS", 600)?),
        })
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub accounts: Arc<SqliteAccountStore>,
    pub otp: Arc<OtpService>,
    pub otp_sender: Arc<dyn OtpSender>,
    pub catalog: Arc<SqliteCatalog>,
    pub complaints: Arc<SqliteComplaintStore>,
    pub ledger: Arc<SqliteLedger>,
    pub bills: Arc<SqliteBillStore>,
    pub uploads: Arc<UploadStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub jwt: Arc<JwtValidator>,
}

impl AppState {
    /// Build every store over `pool`.
    pub fn new(
        pool: SqlitePool,
        jwt: Arc<JwtValidator>,
        uploads: UploadStore,
        gateway: Arc<dyn PaymentGateway>,
        otp_ttl: chrono::Duration,
    ) -> Self {
        Self {
            accounts: Arc::new(SqliteAccountStore::new(pool.clone())),
            otp: Arc::new(OtpService::new(SqliteOtpStore::new(pool.clone()), otp_ttl)),
            otp_sender: Arc::new(LogOtpSender),
            catalog: Arc::new(SqliteCatalog::new(pool.clone())),
            complaints: Arc::new(SqliteComplaintStore::new(pool.clone())),
            ledger: Arc::new(SqliteLedger::new(pool.clone())),
            bills: Arc::new(SqliteBillStore::new(pool.clone())),
            uploads: Arc::new(uploads),
            gateway,
            jwt,
            pool,
        }
    }

    /// Replace the passcode delivery channel.
    pub fn with_otp_sender(mut self, sender: Arc<dyn OtpSender>) -> Self {
        self.otp_sender = sender;
        self
    }
}

/// Start the HTTP server.
pub async fn run() -> anyhow::Result<()> {
    init_telemetry(&TelemetryConfig::from_env())?;

    info!("Starting civic-desk v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Max connections: {}", config.max_connections);
    info!("  Upload directory: {}", config.upload_dir.display());

    // Connect to SQLite
    let pool = crate::infra::sqlite::connect(&config.database_url, config.max_connections).await?;
    info!("Connected to SQLite");

    if config.migrate_on_startup {
        info!("Running database migrations...");
        crate::migrations::run_sqlite(&pool).await?;
        info!("Database migrations applied");
    } else {
        info!("DB migrations skipped (DB_MIGRATE_ON_STARTUP=0)");
    }

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    if matches!(config.gateway, GatewayConfig::Offline { .. }) {
        warn!("Using the offline payment gateway; orders are not sent to a real provider");
    }

    let jwt = Arc::new(JwtValidator::new(
        config.jwt_secret.as_bytes(),
        &config.jwt_issuer,
        config.jwt_ttl,
    ));
    let state = AppState::new(
        pool,
        jwt,
        UploadStore::new(&config.upload_dir, config.max_upload_bytes),
        config.gateway.build(),
        config.otp_ttl,
    );

    // Background work and shutdown
    let coordinator = Arc::new(ShutdownCoordinator::new());
    let sweeper = SlaSweeper::new(
        SlaSweepConfig {
            interval: config.sla_sweep_interval,
        },
        state.complaints.clone(),
        state.catalog.clone(),
        state.ledger.clone(),
    );
    let sweeper_handle = spawn_sla_sweeper(sweeper, coordinator.signal());

    {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            coordinator.shutdown();
        });
    }

    let app = build_router(state, cors_layer_from_env()?);

    info!("Starting HTTP server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!("civic-desk is ready to accept connections");

    serve_with_shutdown(listener, app, coordinator, GracefulShutdownConfig::default()).await?;

    if let Err(e) = sweeper_handle.await {
        error!(error = %e, "SLA sweeper task failed");
    }
    Ok(())
}

/// Assemble the full application router.
pub fn build_router(state: AppState, cors: Option<CorsLayer>) -> Router {
    let auth_state = AuthMiddlewareState {
        jwt: state.jwt.clone(),
    };
    let body_limit = state.uploads.max_bytes() + FORM_OVERHEAD_BYTES;

    let api = crate::api::router()
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            crate::auth::auth_middleware,
        ))
        .merge(crate::api::public_router());

    let mut router = Router::new()
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(state.uploads.dir()))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http());

    if let Some(cors_layer) = cors {
        router = router.layer(cors_layer);
    }

    router.with_state(state)
}

/// CORS from `CORS_ALLOW_ORIGINS` (comma list or `*`); unset disables CORS.
pub fn cors_layer_from_env() -> anyhow::Result<Option<CorsLayer>> {
    let origins = match std::env::var("CORS_ALLOW_ORIGINS") {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };
    cors_layer(&origins)
}

fn cors_layer(origins: &str) -> anyhow::Result<Option<CorsLayer>> {
    let origins = origins.trim();
    if origins.is_empty() {
        return Ok(None);
    }

    let allow_origin = if origins == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {s:?}: {e}"))
            })
            .collect::<anyhow::Result<_>>()?;
        AllowOrigin::list(origins)
    };

    Ok(Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ]),
    ))
}

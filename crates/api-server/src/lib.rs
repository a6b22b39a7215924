//! HTTP surface for the watchlist alert engine.

pub mod config;
mod history_routes;
mod name_cache;
mod news_briefing_routes;
mod notification_routes;
mod poller;
mod request_id;
mod watchlist_routes;

pub use config::ServerConfig;
pub use name_cache::NameCache;

use axum::{
    body::Body,
    http::{HeaderValue, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use market_core::{BarRefresher, Clock, MarketCalendar, MarketError, SystemClock};
use market_store::MarketDb;
use notification_service::{EngineConfig, NewsBriefingGenerator, NotificationEngine};
use polygon_client::{PolygonBarRefresher, PolygonClient};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub db: MarketDb,
    pub engine: Arc<NotificationEngine>,
    pub briefings: Arc<NewsBriefingGenerator>,
    pub refresher: Arc<dyn BarRefresher>,
    pub names: NameCache,
    pub calendar: MarketCalendar,
    pub clock: Arc<dyn Clock>,
}

/// JSON envelope for every API response
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Handler error carrying the HTTP status to report
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, anyhow::anyhow!(message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, anyhow::anyhow!(message.into()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed: {:#}", self.error);
        }

        let body = Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.error.to_string()),
        });
        (self.status, body).into_response()
    }
}

impl From<MarketError> for AppError {
    fn from(err: MarketError) -> Self {
        let status = match &err {
            e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            // Request input is validated at the handlers; these come from stored data
            MarketError::InvalidData(_) | MarketError::Parse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MarketError::Api(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::with_status(status, err.into())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

/// Normalise a user-supplied ticker symbol
pub(crate) fn normalize_symbol(raw: &str) -> Result<String, AppError> {
    let symbol = raw.trim().to_uppercase();
    let valid = !symbol.is_empty()
        && symbol.len() <= 10
        && symbol.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if !valid {
        return Err(AppError::bad_request(format!("Invalid symbol: '{}'", raw)));
    }
    Ok(symbol)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    layer.allow_origin(parsed)
}

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(notification_routes::notification_routes())
        .merge(watchlist_routes::watchlist_routes())
        .merge(news_briefing_routes::news_briefing_routes())
        .merge(history_routes::history_routes())
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(request_id::REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(cors_layer(cors_origins))
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }

    // Panic hook: log panic info before crashing
    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    let engine_config = EngineConfig::from_env();
    tracing::info!(
        "Thresholds: daily EOD {}%, momentum {}%, morning gap {}%",
        engine_config.thresholds.daily_eod_pct,
        engine_config.thresholds.momentum_2h_pct,
        engine_config.thresholds.morning_gap_pct
    );

    if !MarketDb::exists(&config.database_url) {
        tracing::info!("No database at {}, creating a new one", config.database_url);
    }
    let db = MarketDb::new(&config.database_url).await?;
    tracing::info!("Database connected: {}", config.database_url);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let calendar = MarketCalendar::default();
    let polygon = PolygonClient::with_rate_limit(config.polygon_api_key.clone(), config.polygon_rate_limit);

    let refresher: Arc<dyn BarRefresher> = Arc::new(PolygonBarRefresher::new(
        polygon.clone(),
        db.bars(),
        calendar,
        clock.clone(),
    ));
    let engine = Arc::new(
        NotificationEngine::new(&db, refresher.clone(), clock.clone(), engine_config).with_calendar(calendar),
    );
    let briefings = Arc::new(NewsBriefingGenerator::new(&db, Arc::new(polygon.clone()), clock.clone()));
    let names = NameCache::new(Arc::new(polygon), config.name_cache_capacity);

    let state = AppState {
        db,
        engine: engine.clone(),
        briefings,
        refresher,
        names,
        calendar,
        clock,
    };

    if let Some(interval) = config.poll_interval {
        poller::spawn(engine, interval);
    }

    let app = build_router(state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

//! Watchlist API Routes

use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use market_core::{Clock, WatchlistEntry};
use serde::{Deserialize, Serialize};

use crate::{normalize_symbol, ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct AddWatchlistRequest {
    pub symbol: String,
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct AddWatchlistResponse {
    pub entry: WatchlistEntry,
    pub created: bool,
}

pub fn watchlist_routes() -> Router<AppState> {
    Router::new()
        .route("/api/watchlist", get(list_watchlist).post(add_to_watchlist))
        .route("/api/watchlist/:symbol", delete(remove_from_watchlist))
}

async fn list_watchlist(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<WatchlistEntry>>>, AppError> {
    let items = state.db.watchlist().list().await?;
    Ok(Json(ApiResponse::success(items)))
}

/// Add a symbol. Without a name, the company name is looked up and cached.
async fn add_to_watchlist(
    State(state): State<AppState>,
    Json(req): Json<AddWatchlistRequest>,
) -> Result<Json<ApiResponse<AddWatchlistResponse>>, AppError> {
    let symbol = normalize_symbol(&req.symbol)?;
    let name = match req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
        Some(name) => name,
        None => state.names.resolve(&symbol).await,
    };

    let watchlist = state.db.watchlist();
    let created = watchlist.add(&symbol, &name, state.clock.now()).await?;
    let entry = watchlist
        .get(&symbol)
        .await?
        .ok_or_else(|| anyhow::anyhow!("{} vanished after insert", symbol))?;

    tracing::info!("Watchlist add {} ({}), created={}", symbol, name, created);
    Ok(Json(ApiResponse::success(AddWatchlistResponse { entry, created })))
}

async fn remove_from_watchlist(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let symbol = normalize_symbol(&symbol)?;
    if !state.db.watchlist().remove(&symbol).await? {
        return Err(AppError::not_found(format!("{} is not on the watchlist", symbol)));
    }

    tracing::info!("Watchlist remove {}", symbol);
    Ok(Json(ApiResponse::success(serde_json::json!({ "removed": symbol }))))
}

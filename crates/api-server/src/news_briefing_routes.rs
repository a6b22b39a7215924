//! News Briefing API Routes
//!
//! Kept apart from notification polling: generation calls the news provider and can be slow.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use notification_service::BriefingReport;
use serde::{Deserialize, Serialize};

use crate::{normalize_symbol, ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

#[derive(Serialize)]
pub struct ToggleResponse {
    pub symbol: String,
    pub enabled: bool,
    pub generated: bool,
}

pub fn news_briefing_routes() -> Router<AppState> {
    Router::new()
        .route("/api/news-briefing/generate", post(generate_briefings))
        .route("/api/news-briefing/toggle/:symbol", post(toggle_briefing))
}

async fn generate_briefings(State(state): State<AppState>) -> Result<Json<ApiResponse<BriefingReport>>, AppError> {
    let report = state.briefings.generate_all().await?;
    Ok(Json(ApiResponse::success(report)))
}

async fn toggle_briefing(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Json(req): Json<ToggleRequest>,
) -> Result<Json<ApiResponse<ToggleResponse>>, AppError> {
    let symbol = normalize_symbol(&symbol)?;
    let generated = state
        .briefings
        .toggle(&symbol, req.enabled)
        .await?
        .ok_or_else(|| AppError::not_found(format!("{} is not on the watchlist", symbol)))?;

    Ok(Json(ApiResponse::success(ToggleResponse {
        symbol,
        enabled: req.enabled,
        generated,
    })))
}

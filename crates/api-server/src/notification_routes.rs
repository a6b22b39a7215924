//! Notification API Routes

use axum::{
    extract::State,
    routing::{delete, get, post},
    Json, Router,
};
use market_core::{ArticleSummary, MarketCalendar, Notification, NotificationType};
use notification_service::templates::MessageTemplate;
use serde::{Deserialize, Serialize};

use crate::{ApiResponse, AppError, AppState};

/// Notification as shown to clients, with a market-local display timestamp
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub symbol: String,
    pub title: String,
    pub message: String,
    pub direction: String,
    pub percent_change: f64,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub articles: Option<Vec<ArticleSummary>>,
}

impl NotificationView {
    fn from_notification(n: Notification, calendar: &MarketCalendar) -> Self {
        let timestamp = n
            .created_at
            .map(|at| MessageTemplate::display_timestamp(calendar.to_local(at)))
            .unwrap_or_default();
        // Briefings always carry an article list, even if it could not be read back
        let articles = match n.kind {
            NotificationType::NewsBriefing => Some(n.articles.unwrap_or_default()),
            _ => None,
        };

        Self {
            id: n.id,
            kind: n.kind,
            symbol: n.symbol,
            title: n.title,
            message: n.message,
            direction: n.direction.as_str().to_string(),
            percent_change: n.percent_change,
            timestamp,
            articles,
        }
    }
}

#[derive(Deserialize)]
pub struct DismissRequest {
    pub notification_id: String,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: u64,
}

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(poll_notifications))
        .route("/api/notifications/dismiss", post(dismiss_notification))
        .route("/api/notifications/clear-all", post(clear_all_notifications))
        .route("/api/notifications/dismissed", delete(clear_dismissed))
}

/// Run detection and return today's active notifications, newest first
async fn poll_notifications(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<NotificationView>>>, AppError> {
    let active = state.engine.poll().await?;
    let views = active
        .into_iter()
        .map(|n| NotificationView::from_notification(n, &state.calendar))
        .collect();
    Ok(Json(ApiResponse::success(views)))
}

async fn dismiss_notification(
    State(state): State<AppState>,
    Json(req): Json<DismissRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let id = req.notification_id.trim();
    if id.is_empty() {
        return Err(AppError::bad_request("notification_id is required"));
    }

    state.engine.dismiss(id).await?;
    Ok(Json(ApiResponse::success(serde_json::json!({ "dismissed": id }))))
}

/// Dismiss every active notification for today
async fn clear_all_notifications(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CountResponse>>, AppError> {
    let count = state.engine.clear_all().await? as u64;
    Ok(Json(ApiResponse::success(CountResponse { count })))
}

/// Drop all dismissal markers
async fn clear_dismissed(State(state): State<AppState>) -> Result<Json<ApiResponse<CountResponse>>, AppError> {
    let count = state.engine.clear_dismissed().await?;
    Ok(Json(ApiResponse::success(CountResponse { count })))
}

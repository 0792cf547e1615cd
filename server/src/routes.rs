use axum::{extract::State, Json, Router};

use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the axum Router: the WebSocket endpoint plus a health check.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Auth via ?token= query param or Authorization header, checked before upgrade
        .route("/ws", axum::routing::get(ws_handler::ws_upgrade))
        .route("/health", axum::routing::get(health_check))
        .with_state(state)
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "rooms": state.rooms.room_count(),
        "sessions": state.sessions.len(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

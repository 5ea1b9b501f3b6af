use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    change_poller: &'static str,
    websocket_connections: usize,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: time::OffsetDateTime,
}

/// Liveness probe over the same components the pipeline uses. Pure
/// query; returns 503 when the store is unreachable.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = state.store.ping().await;

    let response = HealthResponse {
        status: if db_healthy { "healthy" } else { "unhealthy" },
        database: if db_healthy { "connected" } else { "disconnected" },
        change_poller: if state.poller.is_running() {
            "running"
        } else {
            "stopped"
        },
        websocket_connections: state.registry.connection_count().await,
        timestamp: time::OffsetDateTime::now_utc(),
    };

    let code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}

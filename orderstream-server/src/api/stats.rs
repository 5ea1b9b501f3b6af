use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse, response::Response};
use orderstream_core::connections::ConnectionStats;
use orderstream_core::store::ChangeLogStore;
use serde::Serialize;

/// System statistics response.
#[derive(Serialize)]
struct StatsResponse {
    websocket_connections: ConnectionStats,
    recent_changes_last_hour: i64,
    change_poller_status: &'static str,
}

/// Connection metadata plus change volume over the last hour. Pure query.
pub async fn get_stats(State(state): State<AppState>) -> Response {
    let cutoff = time::OffsetDateTime::now_utc() - time::Duration::hours(1);

    let recent_changes_last_hour = match state.store.recent_change_count(cutoff).await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!(error = %e, "failed to query recent change count");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let response = StatsResponse {
        websocket_connections: state.registry.get_stats().await,
        recent_changes_last_hour,
        change_poller_status: if state.poller.is_running() {
            "running"
        } else {
            "stopped"
        },
    };

    Json(response).into_response()
}

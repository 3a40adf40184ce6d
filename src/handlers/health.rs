//! `GET /health` and `GET /ready` (spec §6, `/ready` is an AMBIENT
//! addition mirrored from the teacher's `ready_check` handler). `/health`
//! is a liveness probe only; `/ready` additionally confirms the local
//! bookkeeping store is reachable and reports whether `SessionCache`
//! already holds a warm runtime.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[utoipa::path(get, path = "/health", responses((status = 200, body = HealthResponse)), tag = "Operations")]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub session_cache_warm: bool,
    pub local_store_reachable: bool,
}

#[utoipa::path(get, path = "/ready", responses((status = 200, body = ReadyResponse), (status = 503, body = ReadyResponse)), tag = "Operations")]
pub async fn ready(State(state): State<Arc<AppState>>) -> Response {
    let local_store_reachable = state.request_log.recent_for_workspace(0, 1).await.is_ok();
    let session_cache_warm = state.session_cache.len() > 0;

    let body = ReadyResponse {
        status: if local_store_reachable { "ok" } else { "degraded" },
        session_cache_warm,
        local_store_reachable,
    };

    let status = if local_store_reachable { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(body)).into_response()
}

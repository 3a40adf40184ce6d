//! `POST /save-sql-feedback` (spec §6): persists an approved
//! (question, sql, evidence) tuple back to the vector store via
//! `FeedbackSink` (C14), independent of any in-flight `/generate-sql` run.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::ApiResult;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SaveSqlFeedbackRequest {
    pub workspace_id: i64,
    pub question: String,
    pub sql: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub username: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SaveSqlFeedbackResponse {
    pub ok: bool,
    pub id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/save-sql-feedback",
    request_body = SaveSqlFeedbackRequest,
    responses((status = 200, body = SaveSqlFeedbackResponse)),
    tag = "SQL Generation",
)]
pub async fn save_sql_feedback(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SaveSqlFeedbackRequest>,
) -> ApiResult<Json<SaveSqlFeedbackResponse>> {
    let workspace = state.workspace_loader.load(request.workspace_id).await?;
    let runtime = state.runtime_for(request.username.as_deref(), &workspace).await?;

    let collection = format!("workspace-{}", workspace.id);
    let id = runtime.feedback_sink.submit(&request.question, &request.sql, request.evidence, collection).await?;

    Ok(Json(SaveSqlFeedbackResponse { ok: true, id }))
}

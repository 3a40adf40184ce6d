//! `POST /explain-sql` (spec §6): produces a natural-language explanation
//! of an already-selected SQL query, independent of a `/generate-sql` run
//! (C15, invoked directly rather than lazily via the `explain_generated_query`
//! flag).

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::ApiResult;
use crate::utils::language::detect as detect_language;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ExplainSqlRequest {
    pub workspace_id: i64,
    pub question: String,
    pub generated_sql: String,
    pub database_schema: Option<String>,
    pub evidence: Option<Vec<String>>,
    pub chain_of_thought: Option<String>,
    pub language: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ExplainSqlResponse {
    pub explanation: String,
    pub language: String,
}

#[utoipa::path(
    post,
    path = "/explain-sql",
    request_body = ExplainSqlRequest,
    responses((status = 200, body = ExplainSqlResponse)),
    tag = "SQL Generation",
)]
pub async fn explain_sql(State(state): State<Arc<AppState>>, Json(request): Json<ExplainSqlRequest>) -> ApiResult<Json<ExplainSqlResponse>> {
    let workspace = state.workspace_loader.load(request.workspace_id).await?;
    let runtime = state.runtime_for(request.username.as_deref(), &workspace).await?;

    let language = request.language.unwrap_or_else(|| detect_language(&request.question).to_string());
    let explanation = runtime
        .explainer
        .explain_with_context(
            &request.question,
            &request.generated_sql,
            &language,
            request.database_schema.as_deref(),
            request.evidence.as_deref(),
            request.chain_of_thought.as_deref(),
        )
        .await?;

    Ok(Json(ExplainSqlResponse { explanation, language }))
}

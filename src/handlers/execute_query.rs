//! `POST /execute-query` (spec §6): runs an already-selected SQL
//! statement against the workspace's `DbManager` and returns one page of
//! the result set. Pagination, sort and filter are applied in-process
//! over the full result rather than pushed into the SQL text, since
//! `DbManager::execute` only accepts an opaque statement (spec §6: the
//! driver layer is out of scope, consumed only through the trait).

use std::cmp::Ordering;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app_state::AppState;
use crate::error::ApiResult;
use crate::external::db_manager::FetchMode;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ExecuteQueryRequest {
    pub workspace_id: i64,
    pub sql: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    pub sort: Option<SortSpec>,
    pub filter: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct SortSpec {
    pub column: String,
    #[serde(default)]
    pub descending: bool,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    50
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ExecuteQueryResponse {
    pub rows: Vec<Vec<Value>>,
    pub columns: Vec<String>,
    pub page: u32,
    pub total_rows: usize,
    pub total_pages: u32,
}

#[utoipa::path(
    post,
    path = "/execute-query",
    request_body = ExecuteQueryRequest,
    responses((status = 200, body = ExecuteQueryResponse)),
    tag = "SQL Generation",
)]
pub async fn execute_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExecuteQueryRequest>,
) -> ApiResult<Json<ExecuteQueryResponse>> {
    let workspace = state.workspace_loader.load(request.workspace_id).await?;
    let runtime = state.runtime_for(request.username.as_deref(), &workspace).await?;

    let deadlines = state.deadlines();
    let mut result = runtime.db.execute(&request.sql, FetchMode::All, deadlines.db_timeout_ms).await?;

    if let Some(filter) = &request.filter {
        let needle = filter.to_lowercase();
        result.rows.retain(|row| row.iter().any(|v| value_to_text(v).to_lowercase().contains(&needle)));
    }

    if let Some(sort) = &request.sort {
        if let Some(idx) = result.columns.iter().position(|c| c == &sort.column) {
            result.rows.sort_by(|a, b| compare_cell(&a[idx], &b[idx]));
            if sort.descending {
                result.rows.reverse();
            }
        }
    }

    let total_rows = result.rows.len();
    let page_size = request.page_size.max(1);
    let total_pages = ((total_rows as u32) + page_size - 1) / page_size.max(1);
    let total_pages = total_pages.max(1);
    let page = request.page.max(1);

    let start = ((page - 1) * page_size) as usize;
    let end = (start + page_size as usize).min(total_rows);
    let page_rows = if start < total_rows { result.rows[start..end].to_vec() } else { Vec::new() };

    Ok(Json(ExecuteQueryResponse { rows: page_rows, columns: result.columns, page, total_rows, total_pages }))
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare_cell(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => value_to_text(a).cmp(&value_to_text(b)),
    }
}

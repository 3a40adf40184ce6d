//! Core error taxonomy (spec §7).
//!
//! `CoreError` is the single error type threaded through the pipeline and
//! fan-out workers. Each fatal variant maps onto a `CRITICAL_ERROR` frame
//! (see `models::frame`); recoverable conditions are absorbed by the
//! phase that produced them and never reach this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid question: {0}")]
    InvalidQuestion(String),

    #[error("unsupported language: {0}")]
    LanguageUnsupported(String),

    #[error("keyword extraction failed")]
    KeywordExtractionFailed,

    #[error("vector store unavailable: {0}")]
    VdbUnavailable(String),

    #[error("no schema elements found for schema-linked retrieval")]
    NoSchemaElements,

    #[error("no SQL candidate survived validation after escalation")]
    NoSqlGenerated,

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("selector could not reach a decision after escalation")]
    EvaluationFailed,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("model fallback chain exhausted for agent '{0}'")]
    ModelChainExhausted(String),

    #[error("workspace {0} not found")]
    WorkspaceNotFound(i64),

    #[error("agent template error: {0}")]
    TemplateError(String),

    #[error("request cancelled by client")]
    Cancelled,

    #[error("local store error: {0}")]
    StoreError(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl CoreError {
    /// Maps this error onto the structured `{type, component, message,
    /// impact, action}` payload carried by `CRITICAL_ERROR` frames (spec §7).
    pub fn critical_kind(&self) -> &'static str {
        match self {
            Self::InvalidQuestion(_) => "invalid_question",
            Self::LanguageUnsupported(_) => "language_unsupported",
            Self::KeywordExtractionFailed => "keyword_extraction_failed",
            Self::VdbUnavailable(_) => "vdb_unavailable",
            Self::NoSchemaElements => "no_schema_elements",
            Self::NoSqlGenerated => "no_sql_generated",
            Self::DatabaseError(_) => "database_error",
            Self::EvaluationFailed => "evaluation_failed",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::ModelChainExhausted(_) => "model_chain_exhausted",
            Self::WorkspaceNotFound(_) => "workspace_not_found",
            Self::TemplateError(_) => "template_error",
            Self::Cancelled => "cancelled",
            Self::StoreError(_) => "store_error",
            Self::SerializationError(_) => "serialization_error",
        }
    }

    pub fn component(&self) -> &'static str {
        match self {
            Self::InvalidQuestion(_) | Self::LanguageUnsupported(_) => "validator",
            Self::KeywordExtractionFailed => "keyword_extractor",
            Self::VdbUnavailable(_) | Self::NoSchemaElements => "context_retriever",
            Self::NoSqlGenerated => "agent_pool",
            Self::DatabaseError(_) => "db_manager",
            Self::EvaluationFailed => "selector",
            Self::DeadlineExceeded | Self::Cancelled => "pipeline_controller",
            Self::ModelChainExhausted(_) | Self::TemplateError(_) => "agent_adapter",
            Self::WorkspaceNotFound(_) => "workspace_loader",
            Self::StoreError(_) | Self::SerializationError(_) => "session_cache",
        }
    }

    /// Whether a retry of the same operation might succeed (used by
    /// `AgentAdapter`'s fallback chain and by `Evaluator`'s per-cell error
    /// handling).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::VdbUnavailable(_) | Self::DatabaseError(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

// ============================================================================
// HTTP-facing error for the three non-streaming endpoints
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            CoreError::WorkspaceNotFound(_) => StatusCode::NOT_FOUND,
            CoreError::InvalidQuestion(_) | CoreError::LanguageUnsupported(_) => {
                StatusCode::BAD_REQUEST
            },
            CoreError::VdbUnavailable(_) | CoreError::DatabaseError(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            },
            CoreError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            CoreError::ModelChainExhausted(_) => StatusCode::BAD_GATEWAY,
            CoreError::Cancelled => StatusCode::CONFLICT,
            CoreError::StoreError(e) => {
                tracing::error!("local store error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            },
            CoreError::SerializationError(e) => {
                tracing::error!("serialization error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({
            "error": self.0.to_string(),
            "type": self.0.critical_kind(),
            "code": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

//! Stream frame grammar (spec §6): `prefix:payload\n`, where payload is a
//! JSON object for structured frames and free text for the log-like ones.
//! `Frame::encode` is the sole place that decides the wire shape; phases
//! never format frame text themselves (grounded in `fraiseql-wire`'s
//! `TypedJsonStream`, which keeps serialization out of the producer).

use serde_json::Value;

#[derive(Debug, Clone)]
pub enum Frame {
    ThothLog(String),
    SqlFormatted(Value),
    SqlReady(Value),
    SqlExplanation(Value),
    QueryError(Value),
    CriticalError(Value),
    SystemWarning(String),
    Result(Value),
    Cancelled,
}

impl Frame {
    pub fn critical_error(kind: &str, component: &str, message: &str, impact: &str, action: &str) -> Self {
        Self::CriticalError(serde_json::json!({
            "type": kind,
            "component": component,
            "message": message,
            "impact": impact,
            "action": action,
        }))
    }

    pub fn sql_formatted(sql: &str) -> Self {
        Self::SqlFormatted(serde_json::json!({ "sql": sql }))
    }

    pub fn sql_ready(sql: &str, workspace_id: i64) -> Self {
        Self::SqlReady(serde_json::json!({ "sql": sql, "workspace_id": workspace_id }))
    }

    pub fn sql_explanation(text: &str, language: &str) -> Self {
        Self::SqlExplanation(serde_json::json!({ "text": text, "language": language }))
    }

    pub fn result(success: bool, selected_sql: Option<&str>) -> Self {
        Self::Result(serde_json::json!({ "success": success, "selected_sql": selected_sql }))
    }

    /// Serializes this frame to its wire line, including the trailing
    /// newline that terminates every frame.
    pub fn encode(&self) -> String {
        match self {
            Self::ThothLog(text) => format!("THOTHLOG:{text}\n"),
            Self::SqlFormatted(v) => format!("SQL_FORMATTED:{v}\n"),
            Self::SqlReady(v) => format!("SQL_READY:{v}\n"),
            Self::SqlExplanation(v) => format!("SQL_EXPLANATION:{v}\n"),
            Self::QueryError(v) => format!("QUERY_ERROR:{v}\n"),
            Self::CriticalError(v) => format!("CRITICAL_ERROR:{v}\n"),
            Self::SystemWarning(text) => format!("SYSTEM_WARNING:{text}\n"),
            Self::Result(v) => format!("RESULT:{v}\n"),
            Self::Cancelled => "CANCELLED:\n".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_ready_carries_workspace_id() {
        let frame = Frame::sql_ready("SELECT 1", 42);
        let encoded = frame.encode();
        assert!(encoded.starts_with("SQL_READY:"));
        assert!(encoded.contains("\"workspace_id\":42"));
        assert!(encoded.ends_with('\n'));
    }

    #[test]
    fn critical_error_carries_all_fields() {
        let frame = Frame::critical_error("deadline_exceeded", "pipeline_controller", "too slow", "no SQL produced", "retry");
        let encoded = frame.encode();
        assert!(encoded.starts_with("CRITICAL_ERROR:"));
        for field in ["deadline_exceeded", "pipeline_controller", "too slow", "no SQL produced", "retry"] {
            assert!(encoded.contains(field), "missing {field} in {encoded}");
        }
    }

    #[test]
    fn cancelled_has_no_payload() {
        assert_eq!(Frame::Cancelled.encode(), "CANCELLED:\n");
    }

    #[test]
    fn result_frame_reports_failure_with_no_sql() {
        let frame = Frame::result(false, None);
        let encoded = frame.encode();
        assert!(encoded.contains("\"success\":false"));
        assert!(encoded.contains("\"selected_sql\":null"));
    }
}

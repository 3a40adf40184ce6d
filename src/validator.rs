//! Post-processes raw LLM SQL into something executable (C4): strip
//! markdown fencing, correct identifier delimiters for the target
//! dialect, pretty-print, apply a handful of portability rewrites, then
//! probe the result against `DbManager`.

use std::sync::Arc;

use regex::Regex;

use crate::external::db_manager::{DbManager, Dialect, FetchMode};
use crate::models::candidate::Candidate;

pub struct SqlOutputValidator {
    db: Arc<dyn DbManager>,
}

impl SqlOutputValidator {
    pub fn new(db: Arc<dyn DbManager>) -> Self {
        Self { db }
    }

    /// Runs every normalization step against `candidate.raw` and then
    /// probes the result, filling in `normalized`/`probe_ok`/`probe_error`.
    /// A failed probe does not discard the candidate — P5 keeps it for
    /// diagnostics (spec §4.1).
    pub async fn validate(&self, mut candidate: Candidate, probe_timeout_ms: u64) -> Candidate {
        let stripped = strip_fences(&candidate.raw);
        let delimited = correct_delimiters(&stripped, self.db.dialect());
        let pretty = pretty_print(&delimited);
        let rewritten = compatibility_rewrites(&pretty, self.db.dialect());

        candidate.normalized = rewritten;
        candidate.complexity = token_count_proxy(&candidate.normalized);

        match self.probe(&candidate.normalized, probe_timeout_ms).await {
            Ok(()) => {
                candidate.probe_ok = true;
                candidate.probe_error = None;
            },
            Err(message) => {
                candidate.probe_ok = false;
                candidate.probe_error = Some(message);
            },
        }

        candidate
    }

    async fn probe(&self, sql: &str, timeout_ms: u64) -> Result<(), String> {
        let probe_sql = format!("SELECT * FROM ({sql}) AS probe_wrap LIMIT 0");
        self.db
            .execute(&probe_sql, FetchMode::None, timeout_ms)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Strips ```sql fences / bare ``` fences and trailing commentary,
/// keeping only the first statement up to its terminating semicolon
/// (or the whole remainder if none is present).
fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_fences = if trimmed.starts_with("```") {
        let after_open = trimmed.splitn(2, '\n').nth(1).unwrap_or("");
        after_open.trim_end().trim_end_matches("```").trim()
    } else {
        trimmed
    };

    match without_fences.find(';') {
        Some(idx) => without_fences[..=idx].to_string(),
        None => without_fences.to_string(),
    }
}

/// Rewrites identifier delimiters for the target dialect. The LLM is
/// asked to use double quotes; MySQL-family dialects require backticks.
fn correct_delimiters(sql: &str, dialect: Dialect) -> String {
    match dialect {
        Dialect::MySql => {
            static DOUBLE_QUOTED: once_cell::sync::Lazy<Regex> =
                once_cell::sync::Lazy::new(|| Regex::new(r#""([A-Za-z_][A-Za-z0-9_]*)""#).unwrap());
            DOUBLE_QUOTED.replace_all(sql, "`$1`").into_owned()
        },
        Dialect::Postgres | Dialect::Sqlite => sql.to_string(),
    }
}

/// Collapses internal whitespace to single spaces and ensures clause
/// keywords start on their own line — a lightweight stand-in for a full
/// SQL-format utility, sufficient to make output deterministic and
/// readable in `SQL_FORMATTED` frames.
fn pretty_print(sql: &str) -> String {
    static CLAUSE: once_cell::sync::Lazy<Regex> = once_cell::sync::Lazy::new(|| {
        Regex::new(r"(?i)\s+(FROM|WHERE|GROUP BY|ORDER BY|HAVING|LIMIT|JOIN|LEFT JOIN|RIGHT JOIN|INNER JOIN)\s+").unwrap()
    });
    let collapsed: String = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    CLAUSE.replace_all(&collapsed, "\n$1 ").trim().to_string()
}

/// Dialect-specific compatibility fixes: `DISTINCT` inside a tuple
/// expression and positional parameter placeholders.
fn compatibility_rewrites(sql: &str, dialect: Dialect) -> String {
    match dialect {
        Dialect::Postgres => sql.replace("DISTINCT(", "DISTINCT ("),
        Dialect::MySql | Dialect::Sqlite => sql.to_string(),
    }
}

fn token_count_proxy(sql: &str) -> u32 {
    sql.split_whitespace().count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_sql_fence() {
        let raw = "```sql\nSELECT 1;\n```";
        assert_eq!(strip_fences(raw), "SELECT 1;");
    }

    #[test]
    fn strips_bare_fence() {
        let raw = "```\nSELECT 1\n```";
        assert_eq!(strip_fences(raw), "SELECT 1");
    }

    #[test]
    fn mysql_delimiters_become_backticks() {
        let out = correct_delimiters(r#"SELECT "col" FROM "tbl""#, Dialect::MySql);
        assert_eq!(out, "SELECT `col` FROM `tbl`");
    }

    #[test]
    fn postgres_delimiters_unchanged() {
        let out = correct_delimiters(r#"SELECT "col" FROM "tbl""#, Dialect::Postgres);
        assert_eq!(out, r#"SELECT "col" FROM "tbl""#);
    }

    #[test]
    fn pretty_print_is_idempotent() {
        let once = pretty_print("SELECT a, b FROM t WHERE a = 1 ORDER BY a");
        let twice = pretty_print(&once);
        assert_eq!(once, twice);
    }
}

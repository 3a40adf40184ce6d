//! Contract for the SQL database driver layer (spec §1, out of scope —
//! contract only). `SqlOutputValidator` and `Evaluator` are the only
//! components that call through this trait.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CoreError;
pub use crate::models::workspace::SqlDialect as Dialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    None,
    One,
    All,
}

#[derive(Debug, Clone)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[async_trait]
pub trait DbManager: Send + Sync {
    async fn execute(&self, sql: &str, fetch: FetchMode, timeout_ms: u64) -> Result<QueryRows, CoreError>;

    fn dialect(&self) -> Dialect;

    /// `true` when this manager is restricted to read-only statements —
    /// the mode `SqlOutputValidator`'s probe step and `Evaluator` always
    /// run under.
    fn is_read_only(&self) -> bool {
        true
    }
}

/// Reference `DbManager` implementation for a SQLite-backed target
/// workspace database, used by the standalone binary when no external
/// driver layer is wired in. A deployment embedding this crate behind the
/// real admin surface (spec §1, out of scope) supplies its own
/// `DbManager` for Postgres/MySQL-backed workspaces instead.
pub struct SqliteDbManager {
    pool: sqlx::SqlitePool,
}

impl SqliteDbManager {
    pub async fn connect(url: &str) -> Result<Self, CoreError> {
        let pool = sqlx::SqlitePool::connect(url).await.map_err(CoreError::StoreError)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl DbManager for SqliteDbManager {
    async fn execute(&self, sql: &str, fetch: FetchMode, timeout_ms: u64) -> Result<QueryRows, CoreError> {
        use sqlx::{Column, Row};

        let query = sqlx::query(sql);
        let fut = async {
            match fetch {
                FetchMode::None => {
                    query.execute(&self.pool).await.map_err(|e| CoreError::DatabaseError(e.to_string()))?;
                    Ok(QueryRows { columns: Vec::new(), rows: Vec::new() })
                },
                FetchMode::One => {
                    let row = query.fetch_optional(&self.pool).await.map_err(|e| CoreError::DatabaseError(e.to_string()))?;
                    match row {
                        Some(row) => {
                            let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
                            Ok(QueryRows { columns: columns.clone(), rows: vec![row_to_values(&row, &columns)] })
                        },
                        None => Ok(QueryRows { columns: Vec::new(), rows: Vec::new() }),
                    }
                },
                FetchMode::All => {
                    let rows = query.fetch_all(&self.pool).await.map_err(|e| CoreError::DatabaseError(e.to_string()))?;
                    let columns = rows.first().map(|r| r.columns().iter().map(|c| c.name().to_string()).collect()).unwrap_or_default();
                    let values = rows.iter().map(|r| row_to_values(r, &columns)).collect();
                    Ok(QueryRows { columns, rows: values })
                },
            }
        };

        match tokio::time::timeout(std::time::Duration::from_millis(timeout_ms), fut).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::DatabaseError("query timed out".to_string())),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }
}

fn row_to_values(row: &sqlx::sqlite::SqliteRow, columns: &[String]) -> Vec<Value> {
    use sqlx::Row;

    (0..columns.len())
        .map(|i| {
            if let Ok(v) = row.try_get::<i64, _>(i) {
                return Value::from(v);
            }
            if let Ok(v) = row.try_get::<f64, _>(i) {
                return serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null);
            }
            if let Ok(v) = row.try_get::<bool, _>(i) {
                return Value::Bool(v);
            }
            if let Ok(v) = row.try_get::<String, _>(i) {
                return Value::String(v);
            }
            Value::Null
        })
        .collect()
}

//! The compact schema description (*mschema*) presented to SQL- and
//! test-generation agents: either the full catalog or a reduced view
//! limited to the tables/columns the linking step identified, expanded
//! to their direct foreign-key neighbors (spec §4.6).

use std::collections::HashSet;

use crate::error::CoreError;
use crate::external::db_manager::{DbManager, Dialect, FetchMode, QueryRows};
use crate::models::request::SchemaColumn;

const SAMPLE_VALUES_PER_COLUMN: usize = 3;

#[derive(Debug, Clone)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    /// Bounded sample of distinct values, used both for LSH indexing and
    /// for giving the agent concrete value examples.
    pub sample_values: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    pub tables: Vec<TableSchema>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl SchemaCatalog {
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Builds a `SchemaCatalog` by introspecting the target workspace
    /// database through `DbManager::execute` — the only surface this
    /// out-of-scope collaborator exposes (spec §1). Used once per
    /// `SessionCache` miss (P0), not per request.
    pub async fn introspect(db: &dyn DbManager) -> Result<Self, CoreError> {
        match db.dialect() {
            Dialect::Sqlite => introspect_sqlite(db).await,
            Dialect::Postgres | Dialect::MySql => introspect_information_schema(db).await,
        }
    }

    /// Tables reachable from `seed` via a single foreign-key hop in
    /// either direction (spec §4.6: "transitively up to depth 1").
    fn fk_neighbors(&self, seed: &HashSet<String>) -> HashSet<String> {
        let mut neighbors = HashSet::new();
        for fk in &self.foreign_keys {
            if seed.contains(&fk.from_table) {
                neighbors.insert(fk.to_table.clone());
            }
            if seed.contains(&fk.to_table) {
                neighbors.insert(fk.from_table.clone());
            }
        }
        neighbors
    }

    pub fn render_full(&self) -> String {
        render(&self.tables)
    }

    pub fn render_reduced(&self, linked: &HashSet<SchemaColumn>) -> String {
        let seed_tables: HashSet<String> = linked.iter().map(|c| c.table.clone()).collect();
        let mut include_tables = seed_tables.clone();
        include_tables.extend(self.fk_neighbors(&seed_tables));

        let subset: Vec<TableSchema> = self
            .tables
            .iter()
            .filter(|t| include_tables.contains(&t.name))
            .cloned()
            .collect();
        render(&subset)
    }
}

fn render(tables: &[TableSchema]) -> String {
    let mut out = String::new();
    for table in tables {
        out.push_str(&format!("# {}\n", table.name));
        for col in &table.columns {
            if col.sample_values.is_empty() {
                out.push_str(&format!("- {} ({})\n", col.name, col.data_type));
            } else {
                out.push_str(&format!(
                    "- {} ({}) e.g. [{}]\n",
                    col.name,
                    col.data_type,
                    col.sample_values.join(", ")
                ));
            }
        }
    }
    out
}

fn text_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

async fn introspect_sqlite(db: &dyn DbManager) -> Result<SchemaCatalog, CoreError> {
    let tables_rows = db
        .execute(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            FetchMode::All,
            10_000,
        )
        .await?;

    let mut tables = Vec::new();
    let mut foreign_keys = Vec::new();

    for row in &tables_rows.rows {
        let Some(table_name) = row.first().map(text_cell) else { continue };

        let columns_rows = db.execute(&format!("PRAGMA table_info({table_name})"), FetchMode::All, 10_000).await?;
        let mut columns = Vec::new();
        for col_row in &columns_rows.rows {
            // PRAGMA table_info: cid, name, type, notnull, dflt_value, pk
            let name = col_row.get(1).map(text_cell).unwrap_or_default();
            let data_type = col_row.get(2).map(text_cell).unwrap_or_else(|| "text".to_string());
            let sample_values = sample_values(db, &table_name, &name).await.unwrap_or_default();
            columns.push(ColumnSchema { name, data_type, sample_values });
        }
        tables.push(TableSchema { name: table_name.clone(), columns });

        let fk_rows = db.execute(&format!("PRAGMA foreign_key_list({table_name})"), FetchMode::All, 10_000).await?;
        for fk_row in &fk_rows.rows {
            // PRAGMA foreign_key_list: id, seq, table, from, to, ...
            let to_table = fk_row.get(2).map(text_cell).unwrap_or_default();
            let from_column = fk_row.get(3).map(text_cell).unwrap_or_default();
            let to_column = fk_row.get(4).map(text_cell).unwrap_or_default();
            if !to_table.is_empty() {
                foreign_keys.push(ForeignKey {
                    from_table: table_name.clone(),
                    from_column,
                    to_table,
                    to_column,
                });
            }
        }
    }

    Ok(SchemaCatalog { tables, foreign_keys })
}

async fn introspect_information_schema(db: &dyn DbManager) -> Result<SchemaCatalog, CoreError> {
    let columns_rows = db
        .execute(
            "SELECT table_name, column_name, data_type FROM information_schema.columns \
             WHERE table_schema NOT IN ('information_schema', 'pg_catalog') \
             ORDER BY table_name, ordinal_position",
            FetchMode::All,
            10_000,
        )
        .await?;

    let mut tables: Vec<TableSchema> = Vec::new();
    for row in &columns_rows.rows {
        let table_name = row.first().map(text_cell).unwrap_or_default();
        let column_name = row.get(1).map(text_cell).unwrap_or_default();
        let data_type = row.get(2).map(text_cell).unwrap_or_else(|| "text".to_string());
        let sample_values = sample_values(db, &table_name, &column_name).await.unwrap_or_default();

        match tables.iter_mut().find(|t| t.name == table_name) {
            Some(table) => table.columns.push(ColumnSchema { name: column_name, data_type, sample_values }),
            None => tables.push(TableSchema {
                name: table_name,
                columns: vec![ColumnSchema { name: column_name, data_type, sample_values }],
            }),
        }
    }

    let fk_rows = db
        .execute(
            "SELECT kcu.table_name, kcu.column_name, ccu.table_name, ccu.column_name \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu ON tc.constraint_name = kcu.constraint_name \
             JOIN information_schema.constraint_column_usage ccu ON tc.constraint_name = ccu.constraint_name \
             WHERE tc.constraint_type = 'FOREIGN KEY'",
            FetchMode::All,
            10_000,
        )
        .await
        .unwrap_or(QueryRows { columns: Vec::new(), rows: Vec::new() });

    let foreign_keys = fk_rows
        .rows
        .iter()
        .filter_map(|row| {
            Some(ForeignKey {
                from_table: row.first().map(text_cell)?,
                from_column: row.get(1).map(text_cell)?,
                to_table: row.get(2).map(text_cell)?,
                to_column: row.get(3).map(text_cell)?,
            })
        })
        .collect();

    Ok(SchemaCatalog { tables, foreign_keys })
}

/// Best-effort bounded sample of distinct values for one column, used
/// both for LSH indexing and to give the agent concrete value examples
/// (spec §4.6 "full: ... sample values (bounded)").
async fn sample_values(db: &dyn DbManager, table: &str, column: &str) -> Result<Vec<String>, CoreError> {
    let sql = format!(
        "SELECT DISTINCT {column} FROM {table} WHERE {column} IS NOT NULL LIMIT {SAMPLE_VALUES_PER_COLUMN}"
    );
    let rows = db.execute(&sql, FetchMode::All, 5_000).await?;
    Ok(rows.rows.iter().filter_map(|r| r.first()).map(text_cell).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog {
            tables: vec![
                TableSchema {
                    name: "schools".to_string(),
                    columns: vec![ColumnSchema { name: "id".to_string(), data_type: "integer".to_string(), sample_values: vec![] }],
                },
                TableSchema {
                    name: "districts".to_string(),
                    columns: vec![ColumnSchema {
                        name: "name".to_string(),
                        data_type: "text".to_string(),
                        sample_values: vec!["Los Angeles".to_string()],
                    }],
                },
                TableSchema {
                    name: "unrelated".to_string(),
                    columns: vec![ColumnSchema { name: "x".to_string(), data_type: "text".to_string(), sample_values: vec![] }],
                },
            ],
            foreign_keys: vec![ForeignKey {
                from_table: "schools".to_string(),
                from_column: "district_id".to_string(),
                to_table: "districts".to_string(),
                to_column: "id".to_string(),
            }],
        }
    }

    #[test]
    fn render_full_includes_every_table() {
        let rendered = catalog().render_full();
        assert!(rendered.contains("# schools"));
        assert!(rendered.contains("# districts"));
        assert!(rendered.contains("# unrelated"));
    }

    #[test]
    fn render_reduced_expands_one_foreign_key_hop_but_not_further() {
        let mut linked = HashSet::new();
        linked.insert(SchemaColumn { table: "schools".to_string(), column: "id".to_string() });

        let rendered = catalog().render_reduced(&linked);
        assert!(rendered.contains("# schools"));
        assert!(rendered.contains("# districts"));
        assert!(!rendered.contains("# unrelated"));
    }

    #[test]
    fn render_reduced_shows_sample_values_when_present() {
        let mut linked = HashSet::new();
        linked.insert(SchemaColumn { table: "districts".to_string(), column: "name".to_string() });

        let rendered = catalog().render_reduced(&linked);
        assert!(rendered.contains("Los Angeles"));
    }
}

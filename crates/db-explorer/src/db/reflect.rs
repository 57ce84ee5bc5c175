//! Catalog reflection into [`DatabaseDescriptor`]s.
//!
//! Each backend has one catalog query for tables, one for columns and, for the
//! network kinds, one for the database-level comment. All of them run through
//! the guarded connection like any other statement, and every value they take
//! is bound.

use super::backend::{GuardedConnection, QueryResult};
use super::error::DataSourceError;
use super::metadata::{ColumnDescriptor, DatabaseDescriptor, TableDescriptor};
use crate::config::BackendKind;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Catalog statements of one backend.
///
/// `tables` yields `(table_name, description)`, ordered by name.
/// `columns` yields `(table_name, column_name, data_type, description)`,
/// ordered by table then column position.
#[derive(Debug, Clone, Copy)]
pub struct CatalogQueries {
    pub tables: &'static str,
    pub columns: &'static str,
    /// Takes the database name as `:dbname`.
    pub database_comment: Option<&'static str>,
}

const SQLITE_CATALOG: CatalogQueries = CatalogQueries {
    tables: "SELECT name AS table_name, NULL AS description \
             FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
    columns: "SELECT m.name AS table_name, p.name AS column_name, p.type AS data_type, \
              NULL AS description \
              FROM sqlite_master m JOIN pragma_table_info(m.name) p \
              WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%' \
              ORDER BY m.name, p.cid",
    database_comment: None,
};

const POSTGRES_CATALOG: CatalogQueries = CatalogQueries {
    tables: "SELECT c.relname::text AS table_name, obj_description(c.oid, 'pg_class') AS description \
             FROM pg_catalog.pg_class c \
             JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
             WHERE n.nspname = current_schema() AND c.relkind IN ('r', 'p') \
             ORDER BY c.relname",
    columns: "SELECT c.relname::text AS table_name, a.attname::text AS column_name, \
              format_type(a.atttypid, a.atttypmod) AS data_type, \
              col_description(a.attrelid, a.attnum) AS description \
              FROM pg_catalog.pg_attribute a \
              JOIN pg_catalog.pg_class c ON c.oid = a.attrelid \
              JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
              WHERE n.nspname = current_schema() AND c.relkind IN ('r', 'p') \
              AND a.attnum > 0 AND NOT a.attisdropped \
              ORDER BY c.relname, a.attnum",
    database_comment: Some(
        "SELECT description FROM pg_shdescription \
         WHERE objoid = (SELECT oid FROM pg_database WHERE datname = :dbname)",
    ),
};

const MYSQL_CATALOG: CatalogQueries = CatalogQueries {
    tables: "SELECT CAST(TABLE_NAME AS CHAR) AS table_name, \
             CAST(TABLE_COMMENT AS CHAR) AS description \
             FROM information_schema.tables \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
             ORDER BY TABLE_NAME",
    columns: "SELECT CAST(TABLE_NAME AS CHAR) AS table_name, \
              CAST(COLUMN_NAME AS CHAR) AS column_name, \
              CAST(COLUMN_TYPE AS CHAR) AS data_type, \
              CAST(COLUMN_COMMENT AS CHAR) AS description \
              FROM information_schema.columns \
              WHERE TABLE_SCHEMA = DATABASE() \
              ORDER BY TABLE_NAME, ORDINAL_POSITION",
    database_comment: Some(
        "SELECT SCHEMA_COMMENT FROM information_schema.schemata WHERE SCHEMA_NAME = :dbname",
    ),
};

impl CatalogQueries {
    pub fn for_kind(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Sqlite => SQLITE_CATALOG,
            BackendKind::Postgres => POSTGRES_CATALOG,
            BackendKind::MySql => MYSQL_CATALOG,
        }
    }
}

/// Reads a connected backend's catalog into a [`DatabaseDescriptor`].
pub struct MetadataReflector<'a> {
    conn: &'a GuardedConnection,
    queries: CatalogQueries,
}

impl<'a> MetadataReflector<'a> {
    pub fn new(conn: &'a GuardedConnection) -> Self {
        Self {
            conn,
            queries: CatalogQueries::for_kind(conn.kind()),
        }
    }

    /// Reflects all tables and columns.
    ///
    /// `name` becomes the descriptor name; `db_name` is bound into the
    /// database-comment query. A failing comment query only leaves the
    /// description absent.
    pub async fn reflect(
        &self,
        name: &str,
        db_name: &str,
    ) -> Result<DatabaseDescriptor, DataSourceError> {
        let tables = self.tables().await?;
        let description = self.database_comment(db_name).await;

        debug!(
            source = name,
            tables = tables.len(),
            "Reflected database metadata"
        );

        Ok(DatabaseDescriptor {
            name: name.to_string(),
            tables,
            description,
        })
    }

    async fn tables(&self) -> Result<Vec<TableDescriptor>, DataSourceError> {
        let tables = self.catalog(self.queries.tables).await?;
        let columns = self.catalog(self.queries.columns).await?;

        let mut by_table: HashMap<String, Vec<ColumnDescriptor>> = HashMap::new();
        for row in &columns.rows {
            let (Some(table), Some(column)) = (text_at(row, 0), text_at(row, 1)) else {
                continue;
            };
            by_table.entry(table).or_default().push(ColumnDescriptor {
                name: column,
                data_type: text_at(row, 2).unwrap_or_default(),
                description: text_at(row, 3),
            });
        }

        let mut reflected: Vec<TableDescriptor> = tables
            .rows
            .iter()
            .filter_map(|row| {
                let name = text_at(row, 0)?;
                Some(TableDescriptor {
                    columns: by_table.remove(&name).unwrap_or_default(),
                    description: text_at(row, 1),
                    name,
                })
            })
            .collect();
        reflected.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(reflected)
    }

    async fn database_comment(&self, db_name: &str) -> Option<String> {
        let statement = self.queries.database_comment?;
        let mut params = Map::new();
        params.insert("dbname".to_string(), Value::String(db_name.to_string()));

        match self.conn.query(statement, &params).await {
            Ok(result) => result.rows.first().and_then(|row| text_at(row, 0)),
            Err(e) => {
                warn!(error = %e, "Database comment query failed");
                None
            }
        }
    }

    async fn catalog(&self, statement: &str) -> Result<QueryResult, DataSourceError> {
        self.conn
            .query(statement, &Map::new())
            .await
            .map_err(|e| DataSourceError::Reflection(e.to_string()))
    }
}

/// Non-empty string cell; catalogs report a missing comment as `NULL` or `''`.
fn text_at(row: &[Value], index: usize) -> Option<String> {
    match row.get(index)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::guard::ReadOnlyGuard;
    use serde_json::json;

    #[test]
    fn test_catalog_queries_pass_the_guard() {
        let guard = ReadOnlyGuard::new();
        for kind in [BackendKind::Sqlite, BackendKind::Postgres, BackendKind::MySql] {
            let queries = CatalogQueries::for_kind(kind);
            assert!(guard.check(queries.tables).is_ok());
            assert!(guard.check(queries.columns).is_ok());
            if let Some(comment) = queries.database_comment {
                assert!(guard.check(comment).is_ok());
                assert!(comment.contains(":dbname"));
            }
        }
    }

    #[test]
    fn test_only_network_kinds_have_database_comments() {
        assert!(
            CatalogQueries::for_kind(BackendKind::Sqlite)
                .database_comment
                .is_none()
        );
        assert!(
            CatalogQueries::for_kind(BackendKind::Postgres)
                .database_comment
                .is_some()
        );
        assert!(
            CatalogQueries::for_kind(BackendKind::MySql)
                .database_comment
                .is_some()
        );
    }

    #[test]
    fn test_text_at_treats_empty_as_absent() {
        let row = vec![json!("players"), json!(""), Value::Null, json!(3)];
        assert_eq!(text_at(&row, 0).as_deref(), Some("players"));
        assert_eq!(text_at(&row, 1), None);
        assert_eq!(text_at(&row, 2), None);
        assert_eq!(text_at(&row, 3), None);
        assert_eq!(text_at(&row, 9), None);
    }
}

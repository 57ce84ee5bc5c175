//! Pooled backend connections with the read-only guard in front of them.
//!
//! [`GuardedConnection`] is the only path from this crate to a database: it
//! checks every statement with [`ReadOnlyGuard`], rewrites `:name`
//! placeholders into bound parameters, runs the statement on the backend pool
//! and decodes the rows into JSON cells.

use super::error::DataSourceError;
use super::guard::ReadOnlyGuard;
use super::params::{BoundStatement, bind_named};
use crate::config::{BackendKind, ConnectionParams};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::types::BigDecimal;
use sqlx::types::Uuid;
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{Column, ColumnIndex, Executor, Row, Statement, TypeInfo, ValueRef};
use tracing::debug;

/// Binds JSON values positionally. Numbers bind as integers when they fit,
/// compound values bind as their JSON text.
macro_rules! bind_values {
    ($query:expr, $values:expr) => {{
        let mut query = $query;
        for value in $values {
            query = match value {
                Value::Null => query.bind(None::<String>),
                Value::Bool(b) => query.bind(*b),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => query.bind(i),
                    None => query.bind(n.as_f64()),
                },
                Value::String(s) => query.bind(s.clone()),
                other => query.bind(other.to_string()),
            };
        }
        query
    }};
}

/// Streams rows until the cap is hit. Column names come from the first row,
/// or from preparing the statement when there are no rows.
macro_rules! fetch_capped {
    ($pool:expr, $bound:expr, $max_rows:expr, $decode:ident) => {{
        let bound: &BoundStatement = $bound;
        let query = bind_values!(sqlx::query(&bound.sql), &bound.values);
        let mut stream = query.fetch($pool);
        let mut columns: Option<Vec<String>> = None;
        let mut rows = Vec::new();
        let mut truncated = false;

        while let Some(row) = stream.try_next().await? {
            if columns.is_none() {
                columns = Some(row.columns().iter().map(|c| c.name().to_string()).collect());
            }
            if rows.len() >= $max_rows {
                truncated = true;
                break;
            }
            rows.push((0..row.len()).map(|i| $decode(&row, i)).collect::<Vec<Value>>());
        }
        drop(stream);

        let columns = match columns {
            Some(columns) => columns,
            None => {
                let prepared = $pool.prepare(&bound.sql).await?;
                prepared
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect()
            }
        };

        Ok(QueryResult {
            columns,
            rows,
            truncated,
        })
    }};
}

/// Tabular result of a read statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names of the statement's projection, also for zero rows.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Set when the row cap cut the result short.
    #[serde(default)]
    pub truncated: bool,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of a single-row, single-column result, such as `SELECT COUNT(*)`.
    pub fn scalar(&self) -> Option<&Value> {
        match (self.columns.len(), self.rows.as_slice()) {
            (1, [row]) => row.first(),
            _ => None,
        }
    }

    /// Rows as objects keyed by column name.
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

enum BackendPool {
    Sqlite(SqlitePool),
    Postgres(PgPool),
    MySql(MySqlPool),
}

/// A live, read-only connection pool for one data source.
pub struct GuardedConnection {
    pool: BackendPool,
    guard: ReadOnlyGuard,
    kind: BackendKind,
    max_rows: usize,
}

impl GuardedConnection {
    /// Opens the pool and establishes the first connection.
    ///
    /// Sqlite files are opened with `SQLITE_OPEN_READONLY`. Network sessions
    /// are switched to read-only transactions as soon as they are opened, and
    /// the guard rejects every statement that could switch them back.
    pub async fn open(params: &ConnectionParams) -> Result<Self, DataSourceError> {
        let settings = &params.pool;
        let pool = match params.kind {
            BackendKind::Sqlite => {
                let options = SqliteConnectOptions::new()
                    .filename(&params.db_name)
                    .read_only(true)
                    .create_if_missing(false);
                let pool = SqlitePoolOptions::new()
                    .max_connections(settings.max_connections)
                    .acquire_timeout(settings.acquire_timeout())
                    .connect_with(options)
                    .await
                    .map_err(connection_error)?;
                BackendPool::Sqlite(pool)
            }
            BackendKind::Postgres => {
                let options = PgConnectOptions::new()
                    .host(params.host.as_deref().unwrap_or_default())
                    .port(params.port.unwrap_or(5432))
                    .username(params.username.as_deref().unwrap_or_default())
                    .password(params.password.as_deref().unwrap_or_default())
                    .database(&params.db_name);
                let pool = PgPoolOptions::new()
                    .max_connections(settings.max_connections)
                    .acquire_timeout(settings.acquire_timeout())
                    .after_connect(|conn, _meta| {
                        Box::pin(async move {
                            conn.execute("SET SESSION CHARACTERISTICS AS TRANSACTION READ ONLY")
                                .await?;
                            Ok(())
                        })
                    })
                    .connect_with(options)
                    .await
                    .map_err(connection_error)?;
                BackendPool::Postgres(pool)
            }
            BackendKind::MySql => {
                let options = MySqlConnectOptions::new()
                    .host(params.host.as_deref().unwrap_or_default())
                    .port(params.port.unwrap_or(3306))
                    .username(params.username.as_deref().unwrap_or_default())
                    .password(params.password.as_deref().unwrap_or_default())
                    .database(&params.db_name);
                let pool = MySqlPoolOptions::new()
                    .max_connections(settings.max_connections)
                    .acquire_timeout(settings.acquire_timeout())
                    .after_connect(|conn, _meta| {
                        Box::pin(async move {
                            conn.execute("SET SESSION TRANSACTION READ ONLY").await?;
                            Ok(())
                        })
                    })
                    .connect_with(options)
                    .await
                    .map_err(connection_error)?;
                BackendPool::MySql(pool)
            }
        };

        Ok(Self {
            pool,
            guard: ReadOnlyGuard::new(),
            kind: params.kind,
            max_rows: settings.max_rows,
        })
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn guard(&self) -> &ReadOnlyGuard {
        &self.guard
    }

    /// Guard check, placeholder rewrite, then bound execution.
    pub async fn query(
        &self,
        statement: &str,
        params: &Map<String, Value>,
    ) -> Result<QueryResult, DataSourceError> {
        self.guard.check(statement)?;
        let bound = bind_named(statement, params, self.kind.dialect())?;
        debug!(backend = %self.kind, sql = %bound.sql, binds = bound.values.len(), "Executing statement");

        match &self.pool {
            BackendPool::Sqlite(pool) => fetch_capped!(pool, &bound, self.max_rows, sqlite_cell),
            BackendPool::Postgres(pool) => fetch_capped!(pool, &bound, self.max_rows, postgres_cell),
            BackendPool::MySql(pool) => fetch_capped!(pool, &bound, self.max_rows, mysql_cell),
        }
    }

    pub async fn close(&self) {
        match &self.pool {
            BackendPool::Sqlite(pool) => pool.close().await,
            BackendPool::Postgres(pool) => pool.close().await,
            BackendPool::MySql(pool) => pool.close().await,
        }
    }
}

fn connection_error(err: sqlx::Error) -> DataSourceError {
    DataSourceError::Connection(err.to_string())
}

/// Tries each type in order and maps the first that decodes.
macro_rules! decode_first {
    ($row:expr, $index:expr, $($ty:ty => $map:expr),+ $(,)?) => {{
        $(
            if let Ok(value) = $row.try_get::<$ty, _>($index) {
                return $map(value);
            }
        )+
    }};
}

fn is_null<R: Row>(row: &R, index: usize) -> bool
where
    usize: ColumnIndex<R>,
{
    row.try_get_raw(index).map(|v| v.is_null()).unwrap_or(true)
}

fn unsupported<R: Row>(row: &R, index: usize) -> Value
where
    usize: ColumnIndex<R>,
{
    Value::String(format!("<{}>", row.column(index).type_info().name()))
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn decimal_value(d: BigDecimal) -> Value {
    let text = d.to_string();
    match text.parse::<Number>() {
        Ok(n) => Value::Number(n),
        Err(_) => Value::String(text),
    }
}

fn blob_value(bytes: Vec<u8>) -> Value {
    Value::String(hex::encode(bytes))
}

fn sqlite_cell(row: &SqliteRow, index: usize) -> Value {
    if is_null(row, index) {
        return Value::Null;
    }
    decode_first!(row, index,
        i64 => Value::from,
        f64 => float_value,
        String => Value::String,
        Vec<u8> => blob_value,
    );
    unsupported(row, index)
}

fn postgres_cell(row: &PgRow, index: usize) -> Value {
    if is_null(row, index) {
        return Value::Null;
    }
    decode_first!(row, index,
        bool => Value::Bool,
        i16 => Value::from,
        i32 => Value::from,
        i64 => Value::from,
        f32 => |f: f32| float_value(f64::from(f)),
        f64 => float_value,
        BigDecimal => decimal_value,
        String => Value::String,
        NaiveDateTime => |t: NaiveDateTime| Value::String(t.to_string()),
        DateTime<Utc> => |t: DateTime<Utc>| Value::String(t.to_rfc3339()),
        NaiveDate => |d: NaiveDate| Value::String(d.to_string()),
        NaiveTime => |t: NaiveTime| Value::String(t.to_string()),
        Uuid => |u: Uuid| Value::String(u.to_string()),
        Value => |v: Value| v,
        Vec<u8> => blob_value,
    );
    unsupported(row, index)
}

fn mysql_cell(row: &MySqlRow, index: usize) -> Value {
    if is_null(row, index) {
        return Value::Null;
    }
    decode_first!(row, index,
        i64 => Value::from,
        u64 => Value::from,
        f32 => |f: f32| float_value(f64::from(f)),
        f64 => float_value,
        BigDecimal => decimal_value,
        String => Value::String,
        NaiveDateTime => |t: NaiveDateTime| Value::String(t.to_string()),
        DateTime<Utc> => |t: DateTime<Utc>| Value::String(t.to_rfc3339()),
        NaiveDate => |d: NaiveDate| Value::String(d.to_string()),
        NaiveTime => |t: NaiveTime| Value::String(t.to_string()),
        Value => |v: Value| v,
        Vec<u8> => blob_value,
    );
    unsupported(row, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_only_for_single_cell() {
        let single = QueryResult {
            columns: vec!["count".into()],
            rows: vec![vec![json!(1)]],
            truncated: false,
        };
        assert_eq!(single.scalar(), Some(&json!(1)));

        let wide = QueryResult {
            columns: vec!["id".into(), "name".into()],
            rows: vec![vec![json!(1), json!("Ana")]],
            truncated: false,
        };
        assert_eq!(wide.scalar(), None);
    }

    #[test]
    fn test_records_are_keyed_by_column() {
        let result = QueryResult {
            columns: vec!["id".into(), "name".into()],
            rows: vec![vec![json!(1), json!("Ana")], vec![json!(2), json!(null)]],
            truncated: false,
        };
        let records = result.records();
        assert_eq!(records[0]["name"], json!("Ana"));
        assert_eq!(records[1]["name"], Value::Null);
    }

    #[test]
    fn test_decimal_and_float_conversion() {
        let d: BigDecimal = "12.50".parse().unwrap();
        assert_eq!(decimal_value(d), json!(12.50));
        assert_eq!(float_value(f64::NAN), Value::Null);
        assert_eq!(blob_value(vec![0xde, 0xad]), json!("dead"));
    }
}

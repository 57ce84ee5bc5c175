//! Configuration for data-source connections.
//!
//! These types are plain `serde` structs so a caller can read them from a
//! secrets file (TOML, JSON, ...) and hand them to
//! [`DataSource::connect`](crate::db::DataSource::connect).
//!
//! # Examples
//!
//! ```ignore
//! use db_explorer::config::{ConnectionParams, PoolSettings};
//!
//! // File-based source, registered under the name "sports"
//! let sports = ConnectionParams::sqlite("./data/sports.db").with_name("sports");
//!
//! // Network source with a larger pool
//! let warehouse = ConnectionParams::postgres("warehouse")
//!     .with_credentials("reader", "secret")
//!     .with_host("localhost", 5432)
//!     .with_pool(PoolSettings {
//!         max_connections: 4,
//!         ..Default::default()
//!     });
//! ```

use crate::db::DataSourceError;
use crate::db::params::{Dialect, PlaceholderStyle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// The closed set of supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// File-based database. `db_name` is the path of the database file.
    Sqlite,
    /// Network database reached over host/port with credentials.
    Postgres,
    /// Network database reached over host/port with credentials.
    MySql,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Sqlite => "sqlite",
            BackendKind::Postgres => "postgres",
            BackendKind::MySql => "mysql",
        }
    }

    /// Whether the backend is reached over the network and needs credentials.
    pub fn is_network(&self) -> bool {
        !matches!(self, BackendKind::Sqlite)
    }

    pub fn placeholder_style(&self) -> PlaceholderStyle {
        match self {
            BackendKind::Postgres => PlaceholderStyle::Numbered,
            BackendKind::Sqlite | BackendKind::MySql => PlaceholderStyle::QuestionMark,
        }
    }

    /// Lexical rules used when rewriting placeholders.
    ///
    /// MySQL treats `\` inside string literals as an escape character.
    pub fn dialect(&self) -> Dialect {
        Dialect {
            placeholders: self.placeholder_style(),
            backslash_escapes: matches!(self, BackendKind::MySql),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection pool and result-size settings of one data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of pooled connections.
    ///
    /// Statements check a connection out of the pool for their duration, so
    /// concurrent `answer()` calls sharing one data source wait for each other
    /// when this is 1 and run side by side when it is larger.
    ///
    /// **Default:** 1 (one connection per data source)
    pub max_connections: u32,

    /// Maximum number of rows returned by a single query.
    ///
    /// Rows beyond the cap are not fetched and the result is marked
    /// `truncated`. This keeps query results small enough to be passed back
    /// into later prompts.
    ///
    /// **Default:** 1000
    pub max_rows: usize,

    /// Seconds to wait for a free pooled connection before failing.
    ///
    /// **Default:** 30
    pub acquire_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 1,
            max_rows: 1000,
            acquire_timeout_secs: 30,
        }
    }
}

impl PoolSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// Parameters needed to open a [`DataSource`](crate::db::DataSource).
///
/// For [`BackendKind::Sqlite`] only `db_name` (the file path) is used. For the
/// network kinds `username`, `password`, `host` and `port` are all required;
/// [`validate`](Self::validate) reports any that are missing.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub kind: BackendKind,

    /// Database name, or the database file path for sqlite.
    pub db_name: String,

    /// Name the source is registered and prompted under.
    ///
    /// Defaults to the file stem for sqlite and to `db_name` otherwise.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub pool: PoolSettings,
}

impl ConnectionParams {
    pub fn new(kind: BackendKind, db_name: impl Into<String>) -> Self {
        Self {
            kind,
            db_name: db_name.into(),
            name: None,
            username: None,
            password: None,
            host: None,
            port: None,
            pool: PoolSettings::default(),
        }
    }

    pub fn sqlite(path: impl Into<String>) -> Self {
        Self::new(BackendKind::Sqlite, path)
    }

    pub fn postgres(db_name: impl Into<String>) -> Self {
        Self::new(BackendKind::Postgres, db_name)
    }

    pub fn mysql(db_name: impl Into<String>) -> Self {
        Self::new(BackendKind::MySql, db_name)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    pub fn with_pool(mut self, pool: PoolSettings) -> Self {
        self.pool = pool;
        self
    }

    /// Name the data source is registered under.
    pub fn source_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match self.kind {
            BackendKind::Sqlite => Path::new(&self.db_name)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.db_name.clone()),
            _ => self.db_name.clone(),
        }
    }

    /// Checks that every option the backend kind needs is present.
    ///
    /// Runs before any connection attempt.
    pub fn validate(&self) -> Result<(), DataSourceError> {
        if self.db_name.trim().is_empty() {
            return Err(DataSourceError::InvalidConfig(format!(
                "{} connection requires a database name",
                self.kind
            )));
        }
        if self.pool.max_connections == 0 {
            return Err(DataSourceError::InvalidConfig(
                "pool.max_connections must be at least 1".to_string(),
            ));
        }
        if self.pool.max_rows == 0 {
            return Err(DataSourceError::InvalidConfig(
                "pool.max_rows must be at least 1".to_string(),
            ));
        }
        if !self.kind.is_network() {
            return Ok(());
        }

        let mut missing = Vec::new();
        if is_blank(&self.username) {
            missing.push("username");
        }
        if is_blank(&self.password) {
            missing.push("password");
        }
        if is_blank(&self.host) {
            missing.push("host");
        }
        if self.port.is_none() {
            missing.push("port");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DataSourceError::InvalidConfig(format!(
                "{} connection requires {}",
                self.kind,
                missing.join(", ")
            )))
        }
    }

    /// Backend URL of this source. Contains the password; never log it.
    pub fn connection_url(&self) -> String {
        self.url_with_password(self.password.as_deref().unwrap_or_default())
    }

    /// [`connection_url`](Self::connection_url) with the password masked.
    pub fn redacted_url(&self) -> String {
        self.url_with_password("***")
    }

    fn url_with_password(&self, password: &str) -> String {
        match self.kind {
            BackendKind::Sqlite => format!("sqlite://{}", self.db_name),
            BackendKind::Postgres | BackendKind::MySql => format!(
                "{}://{}:{}@{}:{}/{}",
                self.kind,
                self.username.as_deref().unwrap_or_default(),
                password,
                self.host.as_deref().unwrap_or_default(),
                self.port.map(|p| p.to_string()).unwrap_or_default(),
                self.db_name
            ),
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("kind", &self.kind)
            .field("db_name", &self.db_name)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("pool", &self.pool)
            .finish()
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

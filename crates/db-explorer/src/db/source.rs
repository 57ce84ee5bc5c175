use super::backend::{GuardedConnection, QueryResult};
use super::error::DataSourceError;
use super::metadata::{DatabaseDescriptor, FullDescription, ShortDescription};
use super::reflect::MetadataReflector;
use crate::config::{BackendKind, ConnectionParams};
use serde_json::{Map, Value};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// One configured database: its connection, its reflected metadata and the
/// last connection or reflection failure.
///
/// A source whose connection attempt failed is still returned by
/// [`connect`](Self::connect); it reports `is_connected() == false`, keeps the
/// failure in [`last_error`](Self::last_error) and fails every query with
/// [`DataSourceError::NotConnected`].
pub struct DataSource {
    name: String,
    params: ConnectionParams,
    connection: RwLock<Option<Arc<GuardedConnection>>>,
    metadata: RwLock<Option<Arc<DatabaseDescriptor>>>,
    last_error: RwLock<Option<DataSourceError>>,
}

impl DataSource {
    /// Validates the parameters, attempts one connection and reflects metadata.
    ///
    /// Only a validation failure is returned as `Err`; it happens before any
    /// connection attempt. Connection and reflection failures are recorded.
    pub async fn connect(params: ConnectionParams) -> Result<Self, DataSourceError> {
        params.validate()?;

        let source = Self {
            name: params.source_name(),
            params,
            connection: RwLock::new(None),
            metadata: RwLock::new(None),
            last_error: RwLock::new(None),
        };

        match GuardedConnection::open(&source.params).await {
            Ok(conn) => {
                info!(
                    source = %source.name,
                    url = %source.params.redacted_url(),
                    "Data source connected (read-only)"
                );
                *write(&source.connection) = Some(Arc::new(conn));
                if let Err(e) = source.reflect_metadata().await {
                    warn!(source = %source.name, error = %e, "Metadata reflection failed");
                }
            }
            Err(e) => {
                warn!(
                    source = %source.name,
                    url = %source.params.redacted_url(),
                    error = %e,
                    "Data source connection failed"
                );
                *write(&source.last_error) = Some(e);
            }
        }

        Ok(source)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> BackendKind {
        self.params.kind
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn is_connected(&self) -> bool {
        read(&self.connection).is_some()
    }

    /// Reflected metadata, absent when the source is disconnected or
    /// reflection never succeeded.
    pub fn metadata(&self) -> Option<Arc<DatabaseDescriptor>> {
        read(&self.metadata).clone()
    }

    pub fn last_error(&self) -> Option<DataSourceError> {
        read(&self.last_error).clone()
    }

    /// Re-reads the catalog.
    ///
    /// On failure the error is recorded and previously reflected metadata is
    /// kept.
    pub async fn reflect_metadata(&self) -> Result<Arc<DatabaseDescriptor>, DataSourceError> {
        let conn = self.connection()?;
        let reflected = MetadataReflector::new(&conn)
            .reflect(&self.name, &self.params.db_name)
            .await;

        match reflected {
            Ok(descriptor) => {
                let descriptor = Arc::new(descriptor);
                *write(&self.metadata) = Some(Arc::clone(&descriptor));
                *write(&self.last_error) = None;
                Ok(descriptor)
            }
            Err(e) => {
                let e = match e {
                    DataSourceError::Reflection(_) => e,
                    other => DataSourceError::Reflection(other.to_string()),
                };
                *write(&self.last_error) = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Full nested description, used to prompt query generation.
    pub fn full_description(&self) -> FullDescription {
        FullDescription::new(&self.name, self.kind(), self.metadata().as_deref())
    }

    /// Table-level description without columns, used to prompt the planner.
    pub fn short_description(&self) -> ShortDescription {
        ShortDescription::new(&self.name, self.kind(), self.metadata().as_deref())
    }

    /// Runs a read statement with `:name` placeholders bound from `parameters`.
    pub async fn query(
        &self,
        statement: &str,
        parameters: &Map<String, Value>,
    ) -> Result<QueryResult, DataSourceError> {
        let conn = self.connection()?;
        let result = conn.query(statement, parameters).await;
        match &result {
            Ok(rows) => debug!(
                source = %self.name,
                rows = rows.row_count(),
                truncated = rows.truncated,
                "Query succeeded"
            ),
            Err(e) => debug!(source = %self.name, error = %e, "Query failed"),
        }
        result
    }

    /// Closes the pool. The source is disconnected afterwards.
    pub async fn close(&self) {
        let conn = write(&self.connection).take();
        if let Some(conn) = conn {
            conn.close().await;
            info!(source = %self.name, "Data source closed");
        }
    }

    fn connection(&self) -> Result<Arc<GuardedConnection>, DataSourceError> {
        read(&self.connection)
            .clone()
            .ok_or_else(|| DataSourceError::NotConnected(self.name.clone()))
    }
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("connected", &self.is_connected())
            .field("last_error", &self.last_error())
            .finish()
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

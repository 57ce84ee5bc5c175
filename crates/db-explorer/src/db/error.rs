//! Error types for the data-source layer.

use thiserror::Error;

/// Errors that can occur while connecting to, reflecting or querying a data source.
#[derive(Debug, Clone, Error)]
pub enum DataSourceError {
    /// Connection parameters failed validation. No connection was attempted.
    #[error("Invalid connection configuration: {0}")]
    InvalidConfig(String),

    /// The backend could not be reached or refused the connection.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The catalog could not be read into descriptors.
    #[error("Metadata reflection failed: {0}")]
    Reflection(String),

    /// The read-only guard rejected the statement before it reached the backend.
    #[error("Permission denied: {0}")]
    Permission(String),

    /// The backend rejected the statement.
    #[error("Query execution failed: {0}")]
    Execution(String),

    /// A `:name` placeholder in the statement has no bound value.
    #[error("Missing value for parameter :{0}")]
    MissingParameter(String),

    /// The data source has no live connection.
    #[error("Data source '{0}' is not connected")]
    NotConnected(String),
}

impl DataSourceError {
    /// Stable snake_case label, used when a failure is recorded as data.
    pub fn kind(&self) -> &'static str {
        match self {
            DataSourceError::InvalidConfig(_) => "invalid_config",
            DataSourceError::Connection(_) => "connection",
            DataSourceError::Reflection(_) => "reflection",
            DataSourceError::Permission(_) => "permission",
            DataSourceError::Execution(_) => "execution",
            DataSourceError::MissingParameter(_) => "missing_parameter",
            DataSourceError::NotConnected(_) => "not_connected",
        }
    }
}

impl From<sqlx::Error> for DataSourceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(e) => DataSourceError::InvalidConfig(e.to_string()),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => DataSourceError::Connection(err.to_string()),
            other => DataSourceError::Execution(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels_are_stable() {
        assert_eq!(
            DataSourceError::Permission("DROP".into()).kind(),
            "permission"
        );
        assert_eq!(
            DataSourceError::MissingParameter("id".into()).kind(),
            "missing_parameter"
        );
        assert_eq!(
            DataSourceError::NotConnected("sports".into()).kind(),
            "not_connected"
        );
    }

    #[test]
    fn test_pool_timeout_maps_to_connection() {
        let err: DataSourceError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DataSourceError::Connection(_)));
    }

    #[test]
    fn test_row_not_found_maps_to_execution() {
        let err: DataSourceError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DataSourceError::Execution(_)));
    }
}

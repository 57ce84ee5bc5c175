//! Read-only database access.
//!
//! A [`DataSource`] owns one pooled connection to a sqlite, postgres or mysql
//! database together with the schema reflected from it. Every statement,
//! including the catalog queries used for reflection, passes the
//! [`ReadOnlyGuard`] before it reaches the backend, and `:name` placeholders
//! are always bound rather than interpolated.
//!
//! # Example
//!
//! ```rust,ignore
//! use db_explorer::config::ConnectionParams;
//! use db_explorer::db::DataSource;
//! use serde_json::{Map, json};
//!
//! let source = DataSource::connect(ConnectionParams::sqlite("sports.db")).await?;
//! assert!(source.is_connected());
//!
//! let mut params = Map::new();
//! params.insert("min_id".into(), json!(10));
//! let result = source
//!     .query("SELECT id, name FROM players WHERE id > :min_id", &params)
//!     .await?;
//! println!("{:?}", result.columns);
//! ```

pub mod backend;
pub mod error;
pub mod guard;
pub mod metadata;
pub mod params;
pub mod reflect;
pub mod registry;
pub mod source;

pub use backend::QueryResult;
pub use error::DataSourceError;
pub use guard::ReadOnlyGuard;
pub use metadata::{
    ColumnDescriptor, DatabaseDescriptor, FullDescription, ShortDescription, TableDescriptor,
};
pub use reflect::MetadataReflector;
pub use registry::DataSourceRegistry;
pub use source::DataSource;

use super::error::DataSourceError;
use super::metadata::ShortDescription;
use super::source::DataSource;
use crate::config::ConnectionParams;
use std::sync::Arc;
use tracing::warn;

/// Name → [`DataSource`] mapping, in registration order.
///
/// The caller owns the registry and shares it (behind an `Arc`) with the
/// agents that query data sources.
#[derive(Debug, Default, Clone)]
pub struct DataSourceRegistry {
    sources: Vec<Arc<DataSource>>,
}

impl DataSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects every entry in order.
    ///
    /// Fails on the first entry whose parameters do not validate. Entries that
    /// validate but cannot connect are registered disconnected.
    pub async fn connect_all(
        params: impl IntoIterator<Item = ConnectionParams>,
    ) -> Result<Self, DataSourceError> {
        let mut registry = Self::new();
        for p in params {
            registry.register(DataSource::connect(p).await?);
        }
        Ok(registry)
    }

    /// Registers a source under its name, replacing any source with the same name.
    pub fn register(&mut self, source: DataSource) -> Option<Arc<DataSource>> {
        self.register_shared(Arc::new(source))
    }

    pub fn register_shared(&mut self, source: Arc<DataSource>) -> Option<Arc<DataSource>> {
        match self.sources.iter_mut().find(|s| s.name() == source.name()) {
            Some(slot) => {
                warn!(source = %source.name(), "Replacing data source with the same name");
                Some(std::mem::replace(slot, source))
            }
            None => {
                self.sources.push(source);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<DataSource>> {
        self.sources.iter().find(|s| s.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<DataSource>> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Short descriptions of all sources, in registration order.
    pub fn short_descriptions(&self) -> Vec<ShortDescription> {
        self.sources.iter().map(|s| s.short_description()).collect()
    }

    pub async fn close_all(&self) {
        for source in &self.sources {
            source.close().await;
        }
    }
}

//! # Observability
//!
//! Provides a simple, configurable interface for initializing tracing output
//! for `db-explorer`.
//!
//! Every layer emits structured `tracing` events: one `answer` span per
//! question with a `step` span per plan step, connection and reflection
//! events per data source, and the rendered prompts at debug level.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Configuration for initializing the observability system.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// The maximum log level to capture.
    pub level: Level,
    /// The target for the logs.
    pub target: LogTarget,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            target: LogTarget::default(),
        }
    }
}

impl ObservabilityConfig {
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    fn filter(&self) -> Result<EnvFilter, Box<dyn std::error::Error>> {
        Ok(EnvFilter::from_default_env().add_directive(format!("db_explorer={}", self.level).parse()?))
    }
}

/// Defines the output target for logs.
#[derive(Debug, Clone, Default)]
pub enum LogTarget {
    /// Log to the console (stdout).
    #[default]
    Console,
    /// Log to a file.
    File(String),
}

/// Initializes the global tracing subscriber.
///
/// This function should be called once at the beginning of your application's main function.
///
/// # Panics
///
/// This function will panic if it is called more than once, or if another tracing
/// subscriber has already been set.
pub fn init(config: ObservabilityConfig) -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = tracing_subscriber::registry().with(config.filter()?);

    match config.target {
        LogTarget::Console => {
            let layer = fmt::layer().with_writer(std::io::stdout);
            subscriber.with(layer).init();
        }
        LogTarget::File(path) => {
            let file = std::fs::File::create(path)?;
            let layer = fmt::layer().with_writer(file);
            subscriber.with(layer).init();
        }
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(matches!(config.target, LogTarget::Console));
    }

    #[test]
    fn test_filter_directive_for_crate() {
        let config = ObservabilityConfig::default()
            .with_level(Level::DEBUG)
            .with_target(LogTarget::File("db_explorer.log".to_string()));
        let filter = config.filter().unwrap();
        assert!(
            filter
                .to_string()
                .to_lowercase()
                .contains("db_explorer=debug")
        );
        assert!(matches!(config.target, LogTarget::File(ref path) if path == "db_explorer.log"));
    }
}

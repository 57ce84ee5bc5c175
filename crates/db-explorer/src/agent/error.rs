//! Error types for the agent module.

use crate::prompt::PromptError;
use thiserror::Error;

/// Errors that can occur during agent execution.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model response could not be coerced into the agent's output schema.
    #[error("Model output does not match the expected schema: {0}")]
    SchemaValidation(String),

    /// A required named input was not supplied.
    #[error("Missing required input: {0}")]
    MissingInput(String),

    /// A named input was supplied with the wrong shape.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The requested database is not in the data-source registry.
    #[error("No data source registered with name: {0}")]
    DataSourceNotFound(String),

    /// The prompt template could not be loaded or rendered.
    #[error("Prompt template error: {0}")]
    Template(String),

    /// The language-model call failed (network, HTTP status, rate limit).
    #[error("Process error (status: {status_code:?}): {message}")]
    ProcessError {
        status_code: Option<u16>,
        message: String,
        is_retryable: bool,
    },

    /// The agent execution failed with a specific error message.
    #[error("Agent execution failed: {0}")]
    ExecutionFailed(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A generic error for other cases.
    #[error("Agent error: {0}")]
    Other(String),
}

impl AgentError {
    /// Check if this error should trigger an automatic retry.
    ///
    /// Only transport failures flagged retryable (connection errors, timeouts,
    /// 429 and 5xx responses) qualify. Schema and input errors will not be
    /// fixed by sending the same request again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::ProcessError {
                is_retryable: true,
                ..
            }
        )
    }
}

impl From<PromptError> for AgentError {
    fn from(err: PromptError) -> Self {
        AgentError::Template(err.to_string())
    }
}

//! Error types for orchestrator operations.

use crate::agent::AgentError;
use thiserror::Error;

/// Errors that abort an [`answer`](super::Orchestrator::answer) call.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The plan names an agent that is not registered.
    #[error("No agent found with name: {0}")]
    UnknownAgent(String),

    /// The planner failed to produce a plan.
    #[error("Planning failed: {0}")]
    Planning(#[source] AgentError),

    /// A plan step failed. Turns recorded before the step are kept.
    #[error("Step {step} ({agent}) failed: {source}")]
    Agent {
        step: usize,
        agent: String,
        #[source]
        source: AgentError,
    },

    /// JSON error while recording a turn.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OrchestratorError {
    /// The underlying agent error, if any.
    pub fn agent_error(&self) -> Option<&AgentError> {
        match self {
            Self::Planning(source) | Self::Agent { source, .. } => Some(source),
            _ => None,
        }
    }
}

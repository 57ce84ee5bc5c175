//! 'db-explorer' - Natural-language questions over relational databases.
//!
//! A planner agent turns a question into an ordered list of agent calls; the
//! [`Orchestrator`](orchestrator::Orchestrator) runs them in order and records
//! every result in a [`Conversation`](orchestrator::Conversation). The query
//! agent writes SQL against the reflected schema of a registered
//! [`DataSource`](db::DataSource) and runs it through a read-only guard; the
//! reasoning agent answers from the conversation so far.
//!
//! # Modules
//!
//! - [`config`]: connection parameters and pool settings.
//! - [`db`]: read-only connections, schema reflection and descriptions.
//! - [`agent`]: the agent contract and the query, reasoning and planner agents.
//! - [`llm`]: the language-model trait, structured output parsing and the
//!   OpenAI chat client.
//! - [`prompt`]: prompt templates.
//! - [`orchestrator`]: plan-and-execute orchestration.
//! - [`extract`]: JSON extraction from free-form model output.
//! - [`observability`]: tracing setup.
//!
//! # Example
//!
//! ```rust,no_run
//! use db_explorer::config::ConnectionParams;
//! use db_explorer::db::DataSourceRegistry;
//! use db_explorer::llm::OpenAiChatModel;
//! use db_explorer::orchestrator::{Orchestrator, final_response};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sources = DataSourceRegistry::connect_all([
//!     ConnectionParams::sqlite("sports.db").with_name("sports"),
//! ])
//! .await?;
//!
//! let model = Arc::new(OpenAiChatModel::try_from_env()?);
//! let orchestrator = Orchestrator::with_default_agents(model, Arc::new(sources))?;
//!
//! let conversation = orchestrator.answer("How many players are there?").await?;
//! println!("{:?}", final_response(&conversation));
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod db;
pub mod extract;
pub mod llm;
pub mod observability;
pub mod orchestrator;
pub mod prompt;

pub use agent::{Agent, AgentError, AgentInputs, AgentRegistry, DynamicAgent};
pub use llm::LanguageModel;
pub use orchestrator::{Conversation, Orchestrator, OrchestratorError};

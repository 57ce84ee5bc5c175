//! Agent API for the plan-and-execute pipeline.
//!
//! An agent turns a set of named inputs into a structured output, usually by
//! rendering a prompt template and asking a [`LanguageModel`](crate::llm::LanguageModel)
//! for a schema-validated answer. Agents may have side effects: the
//! [`QueryAgent`] runs the SQL it generated against a data source.
//!
//! # Design
//!
//! - **Capability**: an agent declares its name, a description and the input
//!   variables it needs. The planner only ever sees this [`AgentSummary`].
//! - **Invocation**: the orchestrator passes the inputs chosen by the plan as
//!   [`AgentInputs`].
//!
//! Agents with different output types are stored together behind
//! [`DynamicAgent`], which erases the output to `serde_json::Value`.
//!
//! ```rust,ignore
//! use db_explorer::agent::{AgentAdapter, AgentRegistry, ReasoningAgent};
//!
//! let mut agents = AgentRegistry::new();
//! agents.register_agent(ReasoningAgent::new(model.clone())?);
//! assert_eq!(agents.names(), ["reasoning_agent"]);
//! ```

pub mod error;
pub mod planner;
pub mod query;
pub mod reasoning;

pub use error::AgentError;
pub use planner::{Plan, PlanStep, PlannerAgent};
pub use query::{GeneratedQuery, QueryAgent, QueryAgentOutput, QueryFailure, QueryOutcome};
pub use reasoning::{ReasoningAgent, ReasoningOutput};

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

/// Name, description and input variables of an agent, as shown to the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub name: String,
    pub description: String,
    pub input_variables: Vec<String>,
}

/// Named inputs of one agent invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentInputs(Map<String, Value>);

impl AgentInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts a JSON object; anything else is [`AgentError::InvalidInput`].
    pub fn from_value(value: Value) -> Result<Self, AgentError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(AgentError::InvalidInput(format!(
                "agent inputs must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Value of a required input.
    pub fn require(&self, name: &str) -> Result<&Value, AgentError> {
        self.0
            .get(name)
            .ok_or_else(|| AgentError::MissingInput(name.to_string()))
    }

    /// Value of a required string input.
    pub fn require_str(&self, name: &str) -> Result<&str, AgentError> {
        self.require(name)?
            .as_str()
            .ok_or_else(|| AgentError::InvalidInput(format!("`{name}` must be a string")))
    }

    /// Fails with the first name that is not present.
    pub fn require_all<S: AsRef<str>>(&self, names: &[S]) -> Result<(), AgentError> {
        for name in names {
            self.require(name.as_ref())?;
        }
        Ok(())
    }

    /// Render context for a prompt template. Strings are used as-is, every
    /// other value is written as pretty JSON.
    pub fn to_prompt_context(&self) -> Map<String, Value> {
        self.0
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(prompt_text(value))))
            .collect()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for AgentInputs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Text form of a value inside a prompt.
pub(crate) fn prompt_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// The core trait for defining an agent.
#[async_trait]
pub trait Agent: Send + Sync {
    /// The type of output this agent produces.
    ///
    /// This type must be serializable so that it can be recorded in the
    /// conversation and handed to later agents.
    type Output: Serialize + DeserializeOwned;

    /// Unique name used by the planner to address this agent.
    fn name(&self) -> &str;

    /// Natural language description of what this agent does.
    fn description(&self) -> &str;

    /// Inputs the caller must supply, in prompt order.
    fn input_variables(&self) -> Vec<String>;

    /// Summary shown to the planner. Cheap and side-effect free.
    fn summary(&self) -> AgentSummary {
        AgentSummary {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_variables: self.input_variables(),
        }
    }

    /// Execute the agent with the given inputs.
    async fn execute(&self, inputs: AgentInputs) -> Result<Self::Output, AgentError>;
}

/// Dynamic agent trait for type-erased agent execution.
///
/// This trait allows the orchestrator to work with agents of different output
/// types by converting all outputs to `serde_json::Value`.
#[async_trait]
pub trait DynamicAgent: Send + Sync {
    /// Execute the agent and return the output as a JSON value.
    async fn execute_dynamic(&self, inputs: AgentInputs) -> Result<Value, AgentError>;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn input_variables(&self) -> Vec<String>;

    fn summary(&self) -> AgentSummary {
        AgentSummary {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_variables: self.input_variables(),
        }
    }
}

/// Adapter that wraps any `Agent<Output = T>` to implement `DynamicAgent`.
pub struct AgentAdapter<T: Serialize + DeserializeOwned> {
    inner: Box<dyn Agent<Output = T>>,
}

impl<T: Serialize + DeserializeOwned> AgentAdapter<T> {
    pub fn new(agent: impl Agent<Output = T> + 'static) -> Self {
        Self {
            inner: Box::new(agent),
        }
    }
}

#[async_trait]
impl<T: Serialize + DeserializeOwned> DynamicAgent for AgentAdapter<T> {
    async fn execute_dynamic(&self, inputs: AgentInputs) -> Result<Value, AgentError> {
        let output = self.inner.execute(inputs).await?;
        Ok(serde_json::to_value(output)?)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn input_variables(&self) -> Vec<String> {
        self.inner.input_variables()
    }

    fn summary(&self) -> AgentSummary {
        self.inner.summary()
    }
}

/// Name → agent mapping, in registration order.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<Arc<dyn DynamicAgent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed agent behind an [`AgentAdapter`].
    pub fn register_agent<A>(&mut self, agent: A) -> Option<Arc<dyn DynamicAgent>>
    where
        A: Agent + 'static,
        A::Output: 'static,
    {
        self.register(Arc::new(AgentAdapter::new(agent)))
    }

    /// Registers an agent under its name, replacing any agent with the same name.
    pub fn register(&mut self, agent: Arc<dyn DynamicAgent>) -> Option<Arc<dyn DynamicAgent>> {
        match self.agents.iter_mut().find(|a| a.name() == agent.name()) {
            Some(slot) => {
                warn!(agent = %agent.name(), "Replacing agent with the same name");
                Some(std::mem::replace(slot, agent))
            }
            None => {
                self.agents.push(agent);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DynamicAgent>> {
        self.agents.iter().find(|a| a.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.iter().any(|a| a.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name().to_string()).collect()
    }

    /// Summaries of all agents, in registration order.
    pub fn summaries(&self) -> Vec<AgentSummary> {
        self.agents.iter().map(|a| a.summary()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.names())
            .finish()
    }
}

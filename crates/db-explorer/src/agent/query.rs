use super::{Agent, AgentError, AgentInputs};
use crate::db::{DataSourceError, DataSourceRegistry, QueryResult};
use crate::llm::{LanguageModel, OutputParser, complete_structured};
use crate::prompt::{PromptTemplate, QUERY_AGENT_TEMPLATE};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const QUERY_AGENT_NAME: &str = "query_agent";

const DESCRIPTION: &str =
    "Agent that generates a SQL query for a database given a natural language instruction";

/// Variables the agent fills itself.
const FILLED_VARIABLES: &[&str] = &["database_metadata"];

/// SQL produced by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedQuery {
    /// Read-only SQL query. Literal values are written as named parameters (:name).
    pub query: String,
    /// Values of the named parameters used in the query.
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// A query failure recorded in the conversation instead of aborting the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFailure {
    pub kind: String,
    pub message: String,
}

impl From<&DataSourceError> for QueryFailure {
    fn from(err: &DataSourceError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOutcome {
    QueryResponse(QueryResult),
    QueryError(QueryFailure),
}

/// Output of [`QueryAgent`]: the generated query and either its result or the
/// failure that prevented it from running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAgentOutput {
    pub query: String,
    pub parameters: Map<String, Value>,
    #[serde(flatten)]
    pub outcome: QueryOutcome,
}

impl QueryAgentOutput {
    pub fn response(&self) -> Option<&QueryResult> {
        match &self.outcome {
            QueryOutcome::QueryResponse(result) => Some(result),
            QueryOutcome::QueryError(_) => None,
        }
    }

    pub fn error(&self) -> Option<&QueryFailure> {
        match &self.outcome {
            QueryOutcome::QueryResponse(_) => None,
            QueryOutcome::QueryError(failure) => Some(failure),
        }
    }
}

/// Writes SQL for an instruction against one registered data source and runs it.
///
/// The model sees the full description of the named database. A failure to
/// run the generated query (guard rejection, backend error, disconnected
/// source) is recorded in the output; an unknown database or an unusable
/// model response is an error.
pub struct QueryAgent {
    model: Arc<dyn LanguageModel>,
    sources: Arc<DataSourceRegistry>,
    template: PromptTemplate,
    parser: OutputParser<GeneratedQuery>,
}

impl QueryAgent {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        sources: Arc<DataSourceRegistry>,
    ) -> Result<Self, AgentError> {
        Ok(Self {
            model,
            sources,
            template: PromptTemplate::new(QUERY_AGENT_TEMPLATE)?,
            parser: OutputParser::new(),
        })
    }

    /// Replaces the prompt. `database_metadata` is filled by the agent; every
    /// other template variable becomes a required input.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }
}

#[async_trait]
impl Agent for QueryAgent {
    type Output = QueryAgentOutput;

    fn name(&self) -> &str {
        QUERY_AGENT_NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn input_variables(&self) -> Vec<String> {
        let mut variables = self.template.variables_except(FILLED_VARIABLES);
        if !variables.iter().any(|v| v == "database_name") {
            variables.push("database_name".to_string());
        }
        variables
    }

    async fn execute(&self, inputs: AgentInputs) -> Result<Self::Output, AgentError> {
        inputs.require_all(&self.input_variables())?;
        let database_name = inputs.require_str("database_name")?;

        let source = self
            .sources
            .get(database_name)
            .ok_or_else(|| AgentError::DataSourceNotFound(database_name.to_string()))?;

        let metadata = serde_json::to_string_pretty(&source.full_description())?;
        let mut context = inputs.to_prompt_context();
        context.insert("database_metadata".to_string(), Value::String(metadata));
        let prompt = self.template.render(&context)?;

        let generated = complete_structured(self.model.as_ref(), &prompt, &self.parser).await?;
        debug!(
            source = %database_name,
            query = %generated.query,
            parameters = ?generated.parameters,
            "Generated query"
        );

        let outcome = match source.query(&generated.query, &generated.parameters).await {
            Ok(result) => {
                info!(
                    source = %database_name,
                    rows = result.row_count(),
                    truncated = result.truncated,
                    "Query succeeded"
                );
                QueryOutcome::QueryResponse(result)
            }
            Err(err) => {
                warn!(source = %database_name, kind = err.kind(), error = %err, "Query failed");
                QueryOutcome::QueryError(QueryFailure::from(&err))
            }
        };

        Ok(QueryAgentOutput {
            query: generated.query,
            parameters: generated.parameters,
            outcome,
        })
    }
}

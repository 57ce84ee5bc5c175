use super::{Agent, AgentError, AgentInputs, AgentSummary};
use crate::db::ShortDescription;
use crate::llm::{LanguageModel, OutputParser, complete_structured};
use crate::prompt::{PLANNER_AGENT_TEMPLATE, PromptTemplate};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

pub const PLANNER_AGENT_NAME: &str = "planner_agent";

const DESCRIPTION: &str = "Agent that plans the steps to respond a question";

/// Variables the agent fills itself.
const FILLED_VARIABLES: &[&str] = &["agents", "databases"];

/// One agent call of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlanStep {
    /// Name of the agent to call.
    pub agent_name: String,
    /// Input variables of the agent call.
    #[serde(default)]
    pub input_variables: Map<String, Value>,
}

impl PlanStep {
    pub fn new(agent_name: impl Into<String>, input_variables: Value) -> Self {
        let input_variables = match input_variables {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            agent_name: agent_name.into(),
            input_variables,
        }
    }
}

/// Ordered list of agent calls answering one question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    /// List of agent calls.
    pub plan: Vec<PlanStep>,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { plan: steps }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.plan
    }

    pub fn len(&self) -> usize {
        self.plan.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plan.is_empty()
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.plan.iter().map(|s| s.agent_name.as_str()).collect()
    }
}

/// Turns a question into a [`Plan`].
///
/// The agent summaries and database descriptions are rendered once, at
/// construction. Agent names in the plan are not validated here.
pub struct PlannerAgent {
    model: Arc<dyn LanguageModel>,
    template: PromptTemplate,
    parser: OutputParser<Plan>,
    agents: String,
    databases: String,
}

impl PlannerAgent {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        agents: &[AgentSummary],
        databases: &[ShortDescription],
    ) -> Result<Self, AgentError> {
        Ok(Self {
            model,
            template: PromptTemplate::new(PLANNER_AGENT_TEMPLATE)?,
            parser: OutputParser::new(),
            agents: json_lines(agents)?,
            databases: json_lines(databases)?,
        })
    }

    /// Replaces the prompt. `agents` and `databases` are filled by the agent;
    /// every other template variable becomes a required input.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Agent summaries as rendered into the prompt.
    pub fn agents_snapshot(&self) -> &str {
        &self.agents
    }

    /// Database descriptions as rendered into the prompt.
    pub fn databases_snapshot(&self) -> &str {
        &self.databases
    }
}

/// One compact JSON document per line.
fn json_lines<T: Serialize>(items: &[T]) -> Result<String, AgentError> {
    let lines = items
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

#[async_trait]
impl Agent for PlannerAgent {
    type Output = Plan;

    fn name(&self) -> &str {
        PLANNER_AGENT_NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn input_variables(&self) -> Vec<String> {
        self.template.variables_except(FILLED_VARIABLES)
    }

    async fn execute(&self, inputs: AgentInputs) -> Result<Self::Output, AgentError> {
        inputs.require_all(&self.input_variables())?;

        let mut context = inputs.to_prompt_context();
        context.insert("agents".to_string(), Value::String(self.agents.clone()));
        context.insert("databases".to_string(), Value::String(self.databases.clone()));
        let prompt = self.template.render(&context)?;

        let plan = complete_structured(self.model.as_ref(), &prompt, &self.parser).await?;
        info!(steps = plan.len(), agents = ?plan.agent_names(), "Generated plan");
        debug!(plan = ?plan, "Plan details");
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;
    use serde_json::json;
    use std::sync::Mutex;

    struct PlanningModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for PlanningModel {
        async fn complete(&self, prompt: &str) -> Result<String, AgentError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(r#"```json
{"plan": [
  {"agent_name": "query_agent", "input_variables": {"instruction": "count players", "database_name": "sports"}},
  {"agent_name": "reasoning_agent", "input_variables": {"context": ""}}
]}
```"#
                .to_string())
        }
    }

    fn summaries() -> Vec<AgentSummary> {
        vec![AgentSummary {
            name: "query_agent".to_string(),
            description: "Writes SQL".to_string(),
            input_variables: vec!["database_name".to_string(), "instruction".to_string()],
        }]
    }

    #[tokio::test]
    async fn test_plan_from_model_response() {
        let model = Arc::new(PlanningModel {
            prompts: Mutex::new(Vec::new()),
        });
        let databases = vec![ShortDescription::new("sports", BackendKind::Sqlite, None)];
        let planner = PlannerAgent::new(model.clone(), &summaries(), &databases).unwrap();
        assert_eq!(planner.input_variables(), ["instruction"]);

        let plan = planner
            .execute(AgentInputs::new().with("instruction", "How many players are there?"))
            .await
            .unwrap();

        assert_eq!(plan.agent_names(), ["query_agent", "reasoning_agent"]);
        assert_eq!(plan.steps()[0].input_variables["database_name"], "sports");

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains(r#""name":"query_agent""#));
        assert!(prompts[0].contains(r#""db_name":"sports""#));
        assert!(prompts[0].contains("How many players are there?"));
    }

    #[test]
    fn test_snapshot_is_taken_at_construction() {
        let model = Arc::new(PlanningModel {
            prompts: Mutex::new(Vec::new()),
        });
        let mut agents = summaries();
        let planner = PlannerAgent::new(model, &agents, &[]).unwrap();
        agents.clear();

        assert!(planner.agents_snapshot().contains("query_agent"));
        assert_eq!(planner.databases_snapshot(), "");
    }

    #[test]
    fn test_plan_step_from_value() {
        let step = PlanStep::new("reasoning_agent", json!({"context": ""}));
        assert!(step.input_variables.contains_key("context"));
        assert!(PlanStep::new("x", json!(null)).input_variables.is_empty());
    }
}

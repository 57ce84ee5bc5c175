//! Plan-and-execute orchestration.
//!
//! An [`Orchestrator`] answers a question in two phases:
//!
//! 1. **Planning**: the planner agent turns the question into a [`Plan`], an
//!    ordered list of agent calls. The plan is recorded as the first turn.
//! 2. **Executing**: each step runs in order. A step whose inputs contain
//!    `context` receives a copy of the conversation recorded so far. Each
//!    result is appended as a new turn.
//!
//! There is no retry and no skipping. An agent error aborts the call, while a
//! query failure captured by the query agent is recorded and the plan goes on.
//!
//! ```rust,ignore
//! use db_explorer::orchestrator::Orchestrator;
//!
//! let orchestrator = Orchestrator::with_default_agents(model, sources)?;
//! let conversation = orchestrator.answer("How many players are there?").await?;
//! for turn in conversation.turns() {
//!     println!("{}: {}", turn.speaker, turn.speech);
//! }
//! ```

pub mod conversation;
pub mod error;

pub use conversation::{Conversation, ConversationTurn};
pub use error::OrchestratorError;

use crate::agent::{
    Agent, AgentError, AgentInputs, AgentRegistry, Plan, PlannerAgent, QueryAgent, ReasoningAgent,
};
use crate::db::DataSourceRegistry;
use crate::llm::LanguageModel;
use serde_json::Value;
use std::sync::Arc;
use tracing::{Instrument, info, info_span, warn};

/// Input key that receives the conversation so far.
pub const CONTEXT_INPUT: &str = "context";

/// Runs planner-generated plans against a set of registered agents.
pub struct Orchestrator {
    planner: Box<dyn Agent<Output = Plan>>,
    agents: AgentRegistry,
}

impl Orchestrator {
    pub fn new(planner: impl Agent<Output = Plan> + 'static, agents: AgentRegistry) -> Self {
        Self {
            planner: Box::new(planner),
            agents,
        }
    }

    /// Registers the query and reasoning agents, then builds the planner from
    /// their summaries and the short descriptions of `sources`.
    pub fn with_default_agents(
        model: Arc<dyn LanguageModel>,
        sources: Arc<DataSourceRegistry>,
    ) -> Result<Self, AgentError> {
        let mut agents = AgentRegistry::new();
        agents.register_agent(QueryAgent::new(model.clone(), sources.clone())?);
        agents.register_agent(ReasoningAgent::new(model.clone())?);

        let planner = PlannerAgent::new(model, &agents.summaries(), &sources.short_descriptions())?;
        Ok(Self::new(planner, agents))
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn planner_name(&self) -> &str {
        self.planner.name()
    }

    /// Plans and executes an answer to `question`.
    pub async fn answer(&self, question: &str) -> Result<Conversation, OrchestratorError> {
        let span = info_span!("answer", question = %question);

        async move {
            let plan = self.plan(question).await?;

            let mut conversation = Conversation::new();
            conversation.push(ConversationTurn::new(
                self.planner.name(),
                serde_json::to_value(plan.steps())?,
            ));

            self.execute_plan(&plan, &mut conversation).await?;
            info!(turns = conversation.len(), "Answer complete");
            Ok(conversation)
        }
        .instrument(span)
        .await
    }

    /// Asks the planner for a plan.
    pub async fn plan(&self, question: &str) -> Result<Plan, OrchestratorError> {
        let inputs = AgentInputs::new().with("instruction", question);
        self.planner.execute(inputs).await.map_err(|e| {
            warn!(planner = %self.planner.name(), error = %e, "Planning failed");
            OrchestratorError::Planning(e)
        })
    }

    /// Executes every step of `plan` in order, appending one turn per step.
    ///
    /// On error the turns recorded before the failing step stay in
    /// `conversation`.
    pub async fn execute_plan(
        &self,
        plan: &Plan,
        conversation: &mut Conversation,
    ) -> Result<(), OrchestratorError> {
        info!(steps = plan.len(), "Executing plan");

        for (index, step) in plan.steps().iter().enumerate() {
            let step_number = index + 1;

            let Some(agent) = self.agents.get(&step.agent_name) else {
                warn!(step = step_number, agent = %step.agent_name, "Plan names an unknown agent");
                return Err(OrchestratorError::UnknownAgent(step.agent_name.clone()));
            };

            let mut inputs = AgentInputs::from(step.input_variables.clone());
            if inputs.contains(CONTEXT_INPUT) {
                inputs.insert(CONTEXT_INPUT, conversation.to_value());
            }

            info!(step = step_number, agent = %agent.name(), "Executing step");
            let span = info_span!("step", step = step_number, agent = %agent.name());
            let output = agent
                .execute_dynamic(inputs)
                .instrument(span)
                .await
                .map_err(|source| {
                    warn!(step = step_number, agent = %agent.name(), error = %source, "Step failed");
                    OrchestratorError::Agent {
                        step: step_number,
                        agent: agent.name().to_string(),
                        source,
                    }
                })?;

            if let Some(failure) = output.get("query_error").filter(|v| !v.is_null()) {
                warn!(
                    step = step_number,
                    agent = %agent.name(),
                    failure = %failure,
                    "Step recorded a query failure"
                );
            }

            conversation.push(ConversationTurn::new(agent.name(), output));
        }

        Ok(())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("planner", &self.planner.name())
            .field("agents", &self.agents)
            .finish()
    }
}

/// Returns the speech of the last turn, if it is a natural language response.
pub fn final_response(conversation: &Conversation) -> Option<&str> {
    conversation
        .last()
        .and_then(|turn| turn.speech.get("response"))
        .and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentSummary, DynamicAgent, PlanStep};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    // ========================================================================
    // Mock agents
    // ========================================================================

    struct FixedPlanner {
        plan: Plan,
    }

    #[async_trait]
    impl Agent for FixedPlanner {
        type Output = Plan;

        fn name(&self) -> &str {
            "planner_agent"
        }

        fn description(&self) -> &str {
            "Returns a fixed plan"
        }

        fn input_variables(&self) -> Vec<String> {
            vec!["instruction".to_string()]
        }

        async fn execute(&self, _inputs: AgentInputs) -> Result<Plan, AgentError> {
            Ok(self.plan.clone())
        }
    }

    /// Records the inputs of every call and returns the call count.
    struct CountingAgent {
        name: &'static str,
        calls: Arc<Mutex<Vec<AgentInputs>>>,
    }

    #[async_trait]
    impl DynamicAgent for CountingAgent {
        async fn execute_dynamic(&self, inputs: AgentInputs) -> Result<Value, AgentError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(inputs);
            Ok(json!({ "response": format!("call {}", calls.len()) }))
        }

        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "Counts calls"
        }

        fn input_variables(&self) -> Vec<String> {
            vec![CONTEXT_INPUT.to_string()]
        }
    }

    struct FailingAgent;

    #[async_trait]
    impl DynamicAgent for FailingAgent {
        async fn execute_dynamic(&self, _inputs: AgentInputs) -> Result<Value, AgentError> {
            Err(AgentError::SchemaValidation("missing field `response`".to_string()))
        }

        fn name(&self) -> &str {
            "failing_agent"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn input_variables(&self) -> Vec<String> {
            Vec::new()
        }
    }

    fn orchestrator(plan: Plan, calls: Arc<Mutex<Vec<AgentInputs>>>) -> Orchestrator {
        let mut agents = AgentRegistry::new();
        agents.register(Arc::new(CountingAgent {
            name: "reasoning_agent",
            calls,
        }));
        agents.register(Arc::new(FailingAgent));
        Orchestrator::new(FixedPlanner { plan }, agents)
    }

    // ========================================================================
    // Execution
    // ========================================================================

    #[tokio::test]
    async fn test_turns_follow_plan_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let plan = Plan::new(vec![
            PlanStep::new("reasoning_agent", json!({"note": "first"})),
            PlanStep::new("reasoning_agent", json!({"note": "second"})),
        ]);

        let conversation = orchestrator(plan, calls.clone())
            .answer("question")
            .await
            .unwrap();

        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation.turns()[0].speaker, "planner_agent");
        assert_eq!(conversation.turns()[0].speech[1]["input_variables"]["note"], "second");
        assert_eq!(final_response(&conversation), Some("call 2"));

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].get("note").unwrap(), "first");
        assert!(!calls[0].contains(CONTEXT_INPUT));
    }

    #[tokio::test]
    async fn test_context_is_a_snapshot() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let plan = Plan::new(vec![
            PlanStep::new("reasoning_agent", json!({"context": ""})),
            PlanStep::new("reasoning_agent", json!({"context": ""})),
        ]);

        orchestrator(plan, calls.clone())
            .answer("question")
            .await
            .unwrap();

        let calls = calls.lock().unwrap();
        let first = calls[0].get(CONTEXT_INPUT).unwrap().as_array().unwrap();
        let second = calls[1].get(CONTEXT_INPUT).unwrap().as_array().unwrap();
        assert_eq!(first.len(), 1, "first step only sees the plan turn");
        assert_eq!(second.len(), 2);
        assert_eq!(second[1]["speech"]["response"], "call 1");
    }

    #[tokio::test]
    async fn test_unknown_agent_aborts_after_plan_turn() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let plan = Plan::new(vec![PlanStep::new("nonexistent_agent", json!({}))]);
        let orchestrator = orchestrator(plan.clone(), calls);

        let err = orchestrator.answer("question").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::UnknownAgent(ref name) if name == "nonexistent_agent"));

        let mut conversation = Conversation::new();
        conversation.push(ConversationTurn::new("planner_agent", json!([])));
        assert!(orchestrator.execute_plan(&plan, &mut conversation).await.is_err());
        assert_eq!(conversation.len(), 1);
    }

    #[tokio::test]
    async fn test_agent_error_keeps_earlier_turns() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let plan = Plan::new(vec![
            PlanStep::new("reasoning_agent", json!({})),
            PlanStep::new("failing_agent", json!({})),
            PlanStep::new("reasoning_agent", json!({})),
        ]);
        let orchestrator = orchestrator(plan.clone(), calls.clone());

        let mut conversation = Conversation::new();
        let err = orchestrator
            .execute_plan(&plan, &mut conversation)
            .await
            .unwrap_err();

        match &err {
            OrchestratorError::Agent { step, agent, source } => {
                assert_eq!(*step, 2);
                assert_eq!(agent, "failing_agent");
                assert!(matches!(source, AgentError::SchemaValidation(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.agent_error().is_some());
        assert_eq!(conversation.len(), 1);
        assert_eq!(calls.lock().unwrap().len(), 1, "no step runs after a failure");
    }

    #[test]
    fn test_debug_lists_agents() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let orchestrator = orchestrator(Plan::default(), calls);
        let debug = format!("{orchestrator:?}");
        assert!(debug.contains("reasoning_agent"));
        assert_eq!(
            orchestrator.agents().summaries()[0],
            AgentSummary {
                name: "reasoning_agent".to_string(),
                description: "Counts calls".to_string(),
                input_variables: vec!["context".to_string()],
            }
        );
    }
}

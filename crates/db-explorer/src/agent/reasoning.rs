use super::{Agent, AgentError, AgentInputs};
use crate::llm::{LanguageModel, OutputParser, complete_structured};
use crate::prompt::{PromptTemplate, REASONING_AGENT_TEMPLATE};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const REASONING_AGENT_NAME: &str = "reasoning_agent";

const DESCRIPTION: &str = "Agent that answers a question given a context";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReasoningOutput {
    /// Natural language answer.
    pub response: String,
}

/// Answers in natural language from the conversation so far.
pub struct ReasoningAgent {
    model: Arc<dyn LanguageModel>,
    template: PromptTemplate,
    parser: OutputParser<ReasoningOutput>,
}

impl ReasoningAgent {
    pub fn new(model: Arc<dyn LanguageModel>) -> Result<Self, AgentError> {
        Ok(Self {
            model,
            template: PromptTemplate::new(REASONING_AGENT_TEMPLATE)?,
            parser: OutputParser::new(),
        })
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }
}

#[async_trait]
impl Agent for ReasoningAgent {
    type Output = ReasoningOutput;

    fn name(&self) -> &str {
        REASONING_AGENT_NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn input_variables(&self) -> Vec<String> {
        self.template.variables().to_vec()
    }

    async fn execute(&self, inputs: AgentInputs) -> Result<Self::Output, AgentError> {
        inputs.require_all(&self.input_variables())?;
        let prompt = self.template.render(inputs.to_prompt_context())?;
        complete_structured(self.model.as_ref(), &prompt, &self.parser).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn complete(&self, prompt: &str) -> Result<String, AgentError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(r#"{"response": "There is one player."}"#.to_string())
        }
    }

    #[tokio::test]
    async fn test_answers_from_context() {
        let model = Arc::new(RecordingModel {
            prompts: Mutex::new(Vec::new()),
        });
        let agent = ReasoningAgent::new(model.clone()).unwrap();
        assert_eq!(agent.input_variables(), ["context"]);

        let context = json!([
            {"speaker": "planner_agent", "speech": []},
            {"speaker": "query_agent", "speech": {"query": "SELECT COUNT(*) FROM players"}}
        ]);
        let output = agent
            .execute(AgentInputs::new().with("context", context))
            .await
            .unwrap();
        assert_eq!(output.response, "There is one player.");

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("SELECT COUNT(*) FROM players"));
    }

    #[tokio::test]
    async fn test_requires_context() {
        let model = Arc::new(RecordingModel {
            prompts: Mutex::new(Vec::new()),
        });
        let agent = ReasoningAgent::new(model).unwrap();
        let err = agent.execute(AgentInputs::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::MissingInput(name) if name == "context"));
    }
}

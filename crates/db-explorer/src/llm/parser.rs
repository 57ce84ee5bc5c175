use crate::agent::AgentError;
use crate::extract::FlexibleExtractor;
use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Schema-guided output parser for a structured model response.
///
/// The format instructions embed the JSON schema of `T`; parsing extracts the
/// first JSON document from the response and deserializes it into `T`.
#[derive(Debug, Clone)]
pub struct OutputParser<T> {
    extractor: FlexibleExtractor,
    _output: PhantomData<fn() -> T>,
}

impl<T> Default for OutputParser<T>
where
    T: JsonSchema + DeserializeOwned,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OutputParser<T>
where
    T: JsonSchema + DeserializeOwned,
{
    pub fn new() -> Self {
        Self {
            extractor: FlexibleExtractor::new(),
            _output: PhantomData,
        }
    }

    pub fn with_extractor(mut self, extractor: FlexibleExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// JSON schema of `T`, pretty-printed.
    pub fn schema(&self) -> String {
        let schema = schema_for!(T);
        serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
    }

    /// Instructions appended to the prompt so the model answers in the schema.
    pub fn format_instructions(&self) -> String {
        format!(
            "The output should be formatted as a JSON instance that conforms to the JSON schema below. \
             Respond with the JSON object only, without any other text.\n\n\
             Here is the output schema:\n```json\n{}\n```",
            self.schema()
        )
    }

    /// Coerces a raw response into `T`.
    pub fn parse(&self, raw: &str) -> Result<T, AgentError> {
        let value = self
            .extractor
            .extract(raw)
            .map_err(|e| AgentError::SchemaValidation(e.to_string()))?;

        serde_json::from_value(value).map_err(|e| AgentError::SchemaValidation(e.to_string()))
    }
}

//! Language-model abstraction used by every agent.
//!
//! A [`LanguageModel`] turns a prompt into raw text. Structured output is
//! layered on top by an [`OutputParser`], which appends schema-guided format
//! instructions to the prompt and coerces the raw response into a typed value.
//!
//! ```rust,ignore
//! use db_explorer::llm::{OpenAiChatModel, OutputParser, complete_structured};
//!
//! let model = OpenAiChatModel::try_from_env()?;
//! let parser = OutputParser::<GeneratedQuery>::new();
//! let generated = complete_structured(&model, "Count the players", &parser).await?;
//! ```

pub mod openai;
pub mod parser;

pub use openai::{LlmConfig, OpenAiChatModel};
pub use parser::OutputParser;

use crate::agent::AgentError;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// A text-completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends the prompt and returns the raw model text.
    async fn complete(&self, prompt: &str) -> Result<String, AgentError>;

    /// Model identifier, used in logs.
    fn model_name(&self) -> &str {
        "unknown"
    }
}

#[async_trait]
impl<M: LanguageModel + ?Sized> LanguageModel for Arc<M> {
    async fn complete(&self, prompt: &str) -> Result<String, AgentError> {
        (**self).complete(prompt).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Completes `prompt` with the parser's format instructions appended and
/// parses the response into `T`.
///
/// A response that cannot be coerced into `T` fails with
/// [`AgentError::SchemaValidation`]; transport failures keep the model's error.
pub async fn complete_structured<M, T>(
    model: &M,
    prompt: &str,
    parser: &OutputParser<T>,
) -> Result<T, AgentError>
where
    M: LanguageModel + ?Sized,
    T: JsonSchema + DeserializeOwned,
{
    let full_prompt = format!("{prompt}\n\n{}", parser.format_instructions());
    debug!(model = %model.model_name(), prompt = %full_prompt, "Sending prompt");

    let raw = model.complete(&full_prompt).await?;
    debug!(model = %model.model_name(), response = %raw, "Received response");

    parser.parse(&raw)
}

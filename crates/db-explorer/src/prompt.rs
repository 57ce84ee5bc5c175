//! Prompt templates for the agents.
//!
//! Templates use `minijinja` syntax (`{{ variable }}`) and render in strict
//! mode, so a variable missing from the render context is an error instead of
//! an empty string. The variables a template references are its declared
//! inputs; agents subtract the ones they fill themselves.

use minijinja::{Environment, UndefinedBehavior};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Default prompt of the query agent.
pub const QUERY_AGENT_TEMPLATE: &str = r#"You are an expert SQL analyst. Write one read-only SQL query that answers the instruction below against the database "{{ database_name }}".

Rules:
- Only read data. Never write INSERT, UPDATE, DELETE, CREATE, DROP or ALTER statements.
- Use only tables and columns listed in the database metadata.
- Write the query in the SQL dialect of the database type given in the metadata.
- Put every literal value that comes from the instruction into a named parameter written as :name, and give its value in "parameters". Never inline those values in the query text.

Database metadata:
{{ database_metadata }}

Instruction:
{{ instruction }}"#;

/// Default prompt of the reasoning agent.
pub const REASONING_AGENT_TEMPLATE: &str = r#"You are a helpful data analyst. Below is the conversation so far: the plan that was made for the user's question, followed by the output of every agent that ran, including generated SQL queries and their results or errors.

Answer the user's question using only this information. If a query failed or returned no rows, say so plainly instead of guessing.

Conversation:
{{ context }}"#;

/// Default prompt of the planner agent.
pub const PLANNER_AGENT_TEMPLATE: &str = r#"You are the planner of a team of agents that answers questions about relational databases. Decide which agents to call, in which order, and with which input variables, to answer the instruction.

Available agents (name, description and input variables):
{{ agents }}

Available databases (name, type, description and tables):
{{ databases }}

Guidelines:
- Every step names one agent in "agent_name" and gives its inputs in "input_variables".
- Use the exact database name in "database_name".
- An agent that needs the results of earlier steps takes the input variable "context"; leave its value empty, it is filled with the conversation so far.
- Finish with a step that answers the user in natural language.

Instruction:
{{ instruction }}"#;

/// Errors raised while loading or rendering a template.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Invalid prompt template: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Failed to read prompt template {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A validated prompt template and the variables it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    variables: Vec<String>,
}

impl PromptTemplate {
    /// Parses the template and collects the variables it references, in order
    /// of first appearance.
    pub fn new(source: impl Into<String>) -> Result<Self, PromptError> {
        let source = source.into();
        let env = environment();
        let template = env.template_from_str(&source)?;

        let order = expression_order(&source);
        let mut variables: Vec<String> = template.undeclared_variables(false).into_iter().collect();
        variables.sort_by_key(|name| {
            let position = order.iter().position(|v| v == name).unwrap_or(usize::MAX);
            (position, name.clone())
        });

        Ok(Self { source, variables })
    }

    /// Loads a template from a text file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PromptError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(source)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Variables referenced by the template.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Variables referenced by the template minus the given ones.
    pub fn variables_except(&self, filled: &[&str]) -> Vec<String> {
        self.variables
            .iter()
            .filter(|v| !filled.contains(&v.as_str()))
            .cloned()
            .collect()
    }

    /// Renders the template. Every referenced variable must be present.
    pub fn render<S: Serialize>(&self, context: S) -> Result<String, PromptError> {
        Ok(environment().render_str(&self.source, context)?)
    }
}

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env
}

/// Leading identifiers of `{{ ... }}` expressions, in source order.
fn expression_order(source: &str) -> Vec<String> {
    let Ok(regex) = Regex::new(r"\{\{-?\s*([A-Za-z_][A-Za-z0-9_]*)") else {
        return Vec::new();
    };
    regex
        .captures_iter(source)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

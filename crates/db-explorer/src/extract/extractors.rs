use super::error::ParseError;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Where to look for JSON in a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Content between `<tag>` and `</tag>`.
    TaggedContent(String),
    /// Body of the first fenced Markdown code block.
    MarkdownCodeBlock,
    /// First balanced `{...}` or `[...]` outside string literals.
    FirstJsonEntity,
    /// The whole response, trimmed.
    OriginalText,
}

/// Extracts the first JSON document from free-form model output by trying
/// each strategy in order.
#[derive(Debug, Clone)]
pub struct FlexibleExtractor {
    strategies: Vec<ExtractionStrategy>,
}

impl Default for FlexibleExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FlexibleExtractor {
    pub fn new() -> Self {
        Self {
            strategies: Self::standard_strategies(),
        }
    }

    pub fn with_strategies(strategies: Vec<ExtractionStrategy>) -> Self {
        Self { strategies }
    }

    pub fn standard_strategies() -> Vec<ExtractionStrategy> {
        vec![
            ExtractionStrategy::OriginalText,
            ExtractionStrategy::TaggedContent("answer".to_string()),
            ExtractionStrategy::MarkdownCodeBlock,
            ExtractionStrategy::FirstJsonEntity,
        ]
    }

    /// Returns the first candidate that parses as JSON.
    pub fn extract(&self, text: &str) -> Result<Value, ParseError> {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            let Some(candidate) = self.candidate(text, strategy) else {
                failures.push(format!("{strategy:?}: nothing found"));
                continue;
            };

            match parse_candidate(&candidate) {
                Some(value) => {
                    debug!(?strategy, "Extracted JSON from response");
                    return Ok(value);
                }
                None => failures.push(format!("{strategy:?}: not valid JSON")),
            }
        }

        Err(ParseError::AllStrategiesFailed(failures))
    }

    fn candidate(&self, text: &str, strategy: &ExtractionStrategy) -> Option<String> {
        match strategy {
            ExtractionStrategy::TaggedContent(tag) => extract_tagged(text, tag),
            ExtractionStrategy::MarkdownCodeBlock => extract_code_block(text),
            ExtractionStrategy::FirstJsonEntity => first_json_entity(text).map(str::to_string),
            ExtractionStrategy::OriginalText => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
        }
    }
}

/// Parses a candidate as-is, then the first JSON entity inside it.
fn parse_candidate(candidate: &str) -> Option<Value> {
    serde_json::from_str(candidate).ok().or_else(|| {
        first_json_entity(candidate).and_then(|inner| serde_json::from_str(inner).ok())
    })
}

fn extract_tagged(text: &str, tag: &str) -> Option<String> {
    let pattern = format!(r"(?s)<{tag}>(.*?)</{tag}>", tag = regex::escape(tag));
    let regex = Regex::new(&pattern).ok()?;
    let content = regex.captures(text)?.get(1)?;
    Some(content.as_str().trim().to_string())
}

fn extract_code_block(text: &str) -> Option<String> {
    let regex = Regex::new(r"(?s)```[a-zA-Z0-9_-]*\s*\n(.*?)```").ok()?;
    let content = regex.captures(text)?.get(1)?;
    Some(content.as_str().trim().to_string())
}

/// First complete JSON object or array, skipping brackets inside strings.
pub fn first_json_entity(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = None;
    let mut opening = '{';
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' if start.is_some() => in_string = !in_string,
            '{' | '[' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                    opening = ch;
                }
                depth += 1;
            }
            '}' | ']' if !in_string && depth > 0 => {
                depth -= 1;
                if depth == 0
                    && let Some(p) = start
                {
                    let matches = (opening == '{' && ch == '}') || (opening == '[' && ch == ']');
                    if matches {
                        return Some(&text[p..=i]);
                    }
                    start = None;
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json_response() {
        let value = FlexibleExtractor::new()
            .extract(r#"{"query": "SELECT 1", "parameters": {}}"#)
            .unwrap();
        assert_eq!(value["query"], "SELECT 1");
    }

    #[test]
    fn test_json_inside_prose() {
        let value = FlexibleExtractor::new()
            .extract(r#"Sure! Here is the plan: {"plan": []} Let me know."#)
            .unwrap();
        assert_eq!(value, json!({"plan": []}));
    }

    #[test]
    fn test_fenced_code_block() {
        let text = "Result:\n```json\n{\"response\": \"42 players\"}\n```\n";
        let value = FlexibleExtractor::new().extract(text).unwrap();
        assert_eq!(value["response"], "42 players");
    }

    #[test]
    fn test_tagged_content() {
        let text = "<answer>\n{\"response\": \"ok\"}\n</answer> trailing {broken";
        let value = FlexibleExtractor::new().extract(text).unwrap();
        assert_eq!(value["response"], "ok");
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let text = r#"note {"query": "SELECT '}' AS brace", "parameters": {}} end"#;
        assert_eq!(
            first_json_entity(text),
            Some(r#"{"query": "SELECT '}' AS brace", "parameters": {}}"#)
        );
    }

    #[test]
    fn test_no_json_fails_with_every_strategy_listed() {
        let err = FlexibleExtractor::new()
            .extract("I cannot answer that.")
            .unwrap_err();
        let ParseError::AllStrategiesFailed(failures) = err;
        assert_eq!(failures.len(), 4);
    }
}

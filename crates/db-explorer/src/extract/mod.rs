//! JSON extraction from language-model responses.
//!
//! Models often wrap the requested JSON in prose, Markdown fences or tags.
//! [`FlexibleExtractor`] tries several strategies in order and returns the
//! first candidate that parses.
//!
//! ```rust
//! use db_explorer::extract::FlexibleExtractor;
//!
//! let extractor = FlexibleExtractor::new();
//! let value = extractor
//!     .extract(r#"Here's the query: {"query": "SELECT 1", "parameters": {}}"#)
//!     .unwrap();
//! assert_eq!(value["query"], "SELECT 1");
//! ```

pub mod error;
pub mod extractors;

pub use self::error::ParseError;
pub use self::extractors::{ExtractionStrategy, FlexibleExtractor, first_json_entity};

/// Extracts JSON with the standard strategies.
pub fn extract_json(text: &str) -> Result<serde_json::Value, ParseError> {
    FlexibleExtractor::new().extract(text)
}

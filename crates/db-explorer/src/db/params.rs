//! Named parameter binding.
//!
//! Generated statements use `:name` placeholders. Before execution they are
//! rewritten into the backend's positional syntax and the values are collected
//! into an ordered bind list, so parameter values never end up inside the SQL
//! text. Placeholders inside quoted literals, quoted identifiers and comments
//! are left untouched, as are postgres `::type` casts. Under MySQL rules a
//! backslash inside a string literal escapes the next character.

use super::error::DataSourceError;
use serde_json::{Map, Value};

/// Positional placeholder syntax of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` for every occurrence (sqlite, mysql).
    QuestionMark,
    /// `$1`, `$2`, ... with one index per distinct name (postgres).
    Numbered,
}

/// Lexical rules of a backend that placeholder rewriting depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub placeholders: PlaceholderStyle,
    /// `\'` inside a string literal is an escaped quote (mysql).
    pub backslash_escapes: bool,
}

impl From<PlaceholderStyle> for Dialect {
    fn from(placeholders: PlaceholderStyle) -> Self {
        Self {
            placeholders,
            backslash_escapes: false,
        }
    }
}

/// A statement rewritten to positional placeholders plus its ordered binds.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub values: Vec<Value>,
}

/// Rewrites `:name` placeholders and resolves each one against `params`.
pub fn bind_named(
    statement: &str,
    params: &Map<String, Value>,
    dialect: impl Into<Dialect>,
) -> Result<BoundStatement, DataSourceError> {
    let dialect = dialect.into();
    let chars: Vec<char> = statement.chars().collect();
    let mut sql = String::with_capacity(statement.len());
    let mut values = Vec::new();
    let mut numbered: Vec<String> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '\'' | '"' | '`' => {
                let end = closing_quote(&chars, i, dialect.backslash_escapes && ch != '`');
                sql.extend(&chars[i..end]);
                i = end;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..]
                    .iter()
                    .position(|c| *c == '\n')
                    .map_or(chars.len(), |p| i + p);
                sql.extend(&chars[i..end]);
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let end = block_comment_end(&chars, i);
                sql.extend(&chars[i..end]);
                i = end;
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                sql.push_str("::");
                i += 2;
            }
            ':' if chars.get(i + 1).is_some_and(|c| c.is_ascii_alphabetic() || *c == '_') => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_')
                {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                let value = params
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| DataSourceError::MissingParameter(name.clone()))?;

                match dialect.placeholders {
                    PlaceholderStyle::QuestionMark => {
                        sql.push('?');
                        values.push(value);
                    }
                    PlaceholderStyle::Numbered => {
                        let index = match numbered.iter().position(|n| *n == name) {
                            Some(pos) => pos + 1,
                            None => {
                                numbered.push(name);
                                values.push(value);
                                numbered.len()
                            }
                        };
                        sql.push('$');
                        sql.push_str(&index.to_string());
                    }
                }
                i = end;
            }
            _ => {
                sql.push(ch);
                i += 1;
            }
        }
    }

    Ok(BoundStatement { sql, values })
}

/// Index just past the quote that closes the one at `start`.
/// A doubled quote inside the literal is an escape, and so is a backslash
/// when `backslash_escapes` is set.
fn closing_quote(chars: &[char], start: usize, backslash_escapes: bool) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        if backslash_escapes && chars[i] == '\\' {
            i += 2;
            continue;
        }
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

fn block_comment_end(chars: &[char], start: usize) -> usize {
    let mut i = start + 2;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("params must be an object"),
        }
    }

    #[test]
    fn test_question_mark_style_duplicates_repeated_names() {
        let bound = bind_named(
            "SELECT * FROM players WHERE name = :name OR nickname = :name AND id > :min_id",
            &params(json!({"name": "Ana", "min_id": 3})),
            PlaceholderStyle::QuestionMark,
        )
        .unwrap();

        assert_eq!(
            bound.sql,
            "SELECT * FROM players WHERE name = ? OR nickname = ? AND id > ?"
        );
        assert_eq!(bound.values, vec![json!("Ana"), json!("Ana"), json!(3)]);
    }

    #[test]
    fn test_numbered_style_reuses_index() {
        let bound = bind_named(
            "SELECT * FROM t WHERE a = :x AND b = :y AND c = :x",
            &params(json!({"x": 1, "y": 2})),
            PlaceholderStyle::Numbered,
        )
        .unwrap();

        assert_eq!(bound.sql, "SELECT * FROM t WHERE a = $1 AND b = $2 AND c = $1");
        assert_eq!(bound.values, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_quoted_text_and_casts_are_untouched() {
        let bound = bind_named(
            "SELECT ':literal', \"col:name\", created::date, 'it''s :x' FROM t WHERE id = :id",
            &params(json!({"id": 7})),
            PlaceholderStyle::Numbered,
        )
        .unwrap();

        assert_eq!(
            bound.sql,
            "SELECT ':literal', \"col:name\", created::date, 'it''s :x' FROM t WHERE id = $1"
        );
        assert_eq!(bound.values, vec![json!(7)]);
    }

    #[test]
    fn test_backslash_escaped_quote_under_mysql_rules() {
        let statement = r"SELECT 'it\'s :x' AS label FROM t WHERE id = :id";
        let mysql = Dialect {
            placeholders: PlaceholderStyle::QuestionMark,
            backslash_escapes: true,
        };

        let bound = bind_named(statement, &params(json!({"id": 7})), mysql).unwrap();
        assert_eq!(bound.sql, r"SELECT 'it\'s :x' AS label FROM t WHERE id = ?");
        assert_eq!(bound.values, vec![json!(7)]);

        // Standard SQL ends the literal at the escaped quote, exposing `:x`.
        let err = bind_named(
            statement,
            &params(json!({"id": 7})),
            PlaceholderStyle::QuestionMark,
        )
        .unwrap_err();
        assert!(matches!(err, DataSourceError::MissingParameter(ref name) if name == "x"));
    }

    #[test]
    fn test_comments_are_untouched() {
        let bound = bind_named(
            "SELECT 1 -- :ignored\n/* :also */ WHERE a = :a",
            &params(json!({"a": true})),
            PlaceholderStyle::QuestionMark,
        )
        .unwrap();

        assert_eq!(bound.sql, "SELECT 1 -- :ignored\n/* :also */ WHERE a = ?");
        assert_eq!(bound.values, vec![json!(true)]);
    }

    #[test]
    fn test_missing_parameter() {
        let err = bind_named(
            "SELECT * FROM t WHERE id = :id",
            &Map::new(),
            PlaceholderStyle::QuestionMark,
        )
        .unwrap_err();

        match err {
            DataSourceError::MissingParameter(name) => assert_eq!(name, "id"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_value_is_never_interpolated() {
        let bound = bind_named(
            "SELECT * FROM t WHERE name = :name",
            &params(json!({"name": "x'; DROP TABLE t; --"})),
            PlaceholderStyle::QuestionMark,
        )
        .unwrap();

        assert!(!bound.sql.contains("DROP"));
        assert_eq!(bound.values, vec![json!("x'; DROP TABLE t; --")]);
    }
}

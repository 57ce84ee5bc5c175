//! Read-only statement guard.
//!
//! Every statement sent by a [`DataSource`](super::DataSource), including the
//! catalog queries issued during reflection, passes through
//! [`ReadOnlyGuard::check`] immediately before it reaches the backend.
//!
//! The guard is a prefix blocklist: after whitespace and SQL comments are
//! skipped, a statement is rejected when it starts with one of
//! [`MUTATING_KEYWORDS`] (case-insensitive, so `INSERTED` is rejected too).
//!
//! Connections sit in a read-only session underneath the guard. Statements
//! that could switch that session back are rejected as well: anything that
//! starts with one of [`SESSION_KEYWORDS`], and anything that mentions one of
//! [`SESSION_MARKERS`]. The guard does not parse SQL, so forms such as stored
//! procedure calls are left to the read-only session.

use super::error::DataSourceError;
use tracing::warn;

/// Leading keywords that mark a statement as mutating.
pub const MUTATING_KEYWORDS: &[&str] = &["INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER"];

/// Leading keywords of session-control statements.
pub const SESSION_KEYWORDS: &[&str] = &["SET", "RESET", "PRAGMA"];

/// Fragments of statements that change the read-only transaction mode,
/// matched against the upper-cased statement with whitespace collapsed.
pub const SESSION_MARKERS: &[&str] = &["TRANSACTION_READ_ONLY", "READ WRITE", "QUERY_ONLY"];

/// Intercepts statements and rejects mutating ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnlyGuard;

impl ReadOnlyGuard {
    pub fn new() -> Self {
        Self
    }

    /// Returns `Err(DataSourceError::Permission)` when the statement is mutating
    /// or could leave the read-only session.
    pub fn check(&self, statement: &str) -> Result<(), DataSourceError> {
        if let Some(keyword) = mutating_keyword(statement) {
            warn!(keyword, "Read-only guard rejected statement");
            return Err(DataSourceError::Permission(format!(
                "{keyword} statements are not allowed on a read-only data source"
            )));
        }
        if let Some(marker) = session_change(statement) {
            warn!(marker, "Read-only guard rejected session change");
            return Err(DataSourceError::Permission(format!(
                "{marker} would change the read-only session"
            )));
        }
        Ok(())
    }

    /// Whether the statement starts with a mutating keyword.
    pub fn is_mutating(&self, statement: &str) -> bool {
        mutating_keyword(statement).is_some()
    }

    /// Whether the statement could switch the session out of read-only mode.
    pub fn is_session_change(&self, statement: &str) -> bool {
        session_change(statement).is_some()
    }
}

fn mutating_keyword(statement: &str) -> Option<&'static str> {
    leading_match(statement, MUTATING_KEYWORDS)
}

fn session_change(statement: &str) -> Option<&'static str> {
    if let Some(keyword) = leading_match(statement, SESSION_KEYWORDS) {
        return Some(keyword);
    }
    let normalized = statement
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();
    SESSION_MARKERS
        .iter()
        .copied()
        .find(|marker| normalized.contains(marker))
}

/// First keyword of `keywords` the statement body starts with.
fn leading_match(statement: &str, keywords: &[&'static str]) -> Option<&'static str> {
    let body = skip_leading_comments(statement);
    keywords.iter().copied().find(|k| {
        body.get(..k.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(k))
    })
}

fn skip_leading_comments(statement: &str) -> &str {
    let mut rest = statement.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = match after.find('\n') {
                Some(pos) => after[pos + 1..].trim_start(),
                None => "",
            };
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = match after.find("*/") {
                Some(pos) => after[pos + 2..].trim_start(),
                None => "",
            };
        } else {
            return rest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_blocklisted_prefixes_case_insensitively() {
        let guard = ReadOnlyGuard::new();
        for statement in [
            "INSERT INTO players VALUES (1, 'a')",
            "update players set name = 'b'",
            "  Delete FROM players",
            "create table t (id int)",
            "DROP TABLE players",
            "alter table players add column age int",
        ] {
            let err = guard.check(statement).unwrap_err();
            assert!(
                matches!(err, DataSourceError::Permission(_)),
                "expected Permission for {statement:?}"
            );
        }
    }

    #[test]
    fn test_allows_reads() {
        let guard = ReadOnlyGuard::new();
        assert!(guard.check("SELECT COUNT(*) FROM players").is_ok());
        assert!(guard.check("with t as (select 1) select * from t").is_ok());
        assert!(guard.check("SELECT updated_at FROM drops").is_ok());
    }

    #[test]
    fn test_leading_comments_are_skipped() {
        let guard = ReadOnlyGuard::new();
        assert!(guard.is_mutating("-- cleanup\nDROP TABLE players"));
        assert!(guard.is_mutating("/* one */ /* two */\n  delete from players"));
        assert!(!guard.is_mutating("-- only a comment"));
        assert!(!guard.is_mutating("/* unterminated DROP TABLE players"));
    }

    #[test]
    fn test_keywords_match_as_prefixes() {
        let guard = ReadOnlyGuard::new();
        assert!(guard.is_mutating("INSERTED"));
        assert!(guard.is_mutating("DROPX foo"));
        assert!(guard.is_mutating("deletex"));
        assert!(guard.is_mutating("DROP;"));
        assert!(guard.is_mutating("delete(1)"));
        assert!(!guard.is_mutating("SELECT * FROM inserted"));
    }

    #[test]
    fn test_rejects_session_changes() {
        let guard = ReadOnlyGuard::new();
        for statement in [
            "PRAGMA query_only = OFF",
            "pragma writable_schema = 1",
            "SET SESSION CHARACTERISTICS AS TRANSACTION READ WRITE",
            "set session transaction read write",
            "RESET default_transaction_read_only",
            "/* sneaky */ SET transaction_read_only = off",
            "START TRANSACTION READ\n  WRITE",
            "BEGIN READ WRITE",
            "SELECT set_config('default_transaction_read_only', 'off', false)",
        ] {
            let err = guard.check(statement).unwrap_err();
            assert!(
                matches!(err, DataSourceError::Permission(_)),
                "expected Permission for {statement:?}"
            );
            assert!(guard.is_session_change(statement));
        }
        assert!(!guard.is_session_change("SELECT name FROM settings"));
    }

    #[test]
    fn test_empty_statement_is_not_mutating() {
        let guard = ReadOnlyGuard::new();
        assert!(guard.check("").is_ok());
        assert!(guard.check("   \n ").is_ok());
    }
}

//! Domain errors for roster storage operations
//!
//! Every mutating operation reports failures through [`StoreError`]. The
//! variants follow the error taxonomy of the application:
//!
//! - validation errors never reach storage
//! - uniqueness violations are classified by the violated constraint
//! - referential problems are found by explicit pre-check queries
//! - anything else is surfaced with the underlying SQLite message

use miette::Diagnostic;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Result alias for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("invalid {field}: {message}")]
    #[diagnostic(code(roster::validation))]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("a {kind} named '{name}' already exists under this parent")]
    #[diagnostic(
        code(roster::duplicate_name),
        help("names only need to be unique among siblings; pick another name or parent")
    )]
    DuplicateName { kind: &'static str, name: String },

    #[error("phone number '{phone}' is already used by another member")]
    #[diagnostic(code(roster::duplicate_phone))]
    DuplicatePhone { phone: String },

    #[error("{kind} {id} has child {kind}s and cannot be deleted")]
    #[diagnostic(
        code(roster::has_children),
        help("delete or move the children first")
    )]
    HasChildren { kind: &'static str, id: i64 },

    #[error("{kind} {id} is still referenced by {count} {dependents} and cannot be deleted")]
    #[diagnostic(code(roster::has_dependents))]
    HasDependents {
        kind: &'static str,
        id: i64,
        count: i64,
        dependents: &'static str,
    },

    #[error("{kind} '{key}' not found")]
    #[diagnostic(code(roster::not_found))]
    NotFound { kind: &'static str, key: String },

    #[error("save failed: {source}")]
    #[diagnostic(code(roster::save_failed))]
    SaveFailed {
        #[source]
        source: rusqlite::Error,
    },

    #[error("storage error: {0}")]
    #[diagnostic(code(roster::storage))]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(roster::io))]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        StoreError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            kind,
            key: key.to_string(),
        }
    }
}

/// Columns named by a UNIQUE constraint violation, e.g. `["members.phone_number"]`
///
/// Returns `None` for any other error, including other constraint kinds.
pub fn unique_violation(err: &rusqlite::Error) -> Option<Vec<String>> {
    match err {
        rusqlite::Error::SqliteFailure(e, msg)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            let msg = msg.as_deref().unwrap_or_default();
            let columns = msg
                .split_once(':')
                .map(|(_, cols)| cols)
                .unwrap_or_default()
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            Some(columns)
        }
        _ => None,
    }
}

/// True if `err` is a UNIQUE violation involving `table.column`
pub fn violates_unique(err: &rusqlite::Error, table: &str, column: &str) -> bool {
    let wanted = format!("{}.{}", table, column);
    unique_violation(err)
        .map(|cols| cols.iter().any(|c| *c == wanted))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn unique_error() -> rusqlite::Error {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (a INTEGER, b TEXT, UNIQUE(a, b));
             INSERT INTO t VALUES (1, 'x');",
        )
        .unwrap();
        conn.execute("INSERT INTO t VALUES (1, 'x')", []).unwrap_err()
    }

    #[test]
    fn test_unique_violation_lists_columns() {
        let err = unique_error();
        let cols = unique_violation(&err).unwrap();
        assert_eq!(cols, vec!["t.a".to_string(), "t.b".to_string()]);
        assert!(violates_unique(&err, "t", "b"));
        assert!(!violates_unique(&err, "t", "c"));
    }

    #[test]
    fn test_non_unique_errors_are_not_classified() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (a INTEGER NOT NULL);")
            .unwrap();
        let err = conn.execute("INSERT INTO t VALUES (NULL)", []).unwrap_err();
        assert!(unique_violation(&err).is_none());
    }

    #[test]
    fn test_messages_name_the_offending_value() {
        let err = StoreError::DuplicatePhone {
            phone: "0912".into(),
        };
        assert!(err.to_string().contains("0912"));

        let err = StoreError::not_found("region", "East");
        assert_eq!(err.to_string(), "region 'East' not found");

        let err = StoreError::validation("name", "member name cannot be empty");
        assert_eq!(err.to_string(), "invalid name: member name cannot be empty");
    }
}

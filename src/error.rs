//! Error types for tablediff.
//!
//! All errors that can occur while comparing two tables are represented by
//! [`CompareError`]. Errors are propagated via `Result<T, CompareError>`
//! throughout the codebase; there is no conversion to any foreign error
//! representation — this crate is a plain async library, not a database
//! extension.
//!
//! # Error Classification
//!
//! - **Invalid input** — missing or malformed options, caught before any
//!   SQL is issued.
//! - **Empty domain** — both tables are empty; not a failure, a distinct
//!   "nothing to do" outcome (see [`CompareError::EmptyDomain`] and
//!   [`crate::comparator::ProcessOutcome`]).
//! - **Effort exceeded** — the investigation set outgrew `max_report` at
//!   some level of the cascade.
//! - **SQL error** — any underlying database error, reported with the
//!   statement under which it occurred.
//! - **Internal** — an invariant the design says is unreachable. Indicates
//!   a bug, not bad input.

use std::fmt;

/// Primary error type for a table comparison.
#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    /// A required option (connection, table, keys, cols) was missing or
    /// invalid on one of the two sides. Raised synchronously at
    /// [`crate::comparator::Comparator::new`] time, before any SQL runs.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Both sides are empty (`size == 0` after the level-0 count probe).
    /// Distinct from a failure — callers may treat it as "no work".
    #[error("nothing to compare: both tables are empty")]
    EmptyDomain,

    /// The investigation set at `level` grew past `max_report` entries.
    #[error(
        "effort exceeded at level {level}: {investigate_size} keys under investigation (max_report={max_report})"
    )]
    EffortExceeded {
        level: usize,
        investigate_size: usize,
        max_report: usize,
    },

    /// An underlying database error, with the statement it occurred under.
    #[error("sql error while executing `{statement}`: {source}")]
    Sql {
        statement: String,
        #[source]
        source: SqlErrorSource,
    },

    /// A design invariant was violated. Indicates a bug in this crate, not
    /// bad caller input — kept distinct from [`CompareError::InvalidInput`]
    /// so callers never mistake one for the other.
    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl CompareError {
    /// Build a [`CompareError::Sql`] from a driver error and the statement
    /// that produced it.
    pub fn sql(statement: impl Into<String>, source: impl Into<SqlErrorSource>) -> Self {
        CompareError::Sql {
            statement: statement.into(),
            source: source.into(),
        }
    }

    /// Coarse classification, used only for logging/observability — unlike
    /// the teacher extension this crate has no scheduler to drive retries
    /// from it.
    pub fn kind(&self) -> CompareErrorKind {
        match self {
            CompareError::InvalidInput(_) => CompareErrorKind::InvalidInput,
            CompareError::EmptyDomain => CompareErrorKind::EmptyDomain,
            CompareError::EffortExceeded { .. } => CompareErrorKind::EffortExceeded,
            CompareError::Sql { .. } => CompareErrorKind::Sql,
            CompareError::Internal(_) => CompareErrorKind::Internal,
        }
    }
}

/// Classification of [`CompareError`] for logging/observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareErrorKind {
    InvalidInput,
    EmptyDomain,
    EffortExceeded,
    Sql,
    Internal,
}

impl fmt::Display for CompareErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareErrorKind::InvalidInput => write!(f, "INVALID_INPUT"),
            CompareErrorKind::EmptyDomain => write!(f, "EMPTY_DOMAIN"),
            CompareErrorKind::EffortExceeded => write!(f, "EFFORT_EXCEEDED"),
            CompareErrorKind::Sql => write!(f, "SQL"),
            CompareErrorKind::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The underlying driver error wrapped by [`CompareError::Sql`].
///
/// Boxed so that [`CompareError`] stays a small, `Send + Sync` value
/// regardless of which [`crate::client::SqlConnection`] implementation
/// produced the failure.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SqlErrorSource(Box<dyn std::error::Error + Send + Sync + 'static>);

impl From<tokio_postgres::Error> for SqlErrorSource {
    fn from(e: tokio_postgres::Error) -> Self {
        SqlErrorSource(Box::new(e))
    }
}

impl From<String> for SqlErrorSource {
    fn from(s: String) -> Self {
        SqlErrorSource(s.into())
    }
}

impl From<&str> for SqlErrorSource {
    fn from(s: &str) -> Self {
        SqlErrorSource(s.to_string().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(
            CompareError::InvalidInput("x".into()).kind(),
            CompareErrorKind::InvalidInput
        );
        assert_eq!(CompareError::EmptyDomain.kind(), CompareErrorKind::EmptyDomain);
        assert_eq!(
            CompareError::EffortExceeded {
                level: 2,
                investigate_size: 100,
                max_report: 32
            }
            .kind(),
            CompareErrorKind::EffortExceeded
        );
        assert_eq!(
            CompareError::Internal("x".into()).kind(),
            CompareErrorKind::Internal
        );
    }

    #[test]
    fn test_sql_error_message_includes_statement() {
        let err = CompareError::sql("SELECT 1", "connection reset");
        let msg = err.to_string();
        assert!(msg.contains("SELECT 1"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_effort_exceeded_message() {
        let err = CompareError::EffortExceeded {
            level: 3,
            investigate_size: 64,
            max_report: 32,
        };
        let msg = err.to_string();
        assert!(msg.contains("level 3"));
        assert!(msg.contains("64"));
        assert!(msg.contains("max_report=32"));
    }
}

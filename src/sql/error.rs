//! Errors raised while assembling SQL fragments.

use thiserror::Error;

use super::dialect::Dialect;

/// Construction-time SQL builder errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Raw SQL {sql:?} has {placeholders} placeholder(s) but {bindings} binding(s)")]
    BindingCountMismatch {
        sql: String,
        placeholders: usize,
        bindings: usize,
    },

    #[error("Generated SQL does not parse as {dialect}: {message}")]
    InvalidSql { dialect: Dialect, message: String },
}

pub type QueryResult<T> = Result<T, QueryError>;

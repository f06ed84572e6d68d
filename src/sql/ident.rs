//! Identifier validation and column references.
//!
//! Table and column names are interpolated into SQL text, so they are
//! restricted to plain snake-case identifiers. Values never pass through
//! here; they are bound as parameters.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use super::error::{QueryError, QueryResult};
use super::expr::{table_col, Expr};

static IDENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Reject anything that is not a bare identifier.
pub fn validate_identifier(ident: &str) -> QueryResult<&str> {
    if IDENT_PATTERN.is_match(ident) {
        Ok(ident)
    } else {
        Err(QueryError::InvalidIdentifier(ident.to_string()))
    }
}

/// A validated `table.column` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: &str, column: &str) -> QueryResult<Self> {
        Ok(Self {
            table: validate_identifier(table)?.to_string(),
            column: validate_identifier(column)?.to_string(),
        })
    }

    /// Parse a dotted `table.column` reference.
    pub fn parse(reference: &str) -> QueryResult<Self> {
        match reference.split_once('.') {
            Some((table, column)) => Self::new(table, column),
            None => Err(QueryError::InvalidIdentifier(reference.to_string())),
        }
    }

    pub fn expr(&self) -> Expr {
        table_col(&self.table, &self.column)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

//! SQL Dialect definitions and formatting rules.
//!
//! Data views are served from PostgreSQL and can be replayed locally against
//! DuckDB. Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting: `"` for both
//! - Bind placeholders: `$1, $2, ...` (PostgreSQL) vs `?` (DuckDB)
//! - Cast target names: `TEXT` vs `VARCHAR`
//!
//! # Usage
//!
//! ```ignore
//! use gridiron::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let quoted = dialect.quote_identifier("player");  // "player"
//! ```

mod duckdb;
pub mod helpers;
mod postgres;

pub use duckdb::DuckDb;
pub use postgres::Postgres;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::expr::CastType;
use super::token::TokenStream;

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal with `''` escaping.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str;

    /// Emit LIMIT/OFFSET.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_standard(limit, offset)
    }

    /// String concatenation operator.
    fn concat_operator(&self) -> &'static str {
        "||"
    }

    /// Whether `||` concatenates strings. When false, `CONCAT()` is emitted.
    fn supports_concat_operator(&self) -> bool {
        true
    }

    /// Whether NULLS FIRST/LAST is accepted in ORDER BY.
    fn supports_nulls_ordering(&self) -> bool {
        true
    }

    /// Placeholder text for the 1-based bind parameter `index`.
    fn placeholder(&self, index: usize) -> String {
        helpers::placeholder_numbered(index)
    }

    /// Type name used as a CAST target.
    fn cast_type_name(&self, to: CastType) -> &'static str;
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    DuckDb,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &Postgres,
            Dialect::DuckDb => &DuckDb,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn concat_operator(&self) -> &'static str {
        self.dialect().concat_operator()
    }

    fn supports_concat_operator(&self) -> bool {
        self.dialect().supports_concat_operator()
    }

    fn supports_nulls_ordering(&self) -> bool {
        self.dialect().supports_nulls_ordering()
    }

    fn placeholder(&self, index: usize) -> String {
        self.dialect().placeholder(index)
    }

    fn cast_type_name(&self, to: CastType) -> &'static str {
        self.dialect().cast_type_name(to)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "duckdb" | "duck" => Ok(Dialect::DuckDb),
            other => Err(format!(
                "unknown dialect '{}' (expected postgres or duckdb)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_display() {
        assert_eq!(Dialect::DuckDb.to_string(), "duckdb");
        assert_eq!(Dialect::Postgres.to_string(), "postgres");
    }

    #[test]
    fn test_default_is_postgres() {
        assert_eq!(Dialect::default(), Dialect::Postgres);
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(Dialect::DuckDb.quote_identifier("player"), "\"player\"");
        assert_eq!(Dialect::Postgres.quote_identifier("player"), "\"player\"");
    }

    #[test]
    fn test_quote_string_escaping() {
        assert_eq!(Dialect::Postgres.quote_string("Ja'Marr"), "'Ja''Marr'");
    }

    #[test]
    fn test_placeholder() {
        assert_eq!(Dialect::Postgres.placeholder(1), "$1");
        assert_eq!(Dialect::Postgres.placeholder(12), "$12");
        assert_eq!(Dialect::DuckDb.placeholder(12), "?");
    }

    #[test]
    fn test_cast_type_name() {
        assert_eq!(Dialect::Postgres.cast_type_name(CastType::Text), "TEXT");
        assert_eq!(Dialect::DuckDb.cast_type_name(CastType::Text), "VARCHAR");
        assert_eq!(
            Dialect::Postgres.cast_type_name(CastType::Integer),
            "INTEGER"
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!("postgres".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("DuckDB".parse::<Dialect>().unwrap(), Dialect::DuckDb);
        assert!("mysql".parse::<Dialect>().is_err());
    }
}

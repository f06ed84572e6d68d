//! Syntax validation of emitted SQL.
//!
//! Uses sqlparser-rs for roundtrip validation: generated statements are
//! parsed back with the target dialect's grammar before they are handed out.

use sqlparser::dialect::{DuckDbDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

use super::dialect::Dialect;
use super::error::{QueryError, QueryResult};

/// Validates that a SQL string is syntactically valid for the given dialect.
///
/// Placeholders (`$1`, `?`) are accepted by both parser dialects.
pub fn validate_sql(sql: &str, dialect: Dialect) -> QueryResult<()> {
    let parser_dialect: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::DuckDb => Box::new(DuckDbDialect {}),
    };

    Parser::parse_sql(&*parser_dialect, sql)
        .map(|_| ())
        .map_err(|e| QueryError::InvalidSql {
            dialect,
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_sql() {
        validate_sql("SELECT * FROM player", Dialect::Postgres).unwrap();
        validate_sql("SELECT * FROM player WHERE year = $1", Dialect::Postgres).unwrap();
        validate_sql("SELECT * FROM player WHERE year = ?", Dialect::DuckDb).unwrap();
    }

    #[test]
    fn test_validate_invalid_sql() {
        let result = validate_sql("SELEC * FORM player", Dialect::Postgres);
        assert!(matches!(result, Err(QueryError::InvalidSql { .. })));
    }
}

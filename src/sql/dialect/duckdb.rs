//! DuckDB SQL dialect.
//!
//! DuckDB is PostgreSQL-compatible for everything the data-view compiler
//! emits, except for positional `?` placeholders and `VARCHAR` casts.
//! Used for local analysis against exported play-by-play files.

use super::helpers;
use super::SqlDialect;
use crate::sql::expr::CastType;

/// DuckDB SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn placeholder(&self, index: usize) -> String {
        helpers::placeholder_positional(index)
    }

    fn cast_type_name(&self, to: CastType) -> &'static str {
        match to {
            CastType::Text => "VARCHAR",
            CastType::Integer => "INTEGER",
            CastType::Decimal => "DOUBLE",
        }
    }
}

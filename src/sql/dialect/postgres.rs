//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features:
//! - ANSI identifier quoting (`"`)
//! - Native boolean type (true/false)
//! - Numbered bind placeholders (`$1`)
//! - `TEXT` as the unbounded string type

use super::helpers;
use super::SqlDialect;
use crate::sql::expr::CastType;

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn placeholder(&self, index: usize) -> String {
        helpers::placeholder_numbered(index)
    }

    fn cast_type_name(&self, to: CastType) -> &'static str {
        match to {
            CastType::Text => "TEXT",
            CastType::Integer => "INTEGER",
            CastType::Decimal => "NUMERIC",
        }
    }
}

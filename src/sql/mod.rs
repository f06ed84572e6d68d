//! SQL generation module.
//!
//! This module provides a type-safe SQL builder that generates parameterized
//! SQL for PostgreSQL and DuckDB. It includes:
//!
//! - [`query`] - SELECT query builder (CTEs, joins, grouping)
//! - [`expr`] - Expression AST and builder DSL
//! - [`ident`] - Identifier validation
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations
//! - [`validate`] - Parse-back validation of emitted SQL

pub mod dialect;
pub mod error;
pub mod expr;
pub mod ident;
pub mod query;
pub mod token;
pub mod validate;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect};
pub use error::{QueryError, QueryResult};
pub use expr::{
    and_all, cast, col, count, count_distinct, count_star, func, lit_bool, lit_float,
    lit_int, lit_str, max, min, nullif, param, raw_bound, raw_sql, star, sum,
    table_col, BinaryOperator, CastType, Expr, ExprExt, Literal, UnaryOperator,
};
pub use ident::{validate_identifier, ColumnRef};
pub use query::{
    Cte, Join, JoinType, LimitOffset, NullsOrder, OrderByExpr, Query, SelectExpr, SortDir,
    TableRef, TableSource,
};
pub use token::{CompiledSql, Token, TokenStream};
pub use validate::validate_sql;

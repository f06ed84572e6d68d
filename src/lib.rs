//! # Gridiron
//!
//! Compiles fantasy-football data-view requests into parameterized SQL.
//!
//! ## Architecture
//!
//! A request names columns, per-column filters and the splits (year/week)
//! the report keeps as rows:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          DataViewRequest (columns, params, splits)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [columns]
//! ┌─────────────────────────────────────────────────────────┐
//! │     ColumnDefinition (player / table / team / route)     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner]
//! ┌─────────────────────────────────────────────────────────┐
//! │   CTEs (team stats, route counts) + enrichment joins     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sql]
//! ┌─────────────────────────────────────────────────────────┐
//! │      SQL + bindings (Postgres / DuckDB) + CacheInfo      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here talks to a database. Callers execute the SQL and keep the
//! result for as long as [`cache::CacheInfo`] allows.

pub mod cache;
pub mod columns;
pub mod compile;
pub mod config;
pub mod params;
pub mod planner;
pub mod sql;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::cache::{resolve_cache_policy, CacheInfo, CachePolicyKind, CacheTtls};
    pub use crate::columns::{ColumnDefinition, ColumnRegistry, ColumnSource};
    pub use crate::compile::{
        compile_data_view, compile_data_view_with, ColumnRequest, CompileError, CompileOptions,
        CompileOutput, DataViewRequest,
    };
    pub use crate::config::{Season, Settings};
    pub use crate::params::{DataViewParams, OneOrMany, Split, SplitSet, YearOffsetRange};
    pub use crate::planner::{
        build_join, DataViewOptions, FilterApplier, JoinSpec, PlanError, PlayByPlayFilters,
        ReferenceResolver, SplitReferences,
    };
    pub use crate::sql::{
        col, lit_int, lit_str, param, table_col, Dialect, Expr, ExprExt, Literal, Query,
        TableRef,
    };
}

// Also export at crate root for convenience
pub use compile::{compile_data_view, CompileOptions, DataViewRequest};
pub use sql::{Dialect, Query};

//! Data-view planner - turns requested columns into joins and CTEs.
//!
//! Pieces, leaves first:
//! 1. [`filters`]: filter parameters → WHERE predicates
//! 2. [`join`]: ON-clause construction for enrichment tables
//! 3. [`team_stats`] / [`rate_type`]: pre-aggregating CTEs joined back in via (2)
//!
//! Everything here only builds [`Query`](crate::sql::Query) values. Column
//! and table existence is checked by the database when the SQL runs.

pub mod filters;
pub mod join;
pub mod rate_type;
pub mod team_stats;

pub use filters::{FilterApplier, FilterKind, PlayByPlayFilters};
pub use join::{
    build_join, join_condition, DataViewOptions, JoinSpec, ReferenceResolver, SplitReferences,
};
pub use rate_type::{
    add_rate_type_per_player_route, expanded_years, rate_type_table_key, RouteCountSpec,
    ROUTE_COUNT_COLUMN,
};
pub use team_stats::{add_team_stats_play_by_play, TeamStatsSpec, TeamUnit};

use thiserror::Error;

use crate::params::{ParamError, Split};
use crate::sql::QueryError;

/// Errors that can occur during planning.
///
/// All of these are caller contract violations; degraded inputs such as an
/// unknown matchup type are logged instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("Split by {0} requested but no {0} reference column was provided")]
    MissingReference(Split),

    #[error("Invalid parameters: {0}")]
    Param(#[from] ParamError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

pub type PlanResult<T> = Result<T, PlanError>;

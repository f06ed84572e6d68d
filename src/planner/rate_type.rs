//! Per-player route counts, the denominator of per-route rate stats.
//!
//! A route is a pass play on which the player's snap record carries a
//! route. With a route group the count is of distinct game sub-units
//! (halves, quarters, drives, series) the player ran a route in.

use std::collections::BTreeSet;

use tracing::debug;

use super::filters::FilterApplier;
use super::{PlanError, PlanResult};
use crate::params::{DataViewParams, RouteGroup, SplitSet, YearOffsetRange};
use crate::sql::{
    count_distinct, count_star, lit_str, param, table_col, validate_identifier, Cte, Expr, ExprExt,
    Literal, Query, TableRef,
};

/// Column holding the count in the generated CTE.
pub const ROUTE_COUNT_COLUMN: &str = "rate_type_total_count";

const KEY_PREFIX: &str = "rate_type_per_player_route";

/// Inputs for [`add_rate_type_per_player_route`].
#[derive(Debug, Clone, Default)]
pub struct RouteCountSpec {
    /// Name of the CTE. Required; see [`rate_type_table_key`].
    pub with_table_name: Option<String>,
    pub params: DataViewParams,
    pub splits: SplitSet,
    /// Year used when `params.year` is absent.
    pub default_year: Option<i32>,
}

impl RouteCountSpec {
    pub fn new(with_table_name: &str) -> Self {
        Self {
            with_table_name: Some(with_table_name.into()),
            ..Default::default()
        }
    }

    pub fn params(mut self, params: DataViewParams) -> Self {
        self.params = params;
        self
    }

    pub fn splits(mut self, splits: SplitSet) -> Self {
        self.splits = splits;
        self
    }

    pub fn default_year(mut self, year: i32) -> Self {
        self.default_year = Some(year);
        self
    }
}

/// Every base year plus every year reachable through the offset range,
/// sorted and de-duplicated.
///
/// `{year: [2023], year_offset: [0, 2]}` gives `2023, 2024, 2025`: joins
/// against the CTE expect each intermediate year to be present.
pub fn expanded_years(params: &DataViewParams, default_year: Option<i32>) -> PlanResult<Vec<i32>> {
    let mut base = params.years();
    if base.is_empty() {
        base.extend(default_year);
    }

    let range = params.year_offset_range()?;
    let mut years = BTreeSet::new();
    for &year in &base {
        for offset in range.offsets() {
            years.insert(YearOffsetRange::shift(year, offset)?);
        }
    }
    Ok(years.into_iter().collect())
}

/// Key the CTE name is hashed from. Equal keys mean equal CTEs.
pub fn rate_type_table_key(
    params: &DataViewParams,
    splits: &SplitSet,
    default_year: Option<i32>,
) -> PlanResult<String> {
    let join = |values: Vec<String>| values.join(",");

    let years = expanded_years(params, default_year)?
        .iter()
        .map(i32::to_string)
        .collect();
    let weeks = params.weeks().iter().map(i32::to_string).collect();
    let splits = splits.iter().map(|s| s.as_str().to_string()).collect();

    let mut key = format!(
        "{}_years_{}_weeks_{}_seas_type_{}_splits_{}",
        KEY_PREFIX,
        join(years),
        join(weeks),
        join(params.seas_types()),
        join(splits),
    );
    if let Some(group) = params.rate_type_route_group {
        key.push_str("_route_group_");
        key.push_str(group.as_str());
    }
    if !params.extra.is_empty() {
        let extra = serde_json::Value::Object(params.extra.clone().into_iter().collect());
        key.push_str("_filters_");
        key.push_str(&extra.to_string());
    }
    Ok(key)
}

/// Register the route-count CTE on `query` and return its name.
///
/// Rows are keyed by `pid`, plus `year` and `week` only when the matching
/// split is requested. The player table spells its GSIS column `gsisit_id`
/// while `nfl_snaps` spells it `gsis_it_id`; both are the stored names.
pub fn add_rate_type_per_player_route(
    query: &mut Query,
    spec: &RouteCountSpec,
    filters: &dyn FilterApplier,
) -> PlanResult<String> {
    let name = spec
        .with_table_name
        .as_deref()
        .ok_or(PlanError::MissingArgument("with_table_name"))?;
    validate_identifier(name)?;

    if query.has_cte(name) {
        return Ok(name.to_string());
    }

    let years = expanded_years(&spec.params, spec.default_year)?;
    let group = spec.params.rate_type_route_group;
    debug!(table = name, ?years, ?group, "registering route count CTE");

    let plays = |column: &str| table_col("nfl_plays", column);
    let snaps = |column: &str| table_col("nfl_snaps", column);

    let mut routes = Query::new()
        .select(vec![table_col("player", "pid").alias("pid")])
        .from(TableRef::new("nfl_plays"))
        .inner_join(
            TableRef::new("nfl_snaps"),
            snaps("esbid")
                .eq(plays("esbid"))
                .and(snaps("playid").eq(plays("playid"))),
        )
        .inner_join(
            TableRef::new("player"),
            table_col("player", "gsisit_id").eq(snaps("gsis_it_id")),
        )
        .filter(plays("play_type").eq(param("PASS")))
        .filter(snaps("route").is_not_null());
    routes.add_group_by(table_col("player", "pid"));

    if spec.splits.has_year() {
        routes.add_select(plays("year").alias("year"));
        routes.add_group_by(plays("year"));
    }
    if spec.splits.has_week() {
        routes.add_select(plays("week").alias("week"));
        routes.add_group_by(plays("week"));
    }

    routes.add_select(route_count(group).alias(ROUTE_COUNT_COLUMN));

    if !years.is_empty() {
        let years = years.into_iter().map(|y| Expr::Param(Literal::from(y))).collect();
        routes.add_filter(plays("year").in_list(years));
    }

    let params = DataViewParams {
        year: None,
        year_offset: None,
        ..spec.params.without_career_filters()
    };
    filters.apply_filters(&mut routes, "nfl_plays", &params)?;

    query.add_cte(Cte::new(name, routes));
    Ok(name.to_string())
}

fn route_count(group: Option<RouteGroup>) -> Expr {
    match group {
        None => count_star(),
        Some(group) => count_distinct(
            table_col("nfl_plays", "esbid")
                .concat(lit_str("_"))
                .concat(table_col("nfl_plays", sub_unit_column(group))),
        ),
    }
}

fn sub_unit_column(group: RouteGroup) -> &'static str {
    match group {
        RouteGroup::Half => "game_half",
        RouteGroup::Quarter => "qtr",
        RouteGroup::Drive => "drive_seq",
        RouteGroup::Series => "series_seq",
    }
}

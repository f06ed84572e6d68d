//! Team statistics aggregated from play-by-play rows.
//!
//! Two CTEs are registered, in dependency order:
//!
//! ```text
//! {name}_play_by_play   nfl_plays grouped by team (+ year/week)
//!         │
//!         ▼
//! {name}                summed per team, or per player over the games
//!                       that player was active in
//! ```
//!
//! The second CTE is what callers join against.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use tracing::debug;

use super::filters::{set_predicate, FilterApplier};
use super::{PlanError, PlanResult};
use crate::params::{DataViewParams, SplitSet};
use crate::sql::{
    lit_bool, lit_int, nullif, param, raw_sql, sum, table_col, validate_identifier, Cte, Expr,
    ExprExt, Literal, Query, SelectExpr, TableRef,
};

/// Which side of the ball a play is credited to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamUnit {
    #[default]
    Offense,
    Defense,
}

impl TeamUnit {
    /// `nfl_plays` column holding the team for this unit.
    pub fn column(&self) -> &'static str {
        match self {
            TeamUnit::Offense => "off",
            TeamUnit::Defense => "def",
        }
    }
}

/// Inputs for [`add_team_stats_play_by_play`].
#[derive(Debug, Clone, Default)]
pub struct TeamStatsSpec {
    /// Name of the final CTE. Required.
    pub with_table_name: Option<String>,
    pub unit: TeamUnit,
    /// Raw select expressions for the per-play stage, e.g.
    /// `SUM(rush_yds) AS rush_yds`. Duplicates are dropped.
    pub select_strings: Vec<String>,
    /// Output columns of the final stage.
    pub stat_columns: Vec<String>,
    /// Output columns aggregated as `SUM(x_numerator) / SUM(x_denominator)`.
    pub rate_columns: BTreeSet<String>,
    pub splits: SplitSet,
    pub params: DataViewParams,
    /// Raw HAVING predicates for the final stage.
    pub having: Vec<String>,
    /// Sum only the games the player was active in, grouped by player.
    pub limit_to_player_active_games: bool,
    /// The report's designated FROM table, if any.
    pub from_table_name: Option<String>,
    /// Year exposed by the FROM-table patch when year is not a split.
    pub default_year: Option<i32>,
}

impl TeamStatsSpec {
    pub fn new(with_table_name: &str) -> Self {
        Self {
            with_table_name: Some(with_table_name.into()),
            ..Default::default()
        }
    }

    pub fn unit(mut self, unit: TeamUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn select_string(mut self, sql: &str) -> Self {
        self.select_strings.push(sql.into());
        self
    }

    pub fn stat_column(mut self, name: &str) -> Self {
        self.stat_columns.push(name.into());
        self
    }

    pub fn rate_column(mut self, name: &str) -> Self {
        self.stat_columns.push(name.into());
        self.rate_columns.insert(name.into());
        self
    }

    pub fn splits(mut self, splits: SplitSet) -> Self {
        self.splits = splits;
        self
    }

    pub fn params(mut self, params: DataViewParams) -> Self {
        self.params = params;
        self
    }

    pub fn having(mut self, sql: &str) -> Self {
        self.having.push(sql.into());
        self
    }

    pub fn limit_to_player_active_games(mut self, yes: bool) -> Self {
        self.limit_to_player_active_games = yes;
        self
    }

    pub fn from_table_name(mut self, name: &str) -> Self {
        self.from_table_name = Some(name.into());
        self
    }

    pub fn default_year(mut self, year: i32) -> Self {
        self.default_year = Some(year);
        self
    }
}

/// Register the team stats CTEs on `query` and return the final CTE name.
///
/// Calling again with the same name is a no-op.
pub fn add_team_stats_play_by_play(
    query: &mut Query,
    spec: &TeamStatsSpec,
    filters: &dyn FilterApplier,
) -> PlanResult<String> {
    let name = spec
        .with_table_name
        .as_deref()
        .ok_or(PlanError::MissingArgument("with_table_name"))?;
    validate_identifier(name)?;
    for column in &spec.stat_columns {
        validate_identifier(column)?;
    }

    if query.has_cte(name) {
        return Ok(name.to_string());
    }

    let pbp_name = format!("{}_play_by_play", name);
    let pbp = play_by_play_stage(spec, filters)?;
    let stats = stats_stage(spec, name, &pbp_name);

    debug!(
        table = name,
        active_games = spec.limit_to_player_active_games,
        columns = spec.stat_columns.len(),
        "registering team stats CTEs"
    );

    query.add_cte(Cte::new(&pbp_name, pbp));
    query.add_cte(Cte::new(name, stats));
    Ok(name.to_string())
}

fn play_by_play_stage(spec: &TeamStatsSpec, filters: &dyn FilterApplier) -> PlanResult<Query> {
    let team = table_col("nfl_plays", spec.unit.column());

    let mut pbp = Query::new()
        .select(vec![team.clone().alias("nfl_team")])
        .from(TableRef::new("nfl_plays"))
        .filter(table_col("nfl_plays", "play_type").ne(param("NOPL")));
    pbp.add_group_by(team);

    // any split keeps years apart; active-game matching needs every game row
    let with_year = !spec.splits.is_empty() || spec.limit_to_player_active_games;
    let with_week = spec.splits.has_week() || spec.limit_to_player_active_games;
    for (wanted, column) in [(with_year, "year"), (with_week, "week")] {
        if wanted {
            pbp.add_select(table_col("nfl_plays", column).alias(column));
            pbp.add_group_by(table_col("nfl_plays", column));
        }
    }

    let mut seen = HashSet::new();
    for select in &spec.select_strings {
        if seen.insert(select.as_str()) {
            pbp.add_select(raw_sql(select));
        }
    }

    filters.apply_filters(&mut pbp, "nfl_plays", &spec.params.without_career_filters())?;
    Ok(pbp)
}

fn stats_stage(spec: &TeamStatsSpec, name: &str, pbp_name: &str) -> Query {
    let mut stats = Query::new().from(TableRef::new(pbp_name));

    if spec.limit_to_player_active_games {
        let on = table_col("player_gamelogs", "tm")
            .eq(table_col(pbp_name, "nfl_team"))
            .and(table_col("player_gamelogs", "year").eq(table_col(pbp_name, "year")))
            .and(table_col("player_gamelogs", "week").eq(table_col(pbp_name, "week")));
        stats = stats.inner_join(TableRef::new("player_gamelogs"), on);

        let pid = table_col("player_gamelogs", "pid");
        stats.add_select(pid.clone().alias("pid"));
        stats.add_group_by(pid);

        let mut seas_types: Vec<Literal> =
            spec.params.seas_types().into_iter().map(Literal::from).collect();
        if seas_types.is_empty() {
            seas_types.push(Literal::from("REG"));
        }
        if let Some(pred) = set_predicate(table_col("player_gamelogs", "seas_type"), seas_types) {
            stats.add_filter(pred);
        }
        stats.add_filter(table_col("player_gamelogs", "active").eq(lit_bool(true)));
    } else {
        let team = table_col(pbp_name, "nfl_team");
        stats.add_select(team.clone().alias("nfl_team"));
        stats.add_group_by(team);
    }

    for (wanted, column) in [
        (!spec.splits.is_empty(), "year"),
        (spec.splits.has_week(), "week"),
    ] {
        if wanted {
            stats.add_select(table_col(pbp_name, column).alias(column));
            stats.add_group_by(table_col(pbp_name, column));
        }
    }

    for column in &spec.stat_columns {
        stats.add_select(stat_select(pbp_name, column, spec.rate_columns.contains(column)));
    }

    for having in &spec.having {
        stats.add_having(Expr::Paren(Box::new(raw_sql(having))));
    }

    if spec.from_table_name.as_deref() == Some(name) {
        expose_period_columns(&mut stats, spec);
    }

    stats
}

/// Rates are re-derived from their parts; averaging per-row rates would
/// weight every row equally.
fn stat_select(pbp_name: &str, column: &str, is_rate: bool) -> SelectExpr {
    let expr = if is_rate {
        let numerator = sum(table_col(pbp_name, &format!("{}_numerator", column)));
        let denominator = sum(table_col(pbp_name, &format!("{}_denominator", column)));
        numerator.div(nullif(denominator, lit_int(0)))
    } else {
        sum(table_col(pbp_name, column))
    };
    expr.alias(column)
}

/// The outer query selects year/week from its FROM table; pin them when
/// they are not split columns.
fn expose_period_columns(stats: &mut Query, spec: &TeamStatsSpec) {
    if !stats.selects("year") {
        let year = spec
            .params
            .years()
            .first()
            .copied()
            .or(spec.default_year);
        if let Some(year) = year {
            stats.add_select(param(year).alias("year"));
        }
    }
    if !stats.selects("week") {
        if let Some(&week) = spec.params.weeks().first() {
            stats.add_select(param(week).alias("week"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Split;
    use crate::planner::filters::PlayByPlayFilters;
    use crate::sql::Dialect;
    use serde_json::json;

    fn spec() -> TeamStatsSpec {
        TeamStatsSpec::new("team_rush")
            .select_string("SUM(\"nfl_plays\".\"rush_yds\") AS rush_yds")
            .select_string("SUM(\"nfl_plays\".\"rush_yds\") AS rush_yds")
            .stat_column("rush_yds")
    }

    fn render(spec: &TeamStatsSpec) -> String {
        let mut query = Query::new().select_star().from(TableRef::new("player"));
        add_team_stats_play_by_play(&mut query, spec, &PlayByPlayFilters::new()).unwrap();
        query.to_sql(Dialect::Postgres)
    }

    #[test]
    fn test_missing_name_fails_fast() {
        let spec = TeamStatsSpec::default();
        let mut query = Query::new();
        let err = add_team_stats_play_by_play(&mut query, &spec, &PlayByPlayFilters::new())
            .unwrap_err();
        assert_eq!(err, PlanError::MissingArgument("with_table_name"));
        assert!(query.with.is_empty());
    }

    #[test]
    fn test_registers_both_stages_in_order() {
        let mut query = Query::new().select_star().from(TableRef::new("player"));
        let name =
            add_team_stats_play_by_play(&mut query, &spec(), &PlayByPlayFilters::new()).unwrap();
        assert_eq!(name, "team_rush");
        let names: Vec<&str> = query.with.iter().map(|cte| cte.name.as_str()).collect();
        assert_eq!(names, vec!["team_rush_play_by_play", "team_rush"]);
    }

    #[test]
    fn test_play_by_play_stage() {
        let sql = render(&spec());
        assert!(sql.contains("\"nfl_plays\".\"off\" AS \"nfl_team\""));
        assert!(sql.contains("\"nfl_plays\".\"play_type\" <> 'NOPL'"));
        assert_eq!(sql.matches("AS rush_yds").count(), 1);
        assert!(sql.contains("GROUP BY \"nfl_plays\".\"off\""));
    }

    #[test]
    fn test_career_filters_dropped() {
        let spec = spec().params(
            serde_json::from_value(json!({"year": 2023, "career_year": [1, 2]})).unwrap(),
        );
        let sql = render(&spec);
        assert!(sql.contains("\"nfl_plays\".\"year\" = 2023"));
        assert!(!sql.contains("career_year"));
    }

    #[test]
    fn test_rate_column_sums_parts() {
        let spec = TeamStatsSpec::new("team_ypc")
            .select_string("SUM(rush_yds) AS ypc_numerator")
            .select_string("COUNT(*) AS ypc_denominator")
            .rate_column("ypc");
        let sql = render(&spec);
        assert!(sql.contains(
            "SUM(\"team_ypc_play_by_play\".\"ypc_numerator\") / NULLIF(SUM(\"team_ypc_play_by_play\".\"ypc_denominator\"), 0) AS \"ypc\""
        ));
        assert!(!sql.contains("AVG("));
    }

    #[test]
    fn test_active_games_stage() {
        let spec = spec()
            .limit_to_player_active_games(true)
            .splits([Split::Year].into());
        let sql = render(&spec);
        assert!(sql.contains("INNER JOIN \"player_gamelogs\" ON \"player_gamelogs\".\"tm\" = \"team_rush_play_by_play\".\"nfl_team\""));
        assert!(sql.contains("\"player_gamelogs\".\"seas_type\" = 'REG'"));
        assert!(sql.contains("GROUP BY \"player_gamelogs\".\"pid\", \"team_rush_play_by_play\".\"year\""));
        // first stage keeps week for game matching even without a week split
        assert!(sql.contains("GROUP BY \"nfl_plays\".\"off\", \"nfl_plays\".\"year\", \"nfl_plays\".\"week\""));
    }

    #[test]
    fn test_week_split_keeps_years_apart() {
        let spec = spec()
            .params(serde_json::from_value(json!({"year": [2023, 2024]})).unwrap())
            .splits([Split::Week].into());
        let sql = render(&spec);
        assert!(sql.contains("GROUP BY \"nfl_plays\".\"off\", \"nfl_plays\".\"year\", \"nfl_plays\".\"week\""));
        assert!(sql.contains(
            "GROUP BY \"team_rush_play_by_play\".\"nfl_team\", \"team_rush_play_by_play\".\"year\", \"team_rush_play_by_play\".\"week\""
        ));
    }

    #[test]
    fn test_having_is_raw() {
        let spec = spec().having("SUM(rush_yds) > 100 OR COUNT(*) > 5");
        let sql = render(&spec);
        assert!(sql.contains("HAVING (SUM(rush_yds) > 100 OR COUNT(*) > 5)"));
    }

    #[test]
    fn test_from_table_exposes_year() {
        let spec = spec()
            .from_table_name("team_rush")
            .params(serde_json::from_value(json!({"year": 2022})).unwrap());
        let sql = render(&spec);
        assert!(sql.contains("2022 AS \"year\""));
    }

    #[test]
    fn test_idempotent_registration() {
        let mut query = Query::new();
        let filters = PlayByPlayFilters::new();
        add_team_stats_play_by_play(&mut query, &spec(), &filters).unwrap();
        add_team_stats_play_by_play(&mut query, &spec(), &filters).unwrap();
        assert_eq!(query.with.len(), 2);
    }
}

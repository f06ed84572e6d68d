//! End-to-end compilation from a data-view request to SQL.
//!
//! ```text
//! DataViewRequest → column definitions → CTEs + joins → Query → SQL + bindings
//!                                     ↘ cache policy per column → merged CacheInfo
//! ```
//!
//! Driving rows are `player`. A year split adds a `player_years` CTE and a
//! week split a `player_years_weeks` CTE; enrichment joins match against
//! their `year`/`week` columns.
//!
//! # Example
//!
//! ```ignore
//! use gridiron::columns::ColumnRegistry;
//! use gridiron::compile::{compile_data_view, CompileOptions, DataViewRequest};
//!
//! let request: DataViewRequest = serde_json::from_str(r#"{
//!     "columns": [{"column_id": "player_season_points", "params": {"year": 2023}}],
//!     "splits": ["year"]
//! }"#)?;
//!
//! let options = CompileOptions::new(season);
//! let output = compile_data_view(&request, &ColumnRegistry::builtin(), &options)?;
//! println!("{}", output.sql);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::{resolve_cache_policy, table_hash, CacheInfo, CacheTtls};
use crate::columns::{ColumnDefinition, ColumnRegistry, ColumnSource};
use crate::config::{Season, Settings};
use crate::params::{DataViewParams, MatchupOpponentType, OneOrMany, SplitSet};
use crate::planner::filters::set_predicate;
use crate::planner::{
    add_rate_type_per_player_route, add_team_stats_play_by_play, build_join, expanded_years,
    rate_type_table_key, DataViewOptions, FilterApplier, JoinSpec, PlanError, PlayByPlayFilters,
    ReferenceResolver, RouteCountSpec, SplitReferences, TeamStatsSpec, ROUTE_COUNT_COLUMN,
};
use crate::sql::{
    cast, col, lit_int, nullif, param, raw_sql, table_col, validate_identifier, validate_sql,
    CastType, Cte, Dialect, Expr, ExprExt, Join, JoinType, Literal, OrderByExpr, Query,
    QueryError, TableRef,
};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during compilation.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Cannot sort by {0}: not an output column")]
    UnknownSortColumn(String),

    #[error("Request has no columns")]
    NoColumns,

    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Failed to serialize parameters: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type CompileResult<T> = Result<T, CompileError>;

// ============================================================================
// Request
// ============================================================================

/// One report: requested columns, splits and paging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataViewRequest {
    pub columns: Vec<ColumnRequest>,
    #[serde(default)]
    pub splits: SplitSet,
    #[serde(default)]
    pub sort: Vec<SortRequest>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

/// A requested column with its own filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnRequest {
    pub column_id: String,
    #[serde(default)]
    pub params: DataViewParams,
}

impl ColumnRequest {
    pub fn new(column_id: &str) -> Self {
        Self {
            column_id: column_id.into(),
            params: DataViewParams::default(),
        }
    }

    pub fn with_params(mut self, params: DataViewParams) -> Self {
        self.params = params;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortRequest {
    pub column_id: String,
    #[serde(default)]
    pub desc: bool,
}

// ============================================================================
// Options
// ============================================================================

/// Options for compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// SQL dialect to generate.
    pub dialect: Dialect,

    /// Current-season constants, used as year/week defaults.
    pub season: Season,

    pub ttls: CacheTtls,

    /// Reference time for `cache_expire_at`.
    pub now: DateTime<Utc>,

    /// Parse the generated SQL before returning it.
    pub validate: bool,
}

impl CompileOptions {
    pub fn new(season: Season) -> Self {
        Self {
            dialect: Dialect::default(),
            season,
            ttls: CacheTtls::default(),
            now: Utc::now(),
            validate: false,
        }
    }

    /// Options from loaded settings, with the season derived for `now`.
    pub fn from_settings(settings: &Settings, now: DateTime<Utc>) -> Self {
        Self {
            dialect: settings.output.dialect,
            season: settings.season(now.date_naive()),
            ttls: settings.cache.clone(),
            now,
            validate: settings.output.validate,
        }
    }

    /// Set the SQL dialect.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result of compiling a data view.
#[derive(Debug, Clone, Serialize)]
pub struct CompileOutput {
    /// Parameterized SQL.
    pub sql: String,

    /// Values for the placeholders in `sql`, in order.
    pub bindings: Vec<Literal>,

    /// Shortest-lived policy across the requested columns.
    pub cache_info: CacheInfo,

    /// The dialect used for generation.
    pub dialect: Dialect,

    /// The SQL query AST (for further manipulation if needed).
    #[serde(skip)]
    pub query: Query,
}

impl CompileOutput {
    /// SQL with bound values inlined. For logs and display only.
    pub fn display_sql(&self) -> String {
        self.query.to_sql(self.dialect)
    }
}

// ============================================================================
// Compilation Functions
// ============================================================================

/// Compile a data view with the default play-by-play filter applier.
pub fn compile_data_view(
    request: &DataViewRequest,
    registry: &ColumnRegistry,
    options: &CompileOptions,
) -> CompileResult<CompileOutput> {
    compile_data_view_with(request, registry, &PlayByPlayFilters::new(), options)
}

/// Compile a data view with a caller-supplied filter applier.
pub fn compile_data_view_with(
    request: &DataViewRequest,
    registry: &ColumnRegistry,
    filters: &dyn FilterApplier,
    options: &CompileOptions,
) -> CompileResult<CompileOutput> {
    if request.columns.is_empty() {
        return Err(CompileError::NoColumns);
    }

    let columns = request
        .columns
        .iter()
        .map(|column| {
            registry
                .get(&column.column_id)
                .map(|definition| (column, definition))
                .ok_or_else(|| CompileError::UnknownColumn(column.column_id.clone()))
        })
        .collect::<CompileResult<Vec<_>>>()?;

    let mut assembly = Assembly::new(request, options, filters)?;
    let team_specs = assembly.team_stats_specs(&columns)?;

    let mut cache_info: Option<CacheInfo> = None;
    for (column, definition) in &columns {
        let info = resolve_cache_policy(
            &column.params,
            definition.cache_kind,
            &options.season,
            &options.ttls,
            options.now,
        );
        cache_info = Some(match cache_info {
            Some(current) => current.merge_min(info),
            None => info,
        });

        assembly.add_column(column, definition, &team_specs)?;
    }
    let cache_info = cache_info.ok_or(CompileError::NoColumns)?;

    let query = assembly.finish()?;
    if options.validate {
        validate_sql(&query.to_sql(options.dialect), options.dialect)?;
    }

    let compiled = query.compile(options.dialect);
    info!(
        columns = columns.len(),
        bindings = compiled.bindings.len(),
        cache_ttl = cache_info.cache_ttl,
        "compiled data view"
    );

    Ok(CompileOutput {
        sql: compiled.sql,
        bindings: compiled.bindings,
        cache_info,
        dialect: options.dialect,
        query,
    })
}

// ============================================================================
// Assembly
// ============================================================================

/// Query under construction for one request.
struct Assembly<'a> {
    query: Query,
    request: &'a DataViewRequest,
    options: &'a CompileOptions,
    filters: &'a dyn FilterApplier,
    refs: Box<dyn ReferenceResolver>,
}

impl<'a> Assembly<'a> {
    fn new(
        request: &'a DataViewRequest,
        options: &'a CompileOptions,
        filters: &'a dyn FilterApplier,
    ) -> CompileResult<Self> {
        let mut query = Query::new()
            .select(vec![table_col("player", "pid").alias("pid")])
            .from(TableRef::new("player"));

        let refs: Box<dyn ReferenceResolver> =
            match add_split_table(&mut query, request, &options.season)? {
                Some(split_refs) => Box::new(split_refs),
                None => Box::new(DataViewOptions::new()),
            };

        Ok(Self {
            query,
            request,
            options,
            filters,
            refs,
        })
    }

    fn season(&self) -> &Season {
        &self.options.season
    }

    fn splits(&self) -> &SplitSet {
        &self.request.splits
    }

    /// Team stat columns sharing a CTE must be registered together, so
    /// group them before any SQL is built.
    fn team_stats_specs(
        &self,
        columns: &[(&ColumnRequest, &ColumnDefinition)],
    ) -> CompileResult<BTreeMap<String, TeamStatsSpec>> {
        let mut specs: BTreeMap<String, TeamStatsSpec> = BTreeMap::new();

        for (column, definition) in columns {
            let ColumnSource::TeamStat {
                unit,
                selects,
                rate,
                active_games,
            } = &definition.source
            else {
                continue;
            };

            let name = self.team_table_name(definition, &column.params)?;
            let params = cte_params(&column.params, self.season().year)?;
            let spec = specs.entry(name.clone()).or_insert_with(|| {
                TeamStatsSpec::new(&name)
                    .unit(*unit)
                    .splits(self.splits().clone())
                    .params(params)
                    .limit_to_player_active_games(*active_games)
                    .default_year(self.season().year)
            });

            spec.select_strings.extend(selects.iter().cloned());
            if !spec.stat_columns.contains(&definition.id) {
                spec.stat_columns.push(definition.id.clone());
            }
            if *rate {
                spec.rate_columns.insert(definition.id.clone());
            }
        }

        Ok(specs)
    }

    fn add_column(
        &mut self,
        column: &ColumnRequest,
        definition: &ColumnDefinition,
        team_specs: &BTreeMap<String, TeamStatsSpec>,
    ) -> CompileResult<()> {
        let id = validate_identifier(&definition.id)?;
        debug!(column = id, "adding column");

        match &definition.source {
            ColumnSource::Player { column: source } => {
                validate_identifier(source)?;
                self.query
                    .add_select(table_col("player", source).alias(id));
            }

            ColumnSource::Table {
                table,
                column: source,
                join_year,
                join_week,
                week_is_text,
                season_level,
            } => {
                validate_identifier(table)?;
                validate_identifier(source)?;
                let alias = table_hash(&format!(
                    "{}_{}_{}",
                    table,
                    params_key(&column.params)?,
                    self.splits_key()
                ));

                if !self.is_joined(&alias) {
                    let spec = self
                        .join_spec(&alias, &column.params)
                        .join_table_clause(TableRef::new(table).with_alias(&alias))
                        .join_year(*join_year)
                        .join_week(*join_week)
                        .cast_join_week_to_string(*week_is_text)
                        .skip_week_split_join(*season_level);
                    build_join(&mut self.query, &spec, &*self.refs)?;
                }
                self.query.add_select(table_col(&alias, source).alias(id));
            }

            ColumnSource::TeamStat { active_games, .. } => {
                let name = self.team_table_name(definition, &column.params)?;
                if !self.query.has_cte(&name) {
                    if let Some(spec) = team_specs.get(&name) {
                        add_team_stats_play_by_play(&mut self.query, spec, self.filters)?;
                    }

                    // a split without year still pins one season
                    let mut spec = self
                        .join_spec(&name, &column.params)
                        .join_year_on_year_split(self.splits().is_empty());
                    if !*active_games {
                        let matchup = column
                            .params
                            .matchup_opponent_type
                            .as_deref()
                            .and_then(|raw| raw.parse::<MatchupOpponentType>().ok());
                        if let Some(matchup) = matchup {
                            self.add_opponent_lookup(matchup)?;
                        }
                        spec = spec.join_on_team("nfl_team").team_stats_table(true);
                    }
                    build_join(&mut self.query, &spec, &*self.refs)?;
                }
                self.query.add_select(table_col(&name, id).alias(id));
            }

            ColumnSource::PerRoute {
                pid_column,
                numerator,
            } => {
                validate_identifier(pid_column)?;
                let key = rate_type_table_key(
                    &column.params,
                    self.splits(),
                    Some(self.season().year),
                )?;

                let routes = table_hash(&key);
                let route_spec = RouteCountSpec::new(&routes)
                    .params(column.params.clone())
                    .splits(self.splits().clone())
                    .default_year(self.season().year);
                add_rate_type_per_player_route(&mut self.query, &route_spec, self.filters)?;
                self.join_once(&routes, &column.params)?;

                let stat = table_hash(&format!("{}_{}_{}", id, pid_column, key));
                if !self.query.has_cte(&stat) {
                    let stat_query = self.per_player_stat(pid_column, numerator, &column.params)?;
                    self.query.add_cte(Cte::new(&stat, stat_query));
                }
                self.join_once(&stat, &column.params)?;

                let value = cast(table_col(&stat, "value"), CastType::Decimal);
                let routes_run = nullif(table_col(&routes, ROUTE_COUNT_COLUMN), lit_int(0));
                self.query.add_select(value.div(routes_run).alias(id));
            }
        }

        Ok(())
    }

    fn finish(mut self) -> CompileResult<Query> {
        for sort in &self.request.sort {
            if !self.query.selects(&sort.column_id) {
                return Err(CompileError::UnknownSortColumn(sort.column_id.clone()));
            }
            let expr = col(&sort.column_id);
            let order = if sort.desc {
                OrderByExpr::desc(expr)
            } else {
                OrderByExpr::asc(expr)
            };
            self.query.order_by.push(order.nulls_last());
        }

        let mut query = self.query;
        if let Some(limit) = self.request.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = self.request.offset {
            query = query.offset(offset);
        }
        Ok(query)
    }

    fn join_spec(&self, table_name: &str, params: &DataViewParams) -> JoinSpec {
        JoinSpec::new(table_name)
            .splits(self.splits().clone())
            .params(params.clone())
            .default_year(self.season().year)
            .default_week(self.season().week)
    }

    /// Join a per-player CTE keyed by pid plus the year and week splits.
    fn join_once(&mut self, name: &str, params: &DataViewParams) -> CompileResult<()> {
        if !self.is_joined(name) {
            let spec = self.join_spec(name, params).join_year_on_year_split(true);
            build_join(&mut self.query, &spec, &*self.refs)?;
        }
        Ok(())
    }

    fn is_joined(&self, name: &str) -> bool {
        self.query
            .joins
            .iter()
            .any(|join| join.source.visible_name() == name)
    }

    fn splits_key(&self) -> String {
        self.splits()
            .iter()
            .map(|split| split.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    fn team_table_name(
        &self,
        definition: &ColumnDefinition,
        params: &DataViewParams,
    ) -> CompileResult<String> {
        let (unit, active_games) = match &definition.source {
            ColumnSource::TeamStat {
                unit, active_games, ..
            } => (unit.column(), *active_games),
            _ => ("", false),
        };
        Ok(table_hash(&format!(
            "team_stats_{}_{}_{}_{}",
            unit,
            active_games,
            params_key(params)?,
            self.splits_key()
        )))
    }

    /// Per-player aggregate over plays, keyed like the route-count CTE.
    fn per_player_stat(
        &self,
        pid_column: &str,
        numerator: &str,
        params: &DataViewParams,
    ) -> CompileResult<Query> {
        let plays = |column: &str| table_col("nfl_plays", column);

        let mut stat = Query::new()
            .select(vec![plays(pid_column).alias("pid")])
            .from(TableRef::new("nfl_plays"));
        stat.add_group_by(plays(pid_column));
        if self.splits().has_year() {
            stat.add_select(plays("year").alias("year"));
            stat.add_group_by(plays("year"));
        }
        if self.splits().has_week() {
            stat.add_select(plays("week").alias("week"));
            stat.add_group_by(plays("week"));
        }
        stat.add_select(raw_sql(numerator).alias("value"));

        stat.add_filter(plays(pid_column).is_not_null());
        let years = expanded_years(params, Some(self.season().year))?
            .into_iter()
            .map(Literal::from)
            .collect();
        if let Some(pred) = set_predicate(plays("year"), years) {
            stat.add_filter(pred);
        }

        let play_params = DataViewParams {
            year: None,
            year_offset: None,
            ..params.without_career_filters()
        };
        self.filters
            .apply_filters(&mut stat, "nfl_plays", &play_params)?;
        Ok(stat)
    }

    /// Register and join the opponent lookup for `matchup` once.
    fn add_opponent_lookup(&mut self, matchup: MatchupOpponentType) -> CompileResult<()> {
        let name = matchup.lookup_table();
        if self.query.has_cte(name) {
            return Ok(());
        }

        let lookup = opponent_lookup(matchup, self.season());
        self.query.add_cte(Cte::new(name, lookup));
        build_join(&mut self.query, &JoinSpec::new(name), &*self.refs)?;
        Ok(())
    }
}

/// `player_years` / `player_years_weeks`: one driving row per player and
/// period. Returns the references joins should match against.
fn add_split_table(
    query: &mut Query,
    request: &DataViewRequest,
    season: &Season,
) -> CompileResult<Option<SplitReferences>> {
    let splits = &request.splits;
    if splits.is_empty() {
        return Ok(None);
    }

    let name = if splits.has_week() {
        "player_years_weeks"
    } else {
        "player_years"
    };
    let logs = |column: &str| table_col("player_gamelogs", column);

    let mut years = BTreeSet::new();
    let mut weeks = BTreeSet::new();
    for column in &request.columns {
        years.extend(column.params.years());
        weeks.extend(column.params.weeks());
    }
    if years.is_empty() {
        years.insert(season.year);
    }

    let mut periods = Query::new()
        .select(vec![logs("pid").alias("pid"), logs("year").alias("year")])
        .from(TableRef::new("player_gamelogs"));
    periods.add_group_by(logs("pid"));
    periods.add_group_by(logs("year"));

    let years = years.into_iter().map(Literal::from).collect();
    if let Some(pred) = set_predicate(logs("year"), years) {
        periods.add_filter(pred);
    }

    if splits.has_week() {
        periods.add_select(logs("week").alias("week"));
        periods.add_group_by(logs("week"));
        let weeks = weeks.into_iter().map(Literal::from).collect();
        if let Some(pred) = set_predicate(logs("week"), weeks) {
            periods.add_filter(pred);
        }
    }

    query.add_cte(Cte::new(name, periods));
    query.add_join(Join {
        join_type: JoinType::Inner,
        source: TableRef::new(name).into(),
        on: Some(table_col(name, "pid").eq(table_col("player", "pid"))),
    });
    query.add_select(table_col(name, "year").alias("year"));
    if splits.has_week() {
        query.add_select(table_col(name, "week").alias("week"));
    }

    Ok(Some(SplitReferences::new(name)?))
}

/// Each player's opponent in the current or next week's game.
fn opponent_lookup(matchup: MatchupOpponentType, season: &Season) -> Query {
    let week = match matchup {
        MatchupOpponentType::CurrentWeekOpponentTotal => season.week,
        MatchupOpponentType::NextWeekOpponentTotal => season.week + 1,
    };

    let team = table_col("player", "current_nfl_team");
    let home = table_col("nfl_games", "h");
    let away = table_col("nfl_games", "v");

    let opponent = Expr::Case {
        operand: None,
        when_clauses: vec![(home.clone().eq(team.clone()), away.clone())],
        else_clause: Some(Box::new(home.clone())),
    };
    let plays_in_game = Expr::Paren(Box::new(home.eq(team.clone()).or(away.eq(team))));
    let on = plays_in_game
        .and(table_col("nfl_games", "year").eq(param(season.year)))
        .and(table_col("nfl_games", "week").eq(param(week)))
        .and(table_col("nfl_games", "seas_type").eq(param(season.nfl_seas_type.clone())));

    Query::new()
        .select(vec![
            table_col("player", "pid").alias("pid"),
            opponent.alias("opponent"),
        ])
        .from(TableRef::new("player"))
        .inner_join(TableRef::new("nfl_games"), on)
}

/// Params for a pre-aggregating CTE: offsets folded into the year list so
/// every year a join can reach is aggregated.
fn cte_params(params: &DataViewParams, default_year: i32) -> CompileResult<DataViewParams> {
    let years = expanded_years(params, Some(default_year))?;
    Ok(DataViewParams {
        year: Some(OneOrMany::many(years)),
        year_offset: None,
        ..params.clone()
    })
}

fn params_key(params: &DataViewParams) -> CompileResult<String> {
    Ok(serde_json::to_string(params)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn season() -> Season {
        Season {
            year: 2024,
            week: 5,
            nfl_seas_week: 5,
            nfl_seas_type: "REG".into(),
        }
    }

    fn compile(request: serde_json::Value) -> CompileResult<CompileOutput> {
        let request: DataViewRequest = serde_json::from_value(request).unwrap();
        let options = CompileOptions::new(season()).with_validation(true);
        compile_data_view(&request, &ColumnRegistry::builtin(), &options)
    }

    #[test]
    fn test_unknown_column() {
        let err = compile(json!({"columns": [{"column_id": "nope"}]})).unwrap_err();
        assert!(matches!(err, CompileError::UnknownColumn(id) if id == "nope"));
    }

    #[test]
    fn test_no_columns() {
        assert!(matches!(
            compile(json!({"columns": []})),
            Err(CompileError::NoColumns)
        ));
    }

    #[test]
    fn test_player_column_only() {
        let output = compile(json!({"columns": [{"column_id": "player_position"}]})).unwrap();
        assert_eq!(
            output.sql,
            "SELECT\n  \"player\".\"pid\" AS \"pid\",\n  \"player\".\"pos\" AS \"player_position\"\nFROM \"player\""
        );
        assert!(output.bindings.is_empty());
    }

    #[test]
    fn test_year_split_adds_driving_cte() {
        let output = compile(json!({
            "columns": [{"column_id": "player_season_points", "params": {"year": [2022, 2023]}}],
            "splits": ["year"]
        }))
        .unwrap();
        let sql = output.display_sql();
        assert!(sql.starts_with("WITH \"player_years\" AS ("));
        assert!(sql.contains("INNER JOIN \"player_years\" ON \"player_years\".\"pid\" = \"player\".\"pid\""));
        assert!(sql.contains(".\"year\" = \"player_years\".\"year\""));
    }

    #[test]
    fn test_shared_join_for_equal_params() {
        let output = compile(json!({
            "columns": [
                {"column_id": "player_game_points", "params": {"year": 2023, "week": 4}},
                {"column_id": "player_game_points", "params": {"year": 2023, "week": 4}},
            ]
        }))
        .unwrap();
        assert_eq!(output.query.joins.len(), 1);
    }

    #[test]
    fn test_sort_requires_output_column() {
        let err = compile(json!({
            "columns": [{"column_id": "player_position"}],
            "sort": [{"column_id": "player_draft_position"}]
        }))
        .unwrap_err();
        assert!(matches!(err, CompileError::UnknownSortColumn(_)));

        let output = compile(json!({
            "columns": [{"column_id": "player_draft_position"}],
            "sort": [{"column_id": "player_draft_position", "desc": true}],
            "limit": 50
        }))
        .unwrap();
        assert!(output
            .sql
            .ends_with("ORDER BY \"player_draft_position\" DESC NULLS LAST\nLIMIT 50"));
    }

    #[test]
    fn test_cache_info_takes_shortest() {
        let output = compile(json!({
            "columns": [
                {"column_id": "player_draft_position"},
                {"column_id": "player_prop_line"},
            ]
        }))
        .unwrap();
        assert_eq!(output.cache_info.cache_ttl, CacheTtls::default().betting);
    }
}

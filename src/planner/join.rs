//! ON-clause construction for data-view enrichment joins.
//!
//! Every requested column that lives outside the driving `player` rows is
//! attached with a join built here. The predicate shape depends on the
//! requested splits and on how the year filter was expressed:
//!
//! ```text
//! year split, offset [k, k]       table.year = ref + k
//! year split, offset [a, b]       table.year BETWEEN ref + a AND ref + b
//! year split, scalar year         table.year = <year>
//! year split, year list           table.year = ref AND table.year IN (...)
//! no year split, year given       table.year = <year[0]>
//! no splits at all                literal comparisons against the params
//! ```
//!
//! Picking the wrong shape silently changes aggregation results (double
//! counting across seasons), so each branch is logged at debug level.

use std::fmt;

use tracing::{debug, warn};

use super::{PlanError, PlanResult};
use crate::params::{DataViewParams, MatchupOpponentType, Split, SplitSet, YearOffsetRange};
use crate::sql::{
    and_all, cast, lit_bool, param, table_col, validate_identifier, CastType, ColumnRef, Expr,
    ExprExt, Join, JoinType, Literal, Query, QueryResult, TableRef, TableSource,
};

// =============================================================================
// Reference resolution
// =============================================================================

/// Names the driving-row columns a join is matched against.
pub trait ReferenceResolver {
    /// Year of the driving row. Required for a year split.
    fn year_ref(&self) -> Option<Expr>;

    /// Week of the driving row. Required for a week split.
    fn week_ref(&self) -> Option<Expr>;

    fn pid_ref(&self) -> Expr;

    /// The player's current NFL team, for team-mode joins.
    fn team_ref(&self) -> Expr;
}

/// One split table carries both the year and week of each driving row,
/// e.g. `player_years_weeks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitReferences {
    split_table: String,
    player_table: String,
}

impl SplitReferences {
    pub fn new(split_table: &str) -> QueryResult<Self> {
        Ok(Self {
            split_table: validate_identifier(split_table)?.to_string(),
            player_table: "player".into(),
        })
    }
}

impl ReferenceResolver for SplitReferences {
    fn year_ref(&self) -> Option<Expr> {
        Some(table_col(&self.split_table, "year"))
    }

    fn week_ref(&self) -> Option<Expr> {
        Some(table_col(&self.split_table, "week"))
    }

    fn pid_ref(&self) -> Expr {
        table_col(&self.player_table, "pid")
    }

    fn team_ref(&self) -> Expr {
        table_col(&self.player_table, "current_nfl_team")
    }
}

/// Named references for each driving-row column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataViewOptions {
    pub year_reference: Option<ColumnRef>,
    pub week_reference: Option<ColumnRef>,
    pub pid_reference: ColumnRef,
    pub team_reference: ColumnRef,
}

impl Default for DataViewOptions {
    fn default() -> Self {
        Self {
            year_reference: None,
            week_reference: None,
            pid_reference: ColumnRef {
                table: "player".into(),
                column: "pid".into(),
            },
            team_reference: ColumnRef {
                table: "player".into(),
                column: "current_nfl_team".into(),
            },
        }
    }
}

impl DataViewOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn year_reference(mut self, reference: &str) -> QueryResult<Self> {
        self.year_reference = Some(ColumnRef::parse(reference)?);
        Ok(self)
    }

    pub fn week_reference(mut self, reference: &str) -> QueryResult<Self> {
        self.week_reference = Some(ColumnRef::parse(reference)?);
        Ok(self)
    }

    pub fn pid_reference(mut self, reference: &str) -> QueryResult<Self> {
        self.pid_reference = ColumnRef::parse(reference)?;
        Ok(self)
    }

    pub fn team_reference(mut self, reference: &str) -> QueryResult<Self> {
        self.team_reference = ColumnRef::parse(reference)?;
        Ok(self)
    }
}

impl ReferenceResolver for DataViewOptions {
    fn year_ref(&self) -> Option<Expr> {
        self.year_reference.as_ref().map(ColumnRef::expr)
    }

    fn week_ref(&self) -> Option<Expr> {
        self.week_reference.as_ref().map(ColumnRef::expr)
    }

    fn pid_ref(&self) -> Expr {
        self.pid_reference.expr()
    }

    fn team_ref(&self) -> Expr {
        self.team_reference.expr()
    }
}

// =============================================================================
// Join specification
// =============================================================================

/// Table-specific predicates appended after the generated ones.
pub type AdditionalConditions = Box<dyn Fn(&JoinSpec) -> Vec<Expr> + Send + Sync>;

/// One enrichment join.
pub struct JoinSpec {
    pub table_name: String,
    /// Source joined in place of the bare table: an aliased table or
    /// subquery whose visible name is `table_name`.
    pub join_table_clause: Option<TableSource>,
    pub join_type: JoinType,
    pub splits: SplitSet,
    pub params: DataViewParams,
    /// Year used when `params.year` is absent.
    pub default_year: Option<i32>,
    /// Week used when `params.week` is absent.
    pub default_week: i32,
    pub join_year: bool,
    pub join_week: bool,
    /// Only constrain year when year is a split.
    pub join_year_on_year_split: bool,
    pub cast_join_week_to_string: bool,
    pub skip_week_split_join: bool,
    pub join_on_team: bool,
    /// Column holding the team on the joined table (team mode only).
    pub team_column: String,
    /// Team stats tables are keyed by week as well as team.
    pub is_team_stats_table: bool,
    pub additional_conditions: Option<AdditionalConditions>,
}

impl fmt::Debug for JoinSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinSpec")
            .field("table_name", &self.table_name)
            .field("join_type", &self.join_type)
            .field("splits", &self.splits)
            .field("params", &self.params)
            .field("join_year", &self.join_year)
            .field("join_week", &self.join_week)
            .field("join_on_team", &self.join_on_team)
            .field(
                "additional_conditions",
                &self.additional_conditions.as_ref().map(|_| ".."),
            )
            .finish_non_exhaustive()
    }
}

impl JoinSpec {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.into(),
            join_table_clause: None,
            join_type: JoinType::Left,
            splits: SplitSet::new(),
            params: DataViewParams::default(),
            default_year: None,
            default_week: 0,
            join_year: false,
            join_week: false,
            join_year_on_year_split: false,
            cast_join_week_to_string: false,
            skip_week_split_join: false,
            join_on_team: false,
            team_column: "nfl_team".into(),
            is_team_stats_table: false,
            additional_conditions: None,
        }
    }

    pub fn join_table_clause(mut self, source: impl Into<TableSource>) -> Self {
        self.join_table_clause = Some(source.into());
        self
    }

    pub fn join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = join_type;
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

    pub fn default_year(mut self, year: i32) -> Self {
        self.default_year = Some(year);
        self
    }

    pub fn default_week(mut self, week: i32) -> Self {
        self.default_week = week;
        self
    }

    pub fn join_year(mut self, yes: bool) -> Self {
        self.join_year = yes;
        self
    }

    pub fn join_week(mut self, yes: bool) -> Self {
        self.join_week = yes;
        self
    }

    pub fn join_year_on_year_split(mut self, yes: bool) -> Self {
        self.join_year_on_year_split = yes;
        self
    }

    pub fn cast_join_week_to_string(mut self, yes: bool) -> Self {
        self.cast_join_week_to_string = yes;
        self
    }

    pub fn skip_week_split_join(mut self, yes: bool) -> Self {
        self.skip_week_split_join = yes;
        self
    }

    pub fn join_on_team(mut self, team_column: &str) -> Self {
        self.join_on_team = true;
        self.team_column = team_column.into();
        self
    }

    pub fn team_stats_table(mut self, yes: bool) -> Self {
        self.is_team_stats_table = yes;
        self
    }

    pub fn additional_conditions<F>(mut self, f: F) -> Self
    where
        F: Fn(&JoinSpec) -> Vec<Expr> + Send + Sync + 'static,
    {
        self.additional_conditions = Some(Box::new(f));
        self
    }

    /// Years from params, falling back to the default year.
    fn years(&self) -> Vec<i32> {
        let years = self.params.years();
        if years.is_empty() {
            self.default_year.into_iter().collect()
        } else {
            years
        }
    }

    /// Weeks from params, falling back to the default week.
    fn weeks(&self) -> Vec<i32> {
        let weeks = self.params.weeks();
        if weeks.is_empty() {
            vec![self.default_week]
        } else {
            weeks
        }
    }

    fn column(&self, name: &str) -> Expr {
        table_col(&self.table_name, name)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Attach `spec` to `query` as a join with a generated ON clause.
pub fn build_join(
    query: &mut Query,
    spec: &JoinSpec,
    refs: &dyn ReferenceResolver,
) -> PlanResult<()> {
    let on = join_condition(spec, refs)?;

    let source = spec
        .join_table_clause
        .clone()
        .unwrap_or_else(|| TableRef::new(&spec.table_name).into());

    query.add_join(Join {
        join_type: spec.join_type,
        source,
        on: Some(on),
    });
    Ok(())
}

/// Build the ON clause for `spec`. An empty predicate list becomes `TRUE`.
pub fn join_condition(spec: &JoinSpec, refs: &dyn ReferenceResolver) -> PlanResult<Expr> {
    validate_identifier(&spec.table_name)?;
    if spec.join_on_team {
        validate_identifier(&spec.team_column)?;
    }

    let offsets = spec.params.year_offset_range()?;
    let mut preds = Vec::new();

    let week_joined = entity_predicates(spec, refs, &mut preds)?;

    if spec.splits.is_empty() {
        literal_period_predicates(spec, offsets, &mut preds)?;
    } else {
        split_period_predicates(spec, refs, offsets, week_joined, &mut preds)?;
    }

    if let Some(additional) = &spec.additional_conditions {
        preds.extend(additional(spec));
    }

    Ok(and_all(preds).unwrap_or_else(|| lit_bool(true)))
}

/// Team or player matching. Returns whether a week equality was added.
fn entity_predicates(
    spec: &JoinSpec,
    refs: &dyn ReferenceResolver,
    preds: &mut Vec<Expr>,
) -> PlanResult<bool> {
    if !spec.join_on_team {
        preds.push(spec.column("pid").eq(refs.pid_ref()));
        return Ok(false);
    }

    let team_col = spec.column(&spec.team_column);
    match spec.params.matchup_opponent_type.as_deref() {
        Some(raw) => match raw.parse::<MatchupOpponentType>() {
            Ok(matchup) => {
                debug!(
                    table = %spec.table_name,
                    matchup = matchup.as_str(),
                    "joining team stats on opponent lookup"
                );
                preds.push(team_col.eq(table_col(matchup.lookup_table(), "opponent")));
            }
            Err(_) => {
                warn!(
                    table = %spec.table_name,
                    matchup_opponent_type = raw,
                    "unknown matchup_opponent_type, joining without a team predicate"
                );
            }
        },
        None => {
            preds.push(team_col.eq(refs.team_ref()));
            if spec.splits.has_week() && spec.is_team_stats_table {
                let week_ref = refs.week_ref().ok_or(PlanError::MissingReference(Split::Week))?;
                preds.push(spec.column("week").eq(week_ref));
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Year/week predicates against the driving row's split references.
fn split_period_predicates(
    spec: &JoinSpec,
    refs: &dyn ReferenceResolver,
    offsets: YearOffsetRange,
    week_joined: bool,
    preds: &mut Vec<Expr>,
) -> PlanResult<()> {
    let year_col = spec.column("year");

    if spec.splits.has_year() {
        let year_ref = refs.year_ref().ok_or(PlanError::MissingReference(Split::Year))?;

        if !offsets.is_zero() {
            if offsets.is_single() {
                debug!(table = %spec.table_name, offset = offsets.min, "year split with exact offset");
                preds.push(year_col.eq(year_ref.add(param(offsets.min))));
            } else {
                debug!(
                    table = %spec.table_name,
                    min = offsets.min,
                    max = offsets.max,
                    "year split with offset range"
                );
                preds.push(year_col.between(
                    year_ref.clone().add(param(offsets.min)),
                    year_ref.add(param(offsets.max)),
                ));
            }
        } else if let Some(year) = spec.params.scalar_year() {
            debug!(table = %spec.table_name, year, "year split pinned to scalar year");
            preds.push(year_col.eq(param(year)));
        } else {
            preds.push(year_col.clone().eq(year_ref));
            let years = spec.params.years();
            if !years.is_empty() {
                preds.push(year_col.in_list(years.into_iter().map(param).collect()));
            }
        }
    } else if !spec.join_year_on_year_split {
        if let Some(&year) = spec.years().first() {
            debug!(table = %spec.table_name, year, "pinning year without year split");
            preds.push(year_col.eq(param(year)));
        }
    }

    let week_col = spec.column("week");

    if spec.splits.has_week() && !spec.skip_week_split_join && !week_joined {
        let week_ref = refs.week_ref().ok_or(PlanError::MissingReference(Split::Week))?;
        let week_ref = if spec.cast_join_week_to_string {
            cast(week_ref, CastType::Text)
        } else {
            week_ref
        };
        preds.push(week_col.clone().eq(week_ref));
    }

    if spec.join_week {
        if spec.splits.has_week() {
            let weeks = spec.params.weeks();
            if weeks.is_empty() {
                // no weeks requested: every week of the split stays joinable
                debug!(table = %spec.table_name, "week split without week filter");
            } else {
                preds.push(week_col.in_list(week_params(&weeks)));
            }
        } else {
            preds.push(week_predicate(week_col, &spec.weeks()));
        }
    }

    Ok(())
}

/// Year/week predicates when no split is requested: literal comparisons.
fn literal_period_predicates(
    spec: &JoinSpec,
    offsets: YearOffsetRange,
    preds: &mut Vec<Expr>,
) -> PlanResult<()> {
    if spec.join_year && !spec.join_year_on_year_split {
        let years = spec.years();
        if !years.is_empty() {
            preds.push(literal_year_predicate(spec.column("year"), &years, offsets)?);
        }
    }

    if spec.join_week {
        preds.push(week_predicate(spec.column("week"), &spec.weeks()));
    }
    Ok(())
}

fn literal_year_predicate(
    year_col: Expr,
    years: &[i32],
    offsets: YearOffsetRange,
) -> PlanResult<Expr> {
    if offsets.is_single() {
        let shifted = years
            .iter()
            .map(|&y| YearOffsetRange::shift(y, offsets.min))
            .collect::<Result<Vec<i32>, _>>()?;
        return Ok(match shifted.as_slice() {
            [year] => year_col.eq(param(*year)),
            _ => year_col.in_list(shifted.into_iter().map(param).collect()),
        });
    }

    // non-empty by caller contract
    let first = years.iter().min().copied().unwrap_or_default();
    let last = years.iter().max().copied().unwrap_or_default();
    Ok(year_col.between(
        param(YearOffsetRange::shift(first, offsets.min)?),
        param(YearOffsetRange::shift(last, offsets.max)?),
    ))
}

fn week_params(weeks: &[i32]) -> Vec<Expr> {
    weeks
        .iter()
        .map(|w| Expr::Param(Literal::String(w.to_string())))
        .collect()
}

fn week_predicate(week_col: Expr, weeks: &[i32]) -> Expr {
    match weeks {
        [week] => week_col.eq(param(week.to_string())),
        _ => week_col.in_list(week_params(weeks)),
    }
}

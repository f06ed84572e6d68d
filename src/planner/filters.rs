//! Filter parameters → WHERE predicates.
//!
//! The applier knows a closed catalog of `nfl_plays` columns. Anything not
//! in the catalog is ignored, so request JSON can carry keys meant for
//! other layers without breaking the query.

use serde_json::Value;
use tracing::debug;

use super::PlanResult;
use crate::params::DataViewParams;
use crate::sql::{param, table_col, validate_identifier, Expr, ExprExt, Literal, Query};

/// Mutates a query with WHERE predicates derived from filter parameters.
pub trait FilterApplier {
    /// Add predicates for `params` against columns of `table`.
    fn apply_filters(&self, query: &mut Query, table: &str, params: &DataViewParams)
        -> PlanResult<()>;
}

/// How a catalog column is filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Scalar or list ⇒ `=` / `IN`.
    Set,
    /// `[min, max]` ⇒ `BETWEEN`; a scalar ⇒ `=`.
    Range,
    /// Boolean ⇒ `=`.
    Flag,
}

const PLAY_BY_PLAY_CATALOG: &[(&str, FilterKind)] = &[
    ("play_type", FilterKind::Set),
    ("dwn", FilterKind::Set),
    ("qtr", FilterKind::Set),
    ("off", FilterKind::Set),
    ("def", FilterKind::Set),
    ("psr_pid", FilterKind::Set),
    ("trg_pid", FilterKind::Set),
    ("bc_pid", FilterKind::Set),
    ("ydl_100", FilterKind::Range),
    ("ytg", FilterKind::Range),
    ("score_diff", FilterKind::Range),
    ("air_yds", FilterKind::Range),
    ("sec_rem_qtr", FilterKind::Range),
    ("wp", FilterKind::Range),
    ("fd", FilterKind::Flag),
    ("goal_to_go", FilterKind::Flag),
    ("qb_kneel", FilterKind::Flag),
    ("qb_spike", FilterKind::Flag),
];

/// Table holding `career_year` / `career_game`.
const CAREER_TABLE: &str = "player_gamelogs";

/// Default applier for play-by-play queries.
#[derive(Debug, Clone, Default)]
pub struct PlayByPlayFilters;

impl PlayByPlayFilters {
    pub fn new() -> Self {
        Self
    }

    pub fn catalog() -> &'static [(&'static str, FilterKind)] {
        PLAY_BY_PLAY_CATALOG
    }

    fn kind_of(name: &str) -> Option<FilterKind> {
        PLAY_BY_PLAY_CATALOG
            .iter()
            .find(|(column, _)| *column == name)
            .map(|(_, kind)| *kind)
    }
}

impl FilterApplier for PlayByPlayFilters {
    fn apply_filters(
        &self,
        query: &mut Query,
        table: &str,
        params: &DataViewParams,
    ) -> PlanResult<()> {
        validate_identifier(table)?;

        let years = params.years().into_iter().map(Literal::from).collect();
        if let Some(pred) = set_predicate(table_col(table, "year"), years) {
            query.add_filter(pred);
        }

        let weeks = params.weeks().into_iter().map(Literal::from).collect();
        if let Some(pred) = set_predicate(table_col(table, "week"), weeks) {
            query.add_filter(pred);
        }

        let seas_types = params.seas_types().into_iter().map(Literal::from).collect();
        if let Some(pred) = set_predicate(table_col(table, "seas_type"), seas_types) {
            query.add_filter(pred);
        }

        if references_table(query, CAREER_TABLE) {
            for (name, values) in [
                ("career_year", params.career_years()),
                ("career_game", params.career_games()),
            ] {
                if let Some(pred) = range_predicate(table_col(CAREER_TABLE, name), &values) {
                    query.add_filter(pred);
                }
            }
        }

        for (name, value) in &params.extra {
            let Some(kind) = Self::kind_of(name) else {
                debug!(filter = %name, "ignoring unknown filter");
                continue;
            };

            let column = table_col(table, name);
            let pred = match kind {
                FilterKind::Set => set_predicate(column, json_literals(value)),
                FilterKind::Range => {
                    let bounds: Vec<f64> = json_literals(value)
                        .iter()
                        .filter_map(literal_number)
                        .collect();
                    match bounds.as_slice() {
                        [_] | [_, _] => range_predicate_f64(column, &bounds),
                        _ => {
                            debug!(filter = %name, "malformed range filter");
                            None
                        }
                    }
                }
                FilterKind::Flag => match value {
                    Value::Bool(b) => Some(column.eq(param(*b))),
                    _ => {
                        debug!(filter = %name, "non-boolean flag filter");
                        None
                    }
                },
            };

            if let Some(pred) = pred {
                query.add_filter(pred);
            }
        }

        Ok(())
    }
}

/// `col = v` for one value, `col IN (...)` for several, nothing for none.
pub fn set_predicate(column: Expr, values: Vec<Literal>) -> Option<Expr> {
    let mut values: Vec<Expr> = values.into_iter().map(Expr::Param).collect();
    match values.len() {
        0 => None,
        1 => values.pop().map(|v| column.eq(v)),
        _ => Some(column.in_list(values)),
    }
}

fn range_predicate(column: Expr, values: &[i32]) -> Option<Expr> {
    let low = values.iter().min()?;
    let high = values.iter().max()?;
    if low == high {
        Some(column.eq(param(*low)))
    } else {
        Some(column.between(param(*low), param(*high)))
    }
}

fn range_predicate_f64(column: Expr, values: &[f64]) -> Option<Expr> {
    let low = values.iter().copied().reduce(f64::min)?;
    let high = values.iter().copied().reduce(f64::max)?;
    let bound = |v: f64| {
        if v.fract() == 0.0 {
            param(Literal::Int(v as i64))
        } else {
            param(Literal::Float(v))
        }
    };
    if low == high {
        Some(column.eq(bound(low)))
    } else {
        Some(column.between(bound(low), bound(high)))
    }
}

fn references_table(query: &Query, table: &str) -> bool {
    query
        .from
        .iter()
        .map(|source| source.visible_name())
        .chain(query.joins.iter().map(|join| join.source.visible_name()))
        .any(|name| name == table)
}

fn json_literal(value: &Value) -> Option<Literal> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Literal::Int)
            .or_else(|| n.as_f64().map(Literal::Float)),
        Value::String(s) => Some(Literal::String(s.clone())),
        Value::Bool(b) => Some(Literal::Bool(*b)),
        _ => None,
    }
}

fn json_literals(value: &Value) -> Vec<Literal> {
    match value {
        Value::Array(items) => items.iter().filter_map(json_literal).collect(),
        other => json_literal(other).into_iter().collect(),
    }
}

fn literal_number(literal: &Literal) -> Option<f64> {
    match literal {
        Literal::Int(n) => Some(*n as f64),
        Literal::Float(f) => Some(*f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{Dialect, TableRef};
    use serde_json::json;

    fn apply(params: serde_json::Value) -> String {
        let params: DataViewParams = serde_json::from_value(params).unwrap();
        let mut query = Query::new().select_star().from(TableRef::new("nfl_plays"));
        PlayByPlayFilters::new()
            .apply_filters(&mut query, "nfl_plays", &params)
            .unwrap();
        query.to_sql(Dialect::Postgres)
    }

    #[test]
    fn test_year_week_seas_type() {
        let sql = apply(json!({"year": [2023, 2024], "week": 3, "seas_type": "REG"}));
        assert!(sql.contains(
            "WHERE \"nfl_plays\".\"year\" IN (2023, 2024) AND \"nfl_plays\".\"week\" = 3 AND \"nfl_plays\".\"seas_type\" = 'REG'"
        ));
    }

    #[test]
    fn test_catalog_kinds() {
        let sql = apply(json!({
            "dwn": [3, 4],
            "ydl_100": [20, 0],
            "goal_to_go": true,
        }));
        assert!(sql.contains("\"nfl_plays\".\"dwn\" IN (3, 4)"));
        assert!(sql.contains("\"nfl_plays\".\"goal_to_go\" = true"));
        assert!(sql.contains("\"nfl_plays\".\"ydl_100\" BETWEEN 0 AND 20"));
    }

    #[test]
    fn test_fractional_range() {
        let sql = apply(json!({"wp": [0.25, 0.75]}));
        assert!(sql.contains("\"nfl_plays\".\"wp\" BETWEEN 0.25 AND 0.75"));
    }

    #[test]
    fn test_unknown_and_malformed_keys_ignored() {
        let sql = apply(json!({"favorite_color": "green", "ytg": [1, 2, 3], "fd": "yes"}));
        assert!(!sql.contains("WHERE"));
    }

    #[test]
    fn test_career_filters_need_gamelogs() {
        let sql = apply(json!({"career_year": [1, 3]}));
        assert!(!sql.contains("career_year"));

        let params: DataViewParams =
            serde_json::from_value(json!({"career_year": [1, 3], "career_game": 5})).unwrap();
        let mut query = Query::new()
            .select_star()
            .from(TableRef::new("nfl_plays"))
            .inner_join(
                TableRef::new("player_gamelogs"),
                table_col("player_gamelogs", "esbid").eq(table_col("nfl_plays", "esbid")),
            );
        PlayByPlayFilters::new()
            .apply_filters(&mut query, "nfl_plays", &params)
            .unwrap();
        let sql = query.to_sql(Dialect::Postgres);
        assert!(sql.contains("\"player_gamelogs\".\"career_year\" BETWEEN 1 AND 3"));
        assert!(sql.contains("\"player_gamelogs\".\"career_game\" = 5"));
    }

    #[test]
    fn test_values_are_bound() {
        let params: DataViewParams =
            serde_json::from_value(json!({"play_type": "PASS'; --"})).unwrap();
        let mut query = Query::new().select_star().from(TableRef::new("nfl_plays"));
        PlayByPlayFilters::new()
            .apply_filters(&mut query, "nfl_plays", &params)
            .unwrap();
        let compiled = query.compile(Dialect::Postgres);
        assert!(compiled.sql.ends_with("\"nfl_plays\".\"play_type\" = $1"));
        assert_eq!(compiled.bindings, vec![Literal::String("PASS'; --".into())]);
    }
}

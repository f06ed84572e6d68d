//! Tests for enrichment-join ON clauses.

use gridiron::params::{DataViewParams, Split};
use gridiron::planner::{build_join, join_condition, DataViewOptions, JoinSpec, SplitReferences};
use gridiron::sql::{Dialect, Literal, Query, TableRef};
use serde_json::json;

fn params(value: serde_json::Value) -> DataViewParams {
    serde_json::from_value(value).unwrap()
}

fn split_refs() -> DataViewOptions {
    DataViewOptions::new()
        .year_reference("player_years.year")
        .unwrap()
        .week_reference("player_weeks.week")
        .unwrap()
}

fn on_sql(spec: &JoinSpec) -> String {
    join_condition(spec, &split_refs())
        .unwrap()
        .to_tokens()
        .serialize(Dialect::Postgres)
}

#[test]
fn test_offset_bounds_are_order_independent() {
    let forward = JoinSpec::new("player_seasonlogs")
        .splits([Split::Year].into())
        .params(params(json!({"year_offset": [1, 3]})));
    let backward = JoinSpec::new("player_seasonlogs")
        .splits([Split::Year].into())
        .params(params(json!({"year_offset": [3, 1]})));

    let a = join_condition(&forward, &split_refs())
        .unwrap()
        .to_tokens()
        .compile(Dialect::Postgres);
    let b = join_condition(&backward, &split_refs())
        .unwrap()
        .to_tokens()
        .compile(Dialect::Postgres);

    assert_eq!(a, b);
    assert!(a.sql.ends_with(
        "\"player_seasonlogs\".\"year\" BETWEEN \"player_years\".\"year\" + $1 AND \"player_years\".\"year\" + $2"
    ));
    assert_eq!(a.bindings, vec![Literal::Int(1), Literal::Int(3)]);
}

#[test]
fn test_scalar_offset_matches_single_element_range() {
    let scalar = JoinSpec::new("player_seasonlogs")
        .splits([Split::Year].into())
        .params(params(json!({"year_offset": 2})));
    let range = JoinSpec::new("player_seasonlogs")
        .splits([Split::Year].into())
        .params(params(json!({"year_offset": [2, 2]})));

    assert_eq!(on_sql(&scalar), on_sql(&range));
    assert!(on_sql(&scalar).ends_with("\"player_seasonlogs\".\"year\" = \"player_years\".\"year\" + 2"));
}

#[test]
fn test_same_spec_same_join() {
    let spec = || {
        JoinSpec::new("player_gamelogs")
            .splits([Split::Year, Split::Week].into())
            .params(params(json!({"year": [2022, 2023], "week": [1, 2]})))
            .join_week(true)
    };

    let mut first = Query::new().select_star().from(TableRef::new("player"));
    let mut second = Query::new().select_star().from(TableRef::new("player"));
    build_join(&mut first, &spec(), &split_refs()).unwrap();
    build_join(&mut second, &spec(), &split_refs()).unwrap();

    assert_eq!(
        first.compile(Dialect::Postgres),
        second.compile(Dialect::Postgres)
    );
}

#[test]
fn test_week_split_with_week_filter() {
    let spec = JoinSpec::new("player_gamelogs")
        .splits([Split::Year, Split::Week].into())
        .params(params(json!({"year": [2022], "year_offset": 0, "week": [1, 2]})))
        .join_week(true);

    insta::assert_snapshot!(
        on_sql(&spec),
        @r#""player_gamelogs"."pid" = "player"."pid" AND "player_gamelogs"."year" = "player_years"."year" AND "player_gamelogs"."year" IN (2022) AND "player_gamelogs"."week" = "player_weeks"."week" AND "player_gamelogs"."week" IN ('1', '2')"#
    );
}

#[test]
fn test_week_split_without_week_filter() {
    let spec = JoinSpec::new("player_gamelogs")
        .splits([Split::Year, Split::Week].into())
        .params(params(json!({"year": [2022], "year_offset": 0})))
        .join_week(true);

    let sql = on_sql(&spec);
    assert!(sql.ends_with("\"player_gamelogs\".\"week\" = \"player_weeks\".\"week\""));
    assert!(!sql.contains("\"week\" IN"));
}

#[test]
fn test_split_table_references() {
    let refs = SplitReferences::new("player_years_weeks").unwrap();
    let spec = JoinSpec::new("player_gamelogs")
        .splits([Split::Week].into())
        .params(params(json!({"year": 2023})));

    let sql = join_condition(&spec, &refs)
        .unwrap()
        .to_tokens()
        .serialize(Dialect::Postgres);
    assert_eq!(
        sql,
        "\"player_gamelogs\".\"pid\" = \"player\".\"pid\" AND \"player_gamelogs\".\"year\" = 2023 AND \"player_gamelogs\".\"week\" = \"player_years_weeks\".\"week\""
    );
}

#[test]
fn test_unknown_matchup_joins_unconditionally() {
    let spec = JoinSpec::new("team_stats")
        .join_on_team("nfl_team")
        .params(params(json!({"matchup_opponent_type": "division_rival"})));
    assert_eq!(on_sql(&spec), "true");
}

#[test]
fn test_duckdb_week_cast() {
    let spec = JoinSpec::new("projections_index")
        .splits([Split::Week].into())
        .join_year_on_year_split(true)
        .cast_join_week_to_string(true);

    let sql = join_condition(&spec, &split_refs())
        .unwrap()
        .to_tokens_for_dialect(Dialect::DuckDb)
        .serialize(Dialect::DuckDb);
    assert!(sql.ends_with("CAST(\"player_weeks\".\"week\" AS VARCHAR)"));
}

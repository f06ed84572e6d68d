//! Tests for the team-stats CTE pair.

use gridiron::params::{DataViewParams, Split};
use gridiron::planner::{add_team_stats_play_by_play, PlayByPlayFilters, TeamStatsSpec, TeamUnit};
use gridiron::sql::{Dialect, Query, TableRef};
use serde_json::json;

fn params(value: serde_json::Value) -> DataViewParams {
    serde_json::from_value(value).unwrap()
}

fn render(spec: &TeamStatsSpec) -> String {
    let mut query = Query::new().select_star().from(TableRef::new("player"));
    add_team_stats_play_by_play(&mut query, spec, &PlayByPlayFilters::new()).unwrap();
    query.to_sql(Dialect::Postgres)
}

#[test]
fn test_rate_is_ratio_of_sums() {
    let spec = TeamStatsSpec::new("team_completion")
        .select_string("SUM(CASE WHEN nfl_plays.comp THEN 1 ELSE 0 END) AS completion_pct_numerator")
        .select_string("SUM(CASE WHEN nfl_plays.play_type = 'PASS' THEN 1 ELSE 0 END) AS completion_pct_denominator")
        .rate_column("completion_pct")
        .splits([Split::Year].into());

    let sql = render(&spec);
    let final_stage = sql
        .split("\"team_completion\" AS (")
        .nth(1)
        .unwrap();

    assert_eq!(final_stage.matches("SUM(").count(), 2);
    assert!(!sql.contains("AVG("));
    assert!(final_stage.contains("NULLIF(SUM(\"team_completion_play_by_play\".\"completion_pct_denominator\"), 0)"));
}

#[test]
fn test_defense_unit_groups_by_def() {
    let spec = TeamStatsSpec::new("team_sacks")
        .unit(TeamUnit::Defense)
        .select_string("SUM(CASE WHEN nfl_plays.sk THEN 1 ELSE 0 END) AS sacks")
        .stat_column("sacks")
        .splits([Split::Year, Split::Week].into());

    let sql = render(&spec);
    assert!(sql.contains("\"nfl_plays\".\"def\" AS \"nfl_team\""));
    assert!(sql.contains("\"team_sacks_play_by_play\".\"week\" AS \"week\""));
    assert!(sql.contains("SUM(\"team_sacks_play_by_play\".\"sacks\") AS \"sacks\""));
}

#[test]
fn test_play_filters_reach_first_stage() {
    let spec = TeamStatsSpec::new("team_red_zone")
        .select_string("COUNT(*) AS plays")
        .stat_column("plays")
        .params(params(json!({"year": [2022, 2023], "ydl_100": [0, 20], "seas_type": "REG"})));

    let sql = render(&spec);
    assert!(sql.contains("\"nfl_plays\".\"year\" IN (2022, 2023)"));
    assert!(sql.contains("\"nfl_plays\".\"ydl_100\" BETWEEN 0 AND 20"));
    assert!(sql.contains("\"nfl_plays\".\"seas_type\" = 'REG'"));
}

#[test]
fn test_active_games_use_requested_season_type() {
    let spec = TeamStatsSpec::new("team_targets")
        .select_string("COUNT(*) AS targets")
        .stat_column("targets")
        .params(params(json!({"seas_type": ["REG", "POST"]})))
        .limit_to_player_active_games(true);

    let sql = render(&spec);
    assert!(sql.contains("\"player_gamelogs\".\"seas_type\" IN ('REG', 'POST')"));
    assert!(sql.contains("\"player_gamelogs\".\"active\" = true"));
    assert!(sql.contains("\"player_gamelogs\".\"pid\" AS \"pid\""));
}

#[test]
fn test_invalid_stat_column_rejected() {
    let spec = TeamStatsSpec::new("team_bad").stat_column("yards; drop table player");
    let mut query = Query::new();
    assert!(add_team_stats_play_by_play(&mut query, &spec, &PlayByPlayFilters::new()).is_err());
    assert!(query.with.is_empty());
}
